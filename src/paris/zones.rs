//! Feature regions and the chromosome zone index over them.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

/// Zone width used to bucket feature regions.
///
/// Only affects lookup speed; it need not match the knowledge zone size.
pub const PARIS_ZONE_SIZE: i64 = 100_000;

/// Feature identifier, the `rowid` of its `main.region` row.
pub type FeatureId = i64;

/// Observed tallies of one feature region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    /// Chromosome.
    pub chr: i64,
    /// Margin-expanded start.
    pub pos_min: i64,
    /// Margin-expanded end.
    pub pos_max: i64,
    /// Loci inside the region.
    pub matches: u32,
    /// Significant loci inside the region.
    pub significant: u32,
}

impl Feature {
    /// Whether any locus inside the region was significant.
    pub fn is_significant(&self) -> bool {
        self.significant > 0
    }

    fn contains(&self, chr: i64, pos: i64) -> bool {
        self.chr == chr && self.pos_min <= pos && pos <= self.pos_max
    }
}

/// Every feature region, indexed by `(chr, zone)`.
#[derive(Debug, Default)]
pub struct FeatureTable {
    features: BTreeMap<FeatureId, Feature>,
    zones: FxHashMap<(i64, i64), Vec<FeatureId>>,
}

impl FeatureTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature; the region is indexed under every zone it spans.
    pub fn insert(&mut self, id: FeatureId, feature: Feature) {
        let first = feature.pos_min.div_euclid(PARIS_ZONE_SIZE);
        let last = feature.pos_max.div_euclid(PARIS_ZONE_SIZE);
        for zone in first..=last {
            self.zones.entry((feature.chr, zone)).or_default().push(id);
        }
        self.features.insert(id, feature);
    }

    /// Records one locus against every feature containing it. Returns whether
    /// any feature did.
    pub fn record(&mut self, chr: i64, pos: i64, significant: bool) -> bool {
        let Some(ids) = self.zones.get(&(chr, pos.div_euclid(PARIS_ZONE_SIZE))) else {
            return false;
        };
        let mut matched = false;
        for id in ids {
            if let Some(feature) = self.features.get_mut(id) {
                if feature.contains(chr, pos) {
                    matched = true;
                    feature.matches += 1;
                    feature.significant += u32::from(significant);
                }
            }
        }
        matched
    }

    /// Drops the zone index once scanning is over.
    pub fn seal(&mut self) {
        self.zones = FxHashMap::default();
    }

    /// Feature by id.
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    /// Features in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &Feature)> + '_ {
        self.features.iter().map(|(id, f)| (*id, f))
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
