//! Stratification of features by observed size.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::info;

use super::zones::{FeatureId, FeatureTable};

/// Partition of features into bins.
///
/// Bins 0 and 1 hold the features matching zero and one locus. Larger
/// features are shuffled within each size, taken smallest first, and cut
/// into bins of near-equal population, the earlier bins taking the remainder.
#[derive(Debug, Default)]
pub struct Bins {
    feature_bin: FxHashMap<FeatureId, usize>,
    bins: BTreeMap<usize, Vec<FeatureId>>,
}

/// Summary of one bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinStats {
    /// Bin number.
    pub bin: usize,
    /// Features in the bin.
    pub features: usize,
    /// Significant features in the bin.
    pub significant: usize,
    /// Smallest observed size.
    pub min_size: u32,
    /// Largest observed size.
    pub max_size: u32,
    /// Mean observed size.
    pub mean_size: f64,
}

impl Bins {
    /// Bins the features of `table`, targeting `bin_size` features per bin.
    pub fn assign<R: Rng + ?Sized>(table: &FeatureTable, bin_size: usize, rng: &mut R) -> Self {
        let mut by_size: BTreeMap<u32, Vec<FeatureId>> = BTreeMap::new();
        for (id, feature) in table.iter() {
            by_size.entry(feature.matches).or_default().push(id);
        }
        let mut ascending: Vec<FeatureId> = Vec::with_capacity(table.len());
        for ids in by_size.values_mut() {
            ids.shuffle(rng);
            ascending.extend(ids.iter().copied());
        }

        let mut out = Bins::default();
        let mut rest = ascending.into_iter().peekable();
        for bin in [0usize, 1] {
            while let Some(id) = rest.next_if(|id| {
                table.get(*id).map(|f| f.matches as usize) == Some(bin)
            }) {
                out.place(id, bin);
            }
        }

        let rest: Vec<FeatureId> = rest.collect();
        let target = bin_size.max(1);
        let count = ((rest.len() as f64 / target as f64) + 0.5).floor().max(1.0) as usize;
        let size = rest.len() / count;
        let extra = rest.len() - count * size;
        let mut ids = rest.into_iter();
        for n in 0..count {
            let take = size + usize::from(n < extra);
            for id in ids.by_ref().take(take) {
                out.place(id, n + 2);
            }
        }
        out
    }

    fn place(&mut self, id: FeatureId, bin: usize) {
        self.feature_bin.insert(id, bin);
        self.bins.entry(bin).or_default().push(id);
    }

    /// Bin of a feature.
    pub fn bin_of(&self, id: FeatureId) -> Option<usize> {
        self.feature_bin.get(&id).copied()
    }

    /// Members of a bin.
    pub fn members(&self, bin: usize) -> &[FeatureId] {
        self.bins.get(&bin).map_or(&[], Vec::as_slice)
    }

    /// Bins in ascending order with their members.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[FeatureId])> + '_ {
        self.bins.iter().map(|(bin, ids)| (*bin, ids.as_slice()))
    }

    /// Per-bin statistics, logged at `info`.
    pub fn stats(&self, table: &FeatureTable) -> Vec<BinStats> {
        let mut out = Vec::with_capacity(self.bins.len());
        for (bin, ids) in self.iter() {
            let sizes: Vec<(u32, bool)> = ids
                .iter()
                .filter_map(|id| table.get(*id))
                .map(|f| (f.matches, f.is_significant()))
                .collect();
            if sizes.is_empty() {
                continue;
            }
            let total: u64 = sizes.iter().map(|(s, _)| u64::from(*s)).sum();
            let stats = BinStats {
                bin,
                features: sizes.len(),
                significant: sizes.iter().filter(|(_, sig)| *sig).count(),
                min_size: sizes.iter().map(|(s, _)| *s).min().unwrap_or(0),
                max_size: sizes.iter().map(|(s, _)| *s).max().unwrap_or(0),
                mean_size: total as f64 / sizes.len() as f64,
            };
            info!(
                bin,
                features = stats.features,
                significant = stats.significant,
                min_size = stats.min_size,
                max_size = stats.max_size,
                mean_size = stats.mean_size,
                "paris.bin.stats"
            );
            out.push(stats);
        }
        out
    }
}
