//! PARIS pathway analysis.
//!
//! Result loci are scanned against the main region filter, which holds the
//! feature regions (typically LD blocks). Loci outside every region become
//! single-point features of their own. Features are then stratified by how
//! many loci they hold, and each pathway's count of significant features is
//! compared against random draws of equally many features from the same
//! strata.
//!
//! Runs move through scanning, binning and scoring in one call to
//! [`Biofilter::generate_paris_results`].

mod bins;
mod score;
mod zones;

pub use bins::{BinStats, Bins};
pub use score::{format_general, PermutationTest};
pub use zones::{Feature, FeatureId, FeatureTable, PARIS_ZONE_SIZE};

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{AddAssign, ControlFlow};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rusqlite::{params, Connection};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{Alias, Column, Db, Table};
use crate::config::{Options, ZeroPValuePolicy};
use crate::db::{chromosome_name, parse_chromosome, Biofilter, LocusInput, SnpInput};
use crate::error::{BiofilterError, Result};
use crate::knowledge::KnowledgeProvider;
use crate::query::{
    render, Comparison, DedupPolicy, FilterState, Focus, QueryMode, QueryRequest, Value,
};
use crate::workflows::{comment_header, RowSink};

/// Summary columns, one row per pathway.
pub const PARIS_SUMMARY_HEADER: [&str; 10] = [
    "id",
    "group",
    "description",
    "genes",
    "features",
    "simple",
    "(sig)",
    "complex",
    "(sig)",
    "pval",
];

/// Detail columns, one row per pathway and gene.
pub const PARIS_DETAIL_HEADER: [&str; 9] = [
    "id", "group", "gene", "features", "simple", "(sig)", "complex", "(sig)", "pval",
];

/// Result loci read from outside the workspace.
#[derive(Debug, Clone, Default)]
pub struct ParisInputs {
    /// SNP results; the second extra token is the p-value.
    pub snps: Vec<SnpInput>,
    /// Position results in the user's coordinate convention and build.
    pub loci: Vec<LocusInput>,
    /// UCSC build of `loci`, when it may differ from the knowledge build.
    pub user_build: Option<u32>,
}

impl ParisInputs {
    /// Whether no supplementary results were given.
    pub fn is_empty(&self) -> bool {
        self.snps.is_empty() && self.loci.is_empty()
    }
}

/// Outcome of scanning one source of result loci.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanTally {
    /// Loci inside at least one feature.
    pub matched: u64,
    /// Loci that became single-point features.
    pub singletons: u64,
    /// Loci left out by the zero p-value policy.
    pub ignored: u64,
    /// Loci skipped by chromosome enforcement.
    pub skipped: u64,
    /// SNPs renumbered by a merge.
    pub merged: u64,
    /// SNPs or positions without a usable locus.
    pub unrecognized: u64,
    /// SNPs with several loci.
    pub ambiguous: u64,
}

impl AddAssign for ScanTally {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.singletons += other.singletons;
        self.ignored += other.ignored;
        self.skipped += other.skipped;
        self.merged += other.merged;
        self.unrecognized += other.unrecognized;
        self.ambiguous += other.ambiguous;
    }
}

/// Feature counts of a gene or pathway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureCounts {
    /// Distinct features.
    pub features: usize,
    /// Features holding exactly one locus.
    pub simple: usize,
    /// Significant features holding one locus.
    pub simple_sig: usize,
    /// Features holding several loci.
    pub complex: usize,
    /// Significant features holding several loci.
    pub complex_sig: usize,
}

impl FeatureCounts {
    fn of(table: &FeatureTable, ids: &[FeatureId]) -> Self {
        let mut counts = Self {
            features: ids.len(),
            ..Self::default()
        };
        for feature in ids.iter().filter_map(|id| table.get(*id)) {
            let sig = usize::from(feature.is_significant());
            match feature.matches {
                0 => {}
                1 => {
                    counts.simple += 1;
                    counts.simple_sig += sig;
                }
                _ => {
                    counts.complex += 1;
                    counts.complex_sig += sig;
                }
            }
        }
        counts
    }

    fn push_values(&self, row: &mut Vec<Value>) {
        for n in [
            self.features,
            self.simple,
            self.simple_sig,
            self.complex,
            self.complex_sig,
        ] {
            row.push(Value::Int(n as i64));
        }
    }
}

/// Per-gene line of a pathway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParisDetail {
    /// Gene id.
    pub gene_id: i64,
    /// Gene label.
    pub gene: String,
    /// Feature counts of the gene.
    #[serde(flatten)]
    pub counts: FeatureCounts,
    /// Rendered empirical p-value.
    pub pval: String,
}

/// Result for one pathway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParisSummary {
    /// Group id.
    pub id: i64,
    /// Group label.
    pub group: String,
    /// Group description.
    pub description: Option<String>,
    /// Genes in the group.
    pub genes: usize,
    /// Feature counts of the union of its genes' features.
    #[serde(flatten)]
    pub counts: FeatureCounts,
    /// Rendered empirical p-value.
    pub pval: String,
    /// Gene lines, filled when details are requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ParisDetail>,
}

impl ParisSummary {
    /// Summary row values, in [`PARIS_SUMMARY_HEADER`] order.
    pub fn values(&self) -> Vec<Value> {
        let mut row = vec![
            Value::Int(self.id),
            Value::from(self.group.as_str()),
            Value::from(self.description.clone()),
            Value::Int(self.genes as i64),
        ];
        self.counts.push_values(&mut row);
        row.push(Value::from(self.pval.as_str()));
        row
    }
}

/// Everything a PARIS run produced.
#[derive(Debug, Clone, Default)]
pub struct ParisReport {
    /// Scan outcome over every result source.
    pub scan: ScanTally,
    /// Statistics of each bin.
    pub bins: Vec<BinStats>,
    /// Pathway results, in group id order.
    pub summaries: Vec<ParisSummary>,
}

impl ParisReport {
    /// Writes the summary rows and, when a detail sink is given, one pathway
    /// line (gene `*`) followed by its gene lines.
    pub fn write(&self, summary: &mut dyn RowSink, mut detail: Option<&mut dyn RowSink>) -> Result<()> {
        let mut header: Vec<String> = PARIS_SUMMARY_HEADER.iter().map(|s| s.to_string()).collect();
        comment_header(&mut header);
        summary.header(&header)?;
        if let Some(sink) = detail.as_deref_mut() {
            let mut header: Vec<String> = PARIS_DETAIL_HEADER.iter().map(|s| s.to_string()).collect();
            comment_header(&mut header);
            sink.header(&header)?;
        }
        // a detail sink that breaks stops receiving rows; the summary goes on
        let mut details_open = detail.is_some();
        for result in &self.summaries {
            if summary.row(&result.values())?.is_break() {
                break;
            }
            if !details_open {
                continue;
            }
            let Some(sink) = detail.as_deref_mut() else {
                continue;
            };
            let lead = [Value::Int(result.id), Value::from(result.group.as_str())];
            let mut row = lead.to_vec();
            row.push(Value::from("*"));
            result.counts.push_values(&mut row);
            row.push(Value::from(result.pval.as_str()));
            details_open = sink.row(&row)?.is_continue();
            for gene in result.details.iter() {
                if !details_open {
                    break;
                }
                let mut row = lead.to_vec();
                row.push(Value::from(gene.gene.as_str()));
                gene.counts.push_values(&mut row);
                row.push(Value::from(gene.pval.as_str()));
                details_open = sink.row(&row)?.is_continue();
            }
        }
        summary.finish()?;
        if let Some(sink) = detail {
            sink.finish()?;
        }
        Ok(())
    }
}

/// Significance of one result locus, or why it does not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    Counted(bool),
    Ignored,
    Skipped,
}

/// Reads the chromosome and p-value tokens of a result's extra columns.
fn observe(options: &Options, chr: i64, extra: Option<&str>) -> Observation {
    let tokens: Vec<&str> = extra.map(|e| e.split_whitespace().collect()).unwrap_or_default();
    if options.paris_enforce_input_chromosome {
        match tokens.first().and_then(|t| parse_chromosome(t)) {
            Some(input) if input == chr => {}
            _ => return Observation::Skipped,
        }
    }
    match tokens.get(1).and_then(|t| t.parse::<f64>().ok()) {
        Some(p) if p <= 0.0 => match options.paris_zero_p_values {
            ZeroPValuePolicy::Significant => Observation::Counted(true),
            ZeroPValuePolicy::Insignificant => Observation::Counted(false),
            ZeroPValuePolicy::Ignore => Observation::Ignored,
        },
        Some(p) => Observation::Counted(p <= options.paris_p_value),
        None => Observation::Counted(false),
    }
}

/// Feature table under construction, backed by `main.region`.
struct Scanner<'o> {
    options: &'o Options,
    table: FeatureTable,
}

impl<'o> Scanner<'o> {
    fn load(conn: &Connection, options: &'o Options) -> Result<Self> {
        let margin = options.region_position_margin;
        let mut table = FeatureTable::new();
        let mut stmt = conn.prepare("SELECT rowid, chr, posMin, posMax FROM `main`.`region`")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            table.insert(
                row.get(0)?,
                Feature {
                    chr: row.get(1)?,
                    pos_min: row.get::<_, i64>(2)? - margin,
                    pos_max: row.get::<_, i64>(3)? + margin,
                    matches: 0,
                    significant: 0,
                },
            );
        }
        info!(regions = table.len(), "paris.regions.scanned");
        Ok(Self { options, table })
    }

    fn analyze<I>(&mut self, conn: &Connection, loci: I) -> Result<ScanTally>
    where
        I: IntoIterator<Item = (i64, i64, Option<String>)>,
    {
        let margin = self.options.region_position_margin;
        let mut tally = ScanTally::default();
        let mut insert = conn.prepare_cached(
            "INSERT INTO `main`.`region` (label, chr, posMin, posMax) VALUES (?1, ?2, ?3, ?3)",
        )?;
        for (chr, pos, extra) in loci {
            let significant = match observe(self.options, chr, extra.as_deref()) {
                Observation::Counted(sig) => sig,
                Observation::Ignored => {
                    tally.ignored += 1;
                    continue;
                }
                Observation::Skipped => {
                    tally.skipped += 1;
                    continue;
                }
            };
            if self.table.record(chr, pos, significant) {
                tally.matched += 1;
                continue;
            }
            tally.singletons += 1;
            let label = format!("chr{}:{pos}", chromosome_name(chr));
            insert.execute(params![label, chr, pos])?;
            self.table.insert(
                conn.last_insert_rowid(),
                Feature {
                    chr,
                    pos_min: pos - margin,
                    pos_max: pos + margin,
                    matches: 1,
                    significant: u32::from(significant),
                },
            );
        }
        Ok(tally)
    }
}

fn locus_row(row: &[Value]) -> Option<(i64, i64, Option<String>)> {
    let chr = row.first().and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(parse_chromosome))
    })?;
    let pos = row.get(1).and_then(Value::as_i64)?;
    let extra = row.get(2).and_then(|v| v.as_str()).map(str::to_string);
    Some((chr, pos, extra))
}

fn log_scan(source: &str, tally: &ScanTally) {
    info!(
        source,
        matched = tally.matched,
        singletons = tally.singletons,
        ignored = tally.ignored,
        skipped = tally.skipped,
        merged = tally.merged,
        unrecognized = tally.unrecognized,
        ambiguous = tally.ambiguous,
        "paris.loci.mapped"
    );
}

/// A pathway with its genes, before scoring.
struct Pathway {
    label: String,
    description: Option<String>,
    genes: BTreeSet<i64>,
}

/// Pathways keyed by group id, and gene labels keyed by gene id.
type PathwayMap = (BTreeMap<i64, Pathway>, FxHashMap<i64, String>);

/// A gene's label and its features.
struct GeneFeatures {
    label: String,
    features: Vec<FeatureId>,
}

impl Biofilter {
    /// Scans result loci against the main region filter, bins the features and
    /// scores every pathway by permutation.
    ///
    /// Result loci come from the main SNP and position filters (their extra
    /// columns carry the p-values) and from `inputs`. Single-point features
    /// created for unmatched loci stay in `main.region`; features matching
    /// no locus are removed from it.
    pub fn generate_paris_results(&mut self, inputs: &ParisInputs) -> Result<ParisReport> {
        if !self.filters().is_populated(Db::Main, Table::Region) {
            return Err(BiofilterError::ParisInputMissing);
        }
        let options = self.options().clone();
        let mut rng = match options.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        self.prepare_table_for_update(Db::Main, Table::Region)?;
        let mut scanner = Scanner::load(self.connection(), &options)?;
        let mut report = ParisReport::default();

        for (table, extra) in [(Table::Snp, Column::SnpExtra), (Table::Locus, Column::PositionExtra)] {
            if !self.filters().is_populated(Db::Main, table) {
                continue;
            }
            let request = QueryRequest::new(
                QueryMode::Filter,
                Focus::Main,
                vec![Column::PositionChr, Column::PositionPos, extra],
            )
            .with_filters(FilterState::only(&[(Db::Main, table, 1)]));
            let plan = self.assemble(&request)?;
            let rows = self.collect(&plan, DedupPolicy::for_duplicates(false))?;
            let tally = scanner.analyze(self.connection(), rows.iter().filter_map(|r| locus_row(r)))?;
            log_scan(table.name(), &tally);
            report.scan += tally;
        }
        if !inputs.snps.is_empty() {
            let (loci, mut tally) = self.paris_snp_loci(&inputs.snps)?;
            tally += scanner.analyze(self.connection(), loci)?;
            log_scan("snp-input", &tally);
            report.scan += tally;
        }
        if !inputs.loci.is_empty() {
            let (loci, mut tally) = self.paris_position_loci(&inputs.loci, inputs.user_build)?;
            tally += scanner.analyze(self.connection(), loci)?;
            log_scan("position-input", &tally);
            report.scan += tally;
        }

        let mut table = scanner.table;
        table.seal();
        let bins = Bins::assign(&table, options.paris_bin_size, &mut rng);
        report.bins = bins.stats(&table);
        self.cull_empty_features(bins.members(0))?;

        let (pathways, labels) = self.paris_pathways()?;
        let genes = self.paris_gene_features(labels)?;

        let test = PermutationTest::new(&table, &bins, options.paris_permutation_count)
            .with_max_p_value(options.paris_max_p_value);
        let mut gene_pvals: FxHashMap<i64, String> = FxHashMap::default();
        for (id, pathway) in pathways {
            let features: Vec<FeatureId> = pathway
                .genes
                .iter()
                .filter_map(|g| genes.get(g))
                .flat_map(|g| g.features.iter().copied())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let pval = test.render(test.successes(&features, &mut rng));
            let mut details = Vec::new();
            if options.paris_details {
                for gene_id in &pathway.genes {
                    let Some(gene) = genes.get(gene_id) else {
                        continue;
                    };
                    let pval = match gene_pvals.get(gene_id) {
                        Some(pval) => pval.clone(),
                        None => {
                            let pval = test.render(test.successes(&gene.features, &mut rng));
                            gene_pvals.insert(*gene_id, pval.clone());
                            pval
                        }
                    };
                    details.push(ParisDetail {
                        gene_id: *gene_id,
                        gene: gene.label.clone(),
                        counts: FeatureCounts::of(&table, &gene.features),
                        pval,
                    });
                }
            }
            report.summaries.push(ParisSummary {
                id,
                group: pathway.label,
                description: pathway.description,
                genes: pathway.genes.len(),
                counts: FeatureCounts::of(&table, &features),
                pval,
                details,
            });
        }
        info!(
            pathways = report.summaries.len(),
            features = table.len(),
            permutations = test.permutations(),
            "paris.results.completed"
        );
        Ok(report)
    }

    fn paris_snp_loci(&self, snps: &[SnpInput]) -> Result<(Vec<(i64, i64, Option<String>)>, ScanTally)> {
        let conn = self.connection();
        let knowledge = self.knowledge();
        let validated_only = !self.options().allow_unvalidated_snp_positions;
        let mut tally = ScanTally::default();
        let mut loci = Vec::with_capacity(snps.len());
        for snp in snps {
            let rs = knowledge.current_rs(conn, snp.rs)?;
            if rs != snp.rs {
                tally.merged += 1;
            }
            let positions = knowledge.snp_loci(conn, rs, validated_only)?;
            if positions.is_empty() {
                tally.unrecognized += 1;
                continue;
            }
            if positions.len() > 1 && !self.options().allow_ambiguous_snps {
                tally.ambiguous += 1;
                continue;
            }
            loci.extend(
                positions
                    .into_iter()
                    .map(|(chr, pos)| (chr, pos, snp.extra.clone())),
            );
        }
        Ok((loci, tally))
    }

    fn paris_position_loci(
        &self,
        inputs: &[LocusInput],
        user_build: Option<u32>,
    ) -> Result<(Vec<(i64, i64, Option<String>)>, ScanTally)> {
        let conn = self.connection();
        let knowledge = self.knowledge();
        let (offset, _) = self.input_offsets();
        let lift = match (user_build, knowledge.database_build(conn)?) {
            (Some(from), Some(to)) if from != to => {
                if !knowledge.has_liftover(conn, from, to)? {
                    return Err(BiofilterError::LiftoverUnavailable { from, to });
                }
                Some((from, to))
            }
            _ => None,
        };
        let mut tally = ScanTally::default();
        let mut loci = Vec::with_capacity(inputs.len());
        for input in inputs {
            let (chr, pos) = (input.chr, input.pos + offset);
            let locus = match lift {
                Some((from, to)) => knowledge.lift_locus(conn, from, to, chr, pos)?,
                None => Some((chr, pos)),
            };
            match locus {
                Some((chr, pos)) => loci.push((chr, pos, input.extra.clone())),
                None => tally.unrecognized += 1,
            }
        }
        Ok((loci, tally))
    }

    fn cull_empty_features(&mut self, empty: &[FeatureId]) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        {
            let mut delete = tx.prepare_cached("DELETE FROM `main`.`region` WHERE rowid = ?1")?;
            for id in empty {
                delete.execute([id])?;
            }
        }
        tx.commit()?;
        debug!(culled = empty.len(), "paris.features.culled");
        self.prepare_table_for_query(Db::Main, Table::Region)
    }

    /// Groups of the main group and source filters with their genes.
    fn paris_pathways(&mut self) -> Result<PathwayMap> {
        let filters = FilterState::only(&[
            (Db::Main, Table::Group, self.filters().count(Db::Main, Table::Group)),
            (Db::Main, Table::Source, self.filters().count(Db::Main, Table::Source)),
        ]);
        let request = QueryRequest::new(
            QueryMode::Filter,
            Focus::Main,
            vec![
                Column::GroupId,
                Column::GroupLabel,
                Column::GroupDescription,
                Column::GeneId,
                Column::GeneLabel,
            ],
        )
        .with_filters(filters);
        let plan = self.assemble(&request)?;
        let query2 = if self.has_user_knowledge() {
            Some(self.assemble(&request.with_user_knowledge())?)
        } else {
            None
        };
        let mut pathways: BTreeMap<i64, Pathway> = BTreeMap::new();
        let mut labels: FxHashMap<i64, String> = FxHashMap::default();
        self.execute(
            &plan,
            query2.as_ref(),
            &[],
            DedupPolicy::for_duplicates(true),
            |row| {
                let (Some(id), Some(gene)) = (
                    row.first().and_then(Value::as_i64),
                    row.get(3).and_then(Value::as_i64),
                ) else {
                    return Ok(ControlFlow::Continue(()));
                };
                pathways
                    .entry(id)
                    .or_insert_with(|| Pathway {
                        label: row.get(1).map(Value::to_string).unwrap_or_default(),
                        description: row.get(2).and_then(Value::as_str).map(str::to_string),
                        genes: BTreeSet::new(),
                    })
                    .genes
                    .insert(gene);
                labels
                    .entry(gene)
                    .or_insert_with(|| row.get(4).map(Value::to_string).unwrap_or_default());
                Ok(ControlFlow::Continue(()))
            },
        )?;
        info!(pathways = pathways.len(), genes = labels.len(), "paris.pathways.mapped");
        Ok((pathways, labels))
    }

    /// Features overlapping each gene.
    fn paris_gene_features(&mut self, labels: FxHashMap<i64, String>) -> Result<FxHashMap<i64, GeneFeatures>> {
        let plan = self.assemble(
            &QueryRequest::new(QueryMode::Filter, Focus::Main, vec![Column::RegionId])
                .condition(Alias::Biopolymer, "biopolymer_id", Comparison::eq_param(1))
                .with_filters(FilterState::only(&[(Db::Main, Table::Region, 1)])),
        )?;
        self.prepare_plan(&plan)?;
        let sql = render(&plan, DedupPolicy::for_duplicates(true).render_options());

        let executor = self.executor();
        let mut genes: FxHashMap<i64, GeneFeatures> = FxHashMap::default();
        let mut matched = 0usize;
        for (gene_id, label) in labels {
            let mut features = BTreeSet::new();
            executor.stream(&sql, &[Value::Int(gene_id)], |row, _| {
                if let Some(id) = row.first().and_then(Value::as_i64) {
                    features.insert(id);
                }
                Ok(ControlFlow::Continue(()))
            })?;
            matched += features.len();
            genes.insert(
                gene_id,
                GeneFeatures {
                    label,
                    features: features.into_iter().collect(),
                },
            );
        }
        info!(genes = genes.len(), features = matched, "paris.genes.mapped");
        Ok(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            paris_enforce_input_chromosome: false,
            ..Options::default()
        }
    }

    #[test]
    fn p_values_decide_significance() {
        let opts = options();
        assert_eq!(observe(&opts, 1, Some("1 0.01")), Observation::Counted(true));
        assert_eq!(observe(&opts, 1, Some("1 0.5")), Observation::Counted(false));
        assert_eq!(observe(&opts, 1, Some("1 NA")), Observation::Counted(false));
        assert_eq!(observe(&opts, 1, None), Observation::Counted(false));
    }

    #[test]
    fn zero_p_values_follow_policy() {
        let mut opts = options();
        assert_eq!(observe(&opts, 1, Some("1 0")), Observation::Ignored);
        opts.paris_zero_p_values = ZeroPValuePolicy::Significant;
        assert_eq!(observe(&opts, 1, Some("1 0.0")), Observation::Counted(true));
        opts.paris_zero_p_values = ZeroPValuePolicy::Insignificant;
        assert_eq!(observe(&opts, 1, Some("1 -1")), Observation::Counted(false));
    }

    fn policy() -> impl proptest::strategy::Strategy<Value = ZeroPValuePolicy> {
        proptest::prop_oneof![
            proptest::strategy::Just(ZeroPValuePolicy::Significant),
            proptest::strategy::Just(ZeroPValuePolicy::Insignificant),
            proptest::strategy::Just(ZeroPValuePolicy::Ignore),
        ]
    }

    proptest::proptest! {
        #[test]
        fn zero_policy_only_touches_zero(p in 1e-12f64..1.0, threshold in 1e-6f64..1.0, zero in policy()) {
            let opts = Options {
                paris_p_value: threshold,
                paris_zero_p_values: zero,
                ..options()
            };
            let extra = format!("1 {p}");
            proptest::prop_assert_eq!(
                observe(&opts, 1, Some(&extra)),
                Observation::Counted(p <= threshold)
            );
            let expected = match zero {
                ZeroPValuePolicy::Significant => Observation::Counted(true),
                ZeroPValuePolicy::Insignificant => Observation::Counted(false),
                ZeroPValuePolicy::Ignore => Observation::Ignored,
            };
            proptest::prop_assert_eq!(observe(&opts, 1, Some("1 0.0")), expected);
        }
    }

    fn summary(id: i64, genes: &[&str]) -> ParisSummary {
        ParisSummary {
            id,
            group: format!("PATH{id}"),
            description: None,
            genes: genes.len(),
            counts: FeatureCounts::default(),
            pval: "1.000".into(),
            details: genes
                .iter()
                .enumerate()
                .map(|(n, gene)| ParisDetail {
                    gene_id: n as i64,
                    gene: gene.to_string(),
                    counts: FeatureCounts::default(),
                    pval: "1.000".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn stopped_detail_sink_gets_no_more_rows() {
        let report = ParisReport {
            summaries: vec![summary(1, &["GENEA", "GENEB"]), summary(2, &["GENEC"])],
            ..ParisReport::default()
        };
        let mut summaries = crate::workflows::CollectSink::new();
        let mut details = crate::workflows::CollectSink::with_limit(2);
        report.write(&mut summaries, Some(&mut details)).unwrap();
        assert_eq!(summaries.rows.len(), 2);
        let genes: Vec<String> = details.rows.iter().map(|r| r[2].to_string()).collect();
        assert_eq!(genes, vec!["*", "GENEA"]);
    }

    #[test]
    fn enforced_chromosome_must_agree() {
        let mut opts = options();
        opts.paris_enforce_input_chromosome = true;
        assert_eq!(observe(&opts, 23, Some("X 0.01")), Observation::Counted(true));
        assert_eq!(observe(&opts, 2, Some("chr2 0.01")), Observation::Counted(true));
        assert_eq!(observe(&opts, 1, Some("2 0.01")), Observation::Skipped);
        assert_eq!(observe(&opts, 1, Some("?? 0.01")), Observation::Skipped);
        assert_eq!(observe(&opts, 1, None), Observation::Skipped);
    }

    #[test]
    fn missing_regions_fail() {
        let mut bf = Biofilter::open_in_memory(options()).unwrap();
        let err = bf.generate_paris_results(&ParisInputs::default()).unwrap_err();
        assert_eq!(err.code(), "ParisInputMissing");
    }

    #[test]
    fn feature_counts_split_simple_and_complex() {
        let mut table = FeatureTable::new();
        for (id, matches, significant) in [(1, 1, 1), (2, 1, 0), (3, 4, 2), (4, 0, 0)] {
            table.insert(
                id,
                Feature {
                    chr: 1,
                    pos_min: id * 10,
                    pos_max: id * 10 + 1,
                    matches,
                    significant,
                },
            );
        }
        let counts = FeatureCounts::of(&table, &[1, 2, 3, 4]);
        assert_eq!(
            counts,
            FeatureCounts {
                features: 4,
                simple: 2,
                simple_sig: 1,
                complex: 1,
                complex_sig: 1,
            }
        );
    }
}
