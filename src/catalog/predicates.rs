//! Predicate catalog.
//!
//! Join rules connect aliases in the join graph. Compatibility rules only add
//! conditions between aliases that a plan already contains (overlap windows
//! between loci and regions, region against region). Conditions whose operands
//! carry arithmetic are written once per operand so that either column can use
//! its index.

use crate::config::AmbiguityReduction;

use super::Alias::{self, *};

/// Runtime parameters substituted into predicates and column expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateOptions {
    /// Knowledge `zone_size` setting.
    pub zone_size: i64,
    /// LD profile used for gene boundaries.
    pub ld_profile_id: i64,
    /// Type id of genes, when the knowledge base defines one.
    pub gene_type_id: Option<i64>,
    /// Namespace id of gene symbols, when the knowledge base defines one.
    pub symbol_namespace_id: Option<i64>,
    /// Margin added around regions when matching positions.
    pub position_margin: i64,
    /// Minimum region overlap as a percent of the shorter region.
    pub match_percent: Option<f64>,
    /// Minimum region overlap in bases.
    pub match_bases: i64,
    /// Whether ambiguous group memberships are accepted.
    pub allow_ambiguous_knowledge: bool,
    /// Secondary membership scores consulted for ambiguous memberships.
    pub ambiguity_reduction: AmbiguityReduction,
    /// Whether unvalidated SNP positions are accepted.
    pub allow_unvalidated_snp_positions: bool,
    /// Coordinate base of output positions.
    pub coordinate_base: i64,
    /// Whether output region ends are exclusive.
    pub regions_half_open: bool,
    /// Offset added to start coordinates in output expressions.
    pub min_offset: i64,
    /// Offset added to end coordinates in output expressions.
    pub max_offset: i64,
}

impl PredicateOptions {
    /// Options with all coordinate offsets cleared.
    pub fn new(zone_size: i64, ld_profile_id: i64) -> Self {
        Self {
            zone_size,
            ld_profile_id,
            gene_type_id: None,
            symbol_namespace_id: None,
            position_margin: 0,
            match_percent: Some(100.0),
            match_bases: 0,
            allow_ambiguous_knowledge: false,
            ambiguity_reduction: AmbiguityReduction::No,
            allow_unvalidated_snp_positions: true,
            coordinate_base: 1,
            regions_half_open: false,
            min_offset: 0,
            max_offset: 0,
        }
    }

    /// Returns a copy whose coordinates are shifted into the output convention.
    pub fn with_output_offsets(&self) -> Self {
        let mut out = self.clone();
        out.min_offset = self.coordinate_base - 1;
        out.max_offset = self.coordinate_base - 1 + i64::from(self.regions_half_open);
        out
    }

    fn match_percent_sql(&self) -> String {
        self.match_percent
            .map_or_else(|| "NULL".to_string(), |p| format!("{p}"))
    }

    fn membership_threshold(&self) -> &'static str {
        if self.allow_ambiguous_knowledge {
            "> 0"
        } else {
            ">= 100"
        }
    }
}

type Builder = fn(Alias, Alias, &PredicateOptions) -> Vec<String>;

/// Conditions between every (left, right) pair drawn from two alias sets.
///
/// When `left` and `right` are the same slice the rule applies to every
/// ordered pair of distinct members.
pub struct PredicateRule {
    /// Left-hand aliases.
    pub left: &'static [Alias],
    /// Right-hand aliases.
    pub right: &'static [Alias],
    build: Builder,
}

impl PredicateRule {
    const fn within(set: &'static [Alias], build: Builder) -> Self {
        Self {
            left: set,
            right: set,
            build,
        }
    }

    const fn between(left: &'static [Alias], right: &'static [Alias], build: Builder) -> Self {
        Self { left, right, build }
    }

    /// Ordered alias pairs the rule covers.
    pub fn pairs(&self) -> impl Iterator<Item = (Alias, Alias)> + '_ {
        self.left.iter().flat_map(move |l| {
            self.right
                .iter()
                .filter(move |r| *r != l)
                .map(move |r| (*l, *r))
        })
    }

    /// Renders the rule's conditions for one pair.
    pub fn conditions(&self, left: Alias, right: Alias, opts: &PredicateOptions) -> Vec<String> {
        (self.build)(left, right, opts)
    }
}

fn rs_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.rs = {r}.rs")]
}

fn rs_or_position_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!(
        "(({l}.rs = {r}.rs) OR ({l}.chr = {r}.chr AND {l}.pos = {r}.pos))"
    )]
}

fn position_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.chr = {r}.chr"), format!("{l}.pos = {r}.pos")]
}

fn position_in_zone(l: Alias, r: Alias, o: &PredicateOptions) -> Vec<String> {
    let (z, m) = (o.zone_size, o.position_margin);
    vec![
        format!("{l}.chr = {r}.chr"),
        format!("{l}.pos >= (({r}.zone * {z}) - {m})"),
        format!("{l}.pos < ((({r}.zone + 1) * {z}) + {m})"),
        format!("(({l}.pos + {m}) / {z}) >= {r}.zone"),
        format!("(({l}.pos - {m}) / {z}) <= {r}.zone"),
    ]
}

fn zone_of_region(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.region_rowid = {r}.rowid")]
}

fn zone_of_gene_region(l: Alias, r: Alias, o: &PredicateOptions) -> Vec<String> {
    let z = o.zone_size;
    vec![
        format!("{l}.biopolymer_id = {r}.biopolymer_id"),
        format!("{l}.chr = {r}.chr"),
        format!("(({l}.zone + 1) * {z}) > {r}.posMin"),
        format!("({l}.zone * {z}) <= {r}.posMax"),
        format!("{l}.zone >= ({r}.posMin / {z})"),
        format!("{l}.zone <= ({r}.posMax / {z})"),
    ]
}

fn zones_near(l: Alias, r: Alias, o: &PredicateOptions) -> Vec<String> {
    let z = o.zone_size;
    let reach = format!("(MIN(0,{}) - {z}) / {z}", o.match_bases);
    vec![
        format!("{l}.chr = {r}.chr"),
        format!("{l}.zone >= ({r}.zone + {reach})"),
        format!("{l}.zone <= ({r}.zone - {reach})"),
        format!("{r}.zone >= ({l}.zone + {reach})"),
        format!("{r}.zone <= ({l}.zone - {reach})"),
    ]
}

fn biopolymer_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.biopolymer_id = {r}.biopolymer_id")]
}

fn biopolymer_distinct(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.biopolymer_id != {r}.biopolymer_id")]
}

fn group_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.group_id = {r}.group_id")]
}

fn source_equal(l: Alias, r: Alias, _: &PredicateOptions) -> Vec<String> {
    vec![format!("{l}.source_id = {r}.source_id")]
}

fn position_in_region(l: Alias, r: Alias, o: &PredicateOptions) -> Vec<String> {
    let m = o.position_margin;
    vec![
        format!("{l}.chr = {r}.chr"),
        format!("{l}.pos >= ({r}.posMin - {m})"),
        format!("{l}.pos <= ({r}.posMax + {m})"),
        format!("({l}.pos + {m}) >= {r}.posMin"),
        format!("({l}.pos - {m}) <= {r}.posMax"),
    ]
}

fn regions_overlap(l: Alias, r: Alias, o: &PredicateOptions) -> Vec<String> {
    let bases = o.match_bases;
    let percent = o.match_percent_sql();
    let needed = format!(
        "MAX({bases}, COALESCE((MIN({l}.posMax - {l}.posMin, {r}.posMax - {r}.posMin) + 1) * {percent} / 100.0, {bases}))"
    );
    vec![
        format!("{l}.chr = {r}.chr"),
        format!("({l}.posMax - {l}.posMin + 1) >= {bases}"),
        format!("({r}.posMax - {r}.posMin + 1) >= {bases}"),
        format!(
            "((({l}.posMin >= {r}.posMin) AND ({l}.posMin <= {r}.posMax + 1 - {needed})) OR (({r}.posMin >= {l}.posMin) AND ({r}.posMin <= {l}.posMax + 1 - {needed})))"
        ),
    ]
}

const SNPS: &[Alias] = &[MainSnp, AltSnp, SnpLocus];
const INPUT_SNPS: &[Alias] = &[MainSnp, AltSnp];
const LOCI: &[Alias] = &[MainLocus, AltLocus, SnpLocus];
const INPUT_LOCI: &[Alias] = &[MainLocus, AltLocus];
const ZONES: &[Alias] = &[MainRegionZone, AltRegionZone, BiopolymerZone];
const REGIONS: &[Alias] = &[MainRegion, AltRegion, BiopolymerRegion];
const BIOPOLYMERS: &[Alias] = &[MainGene, AltGene, BiopolymerRegion, Biopolymer];
const GENE_LISTS: &[Alias] = &[MainGene, AltGene, Biopolymer];
const MEMBERSHIPS: &[Alias] = &[UserGroupBiopolymer, GroupBiopolymer];
const KNOWN_PAIR: &[Alias] = &[GroupBiopolymerL, GroupBiopolymerR];
const USER_PAIR: &[Alias] = &[UserGroupBiopolymerL, UserGroupBiopolymerR];
const KNOWN_GROUPS: &[Alias] = &[MainGroup, AltGroup, GroupBiopolymer, Group];
const USER_GROUPS: &[Alias] = &[MainGroup, AltGroup, UserGroupBiopolymer, UserGroup];
const KNOWN_SOURCES: &[Alias] = &[MainSource, AltSource, Group, Source];
const USER_SOURCES: &[Alias] = &[MainSource, AltSource, UserGroup, UserSource];
const RIGHT_CANDIDATES: &[Alias] = &[CandMainBiopolymerR, CandAltBiopolymerR];
const KNOWN_CAND_GROUPS: &[Alias] = &[CandGroup, Group];
const KNOWN_CAND_MEMBERS: &[Alias] = &[GroupBiopolymer, GroupBiopolymerL, GroupBiopolymerR, Group];
const USER_CAND_GROUPS: &[Alias] = &[CandGroup, UserGroup];
const USER_CAND_MEMBERS: &[Alias] = &[
    UserGroupBiopolymer,
    UserGroupBiopolymerL,
    UserGroupBiopolymerR,
    UserGroup,
];

/// Rules that make two aliases adjacent in the join graph.
pub static JOIN_RULES: &[PredicateRule] = &[
    PredicateRule::within(SNPS, rs_equal),
    PredicateRule::between(INPUT_SNPS, &[Gwas], rs_equal),
    PredicateRule::between(&[SnpLocus], &[Gwas], rs_or_position_equal),
    PredicateRule::within(LOCI, position_equal),
    PredicateRule::between(INPUT_LOCI, &[Gwas], position_equal),
    PredicateRule::between(LOCI, ZONES, position_in_zone),
    PredicateRule::between(&[MainRegionZone], &[MainRegion], zone_of_region),
    PredicateRule::between(&[AltRegionZone], &[AltRegion], zone_of_region),
    PredicateRule::between(&[BiopolymerZone], &[BiopolymerRegion], zone_of_gene_region),
    PredicateRule::within(ZONES, zones_near),
    PredicateRule::within(BIOPOLYMERS, biopolymer_equal),
    PredicateRule::between(GENE_LISTS, MEMBERSHIPS, biopolymer_equal),
    PredicateRule::within(KNOWN_PAIR, biopolymer_distinct),
    PredicateRule::within(USER_PAIR, biopolymer_distinct),
    PredicateRule::within(KNOWN_GROUPS, group_equal),
    PredicateRule::within(USER_GROUPS, group_equal),
    PredicateRule::within(KNOWN_SOURCES, source_equal),
    PredicateRule::within(USER_SOURCES, source_equal),
    PredicateRule::between(
        &[CandMainBiopolymerL],
        &[UserGroupBiopolymerL, GroupBiopolymerL],
        biopolymer_equal,
    ),
    PredicateRule::between(
        RIGHT_CANDIDATES,
        &[UserGroupBiopolymerR, GroupBiopolymerR],
        biopolymer_equal,
    ),
    PredicateRule::between(KNOWN_CAND_GROUPS, KNOWN_CAND_MEMBERS, group_equal),
    PredicateRule::between(USER_CAND_GROUPS, USER_CAND_MEMBERS, group_equal),
];

/// Conditions between aliases that are related only transitively.
pub static COMPATIBILITY_RULES: &[PredicateRule] = &[
    PredicateRule::between(LOCI, REGIONS, position_in_region),
    PredicateRule::within(REGIONS, regions_overlap),
];

/// Conditions that apply to a single alias whenever it is part of a plan.
pub fn alias_conditions(alias: Alias, opts: &PredicateOptions) -> Vec<String> {
    match alias {
        BiopolymerRegion => vec![format!("{alias}.ldprofile_id = {}", opts.ld_profile_id)],
        GroupBiopolymer | GroupBiopolymerL | GroupBiopolymerR => {
            let (first, second) = opts.ambiguity_reduction.score_columns();
            let threshold = opts.membership_threshold();
            vec![
                format!("{alias}.biopolymer_id != 0"),
                format!("({alias}.{first} {threshold} OR {alias}.{second} {threshold})"),
            ]
        }
        SnpLocus if !opts.allow_unvalidated_snp_positions => {
            vec![format!("{alias}.validated > 0")]
        }
        _ => Vec::new(),
    }
}

/// Whether any join rule connects the two aliases.
pub fn joinable(a: Alias, b: Alias) -> bool {
    JOIN_RULES.iter().any(|rule| {
        rule.pairs()
            .any(|(l, r)| (l == a && r == b) || (l == b && r == a))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> PredicateOptions {
        PredicateOptions::new(100_000, 1)
    }

    #[test]
    fn within_rules_cover_both_orders() {
        let pairs: Vec<_> = JOIN_RULES[0].pairs().collect();
        assert!(pairs.contains(&(MainSnp, SnpLocus)));
        assert!(pairs.contains(&(SnpLocus, MainSnp)));
        assert!(!pairs.iter().any(|(l, r)| l == r));
    }

    #[test]
    fn zone_window_substitutes_parameters() {
        let mut o = opts();
        o.position_margin = 50;
        let conds = position_in_zone(MainLocus, BiopolymerZone, &o);
        assert!(conds.contains(&"m_l.pos >= ((d_bz.zone * 100000) - 50)".to_string()));
        assert_eq!(conds.len(), 5);
    }

    #[test]
    fn region_overlap_renders_null_percent() {
        let mut o = opts();
        o.match_percent = None;
        o.match_bases = 10;
        let conds = regions_overlap(MainRegion, BiopolymerRegion, &o);
        assert!(conds[3].contains("* NULL / 100.0"));
        assert!(conds[1].ends_with(">= 10"));
    }

    #[test]
    fn membership_threshold_follows_ambiguity() {
        let mut o = opts();
        assert_eq!(
            alias_conditions(GroupBiopolymer, &o)[1],
            "(d_gb.specificity >= 100 OR d_gb.specificity >= 100)"
        );
        o.allow_ambiguous_knowledge = true;
        o.ambiguity_reduction = AmbiguityReduction::Any;
        assert_eq!(
            alias_conditions(GroupBiopolymerL, &o)[1],
            "(d_gb_L.implication > 0 OR d_gb_L.quality > 0)"
        );
    }

    #[test]
    fn validated_positions_only_when_requested() {
        let mut o = opts();
        assert!(alias_conditions(SnpLocus, &o).is_empty());
        o.allow_unvalidated_snp_positions = false;
        assert_eq!(alias_conditions(SnpLocus, &o), vec!["d_sl.validated > 0"]);
    }

    #[test]
    fn joinable_is_symmetric() {
        assert!(joinable(Gwas, SnpLocus));
        assert!(joinable(SnpLocus, Gwas));
        assert!(!joinable(MainSnp, MainGene));
    }

    #[test]
    fn output_offsets() {
        let mut o = opts();
        o.coordinate_base = 0;
        o.regions_half_open = true;
        let shifted = o.with_output_offsets();
        assert_eq!((shifted.min_offset, shifted.max_offset), (-1, 0));
        assert_eq!((o.min_offset, o.max_offset), (0, 0));
    }
}
