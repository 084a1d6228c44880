//! Output columns and their ordered sources.
//!
//! Each column lists the aliases able to supply it, most preferred first. The
//! planner uses the first source whose alias made it into the plan, so the
//! order of every list below is significant.

use std::fmt;
use std::str::FromStr;

use crate::error::{BiofilterError, Result};
use crate::query::PlanError;

use super::predicates::PredicateOptions;
use super::Alias::{self, *};

macro_rules! columns {
    ($($variant:ident => $name:literal,)*) => {
        /// Semantic output column.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[allow(missing_docs)]
        pub enum Column {
            $($variant,)*
        }

        impl Column {
            /// Every column, in catalog order.
            pub const ALL: &'static [Column] = &[$(Column::$variant,)*];

            /// Column name as used in requests and headers.
            pub fn name(self) -> &'static str {
                match self {
                    $(Column::$variant => $name,)*
                }
            }
        }

        impl FromStr for Column {
            type Err = PlanError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Column::$variant),)*
                    _ => Err(PlanError::UnsupportedOutputType { name: s.to_string() }),
                }
            }
        }
    };
}

columns! {
    SnpId => "snp_id",
    SnpLabel => "snp_label",
    SnpExtra => "snp_extra",
    SnpFlag => "snp_flag",
    PositionId => "position_id",
    PositionLabel => "position_label",
    PositionChr => "position_chr",
    PositionPos => "position_pos",
    PositionExtra => "position_extra",
    PositionFlag => "position_flag",
    RegionId => "region_id",
    RegionLabel => "region_label",
    RegionChr => "region_chr",
    RegionZone => "region_zone",
    RegionStart => "region_start",
    RegionStop => "region_stop",
    RegionExtra => "region_extra",
    RegionFlag => "region_flag",
    BiopolymerId => "biopolymer_id",
    BiopolymerIdL => "biopolymer_id_L",
    BiopolymerIdR => "biopolymer_id_R",
    BiopolymerLabel => "biopolymer_label",
    BiopolymerDescription => "biopolymer_description",
    BiopolymerIdentifiers => "biopolymer_identifiers",
    BiopolymerChr => "biopolymer_chr",
    BiopolymerZone => "biopolymer_zone",
    BiopolymerStart => "biopolymer_start",
    BiopolymerStop => "biopolymer_stop",
    BiopolymerExtra => "biopolymer_extra",
    BiopolymerFlag => "biopolymer_flag",
    GeneId => "gene_id",
    GeneLabel => "gene_label",
    GeneDescription => "gene_description",
    GeneIdentifiers => "gene_identifiers",
    GeneSymbols => "gene_symbols",
    GeneExtra => "gene_extra",
    GeneFlag => "gene_flag",
    UpstreamId => "upstream_id",
    UpstreamLabel => "upstream_label",
    UpstreamDistance => "upstream_distance",
    UpstreamStart => "upstream_start",
    UpstreamStop => "upstream_stop",
    DownstreamId => "downstream_id",
    DownstreamLabel => "downstream_label",
    DownstreamDistance => "downstream_distance",
    DownstreamStart => "downstream_start",
    DownstreamStop => "downstream_stop",
    GroupId => "group_id",
    GroupLabel => "group_label",
    GroupDescription => "group_description",
    GroupIdentifiers => "group_identifiers",
    GroupExtra => "group_extra",
    GroupFlag => "group_flag",
    SourceId => "source_id",
    SourceLabel => "source_label",
    GwasRs => "gwas_rs",
    GwasChr => "gwas_chr",
    GwasPos => "gwas_pos",
    GwasTrait => "gwas_trait",
    GwasSnps => "gwas_snps",
    GwasOrBeta => "gwas_orbeta",
    GwasAllele95Ci => "gwas_allele95ci",
    GwasRiskAfreq => "gwas_riskAfreq",
    GwasPubmed => "gwas_pubmed",
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a nearest-gene lookup relative to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Closest gene ending before the position.
    Upstream,
    /// Closest gene starting after the position.
    Downstream,
}

/// Attribute of the nearest gene to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearestField {
    /// Biopolymer id.
    Id,
    /// Gene label.
    Label,
    /// Region start (with output offset).
    Start,
    /// Region end (with output offset).
    Stop,
}

/// Name table consulted for identifier lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTable {
    /// `biopolymer_name`, keyed by `biopolymer_id`.
    Biopolymer,
    /// `group_name`, keyed by `group_id`.
    Group,
}

/// Expression shape of a column source; the alias is substituted at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr {
    /// A plain field of the alias.
    Field(&'static str),
    /// Literal NULL.
    Null,
    /// `rs` number rendered as an `rs`-prefixed label.
    RsLabel,
    /// Chromosome number rendered with its conventional name.
    ChrName,
    /// Start coordinate field, shifted by the output start offset.
    Start(&'static str),
    /// End coordinate field, shifted by the output end offset.
    Stop(&'static str),
    /// All `namespace:name` identifiers of the row.
    Identifiers(NameTable),
    /// Gene symbols of the row.
    Symbols,
    /// A field of the nearest gene in the given direction.
    Nearest(Direction, NearestField),
    /// Distance to the nearest gene in the given direction.
    Distance(Direction),
}

/// One candidate source of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSource {
    /// Alias supplying the column.
    pub alias: Alias,
    /// Field of the alias identifying the contributing row.
    pub row_id: &'static str,
    /// Expression rendered for the column.
    pub expr: Expr,
    /// Restricts the alias to gene-typed biopolymers.
    pub gene_only: bool,
}

macro_rules! src {
    ($alias:expr, $row_id:expr, $expr:expr) => {
        ColumnSource {
            alias: $alias,
            row_id: $row_id,
            expr: $expr,
            gene_only: false,
        }
    };
}

macro_rules! gene {
    ($alias:expr, $row_id:expr, $expr:expr) => {
        ColumnSource {
            alias: $alias,
            row_id: $row_id,
            expr: $expr,
            gene_only: true,
        }
    };
}

const ROWID: &str = "rowid";
const SL_ROWID: &str = "_ROWID_";
const BIO: &str = "biopolymer_id";
const GRP: &str = "group_id";
const SRC: &str = "source_id";
const ZONE: &str = "zone";

use Expr::{ChrName, Distance, Field, Identifiers, Nearest, Null, RsLabel, Start, Stop, Symbols};

macro_rules! locus_sources {
    ($expr:expr) => {
        &[
            src!(AltLocus, ROWID, $expr),
            src!(MainLocus, ROWID, $expr),
            src!(SnpLocus, SL_ROWID, $expr),
        ]
    };
}

macro_rules! region_sources {
    ($expr:expr, $known:expr) => {
        &[
            src!(AltRegion, ROWID, $expr),
            src!(MainRegion, ROWID, $expr),
            src!(BiopolymerRegion, SL_ROWID, $known),
        ]
    };
}

impl Column {
    /// Candidate sources, most preferred first.
    pub fn sources(self) -> &'static [ColumnSource] {
        use Direction::{Downstream, Upstream};
        use NearestField as N;
        match self {
            Column::SnpId => &[
                src!(AltSnp, ROWID, Field("rs")),
                src!(MainSnp, ROWID, Field("rs")),
                src!(SnpLocus, SL_ROWID, Field("rs")),
            ],
            Column::SnpLabel => &[
                src!(AltSnp, ROWID, Field("label")),
                src!(MainSnp, ROWID, Field("label")),
                src!(SnpLocus, SL_ROWID, RsLabel),
            ],
            Column::SnpExtra => &[
                src!(AltSnp, ROWID, Field("extra")),
                src!(MainSnp, ROWID, Field("extra")),
                src!(SnpLocus, SL_ROWID, Null),
            ],
            Column::SnpFlag => &[
                src!(AltSnp, ROWID, Field("flag")),
                src!(MainSnp, ROWID, Field("flag")),
                src!(SnpLocus, SL_ROWID, Null),
            ],
            Column::PositionId => &[
                src!(AltLocus, ROWID, Field("rowid")),
                src!(MainLocus, ROWID, Field("rowid")),
                src!(SnpLocus, SL_ROWID, Field("_ROWID_")),
            ],
            Column::PositionLabel => &[
                src!(AltLocus, ROWID, Field("label")),
                src!(MainLocus, ROWID, Field("label")),
                src!(SnpLocus, SL_ROWID, RsLabel),
            ],
            Column::PositionChr => locus_sources!(ChrName),
            Column::PositionPos => locus_sources!(Start("pos")),
            Column::PositionExtra => &[
                src!(AltLocus, ROWID, Field("extra")),
                src!(MainLocus, ROWID, Field("extra")),
                src!(SnpLocus, SL_ROWID, Null),
            ],
            Column::PositionFlag => &[
                src!(AltLocus, ROWID, Field("flag")),
                src!(MainLocus, ROWID, Field("flag")),
                src!(SnpLocus, SL_ROWID, Null),
            ],
            Column::RegionId => region_sources!(Field("rowid"), Field("_ROWID_")),
            Column::RegionLabel => &[
                src!(AltRegion, ROWID, Field("label")),
                src!(MainRegion, ROWID, Field("label")),
                src!(Biopolymer, BIO, Field("label")),
            ],
            Column::RegionChr => region_sources!(ChrName, ChrName),
            Column::RegionZone => &[
                src!(AltRegionZone, ZONE, Field("zone")),
                src!(MainRegionZone, ZONE, Field("zone")),
                src!(BiopolymerZone, ZONE, Field("zone")),
            ],
            Column::RegionStart => region_sources!(Start("posMin"), Start("posMin")),
            Column::RegionStop => region_sources!(Stop("posMax"), Stop("posMax")),
            Column::RegionExtra => region_sources!(Field("extra"), Null),
            Column::RegionFlag => region_sources!(Field("flag"), Null),
            Column::BiopolymerId => &[
                src!(AltGene, BIO, Field(BIO)),
                src!(MainGene, BIO, Field(BIO)),
                src!(CandMainBiopolymerL, BIO, Field(BIO)),
                src!(CandMainBiopolymerR, BIO, Field(BIO)),
                src!(CandAltBiopolymerR, BIO, Field(BIO)),
                src!(UserGroupBiopolymer, BIO, Field(BIO)),
                src!(BiopolymerRegion, BIO, Field(BIO)),
                src!(GroupBiopolymer, BIO, Field(BIO)),
                src!(GroupBiopolymerL, BIO, Field(BIO)),
                src!(GroupBiopolymerR, BIO, Field(BIO)),
                src!(Biopolymer, BIO, Field(BIO)),
            ],
            Column::BiopolymerIdL => &[
                src!(CandMainBiopolymerL, BIO, Field(BIO)),
                src!(UserGroupBiopolymerL, BIO, Field(BIO)),
                src!(GroupBiopolymerL, BIO, Field(BIO)),
                src!(Biopolymer, BIO, Field(BIO)),
            ],
            Column::BiopolymerIdR => &[
                src!(CandMainBiopolymerR, BIO, Field(BIO)),
                src!(CandAltBiopolymerR, BIO, Field(BIO)),
                src!(UserGroupBiopolymerR, BIO, Field(BIO)),
                src!(GroupBiopolymerR, BIO, Field(BIO)),
                src!(Biopolymer, BIO, Field(BIO)),
            ],
            Column::BiopolymerLabel => &[
                src!(AltGene, BIO, Field("label")),
                src!(MainGene, BIO, Field("label")),
                src!(Biopolymer, BIO, Field("label")),
            ],
            Column::BiopolymerDescription => &[src!(Biopolymer, BIO, Field("description"))],
            Column::BiopolymerIdentifiers => &[
                src!(AltGene, BIO, Identifiers(NameTable::Biopolymer)),
                src!(MainGene, BIO, Identifiers(NameTable::Biopolymer)),
                src!(Biopolymer, BIO, Identifiers(NameTable::Biopolymer)),
            ],
            Column::BiopolymerChr => &[src!(BiopolymerRegion, SL_ROWID, ChrName)],
            Column::BiopolymerZone => &[src!(BiopolymerZone, ZONE, Field("zone"))],
            Column::BiopolymerStart => &[src!(BiopolymerRegion, SL_ROWID, Start("posMin"))],
            Column::BiopolymerStop => &[src!(BiopolymerRegion, SL_ROWID, Stop("posMax"))],
            Column::BiopolymerExtra => &[
                src!(AltGene, BIO, Field("extra")),
                src!(MainGene, BIO, Field("extra")),
                src!(Biopolymer, BIO, Null),
            ],
            Column::BiopolymerFlag => &[
                src!(AltGene, BIO, Field("flag")),
                src!(MainGene, BIO, Field("flag")),
                src!(Biopolymer, BIO, Null),
            ],
            Column::GeneId => &[
                src!(AltGene, BIO, Field(BIO)),
                src!(MainGene, BIO, Field(BIO)),
                gene!(Biopolymer, BIO, Field(BIO)),
            ],
            Column::GeneLabel => &[
                src!(AltGene, BIO, Field("label")),
                src!(MainGene, BIO, Field("label")),
                gene!(Biopolymer, BIO, Field("label")),
            ],
            Column::GeneDescription => &[gene!(Biopolymer, BIO, Field("description"))],
            Column::GeneIdentifiers => &[
                src!(AltGene, BIO, Identifiers(NameTable::Biopolymer)),
                src!(MainGene, BIO, Identifiers(NameTable::Biopolymer)),
                gene!(Biopolymer, BIO, Identifiers(NameTable::Biopolymer)),
            ],
            Column::GeneSymbols => &[
                src!(AltGene, BIO, Symbols),
                src!(MainGene, BIO, Symbols),
                gene!(Biopolymer, BIO, Symbols),
            ],
            Column::GeneExtra => &[
                src!(AltGene, BIO, Field("extra")),
                src!(MainGene, BIO, Field("extra")),
                gene!(Biopolymer, BIO, Null),
            ],
            Column::GeneFlag => &[
                src!(AltGene, BIO, Field("flag")),
                src!(MainGene, BIO, Field("flag")),
                gene!(Biopolymer, BIO, Null),
            ],
            Column::UpstreamId => locus_sources!(Nearest(Upstream, N::Id)),
            Column::UpstreamLabel => locus_sources!(Nearest(Upstream, N::Label)),
            Column::UpstreamDistance => locus_sources!(Distance(Upstream)),
            Column::UpstreamStart => locus_sources!(Nearest(Upstream, N::Start)),
            Column::UpstreamStop => locus_sources!(Nearest(Upstream, N::Stop)),
            Column::DownstreamId => locus_sources!(Nearest(Downstream, N::Id)),
            Column::DownstreamLabel => locus_sources!(Nearest(Downstream, N::Label)),
            Column::DownstreamDistance => locus_sources!(Distance(Downstream)),
            Column::DownstreamStart => locus_sources!(Nearest(Downstream, N::Start)),
            Column::DownstreamStop => locus_sources!(Nearest(Downstream, N::Stop)),
            Column::GroupId => &[
                src!(AltGroup, GRP, Field(GRP)),
                src!(MainGroup, GRP, Field(GRP)),
                src!(CandGroup, GRP, Field(GRP)),
                src!(UserGroupBiopolymer, GRP, Field(GRP)),
                src!(UserGroupBiopolymerL, GRP, Field(GRP)),
                src!(UserGroupBiopolymerR, GRP, Field(GRP)),
                src!(UserGroup, GRP, Field(GRP)),
                src!(GroupBiopolymer, GRP, Field(GRP)),
                src!(GroupBiopolymerL, GRP, Field(GRP)),
                src!(GroupBiopolymerR, GRP, Field(GRP)),
                src!(Group, GRP, Field(GRP)),
            ],
            Column::GroupLabel => &[
                src!(AltGroup, GRP, Field("label")),
                src!(MainGroup, GRP, Field("label")),
                src!(UserGroup, GRP, Field("label")),
                src!(Group, GRP, Field("label")),
            ],
            Column::GroupDescription => &[
                src!(UserGroup, GRP, Field("description")),
                src!(Group, GRP, Field("description")),
            ],
            Column::GroupIdentifiers => &[
                src!(AltGroup, GRP, Identifiers(NameTable::Group)),
                src!(MainGroup, GRP, Identifiers(NameTable::Group)),
                src!(UserGroup, GRP, Field("label")),
                src!(Group, GRP, Identifiers(NameTable::Group)),
            ],
            Column::GroupExtra => &[
                src!(AltGroup, GRP, Field("extra")),
                src!(MainGroup, GRP, Field("extra")),
                src!(UserGroup, GRP, Null),
                src!(Group, GRP, Null),
            ],
            Column::GroupFlag => &[
                src!(AltGroup, GRP, Field("flag")),
                src!(MainGroup, GRP, Field("flag")),
                src!(UserGroup, GRP, Null),
                src!(Group, GRP, Null),
            ],
            Column::SourceId => &[
                src!(AltSource, SRC, Field(SRC)),
                src!(MainSource, SRC, Field(SRC)),
                src!(UserGroup, SRC, Field(SRC)),
                src!(UserSource, SRC, Field(SRC)),
                src!(Group, SRC, Field(SRC)),
                src!(Source, SRC, Field(SRC)),
            ],
            Column::SourceLabel => &[
                src!(AltSource, SRC, Field("label")),
                src!(MainSource, SRC, Field("label")),
                src!(UserSource, SRC, Field("source")),
                src!(Source, SRC, Field("source")),
            ],
            Column::GwasRs => &[src!(Gwas, SL_ROWID, Field("rs"))],
            Column::GwasChr => &[src!(Gwas, SL_ROWID, Field("chr"))],
            Column::GwasPos => &[src!(Gwas, SL_ROWID, Start("pos"))],
            Column::GwasTrait => &[src!(Gwas, SL_ROWID, Field("trait"))],
            Column::GwasSnps => &[src!(Gwas, SL_ROWID, Field("snps"))],
            Column::GwasOrBeta => &[src!(Gwas, SL_ROWID, Field("orbeta"))],
            Column::GwasAllele95Ci => &[src!(Gwas, SL_ROWID, Field("allele95ci"))],
            Column::GwasRiskAfreq => &[src!(Gwas, SL_ROWID, Field("riskAfreq"))],
            Column::GwasPubmed => &[src!(Gwas, SL_ROWID, Field("pubmed_id"))],
        }
    }
}

fn shifted(field: String, offset: i64) -> String {
    match offset {
        0 => field,
        n if n < 0 => format!("{field} - {}", -n),
        n => format!("{field} + {n}"),
    }
}

fn gene_type(opts: &PredicateOptions) -> Result<i64> {
    opts.gene_type_id
        .ok_or_else(|| BiofilterError::knowledge("type", "gene"))
}

fn nearest_filter(a: Alias, dir: Direction, opts: &PredicateOptions) -> Result<String> {
    let bound = match dir {
        Direction::Upstream => format!("d_br.posMax < {a}.pos - {}", opts.position_margin),
        Direction::Downstream => format!("d_br.posMin > {a}.pos + {}", opts.position_margin),
    };
    Ok(format!(
        "FROM `db`.`biopolymer` AS d_b JOIN `db`.`biopolymer_region` AS d_br USING (biopolymer_id) WHERE d_b.type_id+0 = {} AND d_br.ldprofile_id = {} AND d_br.chr = {a}.chr AND {bound}",
        gene_type(opts)?,
        opts.ld_profile_id
    ))
}

impl ColumnSource {
    /// Renders the source's expression for its alias.
    pub fn render(&self, opts: &PredicateOptions) -> Result<String> {
        let a = self.alias;
        Ok(match self.expr {
            Field(f) => format!("{a}.{f}"),
            Null => "NULL".to_string(),
            RsLabel => format!("'rs'||{a}.rs"),
            ChrName => format!(
                "(CASE {a}.chr WHEN 23 THEN 'X' WHEN 24 THEN 'Y' WHEN 25 THEN 'XY' WHEN 26 THEN 'MT' ELSE {a}.chr END)"
            ),
            Start(f) => shifted(format!("{a}.{f}"), opts.min_offset),
            Stop(f) => shifted(format!("{a}.{f}"), opts.max_offset),
            Identifiers(NameTable::Biopolymer) => format!(
                "(SELECT GROUP_CONCAT(namespace||':'||name,'|') FROM `db`.`biopolymer_name` AS d_bn JOIN `db`.`namespace` AS d_n USING (namespace_id) WHERE d_bn.biopolymer_id = {a}.biopolymer_id)"
            ),
            Identifiers(NameTable::Group) => format!(
                "(SELECT GROUP_CONCAT(namespace||':'||name,'|') FROM `db`.`group_name` AS d_gn JOIN `db`.`namespace` AS d_n USING (namespace_id) WHERE d_gn.group_id = {a}.group_id)"
            ),
            Symbols => {
                let ns = opts
                    .symbol_namespace_id
                    .ok_or_else(|| BiofilterError::knowledge("namespace", "symbol"))?;
                format!(
                    "(SELECT GROUP_CONCAT(name,'|') FROM `db`.`biopolymer_name` AS d_bn WHERE d_bn.biopolymer_id = {a}.biopolymer_id AND d_bn.namespace_id = {ns})"
                )
            }
            Nearest(dir, field) => {
                let pick = match field {
                    NearestField::Id => "d_b.biopolymer_id".to_string(),
                    NearestField::Label => "d_b.label".to_string(),
                    NearestField::Start => shifted("d_br.posMin".to_string(), opts.min_offset),
                    NearestField::Stop => shifted("d_br.posMax".to_string(), opts.max_offset),
                };
                let order = match dir {
                    Direction::Upstream => "d_br.posMax DESC",
                    Direction::Downstream => "d_br.posMin",
                };
                format!(
                    "(SELECT {pick} {} ORDER BY {order} LIMIT 1)",
                    nearest_filter(a, dir, opts)?
                )
            }
            Distance(Direction::Upstream) => format!(
                "{a}.pos - (SELECT MAX(d_br.posMax) {})",
                nearest_filter(a, Direction::Upstream, opts)?
            ),
            Distance(Direction::Downstream) => format!(
                "(SELECT MIN(d_br.posMin) {}) - {a}.pos",
                nearest_filter(a, Direction::Downstream, opts)?
            ),
        })
    }

    /// Extra conditions implied by choosing this source.
    pub fn extra_conditions(&self, opts: &PredicateOptions) -> Result<Vec<String>> {
        if self.gene_only {
            Ok(vec![format!("{}.type_id+0 = {}", self.alias, gene_type(opts)?)])
        } else {
            Ok(Vec::new())
        }
    }
}
