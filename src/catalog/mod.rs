//! Static catalogs describing every table participation a plan may use.
//!
//! The catalogs are compile-time data: aliases, the predicates connecting
//! them and the ordered column sources. Nothing here is mutated at runtime.

/// Output columns and their ordered alias sources.
pub mod columns;

/// Single-alias, join and compatibility predicates.
pub mod predicates;

pub use columns::{Column, ColumnSource, Expr};
pub use predicates::{PredicateOptions, PredicateRule};

use std::fmt;

/// Logical database holding a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Db {
    /// Primary filter workspace.
    Main,
    /// Alternate filter workspace.
    Alt,
    /// Candidate model workspace.
    Cand,
    /// User-defined knowledge.
    User,
    /// Static knowledge base.
    Knowledge,
}

impl Db {
    /// Schema name the database is attached under.
    pub fn schema(self) -> &'static str {
        match self {
            Db::Main => "main",
            Db::Alt => "alt",
            Db::Cand => "cand",
            Db::User => "user",
            Db::Knowledge => "db",
        }
    }
}

/// Physical table name within a logical database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum Table {
    Snp,
    Locus,
    Region,
    RegionZone,
    Gene,
    Group,
    Source,
    MainBiopolymer,
    AltBiopolymer,
    GroupBiopolymer,
    SnpLocus,
    BiopolymerRegion,
    BiopolymerZone,
    Biopolymer,
    Gwas,
}

impl Table {
    /// SQL table name.
    pub fn name(self) -> &'static str {
        match self {
            Table::Snp => "snp",
            Table::Locus => "locus",
            Table::Region => "region",
            Table::RegionZone => "region_zone",
            Table::Gene => "gene",
            Table::Group => "group",
            Table::Source => "source",
            Table::MainBiopolymer => "main_biopolymer",
            Table::AltBiopolymer => "alt_biopolymer",
            Table::GroupBiopolymer => "group_biopolymer",
            Table::SnpLocus => "snp_locus",
            Table::BiopolymerRegion => "biopolymer_region",
            Table::BiopolymerZone => "biopolymer_zone",
            Table::Biopolymer => "biopolymer",
            Table::Gwas => "gwas",
        }
    }

    /// Group and source tables form the "group family" excluded or required by model passes.
    pub fn is_group_family(self) -> bool {
        matches!(self, Table::Group | Table::Source)
    }
}

macro_rules! aliases {
    ($($variant:ident => ($name:literal, $db:ident, $table:ident),)*) => {
        /// One named participation of a table within a plan.
        ///
        /// Several aliases may share a table (left and right roles of a model);
        /// each is a distinct node of the join graph.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[allow(missing_docs)]
        pub enum Alias {
            $($variant,)*
        }

        impl Alias {
            /// Every alias, in catalog order.
            pub const ALL: &'static [Alias] = &[$(Alias::$variant,)*];

            /// SQL alias name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Alias::$variant => $name,)*
                }
            }

            /// Database and table the alias reads.
            pub fn location(self) -> (Db, Table) {
                match self {
                    $(Alias::$variant => (Db::$db, Table::$table),)*
                }
            }
        }
    };
}

aliases! {
    MainSnp => ("m_s", Main, Snp),
    MainLocus => ("m_l", Main, Locus),
    MainRegion => ("m_r", Main, Region),
    MainRegionZone => ("m_rz", Main, RegionZone),
    MainGene => ("m_bg", Main, Gene),
    MainGroup => ("m_g", Main, Group),
    MainSource => ("m_c", Main, Source),
    AltSnp => ("a_s", Alt, Snp),
    AltLocus => ("a_l", Alt, Locus),
    AltRegion => ("a_r", Alt, Region),
    AltRegionZone => ("a_rz", Alt, RegionZone),
    AltGene => ("a_bg", Alt, Gene),
    AltGroup => ("a_g", Alt, Group),
    AltSource => ("a_c", Alt, Source),
    CandMainBiopolymerL => ("c_mb_L", Cand, MainBiopolymer),
    CandMainBiopolymerR => ("c_mb_R", Cand, MainBiopolymer),
    CandAltBiopolymerR => ("c_ab_R", Cand, AltBiopolymer),
    CandGroup => ("c_g", Cand, Group),
    UserGroupBiopolymer => ("u_gb", User, GroupBiopolymer),
    UserGroupBiopolymerL => ("u_gb_L", User, GroupBiopolymer),
    UserGroupBiopolymerR => ("u_gb_R", User, GroupBiopolymer),
    UserGroup => ("u_g", User, Group),
    UserSource => ("u_c", User, Source),
    SnpLocus => ("d_sl", Knowledge, SnpLocus),
    BiopolymerRegion => ("d_br", Knowledge, BiopolymerRegion),
    BiopolymerZone => ("d_bz", Knowledge, BiopolymerZone),
    Biopolymer => ("d_b", Knowledge, Biopolymer),
    GroupBiopolymer => ("d_gb", Knowledge, GroupBiopolymer),
    GroupBiopolymerL => ("d_gb_L", Knowledge, GroupBiopolymer),
    GroupBiopolymerR => ("d_gb_R", Knowledge, GroupBiopolymer),
    Group => ("d_g", Knowledge, Group),
    Source => ("d_c", Knowledge, Source),
    Gwas => ("d_w", Knowledge, Gwas),
}

impl Alias {
    /// Logical database of the alias.
    pub fn db(self) -> Db {
        self.location().0
    }

    /// Table of the alias.
    pub fn table(self) -> Table {
        self.location().1
    }

    fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compact set of aliases, iterated in catalog order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasSet(u64);

#[allow(missing_docs)]
impl AliasSet {
    /// The empty set.
    pub const fn empty() -> Self {
        AliasSet(0)
    }

    /// Builds a set from a slice.
    pub fn of(aliases: &[Alias]) -> Self {
        aliases.iter().copied().collect()
    }

    pub fn insert(&mut self, alias: Alias) -> bool {
        let had = self.contains(alias);
        self.0 |= alias.bit();
        !had
    }

    pub fn remove(&mut self, alias: Alias) {
        self.0 &= !alias.bit();
    }

    pub fn contains(self, alias: Alias) -> bool {
        self.0 & alias.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(self, other: AliasSet) -> AliasSet {
        AliasSet(self.0 | other.0)
    }

    pub fn intersection(self, other: AliasSet) -> AliasSet {
        AliasSet(self.0 & other.0)
    }

    pub fn difference(self, other: AliasSet) -> AliasSet {
        AliasSet(self.0 & !other.0)
    }

    pub fn intersects(self, other: AliasSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_subset(self, other: AliasSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterates members in catalog order.
    pub fn iter(self) -> impl Iterator<Item = Alias> {
        Alias::ALL.iter().copied().filter(move |a| self.contains(*a))
    }
}

impl FromIterator<Alias> for AliasSet {
    fn from_iter<I: IntoIterator<Item = Alias>>(iter: I) -> Self {
        let mut set = AliasSet::empty();
        for alias in iter {
            set.insert(alias);
        }
        set
    }
}

impl fmt::Debug for AliasSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Alias::name)).finish()
    }
}

impl fmt::Display for AliasSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(Alias::name).collect();
        f.write_str(&names.join(", "))
    }
}
