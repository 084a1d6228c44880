//! Join graph over the eligible aliases of one request.

use crate::catalog::predicates::JOIN_RULES;
use crate::catalog::{Alias, AliasSet, Db, Table};

use super::filters::FilterState;

/// Eligibility and adjacency of aliases for one request.
///
/// An alias is eligible when its table belongs to the active knowledge
/// (static knowledge base, or user knowledge replacing its group tables) or
/// when its workspace table has a nonzero filter count. Two aliases are
/// adjacent when a join rule covers the pair and both are eligible.
#[derive(Debug, Clone)]
pub struct JoinGraph {
    eligible: AliasSet,
    knowledge: AliasSet,
    adjacent: Vec<AliasSet>,
}

fn replaced_by_user_knowledge(table: Table) -> bool {
    matches!(table, Table::GroupBiopolymer | Table::Group | Table::Source)
}

impl JoinGraph {
    /// Builds the graph for the given filter state.
    pub fn build(filters: &FilterState, user_knowledge: bool) -> Self {
        let mut knowledge = AliasSet::empty();
        let mut eligible = AliasSet::empty();
        for alias in Alias::ALL.iter().copied() {
            let (db, table) = alias.location();
            let is_knowledge = match db {
                Db::Knowledge => !(user_knowledge && replaced_by_user_knowledge(table)),
                Db::User => user_knowledge && replaced_by_user_knowledge(table),
                Db::Main | Db::Alt | Db::Cand => false,
            };
            if is_knowledge {
                knowledge.insert(alias);
                eligible.insert(alias);
            } else if db != Db::User && db != Db::Knowledge && filters.is_populated(db, table) {
                eligible.insert(alias);
            }
        }
        let mut adjacent = vec![AliasSet::empty(); Alias::ALL.len()];
        for rule in JOIN_RULES {
            for (left, right) in rule.pairs() {
                if eligible.contains(left) && eligible.contains(right) {
                    adjacent[left as usize].insert(right);
                    adjacent[right as usize].insert(left);
                }
            }
        }
        Self {
            eligible,
            knowledge,
            adjacent,
        }
    }

    /// Whether the alias passes the knowledge or filter predicate.
    pub fn is_eligible(&self, alias: Alias) -> bool {
        self.eligible.contains(alias)
    }

    /// Whether the alias reads the active knowledge.
    pub fn is_knowledge(&self, alias: Alias) -> bool {
        self.knowledge.contains(alias)
    }

    /// Aliases reading the active knowledge.
    pub fn knowledge(&self) -> AliasSet {
        self.knowledge
    }

    /// Eligible aliases joinable with `alias`.
    pub fn neighbors(&self, alias: Alias) -> AliasSet {
        self.adjacent[alias as usize]
    }

    /// Whether the alias has at least one eligible neighbor.
    pub fn is_node(&self, alias: Alias) -> bool {
        !self.neighbors(alias).is_empty()
    }

    /// All aliases with at least one eligible neighbor.
    pub fn nodes(&self) -> AliasSet {
        Alias::ALL
            .iter()
            .copied()
            .filter(|a| self.is_node(*a))
            .collect()
    }

    /// Whether any member of `set` is adjacent to `alias`.
    pub fn touches(&self, alias: Alias, set: AliasSet) -> bool {
        self.neighbors(alias).intersects(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_leave_only_knowledge() {
        let graph = JoinGraph::build(&FilterState::new(), false);
        assert!(graph.is_eligible(Alias::SnpLocus));
        assert!(!graph.is_eligible(Alias::MainSnp));
        assert!(!graph.is_eligible(Alias::UserGroup));
        assert!(graph.neighbors(Alias::SnpLocus).contains(Alias::Gwas));
        assert!(!graph.neighbors(Alias::SnpLocus).contains(Alias::MainSnp));
    }

    #[test]
    fn populated_filters_join_the_graph() {
        let filters = FilterState::only(&[(Db::Main, Table::Region, 1)]);
        let graph = JoinGraph::build(&filters, false);
        assert!(graph.is_eligible(Alias::MainRegionZone));
        assert!(graph.neighbors(Alias::MainRegionZone).contains(Alias::MainRegion));
        assert!(graph.neighbors(Alias::MainRegionZone).contains(Alias::BiopolymerZone));
        assert!(!graph.is_knowledge(Alias::MainRegion));
    }

    #[test]
    fn user_knowledge_replaces_group_tables() {
        let graph = JoinGraph::build(&FilterState::new(), true);
        assert!(graph.is_knowledge(Alias::UserGroup));
        assert!(!graph.is_eligible(Alias::Group));
        assert!(!graph.is_eligible(Alias::GroupBiopolymer));
        assert!(graph.is_knowledge(Alias::Biopolymer));
        assert!(graph.neighbors(Alias::Biopolymer).contains(Alias::UserGroupBiopolymer));
    }
}
