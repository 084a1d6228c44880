//! Per-table filter counters.

use std::collections::BTreeMap;

use crate::catalog::{Db, Table};

/// How many union/intersect operations have been applied to each workspace table.
///
/// A count of zero means the table is unconstrained: it cannot anchor a plan
/// and its aliases are not eligible join nodes. `region_zone` always reports
/// the count of `region`, since zones are derived from regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    counts: BTreeMap<(Db, Table), u32>,
}

fn canonical(table: Table) -> Table {
    if table == Table::RegionZone {
        Table::Region
    } else {
        table
    }
}

impl FilterState {
    /// An unconstrained state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A state holding only the given counts.
    pub fn only(entries: &[(Db, Table, u32)]) -> Self {
        let mut state = Self::new();
        for (db, table, count) in entries {
            state.set(*db, *table, *count);
        }
        state
    }

    /// Current count for a table.
    pub fn count(&self, db: Db, table: Table) -> u32 {
        self.counts
            .get(&(db, canonical(table)))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the table has been constrained at least once.
    pub fn is_populated(&self, db: Db, table: Table) -> bool {
        self.count(db, table) > 0
    }

    /// Overwrites a table's count.
    pub fn set(&mut self, db: Db, table: Table, count: u32) {
        if count == 0 {
            self.counts.remove(&(db, canonical(table)));
        } else {
            self.counts.insert((db, canonical(table)), count);
        }
    }

    /// Records one more filter operation on a table and returns the new count.
    pub fn bump(&mut self, db: Db, table: Table) -> u32 {
        let entry = self.counts.entry((db, canonical(table))).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Clears the count of a table.
    pub fn reset(&mut self, db: Db, table: Table) {
        self.counts.remove(&(db, canonical(table)));
    }

    /// Copies the counts of one table family from `other`.
    pub fn copy_from(&mut self, other: &FilterState, db: Db, tables: &[Table]) {
        for table in tables {
            self.set(db, *table, other.count(db, *table));
        }
    }

    /// Populated tables of a database.
    pub fn populated(&self, db: Db) -> impl Iterator<Item = Table> + '_ {
        self.counts
            .iter()
            .filter(move |((d, _), n)| *d == db && **n > 0)
            .map(|((_, t), _)| *t)
    }
}
