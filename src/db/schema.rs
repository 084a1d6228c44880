//! Workspace table layout.
//!
//! `main` and `alt` share one layout of filter tables; `cand` holds the
//! candidate model sets and `user` the user-defined knowledge.

use rusqlite::Connection;

use crate::catalog::{Db, Table};
use crate::error::Result;

/// Filter tables present in `main` and `alt`, with their column definitions.
const FILTER_TABLES: &[(Table, &str)] = &[
    (
        Table::Snp,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(32) NOT NULL, \
         rs INTEGER NOT NULL, flag TINYINT NOT NULL DEFAULT 0, extra TEXT",
    ),
    (
        Table::Locus,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(32) NOT NULL, \
         chr TINYINT NOT NULL, pos BIGINT NOT NULL, flag TINYINT NOT NULL DEFAULT 0, extra TEXT",
    ),
    (
        Table::Region,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(32) NOT NULL, \
         chr TINYINT NOT NULL, posMin BIGINT NOT NULL, posMax BIGINT NOT NULL, \
         flag TINYINT NOT NULL DEFAULT 0, extra TEXT",
    ),
    (
        Table::RegionZone,
        "region_rowid INTEGER NOT NULL, chr TINYINT NOT NULL, zone INTEGER NOT NULL, \
         PRIMARY KEY (chr, zone, region_rowid)",
    ),
    (
        Table::Gene,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(32) NOT NULL, \
         biopolymer_id INTEGER NOT NULL, flag TINYINT NOT NULL DEFAULT 0, extra TEXT",
    ),
    (
        Table::Group,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(64) NOT NULL, \
         group_id INTEGER NOT NULL, flag TINYINT NOT NULL DEFAULT 0, extra TEXT",
    ),
    (
        Table::Source,
        "rowid INTEGER PRIMARY KEY AUTOINCREMENT, label VARCHAR(32) NOT NULL, \
         source_id INTEGER NOT NULL, flag TINYINT NOT NULL DEFAULT 0",
    ),
];

const CAND_TABLES: &[(Table, &str)] = &[
    (
        Table::MainBiopolymer,
        "biopolymer_id INTEGER PRIMARY KEY NOT NULL, flag TINYINT NOT NULL DEFAULT 0",
    ),
    (
        Table::AltBiopolymer,
        "biopolymer_id INTEGER PRIMARY KEY NOT NULL, flag TINYINT NOT NULL DEFAULT 0",
    ),
    (
        Table::Group,
        "group_id INTEGER PRIMARY KEY NOT NULL, flag TINYINT NOT NULL DEFAULT 0",
    ),
];

const USER_TABLES: &[(&str, &str)] = &[
    (
        "group",
        "group_id INTEGER PRIMARY KEY NOT NULL, label VARCHAR(64) NOT NULL, \
         description VARCHAR(256), source_id INTEGER NOT NULL, extra TEXT",
    ),
    (
        "group_group",
        "group_id INTEGER NOT NULL, related_group_id INTEGER NOT NULL, \
         contains TINYINT, PRIMARY KEY (group_id, related_group_id)",
    ),
    (
        "group_biopolymer",
        "group_id INTEGER NOT NULL, biopolymer_id INTEGER NOT NULL, \
         PRIMARY KEY (group_id, biopolymer_id)",
    ),
    (
        "source",
        "source_id INTEGER PRIMARY KEY NOT NULL, source VARCHAR(32) NOT NULL, \
         description VARCHAR(256)",
    ),
];

const USER_INDEXES: &[(&str, &str, &str)] = &[
    ("group__label", "group", "label"),
    ("group_biopolymer__biopolymer", "group_biopolymer", "biopolymer_id, group_id"),
];

/// Secondary indexes of a filter table, as `(name suffix, columns)`.
///
/// These are dropped before bulk loads and rebuilt before the table is read.
pub fn filter_indexes(table: Table) -> &'static [(&'static str, &'static str)] {
    match table {
        Table::Snp => &[("rs", "rs")],
        Table::Locus => &[("pos", "chr, pos")],
        Table::Region => &[("chr_min", "chr, posMin"), ("chr_max", "chr, posMax")],
        Table::RegionZone => &[("region", "region_rowid")],
        Table::Gene => &[("biopolymer", "biopolymer_id")],
        Table::Group => &[("group_id", "group_id")],
        Table::Source => &[("source_id", "source_id")],
        _ => &[],
    }
}

/// Creates every workspace table and index.
pub fn create_workspace_schema(conn: &Connection) -> Result<()> {
    for db in [Db::Main, Db::Alt] {
        let schema = db.schema();
        for (table, columns) in FILTER_TABLES {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS `{schema}`.`{}` ({columns});",
                table.name()
            ))?;
            create_filter_indexes(conn, db, *table)?;
        }
    }
    for (table, columns) in CAND_TABLES {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS `cand`.`{}` ({columns});",
            table.name()
        ))?;
    }
    for (table, columns) in USER_TABLES {
        conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS `user`.`{table}` ({columns});"))?;
    }
    for (index, table, columns) in USER_INDEXES {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS `user`.`{index}` ON `{table}` ({columns});"
        ))?;
    }
    Ok(())
}

pub(crate) fn create_filter_indexes(conn: &Connection, db: Db, table: Table) -> Result<()> {
    let (schema, name) = (db.schema(), table.name());
    for (suffix, columns) in filter_indexes(table) {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS `{schema}`.`{name}__{suffix}` ON `{name}` ({columns});"
        ))?;
    }
    Ok(())
}

pub(crate) fn drop_filter_indexes(conn: &Connection, db: Db, table: Table) -> Result<()> {
    let (schema, name) = (db.schema(), table.name());
    for (suffix, _) in filter_indexes(table) {
        conn.execute_batch(&format!("DROP INDEX IF EXISTS `{schema}`.`{name}__{suffix}`;"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        for schema in ["alt", "cand", "user"] {
            conn.execute_batch(&format!("ATTACH DATABASE ':memory:' AS `{schema}`"))
                .unwrap();
        }
        conn
    }

    fn index_count(conn: &Connection, schema: &str, table: &str) -> i64 {
        conn.query_row(
            &format!("SELECT COUNT() FROM `{schema}`.sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL"),
            [table],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn indexes_drop_and_return() {
        let conn = attached();
        create_workspace_schema(&conn).unwrap();
        assert_eq!(index_count(&conn, "alt", "region"), 2);
        drop_filter_indexes(&conn, Db::Alt, Table::Region).unwrap();
        assert_eq!(index_count(&conn, "alt", "region"), 0);
        create_filter_indexes(&conn, Db::Alt, Table::Region).unwrap();
        assert_eq!(index_count(&conn, "alt", "region"), 2);
    }

    #[test]
    fn group_table_name_is_quoted() {
        let conn = attached();
        create_workspace_schema(&conn).unwrap();
        conn.execute("INSERT INTO main.`group` (label, group_id) VALUES ('g', 4)", [])
            .unwrap();
        let rowid: i64 = conn
            .query_row("SELECT rowid FROM main.`group` WHERE group_id = 4", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rowid, 1);
    }
}
