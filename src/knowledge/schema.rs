//! Knowledge database layout.
//!
//! Only the tables and indexes the query engine and the knowledge lookups read
//! are created; loaders that fill them live elsewhere.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::Result;

/// Version written to the `schema` setting.
pub const SCHEMA_VERSION: i64 = 3;

/// Default width of a chromosome zone, in bases.
pub const DEFAULT_ZONE_SIZE: i64 = 100_000;

const TABLES: &[(&str, &str)] = &[
    ("setting", "setting VARCHAR(32) PRIMARY KEY NOT NULL, value VARCHAR(256)"),
    ("grch_ucschg", "grch INTEGER PRIMARY KEY, ucschg INTEGER NOT NULL"),
    (
        "ldprofile",
        "ldprofile_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         ldprofile VARCHAR(32) UNIQUE NOT NULL, description VARCHAR(128), \
         metric VARCHAR(32), value DOUBLE",
    ),
    (
        "namespace",
        "namespace_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         namespace VARCHAR(32) UNIQUE NOT NULL, polygenic TINYINT NOT NULL DEFAULT 0",
    ),
    (
        "source",
        "source_id TINYINT PRIMARY KEY NOT NULL, source VARCHAR(32) UNIQUE NOT NULL, \
         updated DATETIME, version VARCHAR(32), grch INTEGER, ucschg INTEGER, \
         current_ucschg INTEGER, last_status BOOLEAN NOT NULL DEFAULT 0",
    ),
    (
        "type",
        "type_id TINYINT PRIMARY KEY NOT NULL, type VARCHAR(32) UNIQUE NOT NULL",
    ),
    (
        "snp_merge",
        "rsMerged INTEGER NOT NULL, rsCurrent INTEGER NOT NULL, source_id TINYINT NOT NULL",
    ),
    (
        "snp_locus",
        "rs INTEGER NOT NULL, chr TINYINT NOT NULL, pos BIGINT NOT NULL, \
         validated TINYINT NOT NULL, source_id TINYINT NOT NULL, \
         PRIMARY KEY (rs, chr, pos)",
    ),
    (
        "biopolymer",
        "biopolymer_id INTEGER PRIMARY KEY NOT NULL, type_id TINYINT NOT NULL, \
         label VARCHAR(64) NOT NULL, description VARCHAR(256), source_id TINYINT NOT NULL",
    ),
    (
        "biopolymer_name",
        "biopolymer_id INTEGER NOT NULL, namespace_id INTEGER NOT NULL, \
         name VARCHAR(256) NOT NULL, source_id TINYINT NOT NULL, \
         PRIMARY KEY (biopolymer_id, namespace_id, name)",
    ),
    (
        "biopolymer_region",
        "biopolymer_id INTEGER NOT NULL, ldprofile_id INTEGER NOT NULL, \
         chr TINYINT NOT NULL, posMin BIGINT NOT NULL, posMax BIGINT NOT NULL, \
         source_id TINYINT NOT NULL, \
         PRIMARY KEY (biopolymer_id, ldprofile_id, chr, posMin, posMax)",
    ),
    (
        "biopolymer_zone",
        "biopolymer_id INTEGER NOT NULL, chr TINYINT NOT NULL, zone INTEGER NOT NULL, \
         PRIMARY KEY (biopolymer_id, chr, zone)",
    ),
    (
        "group",
        "group_id INTEGER PRIMARY KEY NOT NULL, type_id TINYINT NOT NULL, \
         label VARCHAR(64) NOT NULL, description VARCHAR(256), source_id TINYINT NOT NULL",
    ),
    (
        "group_name",
        "group_id INTEGER NOT NULL, namespace_id INTEGER NOT NULL, \
         name VARCHAR(256) NOT NULL, source_id TINYINT NOT NULL, \
         PRIMARY KEY (group_id, namespace_id, name)",
    ),
    (
        "group_biopolymer",
        "group_id INTEGER NOT NULL, biopolymer_id INTEGER NOT NULL, \
         specificity TINYINT NOT NULL, implication TINYINT NOT NULL, \
         quality TINYINT NOT NULL, source_id TINYINT NOT NULL, \
         PRIMARY KEY (group_id, biopolymer_id, source_id)",
    ),
    (
        "gwas",
        "gwas_id INTEGER PRIMARY KEY NOT NULL, rs INTEGER, chr TINYINT, pos BIGINT, \
         trait VARCHAR(256) NOT NULL, snps VARCHAR(256), orbeta VARCHAR(8), \
         allele95ci VARCHAR(16), riskAfreq VARCHAR(16), pubmed_id INTEGER, \
         source_id TINYINT NOT NULL",
    ),
    (
        "chain",
        "chain_id INTEGER PRIMARY KEY NOT NULL, old_ucschg INTEGER NOT NULL, \
         old_chr TINYINT NOT NULL, old_start BIGINT NOT NULL, old_end BIGINT NOT NULL, \
         new_ucschg INTEGER NOT NULL, new_chr TINYINT NOT NULL, \
         new_start BIGINT NOT NULL, new_end BIGINT NOT NULL, \
         score BIGINT NOT NULL, is_fwd TINYINT NOT NULL, source_id TINYINT NOT NULL",
    ),
    (
        "chain_data",
        "chain_id INTEGER NOT NULL, old_start BIGINT NOT NULL, old_end BIGINT NOT NULL, \
         new_start BIGINT NOT NULL, source_id TINYINT NOT NULL, \
         PRIMARY KEY (chain_id, old_start)",
    ),
];

const INDEXES: &[(&str, &str, &str)] = &[
    ("snp_merge__merge_current", "snp_merge", "rsMerged, rsCurrent"),
    ("snp_locus__chr_pos_rs", "snp_locus", "chr, pos, rs"),
    ("biopolymer__type", "biopolymer", "type_id"),
    ("biopolymer__label_type", "biopolymer", "label, type_id"),
    ("biopolymer_name__name_namespace_biopolymer", "biopolymer_name", "name, namespace_id, biopolymer_id"),
    ("biopolymer_region__ldprofile_chr_min", "biopolymer_region", "ldprofile_id, chr, posMin"),
    ("biopolymer_region__ldprofile_chr_max", "biopolymer_region", "ldprofile_id, chr, posMax"),
    ("biopolymer_zone__zone", "biopolymer_zone", "chr, zone, biopolymer_id"),
    ("group__type", "group", "type_id"),
    ("group__label_type", "group", "label, type_id"),
    ("group_name__name_namespace_group", "group_name", "name, namespace_id, group_id"),
    ("group_biopolymer__biopolymer", "group_biopolymer", "biopolymer_id"),
    ("gwas__rs", "gwas", "rs"),
    ("gwas__chr_pos", "gwas", "chr, pos"),
    ("chain__oldhg_newhg_chr", "chain", "old_ucschg, new_ucschg, old_chr"),
];

const GRCH_UCSCHG: &[(i64, i64)] = &[(34, 16), (35, 17), (36, 18), (37, 19), (38, 38)];

/// Creates the knowledge tables under `schema` and seeds their default rows:
/// the settings, the GRCh to UCSC build map and the unadjusted LD profile `''`.
///
/// Existing tables and rows are left alone, so this is safe on a populated file.
pub fn create_knowledge_schema(conn: &Connection, schema: &str) -> Result<()> {
    for (table, columns) in TABLES {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS `{schema}`.`{table}` ({columns});"
        ))?;
    }
    for (index, table, columns) in INDEXES {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS `{schema}`.`{index}` ON `{table}` ({columns});"
        ))?;
    }
    let settings: [(&str, Option<String>); 5] = [
        ("schema", Some(SCHEMA_VERSION.to_string())),
        ("ucschg", None),
        ("zone_size", Some(DEFAULT_ZONE_SIZE.to_string())),
        ("optimized", Some("0".to_string())),
        ("finalized", Some("0".to_string())),
    ];
    for (name, value) in settings {
        conn.execute(
            &format!("INSERT OR IGNORE INTO `{schema}`.`setting` (setting, value) VALUES (?1, ?2)"),
            params![name, value],
        )?;
    }
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO `{schema}`.`ldprofile` (ldprofile, description, metric, value) \
             VALUES ('', 'no LD adjustment', NULL, NULL)"
        ),
        [],
    )?;
    for (grch, ucschg) in GRCH_UCSCHG {
        conn.execute(
            &format!("INSERT OR IGNORE INTO `{schema}`.`grch_ucschg` (grch, ucschg) VALUES (?1, ?2)"),
            params![grch, ucschg],
        )?;
    }
    debug!(schema, tables = TABLES.len(), "knowledge.schema.created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_tables_and_defaults_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        create_knowledge_schema(&conn, "main").unwrap();
        create_knowledge_schema(&conn, "main").unwrap();
        let zone: String = conn
            .query_row("SELECT value FROM setting WHERE setting = 'zone_size'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(zone, "100000");
        let builds: i64 = conn
            .query_row("SELECT COUNT() FROM grch_ucschg", [], |r| r.get(0))
            .unwrap();
        assert_eq!(builds, 5);
        conn.execute("INSERT INTO `group` (group_id, type_id, label, source_id) VALUES (1, 1, 'g', 1)", [])
            .unwrap();
    }
}
