#![allow(dead_code)]

use std::path::PathBuf;

use biofilter::db::{InputSet, LocusInput, RegionInput, SnpInput};
use biofilter::knowledge::{create_knowledge_schema, NameQuery};
use biofilter::query::Focus;
use biofilter::{Biofilter, OpenOptions, Options};
use rusqlite::{params, Connection};
use tempfile::TempDir;

/// Genes: (id, symbol, chr, posMin, posMax).
pub const GENES: &[(i64, &str, i64, i64, i64)] = &[
    (101, "GENEA", 1, 10_000, 20_000),
    (102, "GENEB", 1, 50_000, 60_000),
    (103, "GENEC", 2, 10_000, 30_000),
    (104, "GENED", 2, 150_000, 160_000),
];

/// Pathways: (id, label, source id, genes).
pub const GROUPS: &[(i64, &str, i64, &[i64])] = &[
    (201, "PATH1", 1, &[101, 102, 103]),
    (202, "PATH2", 2, &[101, 102]),
    (203, "PATH3", 1, &[103, 104]),
];

/// SNP loci: (rs, chr, pos).
pub const SNPS: &[(i64, i64, i64)] = &[
    (1, 1, 15_000),
    (2, 1, 55_000),
    (3, 2, 20_000),
    (4, 2, 155_000),
    (5, 1, 300_000),
];

const ZONE: i64 = 100_000;

/// Writes a small knowledge file and returns its directory (kept alive by the caller).
pub fn knowledge_file() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.db");
    let conn = Connection::open(&path).unwrap();
    create_knowledge_schema(&conn, "main").unwrap();
    conn.execute_batch(
        "INSERT INTO `type` (type_id, type) VALUES (1, 'gene'), (2, 'pathway');
         INSERT INTO namespace (namespace_id, namespace) VALUES (1, 'symbol'), (2, 'entrez');
         INSERT INTO source (source_id, source) VALUES (1, 'kegg'), (2, 'reactome');
         INSERT INTO snp_merge VALUES (9, 1, 1);",
    )
    .unwrap();
    for (id, symbol, chr, min, max) in GENES {
        conn.execute(
            "INSERT INTO biopolymer VALUES (?1, 1, ?2, ?3, 1)",
            params![id, symbol, format!("{symbol} protein")],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO biopolymer_name VALUES (?1, 1, ?2, 1), (?1, 2, ?3, 1)",
            params![id, symbol, (id * 10).to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO biopolymer_region VALUES (?1, 1, ?2, ?3, ?4, 1)",
            params![id, chr, min, max],
        )
        .unwrap();
        for zone in min / ZONE..=max / ZONE {
            conn.execute("INSERT INTO biopolymer_zone VALUES (?1, ?2, ?3)", params![id, chr, zone])
                .unwrap();
        }
    }
    for (id, label, source, genes) in GROUPS {
        conn.execute(
            "INSERT INTO `group` VALUES (?1, 2, ?2, ?3, ?4)",
            params![id, label, format!("{label} pathway"), source],
        )
        .unwrap();
        conn.execute("INSERT INTO group_name VALUES (?1, 1, ?2, ?3)", params![id, label, source])
            .unwrap();
        for gene in genes.iter() {
            conn.execute(
                "INSERT INTO group_biopolymer VALUES (?1, ?2, 100, 100, 100, ?3)",
                params![id, gene, source],
            )
            .unwrap();
        }
    }
    for (rs, chr, pos) in SNPS {
        conn.execute("INSERT INTO snp_locus VALUES (?1, ?2, ?3, 1, 1)", params![rs, chr, pos])
            .unwrap();
    }
    (dir, path)
}

/// A session over a fresh knowledge file.
pub fn session(options: Options) -> (TempDir, Biofilter) {
    let (dir, path) = knowledge_file();
    let bf = Biofilter::open(
        OpenOptions {
            workspace: None,
            knowledge: Some(&path),
        },
        options,
    )
    .unwrap();
    (dir, bf)
}

pub fn snps(rs: &[i64]) -> InputSet {
    InputSet::Snps(rs.iter().map(|rs| SnpInput { rs: *rs, extra: None }).collect())
}

pub fn snp_results(results: &[(i64, &str)]) -> InputSet {
    InputSet::Snps(
        results
            .iter()
            .map(|(rs, extra)| SnpInput {
                rs: *rs,
                extra: Some(extra.to_string()),
            })
            .collect(),
    )
}

pub fn locus(chr: i64, pos: i64, extra: Option<&str>) -> LocusInput {
    LocusInput {
        label: format!("chr{chr}:{pos}"),
        chr,
        pos,
        extra: extra.map(str::to_string),
    }
}

pub fn region(label: &str, chr: i64, pos_min: i64, pos_max: i64) -> RegionInput {
    RegionInput {
        label: label.to_string(),
        chr,
        pos_min,
        pos_max,
        extra: None,
    }
}

pub fn genes(symbols: &[&str]) -> InputSet {
    InputSet::Genes(symbols.iter().map(|s| NameQuery::any(*s)).collect())
}

pub fn groups(labels: &[&str]) -> InputSet {
    InputSet::Groups(labels.iter().map(|s| NameQuery::any(*s)).collect())
}

pub fn load(bf: &mut Biofilter, focus: Focus, input: InputSet) {
    bf.union_input(focus, &input).unwrap();
}

/// Text rows, sorted, for order-insensitive comparison.
pub fn sorted(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut rows = rows;
    rows.sort();
    rows
}

pub fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}
