#![allow(missing_docs)]

mod common;

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use csv::ReaderBuilder;
use serde_json::Value;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    knowledge: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let (dir, knowledge) = common::knowledge_file();
        Self { dir, knowledge }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write input file");
        path
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("biofilter");
        cmd.env("XDG_CONFIG_HOME", self.dir.path())
            .env_remove("BIOFILTER_LOG")
            .arg("--knowledge")
            .arg(&self.knowledge);
        cmd
    }
}

fn tsv_rows(stdout: &[u8]) -> Vec<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(stdout);
    reader
        .records()
        .map(|r| r.expect("tsv record").iter().map(str::to_string).collect())
        .collect()
}

fn stdout_of(cmd: &mut assert_cmd::Command) -> Vec<u8> {
    cmd.assert().success().get_output().stdout.clone()
}

#[test]
fn filter_prints_tsv_with_comment_header() {
    let fx = Fixture::new();
    let snps = fx.file("snps.txt", "rs1\nrs2\nrs5\n");
    let out = stdout_of(
        fx.cmd()
            .args(["filter", "-o", "snp,gene", "--snp-file"])
            .arg(&snps),
    );
    let mut rows = tsv_rows(&out);
    assert_eq!(rows.remove(0), vec!["#snp", "gene"]);
    rows.sort();
    assert_eq!(
        rows,
        vec![vec!["rs1", "GENEA"], vec!["rs2", "GENEB"]]
    );
}

#[test]
fn json_format_writes_one_array_per_line() {
    let fx = Fixture::new();
    let out = stdout_of(fx.cmd().args(["--format", "json", "filter", "-o", "gene", "--gene", "GENEA"]));
    let lines: Vec<Value> = out
        .split(|b| *b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_slice(l).expect("valid json"))
        .collect();
    assert_eq!(lines[0], serde_json::json!(["#gene"]));
    assert_eq!(lines[1], serde_json::json!(["GENEA"]));
    assert_eq!(lines.len(), 2);
}

#[test]
fn model_lists_supported_pairs() {
    let fx = Fixture::new();
    let out = stdout_of(fx.cmd().args(["model", "--gene", "GENEA,GENEB,GENEC"]));
    let rows = tsv_rows(&out);
    assert_eq!(rows[0], vec!["#gene1", "gene2", "score(src-grp)"]);
    assert_eq!(rows[1..], [vec!["GENEA", "GENEB", "2-2"]]);
}

#[test]
fn paris_writes_summary_and_details() {
    let fx = Fixture::new();
    let regions = fx.file(
        "regions.txt",
        "1 R1 5000 25000\n1 R2 45000 65000\n2 R3 5000 35000\n",
    );
    let results = fx.file("results.txt", "rs1 1 0.001\nrs2 1 0.5\nrs3 2 0.01\n");
    let details = fx.dir.path().join("details.txt");
    let out = stdout_of(
        fx.cmd()
            .args(["--set", "random_seed=3", "paris", "--region-file"])
            .arg(&regions)
            .arg("--snp-results")
            .arg(&results)
            .arg("--details-file")
            .arg(&details),
    );
    let rows = tsv_rows(&out);
    assert_eq!(rows[0][0], "#id");
    assert_eq!(rows.len(), 4);
    let detail_rows = tsv_rows(&fs::read(&details).expect("details written"));
    assert_eq!(detail_rows[0][0], "#id");
    assert!(detail_rows.iter().any(|r| r[2] == "*"));
    assert!(detail_rows.iter().any(|r| r[2] == "GENEA"));
}

#[test]
fn explain_shows_plan_and_statement() {
    let fx = Fixture::new();
    let snps = fx.file("snps.txt", "rs1\n");
    let out = stdout_of(
        fx.cmd()
            .args(["explain", "-o", "snp,gene", "--snp-file"])
            .arg(&snps),
    );
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("Select"));
    assert!(text.contains("m_s"));
    assert!(text.contains("SELECT"));
}

#[test]
fn options_file_is_honoured() {
    let fx = Fixture::new();
    let config = fx.file("options.toml", "minimum_model_score = 1\n");
    let out = stdout_of(
        fx.cmd()
            .arg("--config")
            .arg(&config)
            .args(["model", "--gene", "GENEA,GENEB,GENEC"]),
    );
    assert_eq!(tsv_rows(&out).len(), 4);
}

#[test]
fn bad_override_fails() {
    let fx = Fixture::new();
    let snps = fx.file("snps.txt", "rs1\n");
    let assert = fx
        .cmd()
        .args(["--set", "no_such_option=1", "filter", "-o", "snp", "--snp-file"])
        .arg(&snps)
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.starts_with("error:"), "{stderr}");
}

#[test]
fn unknown_output_type_fails() {
    let fx = Fixture::new();
    let snps = fx.file("snps.txt", "rs1\n");
    fx.cmd()
        .args(["filter", "-o", "snp,bogus", "--snp-file"])
        .arg(&snps)
        .assert()
        .failure();
}

#[test]
fn gene_search_and_gene_names_intersect() {
    let fx = Fixture::new();
    let out = stdout_of(fx.cmd().args([
        "filter",
        "-o",
        "gene",
        "--gene-search",
        "protein",
        "--gene",
        "GENEB,GENED",
    ]));
    let mut rows = tsv_rows(&out);
    rows.remove(0);
    rows.sort();
    assert_eq!(rows, vec![vec!["GENEB"], vec!["GENED"]]);
}

#[test]
fn user_knowledge_file_seeds_gene_filter() {
    let fx = Fixture::new();
    let knowledge = fx.file("mine.txt", "mine\nGROUP custom picks\nGENEA GENEC\n");
    let out = stdout_of(
        fx.cmd()
            .args(["filter", "-o", "gene", "--user-defined-filter", "gene", "--user-knowledge"])
            .arg(&knowledge),
    );
    let mut rows = tsv_rows(&out);
    assert_eq!(rows.remove(0), vec!["#gene"]);
    rows.sort();
    assert_eq!(rows, vec![vec!["GENEA"], vec!["GENEC"]]);
}
