#![allow(missing_docs)]

mod common;

use biofilter::db::{read_user_knowledge, InputSet};
use biofilter::knowledge::NameQuery;
use biofilter::query::Focus;
use biofilter::workflows::{CollectSink, TsvSink};
use biofilter::Options;

use common::{genes, groups, load, session, snps, sorted, strings};

#[test]
fn snps_map_to_genes() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1, 2, 5]));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["snp", "gene"], &mut sink).unwrap();
    assert_eq!(sink.header, vec!["#snp", "gene"]);
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["rs1", "GENEA"], &["rs2", "GENEB"]])
    );
}

#[test]
fn gene_filter_restricts_snps() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1, 2, 3, 4]));
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEC"]));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["snp"], &mut sink).unwrap();
    assert_eq!(sorted(sink.text_rows()), strings(&[&["rs1"], &["rs3"]]));
}

#[test]
fn merged_snps_are_renumbered() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[9]));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["gene"], &mut sink).unwrap();
    assert_eq!(sink.text_rows(), strings(&[&["GENEA"]]));
}

#[test]
fn group_filter_lists_member_genes() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, groups(&["PATH3"]));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["gene", "group"], &mut sink).unwrap();
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["GENEC", "PATH3"], &["GENED", "PATH3"]])
    );
}

#[test]
fn intersected_inputs_narrow_the_filter() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1, 2, 3]));
    let summary = bf.intersect_input(Focus::Main, &snps(&[2, 3, 4])).unwrap();
    assert_eq!((summary.kept, summary.dropped), (2, 1));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["snp"], &mut sink).unwrap();
    assert_eq!(sorted(sink.text_rows()), strings(&[&["rs2"], &["rs3"]]));
}

#[test]
fn unknown_output_type_is_rejected() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1]));
    let err = bf
        .generate_filter_output(&["snp", "bogus"], &mut CollectSink::new())
        .unwrap_err();
    assert_eq!(err.code(), "UnsupportedOutputType");
    let err = bf
        .generate_filter_output(&[] as &[&str], &mut CollectSink::new())
        .unwrap_err();
    assert_eq!(err.code(), "NoOutputsOrConditions");
}

#[test]
fn tsv_output_has_comment_header() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1]));
    let mut sink = TsvSink::new(Vec::new());
    bf.generate_filter_output(&["snp", "gene"], &mut sink).unwrap();
    let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    assert_eq!(text, "#snp\tgene\nrs1\tGENEA\n");
}

fn searches(texts: &[&str]) -> Vec<NameQuery> {
    texts
        .iter()
        .map(|t| NameQuery::any(*t).with_extra(Some(t.to_string())))
        .collect()
}

#[test]
fn gene_search_matches_descriptions_and_narrows() {
    let (_dir, mut bf) = session(Options::default());
    let added = bf
        .union_input(Focus::Main, &InputSet::GeneSearch(searches(&["protein"])))
        .unwrap();
    assert_eq!(added.added, 4);
    let kept = bf
        .intersect_input(Focus::Main, &InputSet::GeneSearch(searches(&["genea", "nothing"])))
        .unwrap();
    assert_eq!((kept.kept, kept.dropped), (1, 3));
    assert_eq!((kept.tally.matched, kept.tally.unrecognized), (1, 1));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["gene"], &mut sink).unwrap();
    assert_eq!(sink.text_rows(), strings(&[&["GENEA"]]));
}

#[test]
fn group_search_loads_the_group_filter() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, InputSet::GroupSearch(searches(&["PATH3"])));
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["gene", "group"], &mut sink).unwrap();
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["GENEC", "PATH3"], &["GENED", "PATH3"]])
    );
}

#[test]
fn user_knowledge_seeds_the_gene_filter() {
    let (_dir, mut bf) = session(Options::default());
    let text = "mine hand-picked\nGROUP custom\nGENEA GENED missing\n";
    let knowledge = read_user_knowledge(text.as_bytes(), "").unwrap();
    let tally = bf.load_user_knowledge(&knowledge).unwrap();
    assert_eq!((tally.matched, tally.unrecognized), (2, 1));
    assert!(bf.has_user_knowledge());
    assert_eq!(bf.apply_user_knowledge_filter(false).unwrap(), 2);
    let mut sink = CollectSink::new();
    bf.generate_filter_output(&["gene"], &mut sink).unwrap();
    assert_eq!(sorted(sink.text_rows()), strings(&[&["GENEA"], &["GENED"]]));
}
