#![allow(missing_docs)]

mod common;

use biofilter::query::Focus;
use biofilter::workflows::CollectSink;
use biofilter::Options;

use common::{genes, load, session, snps, sorted, strings};

#[test]
fn rows_without_annotations_are_padded() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1, 5]));
    let mut sink = CollectSink::new();
    let rows = bf
        .generate_annotation_output(&["snp"], &["gene"], &mut sink)
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(sink.header, vec!["#snp", "gene"]);
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["rs1", "GENEA"], &["rs5", ""]])
    );
}

#[test]
fn every_annotation_follows_its_row() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1]));
    let mut sink = CollectSink::new();
    bf.generate_annotation_output(&["snp"], &["group"], &mut sink)
        .unwrap();
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["rs1", "PATH1"], &["rs1", "PATH2"]])
    );
}

#[test]
fn alternate_filters_limit_annotations() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1, 2]));
    load(&mut bf, Focus::Alt, genes(&["GENEB"]));
    let mut sink = CollectSink::new();
    bf.generate_annotation_output(&["snp"], &["gene"], &mut sink)
        .unwrap();
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["rs1", ""], &["rs2", "GENEB"]])
    );
}

#[test]
fn annotation_needs_columns_on_both_sides() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, snps(&[1]));
    let err = bf
        .generate_annotation_output(&["snp"], &[] as &[&str], &mut CollectSink::new())
        .unwrap_err();
    assert_eq!(err.code(), "NoOutputsOrConditions");
}

fn with_second_geneb_region(bf: &biofilter::Biofilter) {
    bf.connection()
        .execute(
            "INSERT INTO `db`.`biopolymer_region` VALUES (102, 1, 1, 14000, 16000, 1)",
            [],
        )
        .unwrap();
}

#[test]
fn duplicate_output_keeps_every_annotation() {
    let (_dir, mut bf) = session(Options {
        allow_duplicate_output: true,
        ..Options::default()
    });
    with_second_geneb_region(&bf);
    load(&mut bf, Focus::Main, snps(&[1]));
    let mut sink = CollectSink::new();
    let rows = bf
        .generate_annotation_output(&["snp"], &["group"], &mut sink)
        .unwrap();
    assert_eq!(rows, 4);
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[
            &["rs1", "PATH1"],
            &["rs1", "PATH1"],
            &["rs1", "PATH2"],
            &["rs1", "PATH2"],
        ])
    );
}

#[test]
fn repeated_annotations_collapse_by_default() {
    let (_dir, mut bf) = session(Options::default());
    with_second_geneb_region(&bf);
    load(&mut bf, Focus::Main, snps(&[1]));
    let mut sink = CollectSink::new();
    let rows = bf
        .generate_annotation_output(&["snp"], &["group"], &mut sink)
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["rs1", "PATH1"], &["rs1", "PATH2"]])
    );
}
