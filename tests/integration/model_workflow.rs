#![allow(missing_docs)]

mod common;

use biofilter::query::Focus;
use biofilter::workflows::{CollectSink, ModelPair};
use biofilter::Options;

use common::{genes, load, session, sorted, strings};

#[test]
fn baseline_requires_minimum_source_support() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB", "GENEC"]));
    let models = bf.model_baseline().unwrap();
    assert_eq!(
        models,
        vec![ModelPair {
            left: 101,
            right: 102,
            sources: 2,
            groups: 2,
        }]
    );
}

#[test]
fn baseline_is_sorted_by_support() {
    let options = Options {
        minimum_model_score: 1,
        ..Options::default()
    };
    let (_dir, mut bf) = session(options);
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB", "GENEC"]));
    let models = bf.model_baseline().unwrap();
    assert_eq!(models.len(), 3);
    assert_eq!((models[0].left, models[0].right), (101, 102));
    assert!(models
        .windows(2)
        .all(|w| (w[0].sources, w[0].groups) >= (w[1].sources, w[1].groups)));
    assert!(models.iter().all(|m| m.left < m.right));
}

#[test]
fn oversized_groups_are_not_candidates() {
    let options = Options {
        minimum_model_score: 1,
        maximum_model_group_size: 2,
        ..Options::default()
    };
    let (_dir, mut bf) = session(options);
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB", "GENEC"]));
    let models = bf.model_baseline().unwrap();
    // only PATH2 (two genes) is small enough
    assert_eq!(
        models,
        vec![ModelPair {
            left: 101,
            right: 102,
            sources: 1,
            groups: 1,
        }]
    );
}

#[test]
fn model_rows_carry_the_score() {
    let (_dir, mut bf) = session(Options::default());
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB", "GENEC"]));
    let mut sink = CollectSink::new();
    let rows = bf
        .generate_model_output(&["gene"], &["gene"], &mut sink)
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(sink.header, vec!["#gene1", "gene2", "score(src-grp)"]);
    assert_eq!(sink.text_rows(), strings(&[&["GENEA", "GENEB", "2-2"]]));
}

#[test]
fn pairwise_models_cross_both_sides() {
    let options = Options {
        all_pairwise_models: true,
        ..Options::default()
    };
    let (_dir, mut bf) = session(options);
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB"]));
    load(&mut bf, Focus::Alt, genes(&["GENEC"]));
    let mut sink = CollectSink::new();
    bf.generate_model_output(&["gene"], &["gene"], &mut sink)
        .unwrap();
    assert_eq!(sink.header, vec!["#gene1", "gene2"]);
    assert_eq!(
        sorted(sink.text_rows()),
        strings(&[&["GENEA", "GENEC"], &["GENEB", "GENEC"]])
    );
}

#[test]
fn model_count_is_capped() {
    let options = Options {
        all_pairwise_models: true,
        maximum_model_count: 1,
        ..Options::default()
    };
    let (_dir, mut bf) = session(options);
    load(&mut bf, Focus::Main, genes(&["GENEA", "GENEB"]));
    load(&mut bf, Focus::Alt, genes(&["GENEC", "GENED"]));
    let mut sink = CollectSink::new();
    let rows = bf
        .generate_model_output(&["gene"], &["gene"], &mut sink)
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(sink.rows.len(), 1);
}
