#![allow(missing_docs)]

mod common;

use biofilter::config::ZeroPValuePolicy;
use biofilter::db::InputSet;
use biofilter::paris::{Bins, Feature, FeatureTable, ParisSummary};
use biofilter::query::Focus;
use biofilter::workflows::CollectSink;
use biofilter::{Biofilter, Options, ParisInputs};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use common::{load, locus, region, session, snp_results};

fn seeded() -> Options {
    Options {
        random_seed: Some(7),
        paris_permutation_count: 200,
        ..Options::default()
    }
}

/// Four gene-sized regions, one empty region and SNP results on every gene
/// plus one outside all regions.
fn prepare(bf: &mut Biofilter) {
    load(
        bf,
        Focus::Main,
        InputSet::Regions(vec![
            region("R1", 1, 5_000, 25_000),
            region("R2", 1, 45_000, 65_000),
            region("R3", 2, 5_000, 35_000),
            region("R4", 2, 140_000, 170_000),
            region("R5", 3, 1_000, 2_000),
        ]),
    );
    load(
        bf,
        Focus::Main,
        snp_results(&[
            (1, "1 0.001"),
            (2, "1 0.5"),
            (3, "2 0.01"),
            (4, "2 0"),
            (5, "1 0.2"),
        ]),
    );
}

fn region_count(bf: &Biofilter) -> i64 {
    bf.connection()
        .query_row("SELECT COUNT(*) FROM `main`.`region`", [], |r| r.get(0))
        .unwrap()
}

fn summary(results: &[ParisSummary], id: i64) -> &ParisSummary {
    results.iter().find(|s| s.id == id).unwrap()
}

#[test]
fn scanning_counts_matches_singletons_and_ignored() {
    let (_dir, mut bf) = session(seeded());
    prepare(&mut bf);
    let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
    assert_eq!(report.scan.matched, 3);
    assert_eq!(report.scan.singletons, 1);
    assert_eq!(report.scan.ignored, 1);
    // R4 and R5 matched nothing and were culled; the singleton was added
    assert_eq!(region_count(&bf), 4);
    let singleton: String = bf
        .connection()
        .query_row(
            "SELECT label FROM `main`.`region` WHERE chr = 1 AND posMin = 300000",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(singleton, "chr1:300000");
}

#[test]
fn pathways_report_feature_counts() {
    let (_dir, mut bf) = session(seeded());
    prepare(&mut bf);
    let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
    let ids: Vec<i64> = report.summaries.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![201, 202, 203]);

    let path1 = summary(&report.summaries, 201);
    assert_eq!(path1.group, "PATH1");
    assert_eq!(path1.genes, 3);
    assert_eq!(path1.counts.features, 3);
    assert_eq!((path1.counts.simple, path1.counts.simple_sig), (3, 2));
    assert_eq!(path1.counts.complex, 0);

    let path3 = summary(&report.summaries, 203);
    assert_eq!(path3.genes, 2);
    assert_eq!(path3.counts.features, 1);
    assert_eq!(path3.counts.simple_sig, 1);
    assert!(path3.details.is_empty());
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let (_dir, mut bf) = session(seeded());
        prepare(&mut bf);
        let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
        report
            .summaries
            .into_iter()
            .map(|s| s.pval)
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, run());
    assert!(first.iter().all(|p| !p.is_empty()));
}

#[test]
fn zero_p_values_can_count_as_significant() {
    let options = Options {
        paris_zero_p_values: ZeroPValuePolicy::Significant,
        ..seeded()
    };
    let (_dir, mut bf) = session(options);
    prepare(&mut bf);
    let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
    assert_eq!(report.scan.ignored, 0);
    assert_eq!(report.scan.matched, 4);
    assert_eq!(region_count(&bf), 5);
    let path3 = summary(&report.summaries, 203);
    assert_eq!((path3.counts.features, path3.counts.simple_sig), (2, 2));
}

#[test]
fn chromosome_enforcement_skips_disagreeing_results() {
    let (_dir, mut bf) = session(seeded());
    load(&mut bf, Focus::Main, InputSet::Regions(vec![region("R1", 1, 5_000, 25_000)]));
    load(&mut bf, Focus::Main, snp_results(&[(1, "2 0.001"), (2, "1 0.5")]));
    let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
    assert_eq!(report.scan.skipped, 1);
    assert_eq!(report.scan.matched, 0);
    assert_eq!(report.scan.singletons, 1);
}

#[test]
fn supplementary_positions_join_the_scan() {
    let (_dir, mut bf) = session(seeded());
    prepare(&mut bf);
    let inputs = ParisInputs {
        loci: vec![locus(3, 1_500, Some("3 0.01"))],
        ..ParisInputs::default()
    };
    let report = bf.generate_paris_results(&inputs).unwrap();
    assert_eq!(report.scan.matched, 4);
    // R5 now holds a locus and survives culling
    assert_eq!(region_count(&bf), 5);
}

#[test]
fn details_list_every_gene() {
    let options = Options {
        paris_details: true,
        ..seeded()
    };
    let (_dir, mut bf) = session(options);
    prepare(&mut bf);
    let report = bf.generate_paris_results(&ParisInputs::default()).unwrap();
    let path1 = summary(&report.summaries, 201);
    let genes: Vec<&str> = path1.details.iter().map(|d| d.gene.as_str()).collect();
    assert_eq!(genes, vec!["GENEA", "GENEB", "GENEC"]);
    assert!(path1.details.iter().all(|d| d.counts.features == 1));

    let mut summary_sink = CollectSink::new();
    let mut detail_sink = CollectSink::new();
    report
        .write(&mut summary_sink, Some(&mut detail_sink))
        .unwrap();
    assert_eq!(summary_sink.header[0], "#id");
    assert_eq!(summary_sink.rows.len(), 3);
    // one pathway line plus one line per gene, for each pathway
    assert_eq!(detail_sink.rows.len(), 3 + 3 + 2 + 2);
    assert_eq!(detail_sink.text_rows()[0][2], "*");
}

#[test]
fn lifting_without_chains_fails() {
    let (_dir, mut bf) = session(seeded());
    prepare(&mut bf);
    bf.connection()
        .execute("INSERT OR REPLACE INTO `db`.`setting` (setting, value) VALUES ('ucschg', '19')", [])
        .unwrap();
    let inputs = ParisInputs {
        loci: vec![locus(1, 15_000, Some("1 0.01"))],
        user_build: Some(18),
        ..ParisInputs::default()
    };
    let err = bf.generate_paris_results(&inputs).unwrap_err();
    assert_eq!(err.code(), "LiftoverUnavailable");
}

#[test]
fn regions_are_required() {
    let (_dir, mut bf) = session(seeded());
    load(&mut bf, Focus::Main, snp_results(&[(1, "1 0.001")]));
    let err = bf.generate_paris_results(&ParisInputs::default()).unwrap_err();
    assert_eq!(err.code(), "ParisInputMissing");
}

fn table(sizes: &[u32]) -> FeatureTable {
    let mut table = FeatureTable::new();
    for (i, size) in sizes.iter().enumerate() {
        let start = i as i64 * 1_000;
        table.insert(
            i as i64 + 1,
            Feature {
                chr: 1,
                pos_min: start,
                pos_max: start + 10,
                matches: *size,
                significant: 0,
            },
        );
    }
    table
}

proptest! {
    #[test]
    fn bins_partition_features(
        sizes in prop::collection::vec(0u32..12, 0..200),
        bin_size in 1usize..40,
        seed in any::<u64>(),
    ) {
        let table = table(&sizes);
        let bins = Bins::assign(&table, bin_size, &mut ChaCha8Rng::seed_from_u64(seed));

        let mut placed = 0usize;
        for (id, feature) in table.iter() {
            let bin = bins.bin_of(id);
            prop_assert!(bin.is_some());
            let bin = bin.unwrap_or_default();
            if feature.matches < 2 {
                prop_assert_eq!(bin, feature.matches as usize);
            } else {
                prop_assert!(bin >= 2);
            }
            placed += 1;
        }
        prop_assert_eq!(placed, sizes.len());

        let stratified: Vec<(usize, &[i64])> = bins.iter().filter(|(b, _)| *b >= 2).collect();
        if let (Some(first), Some(last)) = (stratified.first(), stratified.last()) {
            prop_assert!(first.1.len() >= last.1.len());
            prop_assert!(first.1.len() - last.1.len() <= 1);
        }
        for pair in stratified.windows(2) {
            let max = pair[0].1.iter().filter_map(|id| table.get(*id)).map(|f| f.matches).max();
            let min = pair[1].1.iter().filter_map(|id| table.get(*id)).map(|f| f.matches).min();
            prop_assert!(max <= min);
        }
    }
}
