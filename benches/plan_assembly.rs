#![forbid(unsafe_code)]

use biofilter::catalog::{Alias, Column, Db, PredicateOptions, Table};
use biofilter::paris::{Bins, Feature, FeatureTable, PermutationTest};
use biofilter::query::{
    render, Comparison, FilterState, Focus, Planner, QueryMode, QueryRequest, RenderOptions,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FEATURE_COUNT: i64 = 20_000;

fn options() -> PredicateOptions {
    let mut o = PredicateOptions::new(100_000, 1);
    o.gene_type_id = Some(1);
    o.symbol_namespace_id = Some(1);
    o
}

fn plan_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan/assemble");
    let opts = options();
    let cases = [
        (
            "snp_gene",
            FilterState::only(&[(Db::Main, Table::Snp, 1)]),
            QueryRequest::new(QueryMode::Filter, Focus::Main, vec![Column::SnpLabel, Column::GeneLabel]),
        ),
        (
            "snp_to_group_bridge",
            FilterState::only(&[(Db::Main, Table::Snp, 1), (Db::Main, Table::Group, 1)]),
            QueryRequest::new(QueryMode::Filter, Focus::Main, vec![Column::SnpLabel, Column::GroupLabel]),
        ),
        (
            "annotate_nearest",
            FilterState::only(&[(Db::Main, Table::Snp, 1)]),
            QueryRequest::new(
                QueryMode::Annotate,
                Focus::Alt,
                vec![Column::GeneLabel, Column::UpstreamLabel, Column::GroupLabel],
            )
            .condition(Alias::MainSnp, "rowid", Comparison::eq_param(1)),
        ),
    ];

    group.throughput(Throughput::Elements(1));
    for (name, filters, request) in &cases {
        let planner = Planner::new(&opts, filters);
        group.bench_function(*name, |b| {
            b.iter(|| black_box(planner.assemble(black_box(request))));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("plan/render");
    for (name, filters, request) in &cases {
        let Ok(plan) = Planner::new(&opts, filters).assemble(request) else {
            continue;
        };
        group.bench_function(*name, |b| {
            b.iter(|| {
                black_box(render(
                    black_box(&plan),
                    RenderOptions {
                        order_identity: true,
                        identity_nulls_last: true,
                    },
                ))
            });
        });
    }
    group.finish();
}

fn permutation_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("paris/permute");
    group.sample_size(20);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut table = FeatureTable::new();
    for id in 0..FEATURE_COUNT {
        let matches = rng.gen_range(0..40u32);
        table.insert(
            id,
            Feature {
                chr: 1 + (id % 22),
                pos_min: id * 10_000,
                pos_max: id * 10_000 + 5_000,
                matches,
                significant: if matches > 0 { rng.gen_range(0..=matches) } else { 0 },
            },
        );
    }
    table.seal();
    let bins = Bins::assign(&table, 5_000, &mut rng);
    let test = PermutationTest::new(&table, &bins, 1_000);
    let pathway: Vec<i64> = (0..FEATURE_COUNT).step_by(97).collect();

    group.throughput(Throughput::Elements(test.permutations() as u64));
    group.bench_function("pathway_100_features", |b| {
        b.iter(|| black_box(test.successes(black_box(&pathway), &mut rng)));
    });
    group.finish();
}

criterion_group!(benches, plan_assembly, permutation_scoring);
criterion_main!(benches);
