#![allow(missing_docs)]

use biofilter::catalog::{Alias, AliasSet, Column, Db, PredicateOptions, Table};
use biofilter::query::{render, FilterState, Focus, JoinGraph, Planner, QueryMode, QueryRequest, RenderOptions};
use biofilter::{Biofilter, Options};
use proptest::prelude::*;

const FILTER_TABLES: &[Table] = &[
    Table::Snp,
    Table::Locus,
    Table::Region,
    Table::Gene,
    Table::Group,
    Table::Source,
];

const OUTPUTS: &[Column] = &[
    Column::SnpLabel,
    Column::PositionLabel,
    Column::PositionPos,
    Column::RegionLabel,
    Column::GeneLabel,
    Column::GeneId,
    Column::GroupLabel,
    Column::SourceLabel,
    Column::UpstreamLabel,
    Column::GwasTrait,
];

fn options() -> PredicateOptions {
    let mut o = PredicateOptions::new(100_000, 1);
    o.gene_type_id = Some(1);
    o.symbol_namespace_id = Some(1);
    o
}

fn arb_filters() -> impl Strategy<Value = FilterState> {
    prop::sample::subsequence(FILTER_TABLES.to_vec(), 0..=3).prop_map(|tables| {
        let mut filters = FilterState::new();
        for table in tables {
            filters.set(Db::Main, table, 1);
            if table == Table::Region {
                filters.set(Db::Main, Table::RegionZone, 1);
            }
        }
        filters
    })
}

fn arb_outputs() -> impl Strategy<Value = Vec<Column>> {
    prop::collection::vec(prop::sample::select(OUTPUTS), 1..=3)
}

/// Whether every alias in `set` is reachable from every other through
/// adjacent aliases inside `set`.
fn connected(set: AliasSet, graph: &JoinGraph) -> bool {
    let Some(first) = set.iter().next() else {
        return true;
    };
    let mut reached = AliasSet::of(&[first]);
    let mut frontier = vec![first];
    while let Some(alias) = frontier.pop() {
        for next in graph.neighbors(alias).intersection(set).iter() {
            if reached.insert(next) {
                frontier.push(next);
            }
        }
    }
    reached == set
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn filter_plans_use_eligible_connected_aliases(filters in arb_filters(), outputs in arb_outputs()) {
        let opts = options();
        let request = QueryRequest::new(QueryMode::Filter, Focus::Main, outputs.clone());
        let graph = JoinGraph::build(&filters, false);
        match Planner::new(&opts, &filters).assemble(&request) {
            Ok(plan) => {
                let aliases = plan.aliases();
                for alias in aliases.iter() {
                    prop_assert!(graph.is_eligible(alias), "{alias} is not eligible");
                }
                for alias in Alias::ALL.iter().copied() {
                    let (db, table) = alias.location();
                    if db == Db::Main && table != Table::RegionZone && filters.is_populated(db, table) {
                        prop_assert!(plan.from.contains(alias), "anchor {alias} missing");
                    }
                }
                for col in &outputs {
                    prop_assert!(plan.expression(*col).is_some(), "{col} unresolved");
                }
                prop_assert_eq!(plan.select.len(), outputs.len());
                prop_assert!(plan.joins.is_empty());
                prop_assert!(connected(plan.from, &graph), "{} is not connected", plan.from);
            }
            Err(err) => {
                prop_assert!(
                    matches!(err.code(), "NoSourceTable" | "NoJoinPath"),
                    "unexpected error {}",
                    err
                );
            }
        }
    }

    #[test]
    fn annotation_joins_trail_the_plan(filters in arb_filters(), outputs in arb_outputs()) {
        let opts = options();
        let request = QueryRequest::new(QueryMode::Annotate, Focus::Alt, outputs.clone())
            .condition(Alias::MainSnp, "rowid", biofilter::query::Comparison::eq_param(1));
        let mut filters = filters;
        filters.set(Db::Main, Table::Snp, 1);
        let graph = JoinGraph::build(&filters, false);
        if let Ok(plan) = Planner::new(&opts, &filters).assemble(&request) {
            prop_assert_eq!(plan.from, AliasSet::of(&[Alias::MainSnp]));
            // each outer join attaches to something already placed
            let mut placed = plan.from;
            for join in &plan.joins {
                prop_assert!(graph.touches(join.alias, placed), "{} dangles", join.alias);
                placed.insert(join.alias);
            }
            for col in &outputs {
                prop_assert!(plan.expression(*col).is_some(), "{col} unresolved");
            }
        }
    }
}

#[test]
fn rendered_plans_prepare_against_the_workspace() {
    let bf = Biofilter::open_in_memory(Options::default()).unwrap();
    let opts = options();
    let filters = FilterState::only(&[
        (Db::Main, Table::Snp, 1),
        (Db::Main, Table::Gene, 1),
        (Db::Main, Table::Group, 1),
    ]);
    let planner = Planner::new(&opts, &filters);
    let requests = [
        QueryRequest::new(QueryMode::Filter, Focus::Main, vec![Column::SnpLabel, Column::GeneLabel]),
        QueryRequest::new(QueryMode::Filter, Focus::Main, vec![Column::GroupLabel, Column::SourceLabel]),
        QueryRequest::new(QueryMode::Annotate, Focus::Alt, vec![Column::GeneLabel, Column::UpstreamLabel])
            .condition(Alias::MainSnp, "rowid", biofilter::query::Comparison::eq_param(1)),
    ];
    for request in &requests {
        let plan = planner.assemble(request).unwrap();
        let rendered = render(
            &plan,
            RenderOptions {
                order_identity: true,
                identity_nulls_last: true,
            },
        );
        assert_eq!(rendered.output_len, request.select.len());
        bf.connection()
            .prepare(&rendered.sql)
            .unwrap_or_else(|e| panic!("{e}\n{}", rendered.sql));
    }
}
