//! Query plan assembly.
//!
//! The planner chooses a connected set of aliases able to supply every
//! requested column, anchors it on the populated filter tables of the focus
//! workspace, and attaches the conditions of every rule that covers a pair of
//! aliases in the plan.

use std::collections::{HashSet, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::catalog::predicates::{alias_conditions, COMPATIBILITY_RULES, JOIN_RULES};
use crate::catalog::{Alias, AliasSet, Column, ColumnSource, Db, PredicateOptions, Table};
use crate::error::Result;

use super::errors::PlanError;
use super::filters::FilterState;
use super::graph::JoinGraph;
use super::plan::{Focus, QueryMode, QueryPlan, QueryRequest};
use super::profile::{profile_timer, record_profile_timer, ProfileKind};

/// Assembles [`QueryPlan`]s against a filter state.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    options: &'a PredicateOptions,
    filters: &'a FilterState,
    alternate_model_filtering: bool,
}

impl<'a> Planner<'a> {
    /// Creates a planner over the session's predicate options and filters.
    pub fn new(options: &'a PredicateOptions, filters: &'a FilterState) -> Self {
        Self {
            options,
            filters,
            alternate_model_filtering: false,
        }
    }

    /// Keeps the alternate workspace's filters from falling back to the main ones.
    pub fn with_alternate_model_filtering(mut self, enabled: bool) -> Self {
        self.alternate_model_filtering = enabled;
        self
    }

    /// Assembles the plan for one request.
    pub fn assemble(&self, request: &QueryRequest) -> Result<QueryPlan> {
        let start = profile_timer();
        let result = self.assemble_inner(request);
        record_profile_timer(ProfileKind::Assemble, start);
        result
    }

    fn assemble_inner(&self, request: &QueryRequest) -> Result<QueryPlan> {
        let filters = request.filters.as_ref().unwrap_or(self.filters);
        let graph = JoinGraph::build(filters, request.user_knowledge);

        let mut wanted: Vec<Column> = Vec::new();
        for col in request
            .select
            .iter()
            .chain(request.having.iter().map(|(c, _)| c))
        {
            if !wanted.contains(col) {
                wanted.push(*col);
            }
        }
        if wanted.is_empty() && request.conditions.is_empty() {
            return Err(PlanError::NoOutputsOrConditions.into());
        }

        let mut candidates: FxHashMap<Column, Vec<Alias>> = FxHashMap::default();
        let mut alias_columns: FxHashMap<Alias, Vec<Column>> = FxHashMap::default();
        for col in &wanted {
            let aliases: Vec<Alias> = col
                .sources()
                .iter()
                .map(|s| s.alias)
                .filter(|a| graph.is_node(*a))
                .collect();
            if aliases.is_empty() {
                return Err(PlanError::no_source(col).into());
            }
            for alias in &aliases {
                alias_columns.entry(*alias).or_default().push(*col);
            }
            candidates.insert(*col, aliases);
        }

        let mut from = self.anchors(request, filters, &graph);
        if from.is_empty() {
            from.insert(seed(&wanted, &graph)?);
        }
        if from.len() > 1 {
            from = connect_anchors(from, &graph)?;
        }

        let mut remaining: Vec<Column> = wanted
            .iter()
            .copied()
            .filter(|c| !candidates[c].iter().any(|a| from.contains(*a)))
            .collect();
        let mut joins: Vec<Alias> = Vec::new();
        if request.mode == QueryMode::Annotate {
            while let Some(target) = remaining.first().copied() {
                let preferred = candidates[&target][0];
                let path = path_to_plan(preferred, from, &joins, &graph)
                    .ok_or_else(|| PlanError::no_source(target))?;
                for alias in path {
                    joins.push(alias);
                    if let Some(cols) = alias_columns.get(&alias) {
                        remaining.retain(|c| !cols.contains(c));
                    }
                }
            }
        } else if !remaining.is_empty() {
            from = grow_tree(from, &remaining, &alias_columns, &graph)?;
        }

        let options = if request.apply_offsets {
            self.options.with_output_offsets()
        } else {
            self.options.clone()
        };
        let mut plan = QueryPlan::new(request.select.clone(), from, joins);

        for (idx, col) in request.select.iter().enumerate() {
            if let Some(prev) = request.select[..idx].iter().position(|c| c == col) {
                plan.select[idx] = plan.select[prev].clone();
                continue;
            }
            let source = first_source(&plan, *col)?;
            plan.push_identity(source.alias, source.row_id);
            plan.select[idx] = source.render(&options)?;
            attach_extra(&mut plan, source, &options)?;
        }

        for (col, cmp) in &request.having {
            let source = first_source(&plan, *col)?;
            let expr = source.render(&options)?;
            if let Some(placement) = plan.placement_of(source.alias) {
                plan.attach(placement, format!("({expr} {cmp})"));
            }
            attach_extra(&mut plan, source, &options)?;
        }

        for cond in &request.conditions {
            plan.conditions
                .insert(format!("{}.{} {}", cond.alias, cond.field, cond.cmp));
        }

        for alias in plan.aliases().iter() {
            if let Some(placement) = plan.placement_of(alias) {
                for cond in alias_conditions(alias, &options) {
                    plan.attach(placement, cond);
                }
            }
        }

        for rule in JOIN_RULES.iter().chain(COMPATIBILITY_RULES) {
            for (left, right) in rule.pairs() {
                if let Some(placement) = plan.pair_placement(left, right) {
                    for cond in rule.conditions(left, right, &options) {
                        plan.attach(placement, cond);
                    }
                }
            }
        }

        debug!(
            mode = ?request.mode,
            focus = ?request.focus,
            from = %plan.from,
            joins = plan.joins.len(),
            conditions = plan.conditions.len(),
            "query.plan.assembled"
        );
        Ok(plan)
    }

    /// Populated filter tables that anchor the plan, plus every alias named
    /// by a row condition.
    fn anchors(&self, request: &QueryRequest, filters: &FilterState, graph: &JoinGraph) -> AliasSet {
        let mut anchors: AliasSet = request.conditions.iter().map(|c| c.alias).collect();
        for alias in Alias::ALL.iter().copied() {
            let (db, table) = alias.location();
            if !matches!(db, Db::Main | Db::Alt | Db::Cand) || !filters.is_populated(db, table) {
                continue;
            }
            let in_focus = db == request.focus.db()
                || (db == Db::Main
                    && request.focus == Focus::Alt
                    && request.mode != QueryMode::Annotate
                    && !self.alternate_model_filtering);
            if !in_focus || !graph.is_eligible(alias) {
                continue;
            }
            match request.mode {
                QueryMode::ModelLeft if table.is_group_family() => continue,
                QueryMode::ModelRight if !table.is_group_family() => continue,
                _ => {}
            }
            if alias == Alias::CandMainBiopolymerR
                && (self.alternate_model_filtering
                    || filters.is_populated(Db::Cand, Table::AltBiopolymer))
            {
                continue;
            }
            anchors.insert(alias);
        }
        anchors
    }
}

/// Last knowledge source of the first wanted column.
fn seed(wanted: &[Column], graph: &JoinGraph) -> Result<Alias> {
    let first = wanted
        .first()
        .copied()
        .ok_or(PlanError::NoOutputsOrConditions)?;
    first
        .sources()
        .iter()
        .rev()
        .map(|s| s.alias)
        .find(|a| graph.is_knowledge(*a))
        .ok_or_else(|| PlanError::no_source(first).into())
}

/// Breadth-first expansion from one anchor until every other anchor is inside.
fn connect_anchors(anchors: AliasSet, graph: &JoinGraph) -> Result<AliasSet> {
    let Some(first) = anchors.iter().next() else {
        return Ok(anchors);
    };
    let nodes = graph.nodes();
    let start = AliasSet::of(&[first]);
    let mut queue = VecDeque::from([start]);
    let mut seen: HashSet<AliasSet> = HashSet::from([start]);
    while let Some(inside) = queue.pop_front() {
        if anchors.is_subset(inside) {
            return Ok(inside);
        }
        for alias in nodes.difference(inside).iter() {
            if graph.touches(alias, inside) {
                let mut next = inside;
                next.insert(alias);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    Err(PlanError::no_join(anchors).into())
}

/// Smallest set of knowledge (or zone) aliases that, added to `from`, supplies
/// every remaining column while staying connected.
fn grow_tree(
    from: AliasSet,
    remaining: &[Column],
    alias_columns: &FxHashMap<Alias, Vec<Column>>,
    graph: &JoinGraph,
) -> Result<AliasSet> {
    let available: AliasSet = Alias::ALL
        .iter()
        .copied()
        .filter(|a| graph.is_knowledge(*a) || a.table() == Table::RegionZone)
        .collect();
    let covered = |inside: AliasSet| {
        remaining.iter().all(|col| {
            inside
                .iter()
                .any(|a| alias_columns.get(&a).is_some_and(|cols| cols.contains(col)))
        })
    };
    let mut queue = VecDeque::from([from]);
    let mut seen: HashSet<AliasSet> = HashSet::from([from]);
    while let Some(inside) = queue.pop_front() {
        if covered(inside) {
            return Ok(inside);
        }
        for alias in available.difference(inside).iter() {
            if graph.touches(alias, inside) {
                let mut next = inside;
                next.insert(alias);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    let missing: Vec<&str> = remaining.iter().map(|c| c.name()).collect();
    Err(PlanError::no_source(missing.join(", ")).into())
}

/// Shortest path from `start` to any alias already in the plan, returned
/// nearest-to-the-plan first and excluding the plan member it reaches.
fn path_to_plan(start: Alias, from: AliasSet, joins: &[Alias], graph: &JoinGraph) -> Option<Vec<Alias>> {
    let in_plan = |a: Alias| from.contains(a) || joins.contains(&a);
    if in_plan(start) {
        return Some(Vec::new());
    }
    let mut parent: FxHashMap<Alias, Alias> = FxHashMap::default();
    let mut visited = AliasSet::of(&[start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for next in graph.neighbors(current).iter() {
            if !visited.insert(next) {
                continue;
            }
            if in_plan(next) {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(prev) = parent.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                return Some(path);
            }
            parent.insert(next, current);
            queue.push_back(next);
        }
    }
    None
}

fn first_source(plan: &QueryPlan, column: Column) -> Result<&'static ColumnSource> {
    column
        .sources()
        .iter()
        .find(|s| plan.contains(s.alias))
        .ok_or_else(|| PlanError::no_source(column).into())
}

fn attach_extra(plan: &mut QueryPlan, source: &ColumnSource, options: &PredicateOptions) -> Result<()> {
    if let Some(placement) = plan.placement_of(source.alias) {
        for cond in source.extra_conditions(options)? {
            plan.attach(placement, cond);
        }
    }
    Ok(())
}
