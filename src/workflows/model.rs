//! Gene-gene model generation.
//!
//! Knowledge-supported models start from a baseline of candidate biopolymer
//! pairs sharing candidate groups, scored by the number of distinct sources
//! and groups supporting them. Each baseline pair is then expanded through
//! the main (left) and alt (right) filters into full output rows.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{Column, ColumnSource, Db, Table};
use crate::db::Biofilter;
use crate::error::Result;
use crate::query::{
    render, Comparison, DedupPolicy, Focus, QueryMode, QueryPlan, QueryRequest, RenderOptions,
    RowKey, Value,
};

use super::{comment_header, non_empty, RowSink};

/// A baseline model: two biopolymers and the knowledge supporting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelPair {
    /// Smaller biopolymer id.
    pub left: i64,
    /// Larger biopolymer id.
    pub right: i64,
    /// Distinct sources supporting the pair.
    pub sources: i64,
    /// Distinct groups supporting the pair.
    pub groups: i64,
}

impl ModelPair {
    /// Score label, `sources-groups`.
    pub fn score(&self) -> String {
        format!("{}-{}", self.sources, self.groups)
    }
}

/// First source of a column whose alias made it into the plan.
fn plan_source(plan: &QueryPlan, column: Column) -> Option<&'static ColumnSource> {
    column.sources().iter().find(|s| plan.contains(s.alias))
}

impl Biofilter {
    fn model_column(&self) -> Column {
        if self.options().only_gene_models {
            Column::GeneId
        } else {
            Column::BiopolymerId
        }
    }

    /// Loads `cand.main_biopolymer` and `cand.alt_biopolymer` from the
    /// non-group filters of each workspace.
    pub fn identify_candidate_model_biopolymers(&mut self) -> Result<()> {
        let targets = [
            (Focus::Main, Table::MainBiopolymer),
            (Focus::Alt, Table::AltBiopolymer),
        ];
        for (_, table) in targets {
            self.filters_mut().reset(Db::Cand, table);
            self.connection()
                .execute(&format!("DELETE FROM `cand`.`{}`", table.name()), [])?;
        }
        let column = self.model_column();
        for (focus, table) in targets {
            let constrained = self
                .filters()
                .populated(focus.db())
                .any(|t| !t.is_group_family());
            if !constrained {
                continue;
            }
            let plan = self.assemble(&QueryRequest::new(QueryMode::ModelLeft, focus, vec![column]))?;
            self.prepare_plan(&plan)?;
            let sql = format!(
                "INSERT OR IGNORE INTO `cand`.`{}` (biopolymer_id, flag) VALUES (?1, 0)",
                table.name()
            );
            let conn = self.connection();
            self.executor()
                .execute(&plan, None, &[], DedupPolicy::ContiguousRun, |row| {
                    conn.prepare_cached(&sql)?.execute([&row[0]])?;
                    Ok(ControlFlow::Continue(()))
                })?;
            let count: i64 = conn.query_row(&format!("SELECT COUNT() FROM `cand`.`{}`", table.name()), [], |r| {
                r.get(0)
            })?;
            self.filters_mut().set(Db::Cand, table, 1);
            info!(focus = ?focus, candidates = count, "model.candidates.biopolymers");
        }
        Ok(())
    }

    /// Loads `cand.group` from the group and source filters, then keeps the
    /// groups holding at least two (and at most `maximum-model-group-size`)
    /// candidate biopolymers.
    pub fn identify_candidate_model_groups(&mut self) -> Result<()> {
        self.filters_mut().reset(Db::Cand, Table::Group);
        self.connection().execute("DELETE FROM `cand`.`group`", [])?;
        for focus in [Focus::Main, Focus::Alt] {
            let constrained = self
                .filters()
                .populated(focus.db())
                .any(|t| t.is_group_family());
            if constrained {
                let plan =
                    self.assemble(&QueryRequest::new(QueryMode::ModelRight, focus, vec![Column::GroupId]))?;
                self.load_candidate_groups(&plan)?;
            }
        }

        let column = self.model_column();
        let mut plan = self.assemble(
            &QueryRequest::new(QueryMode::ModelRight, Focus::Cand, vec![Column::GroupId])
                .having(column, Comparison::ne(0)),
        )?;
        if let Some(group) = plan_source(&plan, Column::GroupId) {
            plan.group_by.push(format!("{}.{}", group.alias, group.row_id));
        }
        if let Some(member) = plan_source(&plan, column) {
            let expr = member.render(self.predicate_options())?;
            let max = self.options().maximum_model_group_size;
            plan.having.insert(if max > 0 {
                format!("(COUNT(DISTINCT {expr}) BETWEEN 2 AND {max})")
            } else {
                format!("COUNT(DISTINCT {expr}) >= 2")
            });
        }
        self.load_candidate_groups(&plan)?;
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT() FROM `cand`.`group`", [], |r| r.get(0))?;
        info!(groups = count, "model.candidates.groups");
        Ok(())
    }

    /// Inserts the plan's group ids into `cand.group`, or intersects with it
    /// once it is populated.
    fn load_candidate_groups(&mut self, plan: &QueryPlan) -> Result<()> {
        self.prepare_plan(plan)?;
        let intersect = self.filters().is_populated(Db::Cand, Table::Group);
        let conn = self.connection();
        let sql = if intersect {
            conn.execute("UPDATE `cand`.`group` SET flag = 0", [])?;
            "UPDATE `cand`.`group` SET flag = 1 WHERE group_id = ?1"
        } else {
            "INSERT OR IGNORE INTO `cand`.`group` (group_id, flag) VALUES (?1, 0)"
        };
        self.executor()
            .execute(plan, None, &[], DedupPolicy::ContiguousRun, |row| {
                conn.prepare_cached(sql)?.execute([&row[0]])?;
                Ok(ControlFlow::Continue(()))
            })?;
        if intersect {
            conn.execute("DELETE FROM `cand`.`group` WHERE flag = 0", [])?;
        }
        self.filters_mut().set(Db::Cand, Table::Group, 1);
        Ok(())
    }

    /// Computes the knowledge-supported baseline models over the candidate tables.
    pub fn model_baseline(&mut self) -> Result<Vec<ModelPair>> {
        self.identify_candidate_model_biopolymers()?;
        self.identify_candidate_model_groups()?;

        let mut plan = self.assemble(&QueryRequest::new(
            QueryMode::Model,
            Focus::Cand,
            vec![
                Column::BiopolymerIdL,
                Column::BiopolymerIdR,
                Column::SourceId,
                Column::GroupId,
            ],
        ))?;
        let (l, r) = (plan.select[0].clone(), plan.select[1].clone());
        let (src, grp) = (plan.select[2].clone(), plan.select[3].clone());
        plan.group_by = vec![format!("MIN({l}, {r})"), format!("MAX({l}, {r})")];
        plan.select = vec![
            format!("MIN(MIN({l}, {r}))"),
            format!("MAX(MAX({l}, {r}))"),
            format!("COUNT(DISTINCT {src})"),
            format!("COUNT(DISTINCT {grp})"),
        ];
        plan.identity.clear();
        let options = self.options();
        if options.minimum_model_score > 0 {
            plan.having
                .insert(format!("COUNT(DISTINCT {src}) >= {}", options.minimum_model_score));
        }
        if options.sort_models {
            plan.order_by = vec![
                format!("COUNT(DISTINCT {src}) DESC"),
                format!("COUNT(DISTINCT {grp}) DESC"),
            ];
        }
        if options.maximum_model_count > 0 {
            plan.limit = Some(options.maximum_model_count);
        }
        self.prepare_plan(&plan)?;
        let rendered = render(&plan, RenderOptions::default());
        debug!(sql = %rendered.sql, "model.baseline.statement");

        let mut models = Vec::new();
        self.executor().stream(&rendered, &[], |row, _| {
            let field = |i: usize| row.get(i).and_then(Value::as_i64).unwrap_or(0);
            models.push(ModelPair {
                left: field(0),
                right: field(1),
                sources: field(2),
                groups: field(3),
            });
            Ok(ControlFlow::Continue(()))
        })?;
        info!(models = models.len(), "model.baseline.completed");
        Ok(models)
    }

    /// Streams model rows: left-hand output columns (suffixed `1`), right-hand
    /// columns (suffixed `2`) and, for knowledge-supported models, the score.
    pub fn generate_model_output<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        left_types: &[S],
        right_types: &[T],
        sink: &mut dyn RowSink,
    ) -> Result<u64> {
        let left = non_empty(left_types)?;
        let right = non_empty(right_types)?;
        let pairwise = self.options().all_pairwise_models;
        let limit = self.options().maximum_model_count;
        let baseline = if pairwise {
            Vec::new()
        } else {
            self.model_baseline()?
        };

        let column = self.model_column();
        let mut request_l = QueryRequest::new(QueryMode::Filter, Focus::Main, left.columns.clone()).with_offsets();
        let mut request_r = QueryRequest::new(QueryMode::Filter, Focus::Alt, right.columns.clone()).with_offsets();
        if !pairwise {
            request_l = request_l.having(column, Comparison::eq_param(1));
            request_r = request_r.having(column, Comparison::eq_param(1));
        }
        let plan_l = self.assemble(&request_l)?;
        let plan_r = self.assemble(&request_r)?;
        self.prepare_plan(&plan_l)?;
        self.prepare_plan(&plan_r)?;
        let sql_l = render(&plan_l, RenderOptions::default());
        let sql_r = render(&plan_r, RenderOptions::default());

        let mut header: Vec<String> = left.header.iter().map(|h| format!("{h}1")).collect();
        header.extend(right.header.iter().map(|h| format!("{h}2")));
        if !pairwise {
            header.push("score(src-grp)".to_string());
        }
        comment_header(&mut header);
        sink.header(&header)?;

        let executor = self.executor();
        let different = left.columns != right.columns;
        let mut emitted = 0u64;
        if !pairwise {
            let mut seen: FxHashSet<(RowKey, RowKey)> = FxHashSet::default();
            for model in &baseline {
                let score = Value::Text(model.score());
                let mut rights: Vec<(Vec<Value>, RowKey)> = Vec::new();
                executor.stream(&sql_r, &[Value::Int(model.right)], |row, key| {
                    rights.push((row, key));
                    Ok(ControlFlow::Continue(()))
                })?;
                let flow = executor.stream(&sql_l, &[Value::Int(model.left)], |row_l, key_l| {
                    for (row_r, key_r) in &rights {
                        if !different && key_l == *key_r {
                            continue;
                        }
                        let id = if different || key_l <= *key_r {
                            (key_l.clone(), key_r.clone())
                        } else {
                            (key_r.clone(), key_l.clone())
                        };
                        if !seen.insert(id) {
                            continue;
                        }
                        let mut out = row_l.clone();
                        out.extend(row_r.iter().cloned());
                        out.push(score.clone());
                        emitted += 1;
                        if sink.row(&out)?.is_break() || (limit > 0 && emitted >= limit) {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    Ok(ControlFlow::Continue(()))
                })?;
                if flow.is_break() {
                    break;
                }
            }
        } else {
            let mut rights: Vec<(Vec<Value>, RowKey)> = Vec::new();
            let mut seen_r: FxHashSet<RowKey> = FxHashSet::default();
            executor.stream(&sql_r, &[], |row, key| {
                if seen_r.insert(key.clone()) {
                    rights.push((row, key));
                }
                Ok(ControlFlow::Continue(()))
            })?;
            let mut seen_l: FxHashSet<RowKey> = FxHashSet::default();
            executor.stream(&sql_l, &[], |row_l, key_l| {
                if !seen_l.insert(key_l.clone()) {
                    return Ok(ControlFlow::Continue(()));
                }
                for (row_r, key_r) in &rights {
                    if !different && key_l == *key_r {
                        continue;
                    }
                    let mut out = row_l.clone();
                    out.extend(row_r.iter().cloned());
                    emitted += 1;
                    if sink.row(&out)?.is_break() || (limit > 0 && emitted >= limit) {
                        return Ok(ControlFlow::Break(()));
                    }
                }
                Ok(ControlFlow::Continue(()))
            })?;
        }
        sink.finish()?;
        info!(rows = emitted, pairwise, baseline = baseline.len(), "model.output.completed");
        Ok(emitted)
    }
}
