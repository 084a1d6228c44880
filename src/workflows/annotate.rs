use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::db::Biofilter;
use crate::error::Result;
use crate::query::{render, Comparison, Focus, QueryMode, QueryRequest, RenderOptions, RowKey, Value};

use super::{comment_header, non_empty, RowSink};

impl Biofilter {
    /// Streams the main filter's rows, each followed by its annotations from
    /// the alternate workspace.
    ///
    /// The annotation statement is re-run for every filtered row with that
    /// row's identity bound as parameters. A row without annotations is still
    /// emitted once, padded with nulls. Unless duplicate output is allowed,
    /// annotation rows whose identity only differs from an earlier one by
    /// nulled parts are suppressed.
    pub fn generate_annotation_output<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        filter_types: &[S],
        annotation_types: &[T],
        sink: &mut dyn RowSink,
    ) -> Result<u64> {
        let filter = non_empty(filter_types)?;
        let annotation = non_empty(annotation_types)?;

        let plan_f = self.assemble(
            &QueryRequest::new(QueryMode::Filter, Focus::Main, filter.columns.clone()).with_offsets(),
        )?;
        let mut request_a =
            QueryRequest::new(QueryMode::Annotate, Focus::Alt, annotation.columns.clone()).with_offsets();
        for (n, &(alias, field)) in plan_f.identity.iter().enumerate() {
            request_a = request_a.condition(alias, field, Comparison::eq_param(n + 1));
        }
        let plan_a = self.assemble(&request_a)?;
        self.prepare_plan(&plan_f)?;
        self.prepare_plan(&plan_a)?;

        let allow_dupes = self.options().allow_duplicate_output;
        let sql_f = render(
            &plan_f,
            RenderOptions {
                order_identity: allow_dupes,
                identity_nulls_last: false,
            },
        );
        let sql_a = render(
            &plan_a,
            RenderOptions {
                order_identity: true,
                identity_nulls_last: true,
            },
        );
        debug!(filter = %sql_f.sql, annotate = %sql_a.sql, "annotate.statements");

        let mut header = filter.header;
        header.extend(annotation.header);
        comment_header(&mut header);
        sink.header(&header)?;

        let empty_a = vec![Value::Null; annotation.columns.len()];
        let executor = self.executor();
        let mut seen_f: FxHashSet<RowKey> = FxHashSet::default();
        let mut last_f: Option<RowKey> = None;
        let mut primary = 0u64;
        let mut emitted = 0u64;
        executor.stream(&sql_f, &[], |row_f, key_f| {
            let fresh = if allow_dupes {
                let fresh = last_f.as_ref() != Some(&key_f);
                last_f = Some(key_f.clone());
                fresh
            } else {
                seen_f.insert(key_f.clone())
            };
            if !fresh {
                return Ok(ControlFlow::Continue(()));
            }
            primary += 1;
            let bindings: Vec<Value> = key_f.0.iter().map(Value::from).collect();
            let mut seen_a = SeenAnnotations::default();
            let mut matched = false;
            let mut stop = false;
            executor.stream(&sql_a, &bindings, |row_a, key_a| {
                if !allow_dupes && !seen_a.admit(&key_a) {
                    return Ok(ControlFlow::Continue(()));
                }
                matched = true;
                let mut out = row_f.clone();
                out.extend(row_a);
                emitted += 1;
                let flow = sink.row(&out)?;
                stop = flow.is_break();
                Ok(flow)
            })?;
            if stop {
                return Ok(ControlFlow::Break(()));
            }
            if !matched {
                let mut out = row_f;
                out.extend(empty_a.iter().cloned());
                emitted += 1;
                return sink.row(&out);
            }
            Ok(ControlFlow::Continue(()))
        })?;
        sink.finish()?;
        info!(primary, rows = emitted, "annotate.output.completed");
        Ok(emitted)
    }
}

/// Annotation identities already written for one filtered row.
#[derive(Default)]
struct SeenAnnotations(FxHashSet<RowKey>);

impl SeenAnnotations {
    /// Whether `key` is new. A key equal to an earlier one, or to an earlier
    /// one with some parts nulled, is not. Admitted keys record every
    /// reduction of themselves.
    fn admit(&mut self, key: &RowKey) -> bool {
        if self.0.contains(key) {
            return false;
        }
        self.0.extend(key.null_reductions());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[Option<i64>]) -> RowKey {
        RowKey::from_values(&parts.iter().map(|p| Value::from(*p)).collect::<Vec<_>>())
    }

    #[test]
    fn nulled_identity_parts_are_suppressed_after_a_full_row() {
        let mut seen = SeenAnnotations::default();
        assert!(seen.admit(&key(&[Some(7), Some(2)])));
        assert!(!seen.admit(&key(&[Some(7), Some(2)])));
        assert!(!seen.admit(&key(&[Some(7), None])));
        assert!(!seen.admit(&key(&[None, Some(2)])));
        assert!(!seen.admit(&key(&[None, None])));
        assert!(seen.admit(&key(&[Some(7), Some(3)])));
        assert!(seen.admit(&key(&[Some(8), None])));
    }

    #[test]
    fn a_full_row_after_its_reduction_is_still_new() {
        let mut seen = SeenAnnotations::default();
        assert!(seen.admit(&key(&[Some(7), None])));
        assert!(!seen.admit(&key(&[None, None])));
        assert!(seen.admit(&key(&[Some(7), Some(2)])));
    }
}
