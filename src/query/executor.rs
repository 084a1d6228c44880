//! Statement execution with row-identity deduplication.

use std::ops::ControlFlow;

use rusqlite::{params_from_iter, Connection};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::Result;

use super::plan::QueryPlan;
use super::profile::{profile_timer, record_profile_timer, ProfileKind};
use super::render::{render, RenderOptions, RenderedQuery};
use super::value::{RowKey, Value};

/// How repeated row identities are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Emits the first row of each run of equal identities. Statements are
    /// rendered with the identity columns in `ORDER BY` so runs are contiguous.
    ContiguousRun,
    /// Remembers every identity seen, across both statements.
    GlobalSet,
}

impl DedupPolicy {
    /// Policy matching the duplicate-output setting.
    pub fn for_duplicates(allowed: bool) -> Self {
        if allowed {
            DedupPolicy::ContiguousRun
        } else {
            DedupPolicy::GlobalSet
        }
    }

    /// Render options the policy relies on.
    pub fn render_options(self) -> RenderOptions {
        RenderOptions {
            order_identity: self == DedupPolicy::ContiguousRun,
            identity_nulls_last: false,
        }
    }
}

/// Runs rendered statements over one connection.
///
/// Statements only borrow the connection, so a callback may run another
/// statement while the outer one is still stepping.
#[derive(Clone, Copy)]
pub struct Executor<'c> {
    conn: &'c Connection,
}

impl<'c> Executor<'c> {
    /// Creates an executor over a connection.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Streams every row of a statement, split into output values and identity.
    pub fn stream<F>(&self, query: &RenderedQuery, bindings: &[Value], mut on_row: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(Vec<Value>, RowKey) -> Result<ControlFlow<()>>,
    {
        let start = profile_timer();
        let mut stmt = self.conn.prepare_cached(&query.sql)?;
        let width = query.output_len + query.identity_len;
        let mut rows = stmt.query(params_from_iter(bindings.iter()))?;
        let mut flow = ControlFlow::Continue(());
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            let mut values = (0..width)
                .map(|i| row.get_ref(i).map(Value::from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let identity = values.split_off(query.output_len);
            seen += 1;
            if on_row(values, RowKey::from_values(&identity))?.is_break() {
                flow = ControlFlow::Break(());
                break;
            }
        }
        record_profile_timer(ProfileKind::Execute, start);
        trace!(rows = seen, "query.statement.stepped");
        Ok(flow)
    }

    /// Executes a plan, and optionally a second plan whose rows follow, emitting
    /// each row identity once under the given policy. Returns the rows emitted.
    pub fn execute<F>(
        &self,
        plan: &QueryPlan,
        query2: Option<&QueryPlan>,
        bindings: &[Value],
        policy: DedupPolicy,
        mut on_row: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<Value>) -> Result<ControlFlow<()>>,
    {
        let options = policy.render_options();
        let mut emitted = 0u64;
        let mut global: FxHashSet<RowKey> = FxHashSet::default();
        for plan in std::iter::once(plan).chain(query2) {
            let rendered = render(plan, options);
            let mut last: Option<RowKey> = None;
            let flow = self.stream(&rendered, bindings, |values, key| {
                let fresh = match policy {
                    DedupPolicy::ContiguousRun => {
                        if last.as_ref() == Some(&key) {
                            false
                        } else {
                            last = Some(key);
                            true
                        }
                    }
                    DedupPolicy::GlobalSet => global.insert(key),
                };
                if !fresh {
                    return Ok(ControlFlow::Continue(()));
                }
                emitted += 1;
                on_row(values)
            })?;
            if flow.is_break() {
                break;
            }
        }
        Ok(emitted)
    }
}
