//! Query construction and execution engine.
//!
//! Requests name output columns, conditions and a mode; the planner turns them
//! into a structured [`QueryPlan`] over the alias catalog, the renderer emits
//! statement text and the executor streams deduplicated rows.

/// Structured planning errors.
pub mod errors;

/// Executes rendered plans and applies the deduplication policies.
///
/// Rows are pushed to a callback that may stop the stream early.
pub mod executor;

/// Per-table filter counters.
pub mod filters;

/// Alias eligibility and adjacency for one request.
pub mod graph;

/// Requests, plans and explain output.
pub mod plan;

/// Plan assembly.
///
/// Anchors the plan on populated filters, connects anchors through the join
/// graph and resolves every column to its preferred reachable source.
pub mod planner;

/// Performance profiling for plan handling.
///
/// Collects timing and count statistics when `BIOFILTER_PROFILE` is set.
pub mod profile;

/// Statement text rendering.
pub mod render;

/// Runtime values and composite row keys.
pub mod value;

pub use errors::PlanError;
pub use executor::{DedupPolicy, Executor};
pub use filters::FilterState;
pub use graph::JoinGraph;
pub use plan::{
    CompareOp, Comparison, Focus, Operand, PlanExplain, QueryMode, QueryPlan, QueryRequest,
    RowCondition,
};
pub use planner::Planner;
pub use render::{render, RenderOptions, RenderedQuery};
pub use value::{KeyPart, RowKey, Value};
