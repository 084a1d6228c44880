//! Consumer workflows built on the query engine.
//!
//! Each workflow expands output types into catalog columns, assembles its
//! plans against the session's filters and streams rows into a [`RowSink`],
//! header first.

/// Annotation of filtered rows with the alternate workspace.
pub mod annotate;

/// Filtered output.
pub mod filter;

/// Gene-gene model generation.
pub mod model;

/// Output types and row sinks.
pub mod output;

pub use model::ModelPair;
pub use output::{
    comment_header, expand_output_types, CollectSink, JsonLinesSink, OutputColumns, RowSink, TsvSink,
};

use crate::error::Result;
use crate::query::PlanError;

pub(crate) fn non_empty<S: AsRef<str>>(types: &[S]) -> Result<OutputColumns> {
    let out = expand_output_types(types)?;
    if out.is_empty() {
        return Err(PlanError::NoOutputsOrConditions.into());
    }
    Ok(out)
}
