#![allow(missing_docs)]

use thiserror::Error;

/// Structured errors emitted while assembling a query plan.
///
/// Every variant is fatal to the call that produced it; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The request named neither output columns nor conditions.
    #[error("internal query with no outputs or conditions")]
    NoOutputsOrConditions,
    /// No eligible alias can supply the column.
    #[error("could not find a source table for output column '{column}'")]
    NoSourceTable { column: String },
    /// The listed aliases cannot be connected through eligible joins.
    #[error("could not find a join path for tables: {aliases}")]
    NoJoinPath { aliases: String },
    /// A requested output type is not known.
    #[error("unsupported output type '{name}'")]
    UnsupportedOutputType { name: String },
}

impl PlanError {
    pub(crate) fn no_source(column: impl ToString) -> Self {
        PlanError::NoSourceTable {
            column: column.to_string(),
        }
    }

    pub(crate) fn no_join(aliases: impl ToString) -> Self {
        PlanError::NoJoinPath {
            aliases: aliases.to_string(),
        }
    }

    /// Stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::NoOutputsOrConditions => "NoOutputsOrConditions",
            PlanError::NoSourceTable { .. } => "NoSourceTable",
            PlanError::NoJoinPath { .. } => "NoJoinPath",
            PlanError::UnsupportedOutputType { .. } => "UnsupportedOutputType",
        }
    }
}
