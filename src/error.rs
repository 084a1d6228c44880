use std::io;

use thiserror::Error;

use crate::query::PlanError;

/// Errors surfaced by a biofilter session.
#[derive(Debug, Error)]
pub enum BiofilterError {
    /// Plan assembly failed.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// An option value matched none, or more than one, of its choices.
    #[error("ambiguous value '{value}' for option '{option}' (expected one of: {choices})")]
    AmbiguousOption {
        /// Option name as written in configuration.
        option: String,
        /// Offending value.
        value: String,
        /// Comma separated list of accepted choices.
        choices: String,
    },
    /// Metadata required to generate expressions is missing from the knowledge base.
    #[error("{what} '{name}' not found in the knowledge database")]
    KnowledgeLookup {
        /// Kind of record that was looked up.
        what: &'static str,
        /// Name that was looked up.
        name: String,
    },
    /// No liftover chains exist between the two genome builds.
    #[error("no liftover chains available from build {from} to build {to}")]
    LiftoverUnavailable {
        /// Source genome build.
        from: u32,
        /// Target genome build.
        to: u32,
    },
    /// PARIS was requested without any input feature regions.
    #[error("PARIS requires input feature regions")]
    ParisInputMissing,
    /// Storage engine failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Tab-separated input or output failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid user knowledge: {0}")]
    UserKnowledge(String),
}

impl BiofilterError {
    /// Returns a stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            BiofilterError::Plan(err) => err.code(),
            BiofilterError::AmbiguousOption { .. } => "AmbiguousOption",
            BiofilterError::KnowledgeLookup { .. } => "KnowledgeLookup",
            BiofilterError::LiftoverUnavailable { .. } => "LiftoverUnavailable",
            BiofilterError::ParisInputMissing => "ParisInputMissing",
            BiofilterError::Sqlite(_) => "Sqlite",
            BiofilterError::Io(_) => "Io",
            BiofilterError::Csv(_) => "Csv",
            BiofilterError::Config(_) => "Config",
            BiofilterError::UserKnowledge(_) => "UserKnowledge",
        }
    }

    pub(crate) fn knowledge(what: &'static str, name: impl Into<String>) -> Self {
        BiofilterError::KnowledgeLookup {
            what,
            name: name.into(),
        }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, BiofilterError>;
