//! Biofilter: filtering, annotation and modeling of genomic data against a
//! LOKI-layout knowledge base.
//!
//! A [`Biofilter`] session attaches the workspace and knowledge schemas to one
//! SQLite connection. Inputs load into filter tables; the query engine plans
//! statements over whatever filters are populated, and the workflows stream
//! their rows into a [`RowSink`](workflows::RowSink).

pub mod catalog;
pub mod config;
pub mod db;
/// Session error type.
pub mod error;
pub mod knowledge;
/// Log subscriber setup.
pub mod logging;
pub mod paris;
pub mod query;
pub mod workflows;

pub use config::Options;
pub use db::{Biofilter, OpenOptions};
pub use error::{BiofilterError, Result};
pub use paris::{ParisInputs, ParisReport};
pub use query::profile::{profile_snapshot, QueryProfileSnapshot};
