//! Publishes a sanitized subset of velocity picks and portfolio performance
//! as static JSON for the website.
//!
//! Pipeline: load picks / tracked rows → keep bin-backed entries
//! ([`alignment`]) → project to public fields ([`sanitize`]) → aggregate
//! ([`stats`]) → write ([`output`]).

pub mod alignment;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod output;
pub mod processor;
pub mod sanitize;
pub mod stats;

pub use alignment::AlignmentPolicy;
pub use config::ExportConfig;
pub use error::{ExportError, ExportResult};
