//! Output generation for analysis reports.
//!
//! # Submodules
//!
//! - [`report`]: Renders an [`AnalysisReport`](crate::models::AnalysisReport) as a plain-text document
//! - [`file`]: Persists the most recent rendered report to disk

pub mod file;
pub mod report;
