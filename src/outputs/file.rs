//! Persistence of the most recent rendered report.

use crate::utils::ensure_parent_dir;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write `text` to `path`, creating parent directories and replacing any
/// previous report.
#[instrument(level = "info", skip(text), fields(path = %path.display()))]
pub async fn write_report(path: &Path, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    ensure_parent_dir(path).await?;
    fs::write(path, text).await?;
    info!(bytes = text.len(), "Wrote report");
    Ok(())
}
