use std::path::{Path, PathBuf};
use std::time::Duration;

use subsweep_core::ChannelRecord;
use thiserror::Error;

use crate::csv::write_records;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::readiness::ReadinessError;
use crate::TransportError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No subscriptions found")]
    NoSubscriptions,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Unreachable(#[from] ReadinessError),
    /// The executor ran the export and reported this error.
    #[error("{0}")]
    Remote(String),
    #[error("export did not finish within {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub count: usize,
    pub path: PathBuf,
}

/// `subscriptions_<date>.csv`, with `date` as `YYYY-MM-DD`.
pub fn export_filename(date: &str) -> String {
    format!("subscriptions_{date}.csv")
}

/// Writes the table into `dir`, replacing an export from the same day.
pub fn write_export(
    dir: &Path,
    records: &[ChannelRecord],
    date: &str,
) -> Result<ExportSummary, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoSubscriptions);
    }
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let path = writer.write(&export_filename(date), &write_records(records))?;
    sweep_logging::sweep_info!("Exported {} channels to {}", records.len(), path.display());
    Ok(ExportSummary {
        count: records.len(),
        path,
    })
}
