//! Error taxonomy for the screening pipeline
//!
//! Only `OutOfOrderInput`, I/O, CSV framing and configuration errors abort a
//! run. `MalformedRecord` is produced by the record source and recovered
//! locally (counted, skipped). Undefined ratios and insufficient peers are not
//! errors at all; they show up as counters in [`crate::summary::RunSummary`].

use crate::record::PeerGroupKey;
use thiserror::Error;

/// Errors raised while screening a claims stream
#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Out-of-order input: peer group {key} at row {position} sorts before the group it follows (input must be sorted ascending by HCPCS code, then claim month)")]
    OutOfOrderInput { key: PeerGroupKey, position: u64 },

    #[error("Malformed record at row {position}: {reason}")]
    MalformedRecord { position: u64, reason: String },

    #[error("Required column '{0}' not found in input header")]
    MissingColumn(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Classification worker panicked")]
    WorkerPanicked,
}

impl ScreenError {
    /// Whether the pipeline may skip the offending row and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScreenError::MalformedRecord { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScreenError>;
