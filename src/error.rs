use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a scan before (or instead of) returning a result.
///
/// Probe timeouts and transport errors never show up here: they are folded into
/// the roster as "unreachable" or as an unset field.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("unsupported address range {network}: only /24 networks can be expanded (got /{prefix})")]
    UnsupportedRange { network: String, prefix: u8 },

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("scan cancelled")]
    Cancelled,
}

/// A report that could not be rendered or written.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
