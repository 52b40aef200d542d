//! Library crate for lan-sweep: LAN host discovery and reporting.
pub mod config;
pub mod error;
pub mod netdetect;
pub mod ports;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod scheduler;
pub mod types;

pub use config::{ScanConfig, ScanOptions};
pub use error::{ReportError, ScanError};
pub use scanner::Scanner;
pub use types::{DeviceCounts, DeviceRecord, ScanResult};
