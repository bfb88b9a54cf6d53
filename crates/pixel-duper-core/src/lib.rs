pub mod cache;
pub mod cluster;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod file_id;
pub mod hasher;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod signature;
pub mod telemetry;

pub use cluster::{recluster, DuplicateGroup, DuplicateGroups};
pub use config::AppConfig;
pub use decode::{ImageDecoder, PixelBuffer, StandardDecoder};
pub use engine::{ScanEngine, ScanResult};
pub use error::Error;
pub use file_id::FileId;
pub use pipeline::Phase;
pub use progress::{ProgressReporter, SilentReporter};
pub use signature::Signature;
pub use telemetry::{PhaseStats, TelemetrySnapshot};
