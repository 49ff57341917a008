//! # Threat Check Library
//!
//! Checks lists of URLs against Google Web Risk with a bounded worker pool,
//! persists one verdict per URL and summarizes the verdict distribution.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threat_check_lib::{ThreatCategory, VerificationPool, WebRiskClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(WebRiskClient::new("my-api-key")?);
//!     let pool = VerificationPool::new(source, ThreatCategory::ALL.to_vec(), 5)?;
//!
//!     let results = pool.verify_all(["https://example.com"]).await?;
//!     for (url, verdict) in results.iter() {
//!         println!("{} - {}", url, verdict);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded Concurrency**: a fixed number of lookups in flight, never unlimited
//! - **No Lost Work**: a claimed URL that is abandoned goes back to the queue
//! - **Fault Containment**: recognized remote faults become `ERROR` verdicts
//! - **CSV In, CSV Out**: `Link` column input, `URL,Threat Type` results
//! - **Chart**: SVG pie chart of the verdict distribution

// Re-export main public API types and functions
pub use checker::UrlChecker;
pub use concurrent::VerificationPool;
pub use config::{
    load_env_config, ConfigManager, DefaultsConfig, EnvConfig, FileConfig, PathsConfig,
    RunConfig, SourceConfig,
};
pub use error::ThreatCheckError;
pub use protocols::{SourceError, VerdictSource, WebRiskClient};
pub use report::{ChartReport, RenderOutcome};
pub use sink::CsvResultSink;
pub use supplier::CsvUrlSupplier;
pub use types::{Distribution, PoolConfig, ResultSet, Share, ThreatCategory, Verdict};

// Public modules
pub mod config;
pub mod protocols;

// Internal modules - their public items are re-exported above
mod checker;
mod concurrent;
mod error;
mod report;
mod sink;
mod supplier;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ThreatCheckError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
