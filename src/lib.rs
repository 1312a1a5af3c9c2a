//! imagefilter — export, overlay, re-import
//!
//! Takes frames leaving an SDK `export` chain, copies them into buffers of
//! an `import` chain, draws a crosshair on them and pushes them back.
//!
//! # Features
//!
//! - **Config**: JSON configuration with `IFF` and `chains` sections
//! - **Chains**: one SDK chain per configuration entry, errors logged per element
//! - **Handoff**: single-slot mailbox between the SDK callback thread and the main loop
//! - **Overlay**: in-place crosshair on packed 24-bit frames
//! - **Loopback SDK**: in-process implementation of the SDK contract
//!
//! # Example
//!
//! ```rust,no_run
//! use imagefilter::{Config, LoopbackSdk, Pipeline, PipelineSettings, ShutdownSignal};
//! use std::sync::Arc;
//!
//! fn main() -> imagefilter::Result<()> {
//!     let config = Config::load("imagefilter.json")?;
//!     let shutdown = ShutdownSignal::new();
//!
//!     let mut pipeline = Pipeline::new(
//!         Arc::new(LoopbackSdk::new()),
//!         config,
//!         PipelineSettings::default(),
//!     );
//!     pipeline.run_until(&shutdown)?;
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod pipeline;
pub mod processing;
pub mod sdk;
pub mod signal;
pub mod types;

// Re-exports for convenience
pub use chain::ChainRegistry;
pub use config::{Config, PipelineSettings, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use mailbox::FrameMailbox;
pub use pipeline::{ImportForwarder, Pipeline, PipelineState};
pub use processing::Crosshair;
pub use sdk::{Chain, ExportHandler, LogLevel, LoopbackSdk, Sdk};
pub use signal::ShutdownSignal;
pub use types::{Frame, FrameMetadata, ImportBuffer, Stats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
