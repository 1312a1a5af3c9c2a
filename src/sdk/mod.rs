//! SDK capability surface
//!
//! Everything the application needs from the image-processing SDK:
//! - library lifetime (`initialize` / `finalize`) and logging
//! - chain construction with an element error callback
//! - per-chain commands, export callbacks and import buffer exchange
//!
//! The [`loopback`] backend implements the contract in-process.

pub mod loopback;

pub use loopback::LoopbackSdk;

use crate::error::Result;
use crate::types::{FrameMetadata, ImportBuffer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Log severity understood by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// Callback invoked by a chain when one of its elements fails
pub type ErrorHandler = Arc<dyn Fn(&str, i32) + Send + Sync>;

/// Receiver of frames leaving an export element.
///
/// Called on an SDK-owned thread. The data slice is only valid for the
/// duration of the call.
pub trait ExportHandler: Send + Sync {
    fn on_frame_exported(&self, data: &[u8], metadata: &FrameMetadata);
}

impl<F> ExportHandler for F
where
    F: Fn(&[u8], &FrameMetadata) + Send + Sync,
{
    fn on_frame_exported(&self, data: &[u8], metadata: &FrameMetadata) {
        self(data, metadata)
    }
}

/// A configured processing chain
pub trait Chain: Send + Sync {
    /// Chain id from its configuration
    fn id(&self) -> &str;

    /// Execute a JSON command, returning the JSON response
    fn execute(&self, command: &str) -> Result<String>;

    /// Register the receiver of frames leaving `element_id`
    fn set_export_callback(&self, element_id: &str, handler: Arc<dyn ExportHandler>) -> Result<()>;

    /// Borrow a free buffer from the importer's pool (zero capacity if none is free)
    fn get_import_buffer(&self, element_id: &str) -> Result<ImportBuffer>;

    /// Return an unused buffer to the importer's pool.
    ///
    /// The chain takes the buffer even when this fails; the caller cannot
    /// retry with it.
    fn release_buffer(&self, element_id: &str, buffer: ImportBuffer) -> Result<()>;

    /// Hand a filled buffer to the importer.
    ///
    /// As with [`release_buffer`](Chain::release_buffer), the buffer belongs
    /// to the chain afterwards, whether or not the push succeeded.
    fn push_import_buffer(
        &self,
        element_id: &str,
        buffer: ImportBuffer,
        metadata: &FrameMetadata,
    ) -> Result<()>;
}

/// SDK entry points
pub trait Sdk: Send + Sync {
    /// Initialize the library with the serialized `IFF` section
    fn initialize(&self, config: &str) -> Result<()>;

    /// Release library resources; chains must already be dropped
    fn finalize(&self);

    /// Write a message to the SDK log
    fn log(&self, level: LogLevel, tag: &str, message: &str);

    /// Build a chain from its serialized configuration
    fn create_chain(&self, config: &str, on_error: ErrorHandler) -> Result<Arc<dyn Chain>>;
}

/// Build an element command document, e.g. `{"exporter": {"command": "on"}}`
pub fn element_command(element_id: &str, command: &str) -> String {
    serde_json::json!({ element_id: { "command": command } }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_command() {
        let cmd: serde_json::Value =
            serde_json::from_str(&element_command("exporter", "on")).unwrap();
        assert_eq!(cmd, serde_json::json!({"exporter": {"command": "on"}}));
    }

    #[test]
    fn test_closure_export_handler() {
        let seen = parking_lot::Mutex::new(Vec::new());
        let handler = |data: &[u8], meta: &FrameMetadata| {
            seen.lock().push((data.len(), meta.width));
        };
        handler.on_frame_exported(&[1, 2, 3], &FrameMetadata::new(1, 1, 0));
        assert_eq!(*seen.lock(), vec![(3, 1)]);
    }

    #[test]
    fn test_log_level_order() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert_eq!(
            serde_json::from_str::<LogLevel>("\"warning\"").unwrap(),
            LogLevel::Warning
        );
    }
}
