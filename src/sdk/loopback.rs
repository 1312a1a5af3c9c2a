//! In-process SDK backend
//!
//! Implements the chain contract without the native library:
//! - `exporter` elements generate a moving test pattern at a fixed rate
//! - `importer` elements own a fixed pool of buffers and accept pushed frames
//!
//! Chain configuration:
//!
//! ```json
//! {"id": "export", "elements": [
//!     {"id": "exporter", "type": "exporter", "width": 640, "height": 480, "fps": 30}
//! ]}
//! {"id": "import", "elements": [
//!     {"id": "importer", "type": "importer", "buffer_size": 921600, "buffer_count": 4}
//! ]}
//! ```

use super::{Chain, ErrorHandler, ExportHandler, LogLevel, Sdk};
use crate::error::{Error, Result};
use crate::types::{FrameMetadata, ImportBuffer, BYTES_PER_PIXEL};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Error code reported when a pushed frame does not fit its buffer
pub const ERROR_FRAME_OVERFLOW: i32 = -75;

/// Error code reported when a buffer from another pool is released
pub const ERROR_FOREIGN_BUFFER: i32 = -22;

/// A frame received by a loopback importer
#[derive(Debug, Clone)]
pub struct ImportedFrame {
    pub chain: String,
    pub element: String,
    pub metadata: FrameMetadata,
    pub data: Vec<u8>,
}

/// Loopback SDK
pub struct LoopbackSdk {
    initialized: AtomicBool,
    sink: Option<Sender<ImportedFrame>>,
}

impl LoopbackSdk {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            sink: None,
        }
    }

    /// Forward a copy of every imported frame to `sink`
    pub fn with_sink(mut self, sink: Sender<ImportedFrame>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl Sdk for LoopbackSdk {
    fn initialize(&self, config: &str) -> Result<()> {
        let _: Value = serde_json::from_str(config)
            .map_err(|e| Error::Sdk(format!("invalid SDK configuration: {}", e)))?;
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(Error::Sdk("SDK already initialized".into()));
        }
        tracing::info!("Loopback SDK initialized");
        Ok(())
    }

    fn finalize(&self) {
        if self.initialized.swap(false, Ordering::SeqCst) {
            tracing::info!("Loopback SDK finalized");
        }
    }

    fn log(&self, level: LogLevel, tag: &str, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(tag, "{}", message),
            LogLevel::Debug => tracing::debug!(tag, "{}", message),
            LogLevel::Info => tracing::info!(tag, "{}", message),
            LogLevel::Warning => tracing::warn!(tag, "{}", message),
            LogLevel::Error | LogLevel::Critical => tracing::error!(tag, "{}", message),
        }
    }

    fn create_chain(&self, config: &str, on_error: ErrorHandler) -> Result<Arc<dyn Chain>> {
        if !self.is_initialized() {
            return Err(Error::Sdk("SDK not initialized".into()));
        }
        let spec: ChainSpec = serde_json::from_str(config)
            .map_err(|e| Error::Sdk(format!("invalid chain configuration: {}", e)))?;
        let chain = LoopbackChain::new(spec, on_error, self.sink.clone())?;
        Ok(Arc::new(chain))
    }
}

#[derive(Debug, Deserialize)]
struct ChainSpec {
    id: String,
    #[serde(default)]
    elements: Vec<ElementSpec>,
}

#[derive(Debug, Deserialize)]
struct ElementSpec {
    id: String,
    #[serde(flatten)]
    kind: ElementKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ElementKind {
    Exporter(GeneratorSpec),
    Importer(PoolSpec),
    /// Elements this backend does not model are accepted and ignored
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct GeneratorSpec {
    width: u32,
    height: u32,
    #[serde(default)]
    padding: u32,
    #[serde(default = "default_fps")]
    fps: u32,
}

fn default_fps() -> u32 {
    30
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PoolSpec {
    buffer_size: usize,
    #[serde(default = "default_buffer_count")]
    buffer_count: usize,
}

fn default_buffer_count() -> usize {
    4
}

/// Generator thread handle
struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Exporter {
    metadata: FrameMetadata,
    interval: Duration,
    handler: Mutex<Option<Arc<dyn ExportHandler>>>,
    worker: Mutex<Option<Worker>>,
}

impl Exporter {
    fn new(spec: GeneratorSpec) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 || spec.fps == 0 {
            return Err(Error::Sdk(format!(
                "exporter needs non-zero width, height and fps (got {}x{} @ {})",
                spec.width, spec.height, spec.fps
            )));
        }
        Ok(Self {
            metadata: FrameMetadata::new(spec.width, spec.height, spec.padding),
            interval: Duration::from_secs(1) / spec.fps,
            handler: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    fn start(&self, element_id: &str) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        let handler = self.handler.lock().clone().ok_or_else(|| {
            Error::Sdk(format!("no export callback set for `{}`", element_id))
        })?;

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let metadata = self.metadata;
        let interval = self.interval;
        let name = format!("loopback-{}", element_id);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || run_generator(metadata, interval, handler, stop_rx))?;

        tracing::debug!("Exporter `{}` started ({} every {:?})", element_id, metadata, interval);
        *worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    fn stop(&self, element_id: &str) -> Result<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        drop(worker.stop);
        worker
            .handle
            .join()
            .map_err(|_| Error::Internal(format!("exporter `{}` thread panicked", element_id)))?;
        tracing::debug!("Exporter `{}` stopped", element_id);
        Ok(())
    }
}

fn run_generator(
    metadata: FrameMetadata,
    interval: Duration,
    handler: Arc<dyn ExportHandler>,
    stop: Receiver<()>,
) {
    let ticker = crossbeam_channel::tick(interval);
    let mut data = vec![0u8; metadata.frame_size()];
    let mut index = 0u64;

    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                fill_test_pattern(&mut data, &metadata, index);
                handler.on_frame_exported(&data, &metadata);
                index += 1;
            }
        }
    }
}

/// Diagonal gradient that shifts by one pixel per frame. Row padding is not written.
pub fn fill_test_pattern(data: &mut [u8], metadata: &FrameMetadata, index: u64) {
    let shift = index as usize;
    let row_bytes = metadata.width as usize * BYTES_PER_PIXEL;
    for (y, row) in data
        .chunks_mut(metadata.stride())
        .take(metadata.height as usize)
        .enumerate()
    {
        for (x, px) in row[..row_bytes].chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            px[0] = (x + shift) as u8;
            px[1] = y as u8;
            px[2] = ((x + y) / 2) as u8;
        }
    }
}

struct Importer {
    spec: PoolSpec,
    free: Mutex<Vec<ImportBuffer>>,
}

impl Importer {
    fn new(spec: PoolSpec) -> Result<Self> {
        if spec.buffer_size == 0 || spec.buffer_count == 0 {
            return Err(Error::Sdk(
                "importer needs non-zero buffer_size and buffer_count".into(),
            ));
        }
        let free = (0..spec.buffer_count)
            .map(|slot| ImportBuffer::new(slot, vec![0u8; spec.buffer_size].into_boxed_slice()))
            .collect();
        Ok(Self {
            spec,
            free: Mutex::new(free),
        })
    }

    fn lease(&self) -> ImportBuffer {
        self.free.lock().pop().unwrap_or_else(ImportBuffer::empty)
    }

    fn owns(&self, buffer: &ImportBuffer) -> bool {
        buffer.slot() < self.spec.buffer_count && buffer.capacity() == self.spec.buffer_size
    }

    /// Put a buffer back; false if it does not belong to this pool
    fn give_back(&self, buffer: ImportBuffer) -> bool {
        if buffer.capacity() == 0 {
            return true;
        }
        if !self.owns(&buffer) {
            return false;
        }
        self.free.lock().push(buffer);
        true
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.free.lock().len()
    }
}

/// Loopback chain
pub struct LoopbackChain {
    id: String,
    on_error: ErrorHandler,
    exporters: HashMap<String, Exporter>,
    importers: HashMap<String, Importer>,
    sink: Option<Sender<ImportedFrame>>,
}

impl LoopbackChain {
    fn new(spec: ChainSpec, on_error: ErrorHandler, sink: Option<Sender<ImportedFrame>>) -> Result<Self> {
        let mut exporters = HashMap::new();
        let mut importers = HashMap::new();

        for element in spec.elements {
            if exporters.contains_key(&element.id) || importers.contains_key(&element.id) {
                return Err(Error::Sdk(format!(
                    "duplicate element `{}` in chain `{}`",
                    element.id, spec.id
                )));
            }
            match element.kind {
                ElementKind::Exporter(generator) => {
                    exporters.insert(element.id, Exporter::new(generator)?);
                }
                ElementKind::Importer(pool) => {
                    importers.insert(element.id, Importer::new(pool)?);
                }
                ElementKind::Other => {
                    tracing::debug!("Chain `{}`: ignoring element `{}`", spec.id, element.id);
                }
            }
        }

        tracing::info!(
            "Chain `{}` created ({} exporters, {} importers)",
            spec.id,
            exporters.len(),
            importers.len()
        );

        Ok(Self {
            id: spec.id,
            on_error,
            exporters,
            importers,
            sink,
        })
    }

    fn exporter(&self, element_id: &str) -> Result<&Exporter> {
        self.exporters
            .get(element_id)
            .ok_or_else(|| Error::UnknownElement(format!("{}/{}", self.id, element_id)))
    }

    fn importer(&self, element_id: &str) -> Result<&Importer> {
        self.importers
            .get(element_id)
            .ok_or_else(|| Error::UnknownElement(format!("{}/{}", self.id, element_id)))
    }

    /// Hand a buffer addressed to an unknown element back to the pool it
    /// was leased from, then report the unknown element.
    fn reclaim(&self, element_id: &str, buffer: ImportBuffer) -> Error {
        if buffer.capacity() > 0 {
            match self.importers.values().find(|importer| importer.owns(&buffer)) {
                Some(importer) => {
                    importer.give_back(buffer);
                }
                None => tracing::warn!(
                    "Chain `{}`: buffer for unknown element `{}` matches no pool",
                    self.id,
                    element_id
                ),
            }
        }
        Error::UnknownElement(format!("{}/{}", self.id, element_id))
    }
}

impl Chain for LoopbackChain {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, command: &str) -> Result<String> {
        let doc: serde_json::Map<String, Value> = serde_json::from_str(command)
            .map_err(|e| Error::InvalidCommand(format!("{}: {}", command, e)))?;

        let mut response = serde_json::Map::new();
        for (element_id, body) in doc {
            let exporter = self.exporter(&element_id)?;
            let state = match body.get("command").and_then(Value::as_str) {
                Some("on") => {
                    exporter.start(&element_id)?;
                    "on"
                }
                Some("off") => {
                    exporter.stop(&element_id)?;
                    "off"
                }
                _ => {
                    return Err(Error::InvalidCommand(format!(
                        "unsupported command for `{}`: {}",
                        element_id, body
                    )))
                }
            };
            response.insert(element_id, serde_json::json!({ "state": state }));
        }
        Ok(Value::Object(response).to_string())
    }

    fn set_export_callback(&self, element_id: &str, handler: Arc<dyn ExportHandler>) -> Result<()> {
        *self.exporter(element_id)?.handler.lock() = Some(handler);
        Ok(())
    }

    fn get_import_buffer(&self, element_id: &str) -> Result<ImportBuffer> {
        Ok(self.importer(element_id)?.lease())
    }

    fn release_buffer(&self, element_id: &str, buffer: ImportBuffer) -> Result<()> {
        let Some(importer) = self.importers.get(element_id) else {
            return Err(self.reclaim(element_id, buffer));
        };
        if !importer.give_back(buffer) {
            (self.on_error)(element_id, ERROR_FOREIGN_BUFFER);
            return Err(Error::Sdk(format!("buffer does not belong to `{}`", element_id)));
        }
        Ok(())
    }

    fn push_import_buffer(
        &self,
        element_id: &str,
        buffer: ImportBuffer,
        metadata: &FrameMetadata,
    ) -> Result<()> {
        let Some(importer) = self.importers.get(element_id) else {
            return Err(self.reclaim(element_id, buffer));
        };

        match metadata
            .checked_frame_size()
            .filter(|&size| size <= buffer.capacity())
        {
            None => (self.on_error)(element_id, ERROR_FRAME_OVERFLOW),
            Some(size) => {
                if let Some(sink) = &self.sink {
                    let frame = ImportedFrame {
                        chain: self.id.clone(),
                        element: element_id.to_string(),
                        metadata: *metadata,
                        data: buffer[..size].to_vec(),
                    };
                    if sink.try_send(frame).is_err() {
                        tracing::trace!("Import sink full, frame not forwarded");
                    }
                }
            }
        }

        if !importer.give_back(buffer) {
            (self.on_error)(element_id, ERROR_FOREIGN_BUFFER);
        }
        Ok(())
    }
}

impl Drop for LoopbackChain {
    fn drop(&mut self) {
        for (element_id, exporter) in &self.exporters {
            if let Err(e) = exporter.stop(element_id) {
                tracing::warn!("Chain `{}`: {}", self.id, e);
            }
        }
        tracing::debug!("Chain `{}` released", self.id);
    }
}
