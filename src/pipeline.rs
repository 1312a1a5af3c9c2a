//! Frame pipeline
//!
//! Connects export chain → mailbox → crosshair overlay → import chain and
//! drives the chain lifecycle:
//! `Idle → Initialized → Running → Draining → Terminated`.

use crate::chain::{ChainRegistry, LOG_TAG};
use crate::config::{Config, PipelineSettings};
use crate::error::{Error, Result};
use crate::mailbox::FrameMailbox;
use crate::processing::{self, Crosshair};
use crate::sdk::{element_command, Chain, ExportHandler, LogLevel, Sdk};
use crate::signal::ShutdownSignal;
use crate::types::{Frame, FrameMetadata, ImportBuffer, Stats};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of a [`Pipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing created yet
    Idle,
    /// SDK initialized, chains built
    Initialized,
    /// Export callback registered and exporter switched on
    Running,
    /// Exporter switched off, chains still alive
    Draining,
    /// Chains released, SDK finalized
    Terminated,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame counters shared between the export callback and the main loop
#[derive(Debug, Default)]
pub struct PipelineStats {
    exported: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    overlaid: AtomicU64,
    pushed: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> Stats {
        Stats {
            frames_exported: self.exported.load(Ordering::Relaxed),
            frames_forwarded: self.forwarded.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            frames_overlaid: self.overlaid.load(Ordering::Relaxed),
            frames_pushed: self.pushed.load(Ordering::Relaxed),
        }
    }
}

/// Export callback that copies each frame into a free import buffer and
/// posts it to the mailbox
pub struct ImportForwarder {
    sdk: Arc<dyn Sdk>,
    import: Arc<dyn Chain>,
    importer: String,
    mailbox: Arc<FrameMailbox>,
    stats: Arc<PipelineStats>,
}

impl ImportForwarder {
    pub fn new(
        sdk: Arc<dyn Sdk>,
        import: Arc<dyn Chain>,
        importer: impl Into<String>,
        mailbox: Arc<FrameMailbox>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sdk,
            import,
            importer: importer.into(),
            mailbox,
            stats,
        }
    }

    fn give_back(&self, buffer: ImportBuffer) {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.import.release_buffer(&self.importer, buffer) {
            tracing::error!("Failed to release import buffer: {}", e);
        }
    }
}

impl ExportHandler for ImportForwarder {
    fn on_frame_exported(&self, data: &[u8], metadata: &FrameMetadata) {
        self.stats.exported.fetch_add(1, Ordering::Relaxed);

        let mut buffer = match self.import.get_import_buffer(&self.importer) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!("Failed to get import buffer: {}", e);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if buffer.capacity() == 0 {
            tracing::trace!("No free import buffer, dropping frame");
            self.give_back(buffer);
            return;
        }

        if buffer.capacity() < data.len() {
            let err = Error::BufferTooSmall {
                capacity: buffer.capacity(),
                required: data.len(),
            };
            self.sdk.log(LogLevel::Error, LOG_TAG, &err.to_string());
            self.give_back(buffer);
            return;
        }

        buffer[..data.len()].copy_from_slice(data);
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);

        if let Some(stale) = self.mailbox.put(Frame::new(buffer, *metadata)) {
            tracing::trace!("Main loop behind, replacing pending frame");
            self.give_back(stale.buffer);
        }
    }
}

/// Export → overlay → import pipeline
pub struct Pipeline {
    sdk: Arc<dyn Sdk>,
    config: Config,
    settings: PipelineSettings,
    crosshair: Crosshair,
    state: PipelineState,
    chains: Option<ChainRegistry>,
    mailbox: Arc<FrameMailbox>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Create a pipeline; nothing is touched until [`Pipeline::initialize`]
    pub fn new(sdk: Arc<dyn Sdk>, config: Config, settings: PipelineSettings) -> Self {
        Self {
            sdk,
            config,
            settings,
            crosshair: Crosshair::default(),
            state: PipelineState::Idle,
            chains: None,
            mailbox: Arc::new(FrameMailbox::new()),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn with_crosshair(mut self, crosshair: Crosshair) -> Self {
        self.crosshair = crosshair;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Current statistics
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    fn expect_state(&self, expected: PipelineState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        Ok(())
    }

    fn chain(&self, id: &str) -> Result<Arc<dyn Chain>> {
        self.chains
            .as_ref()
            .ok_or_else(|| Error::Pipeline("chains not created".into()))?
            .get(id)
    }

    /// Initialize the SDK and build every configured chain
    pub fn initialize(&mut self) -> Result<()> {
        self.expect_state(PipelineState::Idle)?;

        self.sdk.initialize(&self.config.iff().to_string())?;

        let registry = ChainRegistry::build(&self.sdk, self.config.chains()).and_then(|registry| {
            for id in [&self.settings.export_chain, &self.settings.import_chain] {
                registry.get(id)?;
            }
            Ok(registry)
        });

        match registry {
            Ok(registry) => {
                tracing::info!("Pipeline initialized with chains {:?}", registry.ids());
                self.chains = Some(registry);
                self.state = PipelineState::Initialized;
                Ok(())
            }
            Err(e) => {
                self.sdk.finalize();
                self.state = PipelineState::Terminated;
                Err(e)
            }
        }
    }

    /// Register the export callback and switch the exporter on
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(PipelineState::Initialized)?;

        let export = self.chain(&self.settings.export_chain)?;
        let import = self.chain(&self.settings.import_chain)?;

        let forwarder = ImportForwarder::new(
            self.sdk.clone(),
            import,
            self.settings.importer.clone(),
            self.mailbox.clone(),
            self.stats.clone(),
        );
        export.set_export_callback(&self.settings.exporter, Arc::new(forwarder))?;
        export.execute(&element_command(&self.settings.exporter, "on"))?;

        self.state = PipelineState::Running;
        self.sdk
            .log(LogLevel::Info, LOG_TAG, "Press Ctrl-C to terminate the program");
        Ok(())
    }

    /// Process frames until `shutdown` is triggered.
    ///
    /// Checks the flag at least once per wait timeout, even when no frames
    /// arrive.
    pub fn run(&self, shutdown: &ShutdownSignal) -> Result<()> {
        self.expect_state(PipelineState::Running)?;
        let import = self.chain(&self.settings.import_chain)?;

        while !shutdown.is_triggered() {
            if let Some(frame) = self.mailbox.take_timeout(self.settings.wait_timeout) {
                self.process(import.as_ref(), frame);
            }
        }

        tracing::debug!("Frame loop finished");
        Ok(())
    }

    /// Draw the crosshair and push the frame into the import chain
    fn process(&self, import: &dyn Chain, mut frame: Frame) {
        match processing::process_frame(&mut frame, &self.crosshair) {
            Ok(()) => {
                self.stats.overlaid.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Frame {} left unmodified: {}", frame.metadata, e)
            }
            Err(e) => tracing::error!("Frame {} left unmodified: {}", frame.metadata, e),
        }

        // the chain owns the buffer from here on, even if the push fails
        let Frame { buffer, metadata } = frame;
        match import.push_import_buffer(&self.settings.importer, buffer, &metadata) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to push import buffer: {}", e);
            }
        }
    }

    /// Switch the exporter off and return any undelivered buffer
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(PipelineState::Running)?;
        self.state = PipelineState::Draining;

        let export = self.chain(&self.settings.export_chain)?;
        export.execute(&element_command(&self.settings.exporter, "off"))?;

        if let Some(frame) = self.mailbox.try_take() {
            let import = self.chain(&self.settings.import_chain)?;
            import.release_buffer(&self.settings.importer, frame.buffer)?;
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!("Pipeline stopped");
        Ok(())
    }

    /// Release every chain and finalize the SDK
    pub fn shutdown(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Initialized | PipelineState::Draining => {}
            _ => self.expect_state(PipelineState::Draining)?,
        }

        self.chains = None;
        self.sdk.finalize();
        self.state = PipelineState::Terminated;
        tracing::debug!("Pipeline terminated");
        Ok(())
    }

    /// Run the whole lifecycle until `shutdown` is triggered.
    ///
    /// The exporter is switched off and the SDK finalized even when the
    /// loop fails.
    pub fn run_until(&mut self, shutdown: &ShutdownSignal) -> Result<()> {
        self.initialize()?;

        let result = self.start().and_then(|_| self.run(shutdown));

        let stopped = if self.state == PipelineState::Running {
            self.stop()
        } else {
            Ok(())
        };
        let finished = self.shutdown();

        result.and(stopped).and(finished)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.state == PipelineState::Running {
            if let Err(e) = self.stop() {
                tracing::warn!("Failed to stop pipeline: {}", e);
            }
        }
        if matches!(
            self.state,
            PipelineState::Initialized | PipelineState::Draining
        ) {
            if let Err(e) = self.shutdown() {
                tracing::warn!("Failed to shut down pipeline: {}", e);
            }
        }
    }
}
