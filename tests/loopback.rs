//! End-to-end runs against the loopback SDK

use imagefilter::sdk::loopback::{fill_test_pattern, ImportedFrame, ERROR_FRAME_OVERFLOW};
use imagefilter::sdk::ErrorHandler;
use imagefilter::{
    Chain, ChainRegistry, Config, Crosshair, FrameMetadata, LogLevel, LoopbackSdk, Pipeline,
    PipelineSettings, Result, Sdk, ShutdownSignal, Stats,
};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn config(width: u32, height: u32, buffer_size: usize) -> Config {
    Config::from_value(serde_json::json!({
        "IFF": {"logging": {"level": "info"}},
        "chains": [
            {"id": "export", "elements": [
                {"id": "exporter", "type": "exporter", "width": width, "height": height, "fps": 200}
            ]},
            {"id": "import", "elements": [
                {"id": "importer", "type": "importer", "buffer_size": buffer_size, "buffer_count": 3}
            ]}
        ]
    }))
    .unwrap()
}

/// Run the pipeline on a worker thread until `wanted` frames reach the sink
/// or the deadline passes
fn run(config: Config, wanted: usize) -> (Vec<ImportedFrame>, Stats) {
    let (tx, rx) = crossbeam_channel::bounded(64);
    let sdk = Arc::new(LoopbackSdk::new().with_sink(tx));
    let settings = PipelineSettings::default().with_wait_timeout(Duration::from_millis(50));
    let mut pipeline = Pipeline::new(sdk, config, settings);

    let shutdown = ShutdownSignal::new();
    let loop_signal = shutdown.clone();
    let handle = std::thread::spawn(move || {
        pipeline.run_until(&loop_signal).map(|_| pipeline.stats())
    });

    let frames = collect(&rx, wanted, Duration::from_secs(5));
    shutdown.trigger();
    let stats = handle.join().unwrap().unwrap();
    (frames, stats)
}

fn collect(rx: &Receiver<ImportedFrame>, wanted: usize, timeout: Duration) -> Vec<ImportedFrame> {
    let mut frames = Vec::new();
    let deadline = std::time::Instant::now() + timeout;
    while frames.len() < wanted {
        let left = deadline.saturating_duration_since(std::time::Instant::now());
        match rx.recv_timeout(left) {
            Ok(frame) => frames.push(frame),
            Err(_) => break,
        }
    }
    frames
}

#[test]
fn frames_come_back_with_crosshair() {
    let metadata = FrameMetadata::new(320, 240, 0);
    let (frames, stats) = run(config(320, 240, metadata.frame_size()), 3);

    assert_eq!(frames.len(), 3);
    let crosshair = Crosshair::default();
    for frame in &frames {
        assert_eq!(frame.chain, "import");
        assert_eq!(frame.element, "importer");
        assert_eq!(frame.metadata, metadata);

        // pixel (0, 0) carries the frame index
        let mut expected = vec![0u8; metadata.frame_size()];
        fill_test_pattern(&mut expected, &metadata, frame.data[0] as u64);

        for y in 0..metadata.height as usize {
            for x in 0..metadata.width as usize {
                let o = metadata.pixel_offset(x, y);
                let px = &frame.data[o..o + 3];
                if crosshair.covers(&metadata, x, y) {
                    assert_eq!(px, &[0, 0, 255]);
                } else {
                    assert_eq!(px, &expected[o..o + 3]);
                }
            }
        }
    }

    assert!(stats.frames_exported >= 3);
    assert!(stats.frames_pushed >= 3);
    assert_eq!(stats.frames_pushed, stats.frames_overlaid);
}

#[test]
fn undersized_import_pool_drops_every_frame() {
    let metadata = FrameMetadata::new(320, 240, 0);
    let (frames, stats) = run(config(320, 240, metadata.frame_size() / 2), 1);

    assert!(frames.is_empty());
    assert!(stats.frames_exported > 0);
    assert_eq!(stats.frames_forwarded, 0);
    assert_eq!(stats.frames_pushed, 0);
    assert!(stats.frames_dropped >= stats.frames_exported);
}

#[test]
fn small_frames_pass_through_unmodified() {
    let metadata = FrameMetadata::new(64, 48, 0);
    let (frames, stats) = run(config(64, 48, metadata.frame_size()), 2);

    assert_eq!(frames.len(), 2);
    for frame in &frames {
        let mut expected = vec![0u8; metadata.frame_size()];
        fill_test_pattern(&mut expected, &metadata, frame.data[0] as u64);
        assert_eq!(frame.data, expected);
    }
    assert_eq!(stats.frames_overlaid, 0);
}

#[test]
fn config_without_import_chain_fails_cleanly() {
    let config = Config::from_value(serde_json::json!({
        "IFF": {},
        "chains": [{"id": "export", "elements": []}]
    }))
    .unwrap();
    let sdk = Arc::new(LoopbackSdk::new());
    let mut pipeline = Pipeline::new(sdk.clone(), config, PipelineSettings::default());

    assert!(pipeline.run_until(&ShutdownSignal::new()).is_err());
    assert!(!sdk.is_initialized());
}

/// Loopback SDK that also keeps every message written to its log
#[derive(Default)]
struct LoggingLoopback {
    inner: LoopbackSdk,
    logs: Mutex<Vec<(LogLevel, String)>>,
}

impl Sdk for LoggingLoopback {
    fn initialize(&self, config: &str) -> Result<()> {
        self.inner.initialize(config)
    }

    fn finalize(&self) {
        self.inner.finalize()
    }

    fn log(&self, level: LogLevel, tag: &str, message: &str) {
        self.logs.lock().push((level, message.to_string()));
        self.inner.log(level, tag, message)
    }

    fn create_chain(&self, config: &str, on_error: ErrorHandler) -> Result<Arc<dyn Chain>> {
        self.inner.create_chain(config, on_error)
    }
}

#[test]
fn oversized_push_is_logged_through_sdk() {
    let logging = Arc::new(LoggingLoopback::default());
    let sdk: Arc<dyn Sdk> = logging.clone();
    sdk.initialize("{}").unwrap();

    let config = config(8, 8, 48);
    let registry = ChainRegistry::build(&sdk, config.chains()).unwrap();
    let import = registry.get("import").unwrap();

    let buffer = import.get_import_buffer("importer").unwrap();
    assert_eq!(buffer.capacity(), 48);
    // 8x8 needs 192 bytes
    import
        .push_import_buffer("importer", buffer, &FrameMetadata::new(8, 8, 0))
        .unwrap();

    assert_eq!(
        *logging.logs.lock(),
        vec![(
            LogLevel::Error,
            format!(
                "Chain element `importer` reported an error: {}",
                ERROR_FRAME_OVERFLOW
            )
        )]
    );

    drop(registry);
    sdk.finalize();
}
