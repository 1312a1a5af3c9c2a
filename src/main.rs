//! imagefilter CLI
//!
//! Runs the export → crosshair → import loop until Ctrl+C or SIGTERM.

use clap::Parser;
use imagefilter::{
    Config, Crosshair, Error, LoopbackSdk, Pipeline, PipelineSettings, ShutdownSignal,
    DEFAULT_CONFIG_FILE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "imagefilter")]
#[command(about = "Export frames, draw a crosshair, import them back")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON with `IFF` and `chains` sections)
    #[arg(short, long, env = "IMAGEFILTER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Id of the chain frames are exported from
    #[arg(long, default_value = "export")]
    export_chain: String,

    /// Id of the chain frames are imported into
    #[arg(long, default_value = "import")]
    import_chain: String,

    /// Exporter element inside the export chain
    #[arg(long, default_value = "exporter")]
    exporter: String,

    /// Importer element inside the import chain
    #[arg(long, default_value = "importer")]
    importer: String,

    /// Longest wait for a frame before re-checking for shutdown (ms)
    #[arg(long, default_value = "1000")]
    wait_timeout_ms: u64,

    /// Crosshair arm length in pixels
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..))]
    arm: u32,

    /// Crosshair bar thickness in pixels
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    thickness: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("imagefilter=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| exit_on_config_error(e));

    let settings = PipelineSettings::default()
        .with_chains(cli.export_chain, cli.import_chain)
        .with_elements(cli.exporter, cli.importer)
        .with_wait_timeout(Duration::from_millis(cli.wait_timeout_ms));
    let crosshair = Crosshair::default()
        .with_arm(cli.arm)
        .with_thickness(cli.thickness);

    let shutdown = ShutdownSignal::new();
    let _listener = shutdown.listen()?;

    let mut pipeline =
        Pipeline::new(Arc::new(LoopbackSdk::new()), config, settings).with_crosshair(crosshair);

    let loop_signal = shutdown.clone();
    let pipeline = tokio::task::spawn_blocking(move || {
        let result = pipeline.run_until(&loop_signal);
        (pipeline, result)
    });
    let (pipeline, result) = pipeline.await?;
    match result {
        Err(e) if e.is_config_error() => exit_on_config_error(e),
        other => other?,
    }

    let stats = pipeline.stats();
    tracing::info!(
        "Frames exported: {}, forwarded: {}, dropped: {}, overlaid: {}, pushed: {}",
        stats.frames_exported,
        stats.frames_forwarded,
        stats.frames_dropped,
        stats.frames_overlaid,
        stats.frames_pushed
    );

    Ok(())
}

/// Configuration problems end the program with status 1 and a plain message
fn exit_on_config_error(err: Error) -> ! {
    eprintln!("{}", err);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crosshair_defaults() {
        let cli = Cli::try_parse_from(["imagefilter"]).unwrap();
        assert_eq!(cli.arm, 100);
        assert_eq!(cli.thickness, 4);
    }

    #[test]
    fn test_zero_crosshair_sizes_rejected() {
        assert!(Cli::try_parse_from(["imagefilter", "--thickness", "0"]).is_err());
        assert!(Cli::try_parse_from(["imagefilter", "--arm", "0"]).is_err());
        let cli = Cli::try_parse_from(["imagefilter", "--thickness", "1"]).unwrap();
        assert_eq!(cli.thickness, 1);
    }
}
