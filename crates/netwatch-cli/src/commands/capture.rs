/// Live capture from a browser tab.
///
/// Connects to the DevTools endpoint, records until Ctrl-C, SIGTERM, or the
/// tab going away, and leaves both logs on disk for `netwatch diagnose`.
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use netwatch_recorder::{CdpEventSource, PersistenceSink, RecordingSession, RunEnd, SinkConfig};
use netwatch_types::CaptureConfig;

/// Run `netwatch capture TARGET [--port N] [--raw-log P] [--metadata P]`.
pub fn run(
    target: &str,
    port: Option<&str>,
    raw_log: Option<PathBuf>,
    metadata: Option<PathBuf>,
) -> Result<()> {
    let mut config = match CaptureConfig::with_port_override(port) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Some(path) = raw_log {
        config.raw_log_path = path;
    }
    if let Some(path) = metadata {
        config.metadata_path = path;
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(capture(target, config))
}

/// Report a fatal setup error as a JSON object on stderr and exit 1.
fn fail(err: &dyn std::fmt::Display) -> ! {
    eprintln!("{}", serde_json::json!({ "error": err.to_string() }));
    std::process::exit(1);
}

async fn capture(target: &str, config: CaptureConfig) -> Result<()> {
    let source = match CdpEventSource::connect(config.port, target).await {
        Ok(source) => source,
        Err(e) => fail(&e),
    };

    let sink = PersistenceSink::spawn(SinkConfig::from(&config));
    let mut session = match RecordingSession::start(target, source, sink).await {
        Ok(session) => session,
        Err(e) => fail(&e),
    };

    println!("Capturing network traffic");
    println!("  Raw log:   {}", config.raw_log_path.display());
    println!("  Metadata:  {}", config.metadata_path.display());
    println!("  Target:    {target}");
    println!("Press Ctrl+C to stop");
    println!();

    match session.run_until(shutdown_signal()).await {
        RunEnd::Stopped => println!("Stopping capture..."),
        RunEnd::SourceClosed => println!("Browser target closed, stopping capture..."),
    }

    let summary = session
        .stop()
        .await
        .context("failed to stop recording session")?;

    println!(
        "Recorded {} requests ({} still in flight, {} page navigations)",
        summary.records, summary.in_flight, summary.navigations
    );
    if summary.sink.failures > 0 {
        println!(
            "Warning: {} of {} snapshot writes failed",
            summary.sink.failures,
            summary.sink.writes + summary.sink.failures
        );
    }
    Ok(())
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
