mod cli;
mod metrics;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcoder_core::transcoder::Output;
use transcoder_core::{
    load_config, load_default_config, validate_config, Config, LoggingConfig, Source,
    TranscodeEvent, TranscodeHandle, Transcoder, TranscoderError,
};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => load_default_config().context("Failed to load config")?,
    };
    apply_overrides(&mut config, &cli);
    validate_config(&config).context("Configuration validation failed")?;

    init_tracing(&config.logging)?;
    info!("Using ffmpeg at {:?}", config.ffmpeg.ffmpeg_path);

    let source = if cli.input == "-" {
        Source::reader(tokio::io::stdin())
    } else {
        Source::Path(PathBuf::from(&cli.input))
    };
    let transcoder = Transcoder::new(source)
        .with_config(config.ffmpeg.clone())
        .with_args(cli.argument_builder());

    if cli.dry_run {
        let output = match (&cli.output, cli.pipe) {
            (Some(path), _) => Output::File(path.clone()),
            (None, true) => Output::Pipe,
            (None, false) => Output::Args,
        };
        println!("{}", serde_json::to_string(&transcoder.command_args(&output))?);
        return Ok(0);
    }

    let mut handle = match (&cli.output, cli.pipe) {
        (Some(path), _) => transcoder.write_to_file(path).await,
        (None, true) => transcoder.stream().await,
        (None, false) => transcoder.exec().await,
    }
    .context("Failed to start ffmpeg")?;
    info!("Session {} started", handle.id());

    let copy_task = handle.take_stdout().map(|mut stdout| {
        tokio::spawn(async move {
            let mut out = tokio::io::stdout();
            tokio::io::copy(&mut stdout, &mut out).await
        })
    });

    forward_events(&mut handle, cli.pipe).await?;

    if let Some(task) = copy_task {
        match task.await {
            Ok(Ok(bytes)) => info!("Wrote {} bytes to stdout", bytes),
            Ok(Err(e)) => warn!("Failed to copy ffmpeg output: {}", e),
            Err(e) => warn!("Output copy task failed: {}", e),
        }
    }

    let result = handle.wait().await;

    if cli.metrics {
        eprint!("{}", metrics::encode_metrics()?);
    }

    match result {
        Ok(summary) => {
            info!(
                "Transcode finished in {} ms ({} progress updates)",
                summary.elapsed_ms, summary.stats.progress_events
            );
            Ok(0)
        }
        Err(e) => {
            error!("Transcode failed: {}", e);
            Ok(exit_code(&e))
        }
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.ffmpeg {
        config.ffmpeg.ffmpeg_path = path.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.ffmpeg.timeout_secs = timeout;
    }
}

/// Initialize logging on stderr so stdout stays machine readable
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .with_context(|| format!("Invalid log filter {:?}", logging.filter))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

/// Writes every event as a JSON line until the session ends.
///
/// A Ctrl+C cancels the transcode; events keep flowing until the terminal one.
async fn forward_events(handle: &mut TranscodeHandle, to_stderr: bool) -> Result<()> {
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => write_event(&event, to_stderr)?,
                None => break,
            },
            _ = signal::ctrl_c(), if !interrupted => {
                info!("Interrupted, cancelling transcode");
                interrupted = true;
                handle.cancel();
            }
        }
    }

    Ok(())
}

fn write_event(event: &TranscodeEvent, to_stderr: bool) -> Result<()> {
    metrics::record_event(event);
    let line = serde_json::to_string(event).context("Failed to serialize event")?;
    let written = if to_stderr {
        writeln!(std::io::stderr().lock(), "{}", line)
    } else {
        writeln!(std::io::stdout().lock(), "{}", line)
    };
    written.context("Failed to write event")
}

/// Process exit code for a failed transcode.
fn exit_code(error: &TranscoderError) -> i32 {
    match error {
        TranscoderError::ProcessFailed {
            code: Some(code), ..
        } if *code != 0 => *code,
        TranscoderError::Cancelled => 130,
        TranscoderError::Timeout { .. } => 124,
        _ => 1,
    }
}
