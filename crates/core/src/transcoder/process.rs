//! Spawning ffmpeg and wiring its output into a parser session.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::args::ArgumentBuilder;
use super::config::TranscoderConfig;
use super::driver::{drive_session, ExitReason, ProcessExit, SessionSummary};
use super::error::TranscoderError;
use super::events::TranscodeEvent;
use crate::metrics;

/// Where ffmpeg reads its input from.
pub enum Source {
    /// A file ffmpeg opens itself.
    Path(PathBuf),
    /// A byte stream piped into ffmpeg's stdin.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Source {
    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Value passed to `-i`.
    fn input_arg(&self) -> String {
        match self {
            Self::Path(path) => path.to_string_lossy().to_string(),
            Self::Reader(_) => "-".to_string(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

/// Where ffmpeg writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Whatever the compiled arguments already name.
    Args,
    /// A file, overwritten if it exists.
    File(PathBuf),
    /// ffmpeg's stdout, handed back through [`TranscodeHandle::take_stdout`].
    Pipe,
}

/// A configured ffmpeg invocation.
#[derive(Debug)]
pub struct Transcoder {
    source: Source,
    args: ArgumentBuilder,
    config: TranscoderConfig,
}

impl Transcoder {
    /// Creates a transcoder with default configuration and no options.
    pub fn new(source: impl Into<Source>) -> Self {
        Self {
            source: source.into(),
            args: ArgumentBuilder::new(),
            config: TranscoderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TranscoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_args(mut self, args: ArgumentBuilder) -> Self {
        self.args = args;
        self
    }

    pub fn args(&self) -> &ArgumentBuilder {
        &self.args
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Full argument list for the given output target.
    pub fn command_args(&self, output: &Output) -> Vec<String> {
        let mut args = self.config.extra_args.clone();
        args.extend(["-i".to_string(), self.source.input_arg()]);
        args.extend(self.args.compile());
        match output {
            Output::Args => {}
            Output::File(path) => {
                args.extend(["-y".to_string(), path.to_string_lossy().to_string()]);
            }
            Output::Pipe => args.push("pipe:1".to_string()),
        }
        args
    }

    /// Runs with the compiled arguments as-is.
    pub async fn exec(self) -> Result<TranscodeHandle, TranscoderError> {
        self.spawn(Output::Args).await
    }

    /// Runs, writing the result to `path`.
    pub async fn write_to_file(
        self,
        path: impl Into<PathBuf>,
    ) -> Result<TranscodeHandle, TranscoderError> {
        self.spawn(Output::File(path.into())).await
    }

    /// Runs, streaming the result from ffmpeg's stdout.
    pub async fn stream(self) -> Result<TranscodeHandle, TranscoderError> {
        self.spawn(Output::Pipe).await
    }

    async fn spawn(self, output: Output) -> Result<TranscodeHandle, TranscoderError> {
        let id = Uuid::new_v4();
        let args = self.command_args(&output);
        let Self { source, config, .. } = self;

        tokio::fs::create_dir_all(&config.working_dir)
            .await
            .map_err(|_| TranscoderError::WorkingDirectoryFailed {
                path: config.working_dir.clone(),
            })?;

        let piped_input = matches!(source, Source::Reader(_));
        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .current_dir(&config.working_dir)
            .stdin(if piped_input {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if output == Output::Pipe {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscoderError::FfmpegNotFound {
                        path: config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        let span = info_span!("transcode", session = %id);
        info!(
            parent: &span,
            "Started {} {}",
            config.ffmpeg_path.display(),
            args.join(" ")
        );
        metrics::SESSIONS_STARTED.inc();

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stderr was not captured"))?;
        let stdout = child.stdout.take();

        if let Source::Reader(mut reader) = source {
            if let Some(mut stdin) = child.stdin.take() {
                tokio::spawn(
                    async move {
                        // ffmpeg may stop reading early; a broken pipe is expected.
                        match tokio::io::copy(&mut reader, &mut stdin).await {
                            Ok(bytes) => debug!("Piped {} bytes to ffmpeg stdin", bytes),
                            Err(e) => debug!("Stopped piping to ffmpeg stdin: {}", e),
                        }
                    }
                    .instrument(span.clone()),
                );
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let exit = supervise(child, cancel_rx, config.timeout());
        let timeout_secs = config.timeout_secs;

        let task = tokio::spawn(
            async move {
                let summary = drive_session(id, stderr, exit, &events_tx).await;
                record_session(&summary);
                summary
            }
            .instrument(span),
        );

        Ok(TranscodeHandle {
            id,
            events: events_rx,
            stdout,
            cancel_tx: Some(cancel_tx),
            timeout_secs,
            task,
        })
    }
}

/// Waits for the child, killing it on cancellation or timeout.
async fn supervise(
    mut child: Child,
    cancel_rx: oneshot::Receiver<()>,
    timeout: Option<std::time::Duration>,
) -> ProcessExit {
    let cancelled = async {
        // A dropped handle is not a cancellation.
        if cancel_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let deadline = async {
        match timeout {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ProcessExit::from(status),
            Err(e) => {
                warn!("Failed to wait for ffmpeg: {}", e);
                ProcessExit::exited(None)
            }
        },
        _ = cancelled => {
            info!("Cancelling ffmpeg");
            kill(&mut child).await;
            ProcessExit::cancelled()
        }
        _ = deadline => {
            warn!("ffmpeg exceeded its timeout, killing it");
            kill(&mut child).await;
            ProcessExit::timed_out()
        }
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill ffmpeg: {}", e);
    }
}

fn record_session(summary: &SessionSummary) {
    let result = match summary.exit.reason {
        ExitReason::Exited if summary.exit.success() => "success",
        ExitReason::Exited => "failed",
        ExitReason::Cancelled => "cancelled",
        ExitReason::TimedOut => "timeout",
    };
    metrics::SESSIONS_FINISHED.with_label_values(&[result]).inc();
    metrics::SESSION_DURATION
        .with_label_values(&[result])
        .observe(summary.elapsed_ms as f64 / 1000.0);
}

/// A running transcode.
///
/// Events arrive through [`next_event`](Self::next_event) until the
/// terminal event has been delivered. Dropping the handle does not stop
/// ffmpeg; use [`cancel`](Self::cancel) for that.
#[derive(Debug)]
pub struct TranscodeHandle {
    id: Uuid,
    events: mpsc::UnboundedReceiver<TranscodeEvent>,
    stdout: Option<ChildStdout>,
    cancel_tx: Option<oneshot::Sender<()>>,
    timeout_secs: u64,
    task: JoinHandle<SessionSummary>,
}

impl TranscodeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the session has ended and every event
    /// has been received.
    pub async fn next_event(&mut self) -> Option<TranscodeEvent> {
        self.events.recv().await
    }

    /// ffmpeg's stdout, available once and only for [`Transcoder::stream`].
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Asks for the process to be killed. Has no effect after the first call.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Waits for the session to end.
    ///
    /// Events not yet received are discarded.
    pub async fn wait(self) -> Result<SessionSummary, TranscoderError> {
        // Keep the cancel sender alive so waiting does not look like a cancel.
        let _cancel_tx = self.cancel_tx;
        let summary = self.task.await.map_err(|e| TranscoderError::Aborted {
            reason: e.to_string(),
        })?;

        match summary.exit.reason {
            ExitReason::Exited if summary.exit.success() => Ok(summary),
            ExitReason::Exited => Err(TranscoderError::process_failed(
                summary.exit.code,
                summary.last_line,
            )),
            ExitReason::Cancelled => Err(TranscoderError::Cancelled),
            ExitReason::TimedOut => Err(TranscoderError::Timeout {
                timeout_secs: self.timeout_secs,
            }),
        }
    }
}
