//! Drives a parser session from a process's diagnostic stream.

use serde::Serialize;
use std::future::Future;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::TranscodeEvent;
use super::lines::DiagnosticLines;
use crate::parser::{Metadata, ParserEvent, ParserSession, SessionStats};

/// Upper bound on reading leftover stderr once the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The process exited on its own.
    Exited,
    /// The process was killed through its handle.
    Cancelled,
    /// The process was killed after running past its timeout.
    TimedOut,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    pub reason: ExitReason,
}

impl ProcessExit {
    pub fn exited(code: Option<i32>) -> Self {
        Self {
            code,
            reason: ExitReason::Exited,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            code: None,
            reason: ExitReason::Cancelled,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            code: None,
            reason: ExitReason::TimedOut,
        }
    }

    /// Exited on its own with status 0.
    pub fn success(&self) -> bool {
        self.reason == ExitReason::Exited && self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self::exited(status.code())
    }
}

/// Final state of a driven session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub exit: ProcessExit,
    pub metadata: Metadata,
    pub last_line: Option<String>,
    pub stats: SessionStats,
    pub elapsed_ms: u64,
}

/// Feeds `stderr` into a fresh [`ParserSession`] until `exit` resolves.
///
/// Lines are preferred over the exit notification while both are ready, so
/// everything the process wrote before exiting is classified first. Once
/// the process is gone the metadata phase is closed, leftover lines are
/// drained, and exactly one terminal event is sent. Send failures are
/// ignored: a consumer that dropped its receiver no longer cares.
pub async fn drive_session<R, F>(
    id: Uuid,
    stderr: R,
    exit: F,
    tx: &UnboundedSender<TranscodeEvent>,
) -> SessionSummary
where
    R: AsyncRead + Unpin,
    F: Future<Output = ProcessExit>,
{
    let started = Instant::now();
    let mut session = ParserSession::new();
    let mut lines = DiagnosticLines::new(stderr);
    let mut stderr_open = true;

    tokio::pin!(exit);

    let exit = loop {
        tokio::select! {
            biased;
            line = lines.next_line(), if stderr_open => {
                stderr_open = handle_read(&mut session, line, tx);
            }
            status = &mut exit => break status,
        }
    };

    debug!("Session {} process exited: {:?}", id, exit);
    if let Some(event) = session.handle_exit() {
        send(tx, event);
    }

    if stderr_open {
        let drain = async {
            while handle_read(&mut session, lines.next_line().await, tx) {}
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!(
                "Session {} stderr still open {:?} after exit, giving up",
                id, DRAIN_TIMEOUT
            );
        }
    }

    let last_line = session.last_line().map(str::to_string);
    let terminal = if exit.success() {
        TranscodeEvent::Finished
    } else {
        TranscodeEvent::Failed {
            code: exit.code,
            last_line: last_line.clone(),
        }
    };
    let _ = tx.send(terminal);

    let stats = session.stats();
    info!(
        "Session {} ended ({:?}, code {:?}): {} lines, {} progress events, {} parse errors",
        id, exit.reason, exit.code, stats.lines, stats.progress_events, stats.parse_errors
    );

    SessionSummary {
        id,
        exit,
        metadata: session.metadata().clone(),
        last_line,
        stats,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Applies one read result. Returns whether the stream is still open.
fn handle_read(
    session: &mut ParserSession,
    line: std::io::Result<Option<String>>,
    tx: &UnboundedSender<TranscodeEvent>,
) -> bool {
    match line {
        Ok(Some(line)) => {
            for event in session.handle_line(&line) {
                send(tx, event);
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Failed to read diagnostic output: {}", e);
            false
        }
    }
}

fn send(tx: &UnboundedSender<TranscodeEvent>, event: ParserEvent) {
    let _ = tx.send(event.into());
}
