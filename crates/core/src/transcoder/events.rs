//! Events delivered to the consumer of a transcode.

use serde::Serialize;

use crate::parser::{Metadata, ParserEvent, ProgressSnapshot};

/// One notification from a running transcode.
///
/// `Metadata` is delivered at most once and before any `Progress`.
/// Exactly one of `Finished` or `Failed` ends the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscodeEvent {
    Metadata(Metadata),
    Progress(ProgressSnapshot),
    /// A diagnostic line was dropped because it could not be classified.
    ParseError { line: String, reason: String },
    Finished,
    Failed {
        code: Option<i32>,
        last_line: Option<String>,
    },
}

impl TranscodeEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}

impl From<ParserEvent> for TranscodeEvent {
    fn from(event: ParserEvent) -> Self {
        match event {
            ParserEvent::Metadata(metadata) => Self::Metadata(metadata),
            ParserEvent::Progress(snapshot) => Self::Progress(snapshot),
            ParserEvent::ParseError { line, error } => Self::ParseError {
                line,
                reason: error.to_string(),
            },
        }
    }
}
