//! Error types for the parser module.

use thiserror::Error;

/// A failure to classify a single diagnostic line.
///
/// Parse errors never abort a session. The offending line is dropped and
/// reported, and parsing continues with the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line needs an input or output section but none has been opened.
    #[error("no input or output section is open")]
    NoSection,

    /// A `Duration:` line whose value is not in `HH:MM:SS.fff` form.
    #[error("malformed duration: {value}")]
    MalformedDuration { value: String },

    /// The cursor points at a stream that does not exist.
    #[error("stream #{index} is not declared in the current section")]
    MissingStream { index: usize },
}

impl ParseError {
    /// Creates a new malformed duration error.
    pub fn malformed_duration(value: impl Into<String>) -> Self {
        Self::MalformedDuration {
            value: value.into(),
        }
    }
}
