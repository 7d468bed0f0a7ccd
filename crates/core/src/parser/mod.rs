//! Incremental parser for ffmpeg diagnostic output.
//!
//! ffmpeg describes its inputs and outputs on stderr before it starts
//! encoding, then keeps rewriting a progress line until it exits. A
//! [`ParserSession`] consumes that stream one line at a time:
//!
//! - `Input`/`Output` headers, `Duration:` lines, `Stream #` declarations
//!   and `Metadata:` blocks are assembled into a [`Metadata`] tree
//! - the metadata phase closes on `Stream mapping:`, the first progress
//!   line or process exit, whichever comes first, and the finished tree is
//!   emitted exactly once
//! - every `frame=`/`size=` line becomes a [`ProgressSnapshot`]
//!
//! Lines that cannot be classified are reported as
//! [`ParserEvent::ParseError`] and otherwise skipped.
//!
//! # Example
//!
//! ```
//! use transcoder_core::parser::{ParserEvent, ParserSession};
//!
//! let mut session = ParserSession::new();
//! let events = session.feed([
//!     "Input #0, wav, from 'in.wav':",
//!     "  Duration: 00:00:04.00, start: 0.000000, bitrate: 1411 kb/s",
//!     "Stream mapping:",
//!     "size=     256kB time=00:00:01.00 bitrate=2097.2kbits/s",
//! ]);
//!
//! assert!(matches!(events[0], ParserEvent::Metadata(_)));
//! match &events[1] {
//!     ParserEvent::Progress(p) => assert_eq!(p.progress, Some(0.25)),
//!     other => panic!("unexpected event: {:?}", other),
//! }
//! ```

mod cursor;
mod error;
pub mod fields;
mod phase;
mod session;
mod types;

pub use cursor::Cursor;
pub use error::ParseError;
pub use fields::{FieldMap, FieldRegistry, FieldSpec, FieldValue, Transform};
pub use phase::{Phase, PhaseController, PhaseTrigger};
pub use session::{is_progress_line, ParserEvent, ParserSession, SessionStats};
pub use types::{
    FrameSize, Metadata, MetadataMap, ProgressSnapshot, SectionInfo, Side, StreamInfo,
};
