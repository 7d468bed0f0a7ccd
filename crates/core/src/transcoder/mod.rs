//! Running ffmpeg and turning its diagnostic output into events.
//!
//! A [`Transcoder`] pairs a [`Source`] with an [`ArgumentBuilder`] and a
//! [`TranscoderConfig`]. Starting it spawns ffmpeg and returns a
//! [`TranscodeHandle`] that yields [`TranscodeEvent`]s: the stream
//! metadata once, progress snapshots while encoding, and a single
//! `Finished` or `Failed` when the process ends.
//!
//! ```no_run
//! use transcoder_core::transcoder::{ArgumentBuilder, TranscodeEvent, Transcoder};
//!
//! # async fn run() -> Result<(), transcoder_core::transcoder::TranscoderError> {
//! let mut handle = Transcoder::new("in.mkv")
//!     .with_args(ArgumentBuilder::new().video_codec("libx264").audio_codec("aac"))
//!     .write_to_file("out.mp4")
//!     .await?;
//!
//! while let Some(event) = handle.next_event().await {
//!     if let TranscodeEvent::Progress(p) = event {
//!         println!("{:?}", p.progress);
//!     }
//! }
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```

mod args;
mod config;
mod driver;
mod error;
mod events;
mod lines;
mod process;

pub use args::ArgumentBuilder;
pub use config::TranscoderConfig;
pub use driver::{drive_session, ExitReason, ProcessExit, SessionSummary};
pub use error::TranscoderError;
pub use events::TranscodeEvent;
pub use lines::DiagnosticLines;
pub use process::{Output, Source, TranscodeHandle, Transcoder};
