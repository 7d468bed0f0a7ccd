//! Line-at-a-time parsing of ffmpeg diagnostic output.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cursor::Cursor;
use super::error::ParseError;
use super::fields::{parse_duration, METADATA_FIELDS, PROGRESS_FIELDS};
use super::phase::{PhaseController, PhaseTrigger};
use super::types::{Metadata, ProgressSnapshot, SectionInfo, Side, StreamInfo};
use crate::metrics;

static DURATION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)duration:\s*([^,\s]+)").unwrap());
static START_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)start:\s*(-?[\d.]+)").unwrap());
static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+?)\s*:\s*(.+?)$").unwrap());

/// Output of feeding a line or an exit notification to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    /// Metadata is complete. Emitted once per session.
    Metadata(Metadata),
    /// A progress line was seen.
    Progress(ProgressSnapshot),
    /// A line could not be classified and was dropped.
    ParseError { line: String, error: ParseError },
}

/// Line counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub lines: u64,
    pub progress_events: u64,
    pub parse_errors: u64,
}

/// Parser state for one run of the external process.
///
/// Sessions are independent; nothing is shared between them.
#[derive(Debug, Default)]
pub struct ParserSession {
    metadata: Metadata,
    cursor: Cursor,
    phase: PhaseController,
    last_line: Option<String>,
    stats: SessionStats,
}

impl ParserSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata assembled so far.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Last non-empty line seen, trimmed.
    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        !self.phase.is_open()
    }

    pub fn closed_by(&self) -> Option<PhaseTrigger> {
        self.phase.closed_by()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Feeds one diagnostic line (without its terminator).
    pub fn handle_line(&mut self, raw: &str) -> Vec<ParserEvent> {
        let line = raw.trim();
        let mut events = Vec::new();

        self.stats.lines += 1;
        if !line.is_empty() {
            self.last_line = Some(line.to_string());
        }

        if self.phase.is_open() {
            if let Err(error) = self.classify(line, &mut events) {
                warn!("Failed to parse diagnostic line {:?}: {}", line, error);
                metrics::PARSE_ERRORS.inc();
                self.stats.parse_errors += 1;
                events.push(ParserEvent::ParseError {
                    line: line.to_string(),
                    error,
                });
            }
        }

        if is_progress_line(line) {
            self.close(PhaseTrigger::Progress, &mut events);
            let snapshot = ProgressSnapshot::from_fields(&PROGRESS_FIELDS.extract(line))
                .with_duration(self.metadata.input.duration);
            metrics::PROGRESS_EVENTS.inc();
            self.stats.progress_events += 1;
            events.push(ParserEvent::Progress(snapshot));
        }

        events
    }

    /// Feeds several lines in order.
    pub fn feed<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Vec<ParserEvent> {
        lines
            .into_iter()
            .flat_map(|line| self.handle_line(line))
            .collect()
    }

    /// Notifies the session that the process has exited.
    ///
    /// Returns the metadata event if the phase was still open.
    pub fn handle_exit(&mut self) -> Option<ParserEvent> {
        let mut events = Vec::with_capacity(1);
        self.close(PhaseTrigger::ProcessExit, &mut events);
        events.pop()
    }

    fn close(&mut self, trigger: PhaseTrigger, events: &mut Vec<ParserEvent>) {
        if !self.phase.close(trigger) {
            return;
        }
        info!(
            "Metadata phase closed by {} ({} input streams, {} output streams, input duration {:?} ms)",
            trigger.as_str(),
            self.metadata.input.streams.len(),
            self.metadata.output.streams.len(),
            self.metadata.input.duration
        );
        metrics::PHASE_CLOSED
            .with_label_values(&[trigger.as_str()])
            .inc();
        events.push(ParserEvent::Metadata(self.metadata.clone()));
    }

    fn classify(&mut self, line: &str, events: &mut Vec<ParserEvent>) -> Result<(), ParseError> {
        if starts_with_ignore_case(line, "input") {
            self.start_section(Side::Input);
        } else if starts_with_ignore_case(line, "output") {
            self.start_section(Side::Output);
        } else if line.eq_ignore_ascii_case("metadata:") {
            self.cursor.open_metadata_block(&mut self.metadata)?;
        } else if starts_with_ignore_case(line, "duration") {
            self.apply_duration(line)?;
        } else if starts_with_ignore_case(line, "stream mapping") {
            self.close(PhaseTrigger::StreamMapping, events);
        } else if starts_with_ignore_case(line, "stream #") {
            let stream = StreamInfo::from_fields(&METADATA_FIELDS.extract(line));
            debug!(
                "Stream declared in {:?} section: {:?} {:?}",
                self.cursor.side(),
                stream.stream_type,
                stream.codec
            );
            self.cursor.push_stream(&mut self.metadata, stream)?;
        } else {
            self.apply_key_value(line)?;
        }
        Ok(())
    }

    fn start_section(&mut self, side: Side) {
        debug!("Started {} section", side);
        *self.metadata.section_mut(side) = SectionInfo::default();
        self.cursor = Cursor::Section(side);
    }

    fn apply_duration(&mut self, line: &str) -> Result<(), ParseError> {
        let section = self.cursor.section_mut(&mut self.metadata)?;

        let raw = DURATION_VALUE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let duration = parse_duration(raw).ok_or_else(|| ParseError::malformed_duration(raw))?;

        section.duration = Some(duration);
        section.synched = START_OFFSET
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .is_some_and(|start| start == 0.0);
        Ok(())
    }

    fn apply_key_value(&mut self, line: &str) -> Result<(), ParseError> {
        // Banner and configuration lines precede any section.
        if self.cursor.is_detached() {
            return Ok(());
        }
        let Some(target) = self.cursor.metadata_target_mut(&mut self.metadata)? else {
            return Ok(());
        };
        if let Some(caps) = KEY_VALUE.captures(line) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                target.insert(key.as_str().to_string(), value.as_str().to_string());
            }
        }
        Ok(())
    }
}

/// Whether `line` reports encoding progress.
pub fn is_progress_line(line: &str) -> bool {
    starts_with_ignore_case(line, "frame=") || starts_with_ignore_case(line, "size=")
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::FrameSize;

    const SCENARIO: &[&str] = &[
        "Input #0, mp4, from 'x':",
        "  Duration: 00:00:10.00, start: 0.000000, bitrate: 500 kb/s",
        "    Stream #0:0: Video: h264, yuv420p, 640x480, 30 fps",
        "Output #0, mp4, to 'y':",
        "Stream mapping:",
        "frame=  100 fps= 30 q=20.0 size=    512kB time=00:00:05.00 bitrate= 800.0kbits/s",
    ];

    fn metadata_events(events: &[ParserEvent]) -> Vec<&Metadata> {
        events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Metadata(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn progress_events(events: &[ParserEvent]) -> Vec<&ProgressSnapshot> {
        events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut session = ParserSession::new();
        let events = session.feed(SCENARIO.iter().copied());

        assert_eq!(events.len(), 2);
        let metadata = match &events[0] {
            ParserEvent::Metadata(m) => m,
            other => panic!("expected metadata first, got {:?}", other),
        };
        assert_eq!(metadata.input.duration, Some(10_000));
        assert!(metadata.input.synched);
        assert_eq!(metadata.input.streams.len(), 1);
        let video = &metadata.input.streams[0];
        assert!(video.is_video());
        assert_eq!(
            video.size,
            Some(FrameSize {
                width: 640,
                height: 480
            })
        );
        assert_eq!(video.fps, Some(30));
        assert!(metadata.output.streams.is_empty());

        let progress = match &events[1] {
            ParserEvent::Progress(p) => p,
            other => panic!("expected progress, got {:?}", other),
        };
        assert_eq!(progress.frame, Some(100));
        assert_eq!(progress.size, Some(524_288));
        assert_eq!(progress.time, Some(5000));
        assert_eq!(progress.progress, Some(0.5));
        assert_eq!(progress.bitrate, Some(800_000));
        assert_eq!(session.closed_by(), Some(PhaseTrigger::StreamMapping));
    }

    #[test]
    fn test_stream_count_and_order_per_section() {
        let mut session = ParserSession::new();
        session.feed([
            "Input #0, matroska,webm, from 'in.mkv':",
            "Stream #0:0: Video: hevc, yuv420p10le, 3840x2160, 24 fps",
            "Stream #0:1(eng): Audio: eac3, 48000 Hz, 5.1(side), fltp, 640 kb/s",
            "Stream #0:2(eng): Subtitle: subrip",
            "Output #0, mp4, to 'out.mp4':",
            "Stream #0:0: Video: h264, yuv420p, 1920x1080, 24 fps",
            "Stream #0:1: Audio: aac, 48000 Hz, stereo, fltp, 192 kb/s",
        ]);

        let metadata = session.metadata();
        let input_types: Vec<_> = metadata
            .input
            .streams
            .iter()
            .map(|s| s.stream_type.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(input_types, vec!["video", "audio", "subtitle"]);
        assert_eq!(metadata.input.streams[1].channels, Some(5));
        assert_eq!(metadata.output.streams.len(), 2);
        assert_eq!(metadata.output.streams[1].channels, Some(2));
        assert_eq!(metadata.output.streams[1].bitrate, Some(192_000));
    }

    #[test]
    fn test_metadata_blocks() {
        let mut session = ParserSession::new();
        session.feed([
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':",
            "  Metadata:",
            "    major_brand     : isom",
            "    creation_time   : 2015-06-01T12:00:00.000000Z",
            "  Duration: 00:01:02.50, start: 0.023220, bitrate: 1328 kb/s",
            "    Stream #0:0(und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)",
            "    Metadata:",
            "      handler_name    : SoundHandler",
            "      not a pair",
        ]);

        let input = &session.metadata().input;
        assert_eq!(input.duration, Some(62_500));
        assert!(!input.synched);

        let section_meta = input.metadata.as_ref().unwrap();
        assert_eq!(section_meta.get("major_brand").map(String::as_str), Some("isom"));
        assert_eq!(
            section_meta.get("creation_time").map(String::as_str),
            Some("2015-06-01T12:00:00.000000Z")
        );

        let stream_meta = input.streams[0].metadata.as_ref().unwrap();
        assert_eq!(stream_meta.len(), 1);
        assert_eq!(
            stream_meta.get("handler_name").map(String::as_str),
            Some("SoundHandler")
        );
    }

    #[test]
    fn test_metadata_fires_once_for_all_triggers() {
        let mut session = ParserSession::new();
        let mut events = session.feed(SCENARIO.iter().copied());
        events.extend(session.handle_line("Stream mapping:"));
        events.extend(session.handle_exit());
        events.extend(session.handle_line("frame=  200 time=00:00:06.00"));

        assert_eq!(metadata_events(&events).len(), 1);
        assert_eq!(progress_events(&events).len(), 2);
    }

    #[test]
    fn test_closed_phase_ignores_metadata_lines() {
        let mut session = ParserSession::new();
        session.feed(SCENARIO.iter().copied());
        let before = session.metadata().clone();

        let events = session.feed([
            "Input #1, wav, from 'other.wav':",
            "  Duration: 00:10:00.00, start: 0.000000, bitrate: 1411 kb/s",
            "Stream #1:0: Audio: pcm_s16le, 44100 Hz, stereo, s16, 1411 kb/s",
        ]);

        assert!(events.is_empty());
        assert_eq!(session.metadata(), &before);
    }

    #[test]
    fn test_progress_line_closes_phase_without_stream_mapping() {
        let mut session = ParserSession::new();
        let events = session.feed([
            "Input #0, wav, from 'in.wav':",
            "  Duration: 00:00:04.00, start: 0.000000, bitrate: 1411 kb/s",
            "size=     256kB time=00:00:01.00 bitrate=2097.2kbits/s",
        ]);

        assert!(matches!(events[0], ParserEvent::Metadata(_)));
        let progress = progress_events(&events);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].size, Some(256 * 1024));
        assert_eq!(progress[0].progress, Some(0.25));
        assert_eq!(session.closed_by(), Some(PhaseTrigger::Progress));
    }

    #[test]
    fn test_exit_closes_phase() {
        let mut session = ParserSession::new();
        session.feed(["Input #0, mp3, from 'in.mp3':"]);
        let event = session.handle_exit();
        assert!(matches!(event, Some(ParserEvent::Metadata(_))));
        assert!(session.handle_exit().is_none());
        assert_eq!(session.closed_by(), Some(PhaseTrigger::ProcessExit));
    }

    #[test]
    fn test_progress_without_input_duration() {
        let mut session = ParserSession::new();
        let events = session.feed(["frame=   10 fps=0.0 q=-1.0 size=N/A time=00:00:00.40 bitrate=N/A"]);
        let progress = progress_events(&events);
        assert_eq!(progress[0].frame, Some(10));
        assert_eq!(progress[0].time, Some(400));
        assert!(progress[0].fps.is_none());
        assert!(progress[0].size.is_none());
        assert!(progress[0].progress.is_none());
    }

    #[test]
    fn test_line_before_section_is_parse_error() {
        let mut session = ParserSession::new();
        let events = session.feed([
            "ffmpeg version 6.0 Copyright (c) 2000-2023 the FFmpeg developers",
            "  configuration: --enable-gpl --enable-libx264",
            "Stream #0:0: Video: h264, yuv420p, 640x480, 30 fps",
            "Input #0, mp4, from 'x':",
            "Stream #0:0: Video: h264, yuv420p, 640x480, 30 fps",
        ]);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            ParserEvent::ParseError {
                line: "Stream #0:0: Video: h264, yuv420p, 640x480, 30 fps".to_string(),
                error: ParseError::NoSection,
            }
        );
        assert_eq!(session.metadata().input.streams.len(), 1);
        assert_eq!(session.stats().parse_errors, 1);
    }

    #[test]
    fn test_malformed_duration_does_not_stop_session() {
        let mut session = ParserSession::new();
        let events = session.feed([
            "Input #0, mpegts, from 'pipe:':",
            "  Duration: N/A, start: 1.400000, bitrate: N/A",
            "    Stream #0:0[0x100]: Video: mpeg2video (Main), yuv420p(tv, top first), 720x576 [SAR 16:15 DAR 4:3], 25 fps",
        ]);

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ParserEvent::ParseError { error: ParseError::MalformedDuration { value }, .. } if value == "N/A"
        ));
        let input = &session.metadata().input;
        assert!(input.duration.is_none());
        assert_eq!(input.streams.len(), 1);
        assert_eq!(input.streams[0].codec.as_deref(), Some("mpeg2video"));
        assert_eq!(
            input.streams[0].size,
            Some(FrameSize {
                width: 720,
                height: 576
            })
        );
    }

    #[test]
    fn test_oversized_numbers_do_not_stop_session() {
        let mut session = ParserSession::new();
        let events = session.feed([
            "Input #0, wav, from 'in.wav':",
            "  Duration: 9999999999999:00:00.00, start: 0.000000",
            "    Stream #0:0: Audio: pcm_s16le, 44100 Hz, stereo, s16, 99999999999999999 mb/s",
            "Stream mapping:",
            "size= 99999999999999999kB time=00:00:01.00 bitrate=  64.0kbits/s",
        ]);

        assert_eq!(events.len(), 3, "events: {:?}", events);
        assert!(matches!(
            &events[0],
            ParserEvent::ParseError { error: ParseError::MalformedDuration { value }, .. }
                if value == "9999999999999:00:00.00"
        ));
        let metadata = metadata_events(&events);
        assert_eq!(metadata.len(), 1);
        let stream = &metadata[0].input.streams[0];
        assert_eq!(stream.sample_rate, Some(44_100));
        assert!(stream.bitrate.is_none());

        let progress = progress_events(&events);
        assert!(progress[0].size.is_none());
        assert_eq!(progress[0].time, Some(1000));
        assert_eq!(progress[0].bitrate, Some(64_000));
        assert!(progress[0].progress.is_none());
    }

    #[test]
    fn test_negative_zero_start_is_synched() {
        let mut session = ParserSession::new();
        session.feed([
            "Input #0, mp4, from 'x':",
            "  Duration: 00:00:10.00, start: -0.000000, bitrate: 500 kb/s",
        ]);
        assert!(session.metadata().input.synched);
    }

    #[test]
    fn test_repeated_input_header_resets_section() {
        let mut session = ParserSession::new();
        session.feed([
            "Input #0, mp4, from 'a':",
            "Stream #0:0: Video: h264, yuv420p, 640x480, 30 fps",
            "Input #1, mp4, from 'b':",
        ]);
        assert!(session.metadata().input.streams.is_empty());
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        let mut session = ParserSession::new();
        let events = session.feed(["Input #0, mp4, from 'x':", "   ", ""]);
        assert!(events.is_empty());
        assert_eq!(session.last_line(), Some("Input #0, mp4, from 'x':"));

        session.feed(SCENARIO.iter().copied());
        session.handle_line("x.mp4: Invalid data found when processing input");
        assert_eq!(
            session.last_line(),
            Some("x.mp4: Invalid data found when processing input")
        );
        assert_eq!(session.stats().lines, 3 + SCENARIO.len() as u64 + 1);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("frame=  1 fps=0.0"));
        assert!(is_progress_line("SIZE=  1kB"));
        assert!(!is_progress_line("Lsize=  1kB"));
        assert!(!is_progress_line("video:1kB audio:2kB"));
    }
}
