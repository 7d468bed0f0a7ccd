//! Types for the parser module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::fields::{FieldMap, FieldValue};

/// Free-form `key: value` pairs from a `Metadata:` block.
pub type MetadataMap = BTreeMap<String, String>;

/// Which side of the transcode a section describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Input,
    Output,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// One elementary stream declared by a `Stream #x:y` line.
///
/// Only the fields that could be read from the line are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream kind, lowercased (`video`, `audio`, `subtitle`, `data`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Sample rate in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    /// Bitrate in bits per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FrameSize>,
    /// Width divided by height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    /// Pixel format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataMap>,
}

impl StreamInfo {
    /// Builds a stream from fields extracted by the metadata registry.
    pub fn from_fields(fields: &FieldMap) -> Self {
        Self {
            stream_type: fields.text("type"),
            codec: fields.text("codec"),
            sample_rate: fields.int("sample_rate").and_then(|v| u32::try_from(v).ok()),
            channels: fields.int("channels").and_then(|v| u32::try_from(v).ok()),
            bitrate: fields.int("bitrate").and_then(|v| u64::try_from(v).ok()),
            fps: fields.int("fps").and_then(|v| u32::try_from(v).ok()),
            size: match fields.get("size") {
                Some(FieldValue::Size { width, height }) => Some(FrameSize {
                    width: *width,
                    height: *height,
                }),
                _ => None,
            },
            aspect_ratio: fields.float("aspect_ratio"),
            colors: fields.text("colors"),
            metadata: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.stream_type.as_deref() == Some("video")
    }

    pub fn is_audio(&self) -> bool {
        self.stream_type.as_deref() == Some("audio")
    }
}

/// The input or output side of a transcode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    /// Streams in declaration order.
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
    /// Duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Whether the section starts at offset zero.
    #[serde(default)]
    pub synched: bool,
    /// Section-level metadata (as opposed to per-stream metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataMap>,
}

impl SectionInfo {
    pub fn last_stream(&self) -> Option<&StreamInfo> {
        self.streams.last()
    }

    /// First stream of the given type, if any.
    pub fn stream_of_type(&self, stream_type: &str) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.stream_type.as_deref() == Some(stream_type))
    }
}

/// Everything learned about the transcode before progress reporting starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub input: SectionInfo,
    pub output: SectionInfo,
}

impl Metadata {
    pub fn section(&self, side: Side) -> &SectionInfo {
        match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        }
    }

    pub fn section_mut(&mut self, side: Side) -> &mut SectionInfo {
        match side {
            Side::Input => &mut self.input,
            Side::Output => &mut self.output,
        }
    }
}

/// A point-in-time view of encoding progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Frames encoded so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Encoder quantizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    /// Output bytes written so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Media time encoded so far, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Bits per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    /// `time / input duration`, when the input duration is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl ProgressSnapshot {
    /// Builds a snapshot from fields extracted by the progress registry.
    pub fn from_fields(fields: &FieldMap) -> Self {
        Self {
            frame: fields.int("frame").and_then(|v| u64::try_from(v).ok()),
            fps: fields.int("fps").and_then(|v| u32::try_from(v).ok()),
            quality: fields.int("quality").and_then(|v| u32::try_from(v).ok()),
            size: fields.int("size").and_then(|v| u64::try_from(v).ok()),
            time: fields.int("time").and_then(|v| u64::try_from(v).ok()),
            bitrate: fields.int("bitrate").and_then(|v| u64::try_from(v).ok()),
            progress: None,
        }
    }

    /// Sets the completion fraction against `duration_ms`.
    ///
    /// Left unset when either the elapsed time or the duration is unknown.
    pub fn with_duration(mut self, duration_ms: Option<u64>) -> Self {
        self.progress = match (self.time, duration_ms) {
            (Some(time), Some(duration)) if duration > 0 => Some(time as f64 / duration as f64),
            _ => None,
        };
        self
    }
}
