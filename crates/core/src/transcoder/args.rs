//! Fluent construction of ffmpeg output arguments.

use std::fmt::Display;

/// Ordered map from an option key to the arguments it contributes.
///
/// Setting a key that is already present replaces its arguments in place,
/// so the compiled order follows the order keys were first set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentBuilder {
    entries: Vec<(String, Vec<String>)>,
}

impl ArgumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the arguments for `key`.
    pub fn set<I, S>(mut self, key: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = args,
            None => self.entries.push((key, args)),
        }
        self
    }

    /// Removes `key` if present.
    pub fn unset(mut self, key: &str) -> Self {
        self.entries.retain(|(k, _)| k != key);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, args)| args.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets the video codec (`-vcodec`).
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.set("vcodec", ["-vcodec".to_string(), codec.into()])
    }

    /// Sets the video bitrate (`-b:v`), e.g. `800k`.
    pub fn video_bitrate(self, bitrate: impl Display) -> Self {
        self.set("b", ["-b:v".to_string(), bitrate.to_string()])
    }

    /// Sets the output frame rate (`-r`).
    pub fn fps(self, fps: impl Display) -> Self {
        self.set("r", ["-r".to_string(), fps.to_string()])
    }

    /// Sets the output container format (`-f`).
    ///
    /// MP4 output is fragmented so it can be written to a non-seekable pipe.
    pub fn format(self, format: impl Into<String>) -> Self {
        let format = format.into();
        let is_mp4 = format.eq_ignore_ascii_case("mp4");
        let builder = self.set("format", ["-f".to_string(), format]);
        if is_mp4 {
            builder.set("movflags", ["-movflags", "frag_keyframe+faststart"])
        } else {
            builder
        }
    }

    /// Sets the exact frame size (`-s WxH`), ignoring aspect ratio.
    pub fn size(self, width: u32, height: u32) -> Self {
        self.set("s", ["-s".to_string(), format!("{}x{}", width, height)])
    }

    /// Sets the encoder pass number (`-pass`).
    pub fn passes(self, passes: u8) -> Self {
        self.set("pass", ["-pass".to_string(), passes.to_string()])
    }

    /// Sets the display aspect ratio (`-aspect`), e.g. `16:9`.
    pub fn aspect_ratio(self, ratio: impl Display) -> Self {
        self.set("aspect", ["-aspect".to_string(), ratio.to_string()])
    }

    /// Sets a video filter graph (`-vf`), passed through verbatim.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.set("vf", ["-vf".to_string(), filter.into()])
    }

    /// Sets the audio codec (`-acodec`).
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.set("acodec", ["-acodec".to_string(), codec.into()])
    }

    /// Sets the audio sample rate in Hz (`-ar`).
    pub fn sample_rate(self, rate: u32) -> Self {
        self.set("ar", ["-ar".to_string(), rate.to_string()])
    }

    /// Sets the number of audio channels (`-ac`).
    pub fn channels(self, channels: u8) -> Self {
        self.set("ac", ["-ac".to_string(), channels.to_string()])
    }

    /// Sets the audio bitrate (`-ab`), e.g. `128k`.
    pub fn audio_bitrate(self, bitrate: impl Display) -> Self {
        self.set("ab", ["-ab".to_string(), bitrate.to_string()])
    }

    /// Sets an arbitrary option `-key [value]`.
    pub fn custom(self, key: impl Into<String>, value: Option<String>) -> Self {
        let key = key.into();
        let mut args = vec![format!("-{}", key)];
        args.extend(value);
        self.set(key, args)
    }

    /// Captures a single JPEG frame at `time_ms`.
    pub fn capture_frame(self, time_ms: u64) -> Self {
        self.set(
            "ss",
            [
                "-ss".to_string(),
                seek_timestamp(time_ms),
                "-an".to_string(),
                "-r".to_string(),
                "1".to_string(),
                "-vframes".to_string(),
                "1".to_string(),
                "-y".to_string(),
            ],
        )
        .video_codec("mjpeg")
        .format("mjpeg")
    }

    /// Flattens every entry into an argument list.
    pub fn compile(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(_, args)| args.iter().cloned())
            .collect()
    }
}

/// Formats `time_ms` as `H:M:S` with the seconds rounded up.
fn seek_timestamp(time_ms: u64) -> String {
    let mut hours = time_ms / 3_600_000;
    let within_hour = time_ms % 3_600_000;
    let mut minutes = within_hour / 60_000;
    let mut seconds = (within_hour % 60_000).div_ceil(1000);

    if seconds >= 60 {
        seconds -= 60;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        hours += 1;
    }

    format!("{}:{}:{}", hours, minutes, seconds)
}
