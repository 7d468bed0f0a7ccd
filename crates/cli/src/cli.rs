//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use transcoder_core::ArgumentBuilder;

#[derive(Parser, Debug)]
#[command(
    name = "transcode",
    version,
    about = "Run ffmpeg and report its metadata and progress as JSON lines",
    long_about = None
)]
pub struct Cli {
    /// Input file, or `-` to read from stdin
    pub input: String,

    /// Output file (overwritten). Omit to use only the options given.
    pub output: Option<PathBuf>,

    /// Write the encoded output to stdout; events then go to stderr
    #[arg(long, conflicts_with = "output")]
    pub pipe: bool,

    /// Configuration file
    #[arg(long, env = "TRANSCODER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Kill ffmpeg after this many seconds (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Video codec
    #[arg(long)]
    pub vcodec: Option<String>,

    /// Video bitrate, e.g. 800k
    #[arg(long)]
    pub vbitrate: Option<String>,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Container format
    #[arg(long)]
    pub format: Option<String>,

    /// Frame size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Encoder pass number
    #[arg(long)]
    pub passes: Option<u8>,

    /// Display aspect ratio, e.g. 16:9
    #[arg(long)]
    pub aspect: Option<String>,

    /// Video filter graph, passed through unchanged
    #[arg(long)]
    pub vf: Option<String>,

    /// Audio codec
    #[arg(long)]
    pub acodec: Option<String>,

    /// Audio sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Audio channel count
    #[arg(long)]
    pub channels: Option<u8>,

    /// Audio bitrate, e.g. 128k
    #[arg(long)]
    pub abitrate: Option<String>,

    /// Capture a single JPEG frame at this offset in milliseconds
    #[arg(long, value_name = "MS")]
    pub capture_frame: Option<u64>,

    /// Extra ffmpeg option as KEY or KEY=VALUE (repeatable)
    #[arg(long = "custom", value_name = "KEY[=VALUE]")]
    pub custom: Vec<String>,

    /// Print the ffmpeg arguments as JSON and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,
}

impl Cli {
    /// Translates the encoding options into ffmpeg output arguments.
    pub fn argument_builder(&self) -> ArgumentBuilder {
        let mut args = ArgumentBuilder::new();

        if let Some(ms) = self.capture_frame {
            args = args.capture_frame(ms);
        }
        if let Some(codec) = &self.vcodec {
            args = args.video_codec(codec.as_str());
        }
        if let Some(bitrate) = &self.vbitrate {
            args = args.video_bitrate(bitrate);
        }
        if let Some(fps) = self.fps {
            args = args.fps(fps);
        }
        if let Some(format) = &self.format {
            args = args.format(format.as_str());
        }
        if let Some((width, height)) = self.size {
            args = args.size(width, height);
        }
        if let Some(passes) = self.passes {
            args = args.passes(passes);
        }
        if let Some(aspect) = &self.aspect {
            args = args.aspect_ratio(aspect);
        }
        if let Some(filter) = &self.vf {
            args = args.video_filter(filter.as_str());
        }
        if let Some(codec) = &self.acodec {
            args = args.audio_codec(codec.as_str());
        }
        if let Some(rate) = self.sample_rate {
            args = args.sample_rate(rate);
        }
        if let Some(channels) = self.channels {
            args = args.channels(channels);
        }
        if let Some(bitrate) = &self.abitrate {
            args = args.audio_bitrate(bitrate);
        }
        for custom in &self.custom {
            args = match custom.split_once('=') {
                Some((key, value)) => args.custom(key, Some(value.to_string())),
                None => args.custom(custom.as_str(), None),
            };
        }

        args
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", value))?;
    let width = width
        .parse()
        .map_err(|e| format!("invalid width {:?}: {}", width, e))?;
    let height = height
        .parse()
        .map_err(|e| format!("invalid height {:?}: {}", height, e))?;
    Ok((width, height))
}
