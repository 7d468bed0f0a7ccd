pub mod config;
pub mod metrics;
pub mod parser;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config,
    ConfigError, LoggingConfig,
};
pub use parser::{
    Metadata, ParseError, ParserEvent, ParserSession, ProgressSnapshot, SectionInfo, StreamInfo,
};
pub use transcoder::{
    ArgumentBuilder, Source, TranscodeEvent, TranscodeHandle, Transcoder, TranscoderConfig,
    TranscoderError,
};
