pub mod config;
pub mod process_group;
pub mod testing;
pub mod transcode;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use process_group::{KillError, ProcessGroup};
pub use transcode::{
    transcode_segments, AudioProfile, EncoderConfig, FfmpegSegmenter, SegmentNotification,
    SegmentStream, TranscodeConfig, TranscodeError, TranscodeState, Transcoder, VideoProfile,
};
