use serde::{Deserialize, Serialize};

use crate::transcode::{EncoderConfig, TranscodeConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// The transcode to run
    pub job: TranscodeConfig,
}
