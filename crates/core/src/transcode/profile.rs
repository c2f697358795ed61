//! Pixel format classification for picking the H.264 profile.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::types::PixelFormat;

/// Pixel formats sampled at 4:2:2 chroma.
static HIGH_CHROMA_FORMATS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Planar
        "yuv422p",
        "yuv422p9le",
        "yuv422p9be",
        "yuv422p10le",
        "yuv422p10be",
        "yuv422p12le",
        "yuv422p12be",
        "yuv422p14le",
        "yuv422p14be",
        "yuv422p16le",
        "yuv422p16be",
        // Packed
        "yuyv422",
        "uyvy422",
        // JPEG range
        "yuvj422p",
        // With alpha
        "yuva422p",
        "yuva422p9le",
        "yuva422p9be",
        "yuva422p10le",
        "yuva422p10be",
        "yuva422p12le",
        "yuva422p12be",
        "yuva422p16le",
        "yuva422p16be",
        // Professional / broadcast packed
        "v210",
        "v216",
        // Semi-planar
        "p210le",
        "p210be",
        "p216le",
        "p216be",
    ]
    .into_iter()
    .collect()
});

/// Whether the pixel format needs the 4:2:2 profile variant.
pub fn is_high_chroma(format: &PixelFormat) -> bool {
    HIGH_CHROMA_FORMATS.contains(format.as_str())
}

/// H.264 profile variant passed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum H264Profile {
    #[default]
    High,
    High422,
}

impl H264Profile {
    /// Picks the variant for a probed pixel format.
    pub fn for_format(format: &PixelFormat) -> Self {
        if is_high_chroma(format) {
            Self::High422
        } else {
            Self::High
        }
    }

    /// Value for `-profile:v`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::High422 => "high422",
        }
    }
}
