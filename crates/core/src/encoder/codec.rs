//! Output codecs and containers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video codec of the normalized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputCodec {
    /// H.264 / AVC
    #[default]
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9 (software only)
    Vp9,
    /// Apple ProRes 422
    Prores,
}

impl OutputCodec {
    pub const ALL: [OutputCodec; 4] = [Self::H264, Self::H265, Self::Vp9, Self::Prores];

    /// VideoToolbox encoder for this codec, if one exists.
    pub fn hardware_encoder(&self) -> Option<&'static str> {
        match self {
            Self::H264 => Some("h264_videotoolbox"),
            Self::H265 => Some("hevc_videotoolbox"),
            Self::Prores => Some("prores_videotoolbox"),
            Self::Vp9 => None,
        }
    }

    /// Software encoder used for the quality-targeted initial encode.
    pub fn software_encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Prores => "prores_ks",
        }
    }

    /// Software encoder used for bitrate-targeted two-pass encodes.
    ///
    /// ProRes has no bitrate mode, so it falls back to H.264.
    pub fn two_pass_encoder(&self) -> &'static str {
        match self {
            Self::H264 | Self::Prores => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Vp9 => "vp9",
            Self::Prores => "prores",
        }
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "avc" => Ok(Self::H264),
            "h265" | "hevc" => Ok(Self::H265),
            "vp9" => Ok(Self::Vp9),
            "prores" => Ok(Self::Prores),
            other => Err(format!(
                "unknown codec '{}', expected one of h264, h265, vp9, prores",
                other
            )),
        }
    }
}

/// Container of the normalized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MPEG-4 Part 14 (.mp4)
    #[default]
    Mp4,
    /// QuickTime (.mov)
    Mov,
    /// Matroska (.mkv)
    Mkv,
}

impl OutputFormat {
    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
        }
    }

    /// Whether the container supports moving the index to the front.
    pub fn supports_faststart(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Mov)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "mov" => Ok(Self::Mov),
            "mkv" => Ok(Self::Mkv),
            other => Err(format!(
                "unknown format '{}', expected one of mp4, mov, mkv",
                other
            )),
        }
    }
}
