//! Host platform and hardware encoder detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::codec::OutputCodec;
use super::config::HardwareConfig;
use crate::media::Transcoder;

/// Hardware encoders probed for on macOS.
const VIDEOTOOLBOX_ENCODERS: [&str; 3] = [
    "h264_videotoolbox",
    "hevc_videotoolbox",
    "prores_videotoolbox",
];

/// What hardware-accelerated encoding the current host offers.
///
/// Built once per run and shared read-only between workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub platform_name: String,
    pub architecture: String,
    pub is_apple_silicon: bool,
    pub hardware_encoders: BTreeSet<String>,
    pub max_hardware_width: u32,
    pub max_hardware_height: u32,
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self::software_only(
            std::env::consts::OS,
            std::env::consts::ARCH,
            &HardwareConfig::default(),
        )
    }
}

impl CapabilitySnapshot {
    /// A snapshot with no hardware encoders.
    pub fn software_only(platform: &str, arch: &str, hardware: &HardwareConfig) -> Self {
        Self {
            platform_name: platform.to_string(),
            architecture: arch.to_string(),
            is_apple_silicon: is_apple_silicon(platform, arch),
            hardware_encoders: BTreeSet::new(),
            max_hardware_width: hardware.max_width,
            max_hardware_height: hardware.max_height,
        }
    }

    /// Detects capabilities of the current host.
    pub async fn detect(transcoder: &dyn Transcoder, hardware: &HardwareConfig) -> Self {
        Self::detect_for_platform(
            std::env::consts::OS,
            std::env::consts::ARCH,
            transcoder,
            hardware,
        )
        .await
    }

    /// Detects capabilities as if running on `platform`/`arch`.
    ///
    /// The encoder list is only probed on macOS. Any probe failure yields a
    /// software-only snapshot.
    pub async fn detect_for_platform(
        platform: &str,
        arch: &str,
        transcoder: &dyn Transcoder,
        hardware: &HardwareConfig,
    ) -> Self {
        let mut snapshot = Self::software_only(platform, arch, hardware);

        if !hardware.enabled {
            debug!("Hardware encoding disabled by configuration");
            return snapshot;
        }
        if platform != "macos" {
            return snapshot;
        }

        let args = vec!["-hide_banner".to_string(), "-encoders".to_string()];
        let stdout = match transcoder.invoke(&args).await {
            Ok(output) if output.success() => output.stdout,
            Ok(output) => {
                debug!(exit_code = ?output.exit_code, "Encoder listing failed, using software encoding");
                return snapshot;
            }
            Err(e) => {
                debug!(error = %e, "Encoder probe unavailable, using software encoding");
                return snapshot;
            }
        };

        snapshot.hardware_encoders = VIDEOTOOLBOX_ENCODERS
            .iter()
            .filter(|name| stdout.contains(*name))
            .map(|name| name.to_string())
            .collect();

        if snapshot.has_hardware_encoder() {
            info!(
                encoders = ?snapshot.hardware_encoders,
                "Hardware acceleration available"
            );
        }

        snapshot
    }

    /// Whether any hardware encoder was found.
    pub fn has_hardware_encoder(&self) -> bool {
        !self.hardware_encoders.is_empty()
    }

    /// Whether the platform exposes the VideoToolbox path at all.
    pub fn hardware_path_available(&self) -> bool {
        self.is_apple_silicon && self.has_hardware_encoder()
    }

    /// Whether a canvas of this size fits the hardware encoder ceiling.
    pub fn fits_hardware(&self, width: u32, height: u32) -> bool {
        width <= self.max_hardware_width && height <= self.max_hardware_height
    }

    /// The hardware encoder to use for `codec` at this canvas size, if any.
    pub fn hardware_encoder_for(
        &self,
        codec: OutputCodec,
        width: u32,
        height: u32,
    ) -> Option<&'static str> {
        if !self.hardware_path_available() || !self.fits_hardware(width, height) {
            return None;
        }
        codec
            .hardware_encoder()
            .filter(|name| self.hardware_encoders.contains(*name))
    }
}

fn is_apple_silicon(platform: &str, arch: &str) -> bool {
    platform == "macos" && arch == "aarch64"
}
