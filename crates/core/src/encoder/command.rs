//! Assembles transcoder argument lists.

use std::path::Path;
use tracing::{info, warn};

use super::capabilities::CapabilitySnapshot;
use super::codec::{OutputCodec, OutputFormat};
use super::config::EncodeSettings;
use crate::geometry::GeometryPlan;

/// Null sink for the analysis pass.
#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

/// Files feeding the spotlight filter graph.
#[derive(Debug, Clone, Copy)]
pub struct SpotlightInputs<'a> {
    pub source: &'a Path,
    pub mask: &'a Path,
    pub border: &'a Path,
}

/// A single transcoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeCommand {
    pub args: Vec<String>,
    /// Video encoder selected for this command.
    pub encoder: String,
    pub hardware: bool,
}

/// Analysis and final pass of a bitrate-targeted encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoPassCommand {
    pub analysis: Vec<String>,
    pub encode: Vec<String>,
    pub encoder: String,
    pub bitrate_kbps: u32,
}

/// Builds the filter graph that crops, rounds, borders, and pads one source.
///
/// Input 0 is the source, input 1 the mask, input 2 the border.
pub fn filter_graph(plan: &GeometryPlan) -> String {
    format!(
        "[0:v]crop={cw}:{ch}:{cx}:{cy}[cropped];\
         [1:v]format=rgba[mask];\
         [cropped][mask]alphamerge[rounded];\
         [2:v]format=rgba[border];\
         [border][rounded]overlay={b}:{b}:shortest=1[bordered];\
         color=c=black:s={w}x{h}[bg];\
         [bg][bordered]overlay={px}:{py}:shortest=1,format=yuv420p[final]",
        cw = plan.crop_width,
        ch = plan.crop_height,
        cx = plan.crop_x,
        cy = plan.crop_y,
        b = plan.border_thickness,
        w = plan.canvas_width,
        h = plan.canvas_height,
        px = plan.paste_x,
        py = plan.paste_y,
    )
}

/// Codec arguments for the quality-targeted initial encode.
fn video_codec_args(codec: OutputCodec, hardware: bool) -> Vec<&'static str> {
    match (codec, hardware) {
        (OutputCodec::H264, true) => vec![
            "-c:v", "h264_videotoolbox", "-b:v", "3M", "-profile:v", "main", "-allow_sw", "1",
        ],
        (OutputCodec::H265, true) => vec![
            "-c:v", "hevc_videotoolbox", "-b:v", "3M", "-maxrate", "4M", "-bufsize", "6M",
            "-profile:v", "main", "-tag:v", "hvc1", "-allow_sw", "1",
        ],
        (OutputCodec::Prores, true) => vec![
            "-c:v", "prores_videotoolbox", "-profile:v", "2", "-vendor", "apl0",
        ],
        (OutputCodec::H264, false) => vec![
            "-c:v", "libx264", "-preset", "medium", "-crf", "18", "-profile:v", "high",
            "-level", "4.1",
        ],
        (OutputCodec::H265, false) => vec![
            "-c:v", "libx265", "-preset", "medium", "-crf", "20", "-tag:v", "hvc1",
        ],
        (OutputCodec::Prores, false) => vec!["-c:v", "prores_ks", "-profile:v", "2"],
        (OutputCodec::Vp9, _) => vec!["-c:v", "libvpx-vp9", "-crf", "31", "-b:v", "0"],
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn container_args(format: OutputFormat) -> Vec<String> {
    if format.supports_faststart() {
        vec!["-movflags".to_string(), "+faststart".to_string()]
    } else {
        Vec::new()
    }
}

/// Builds transcoder invocations for one run's settings and host.
#[derive(Debug, Clone, Copy)]
pub struct EncodeCommandBuilder<'a> {
    settings: &'a EncodeSettings,
    capabilities: &'a CapabilitySnapshot,
}

impl<'a> EncodeCommandBuilder<'a> {
    pub fn new(settings: &'a EncodeSettings, capabilities: &'a CapabilitySnapshot) -> Self {
        Self {
            settings,
            capabilities,
        }
    }

    /// Picks the hardware encoder when the host, codec, and canvas all allow it.
    fn select_hardware(&self, plan: &GeometryPlan) -> Option<&'static str> {
        let codec = self.settings.codec;
        let caps = self.capabilities;
        let selected = caps.hardware_encoder_for(codec, plan.canvas_width, plan.canvas_height);

        if selected.is_none() && caps.hardware_path_available() {
            if !caps.fits_hardware(plan.canvas_width, plan.canvas_height) {
                warn!(
                    width = plan.canvas_width,
                    height = plan.canvas_height,
                    max_width = caps.max_hardware_width,
                    max_height = caps.max_hardware_height,
                    "Output exceeds hardware encoder limits, using software encoding"
                );
            } else {
                warn!(
                    codec = %codec,
                    "Hardware acceleration not available for codec, using software encoding"
                );
            }
        }
        selected
    }

    /// Builds the initial spotlight encode.
    ///
    /// `duration_secs` caps the output so the looped stencil inputs cannot
    /// extend it. A non-positive duration leaves the output uncapped.
    pub fn spotlight(
        &self,
        plan: &GeometryPlan,
        inputs: SpotlightInputs<'_>,
        output: &Path,
        duration_secs: f64,
    ) -> EncodeCommand {
        let hardware_encoder = self.select_hardware(plan);
        let hardware = hardware_encoder.is_some();
        let codec_args = video_codec_args(self.settings.codec, hardware);
        let encoder = codec_args[1].to_string();

        if hardware {
            info!(encoder = %encoder, "Using hardware acceleration");
        } else {
            info!(encoder = %encoder, "Using software encoding");
        }

        let mut args = vec![
            "-i".to_string(),
            path_arg(inputs.source),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            path_arg(inputs.mask),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            path_arg(inputs.border),
            "-filter_complex".to_string(),
            filter_graph(plan),
            "-map".to_string(),
            "[final]".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
        ];

        if duration_secs > 0.0 {
            args.extend(["-t".to_string(), duration_secs.to_string()]);
        }

        args.extend(codec_args.iter().map(|s| s.to_string()));
        args.extend(container_args(self.settings.format));

        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.settings.audio_bitrate_kbps),
            "-ar".to_string(),
            self.settings.audio_sample_rate_hz.to_string(),
            "-stats".to_string(),
            "-y".to_string(),
            path_arg(output),
        ]);

        EncodeCommand {
            args,
            encoder,
            hardware,
        }
    }

    /// Builds a software two-pass encode of `input` at `bitrate_kbps`.
    ///
    /// Pass statistics are written next to `passlog_prefix`.
    pub fn two_pass(
        &self,
        input: &Path,
        output: &Path,
        passlog_prefix: &Path,
        bitrate_kbps: u32,
        audio_bitrate_kbps: u32,
    ) -> TwoPassCommand {
        let encoder = self.settings.codec.two_pass_encoder();
        let bitrate = bitrate_kbps as f64;

        let rate_args = |pass: u8| -> Vec<String> {
            let mut args = vec![
                "-i".to_string(),
                path_arg(input),
                "-c:v".to_string(),
                encoder.to_string(),
                "-b:v".to_string(),
                format!("{}k", bitrate_kbps),
                "-maxrate".to_string(),
                format!("{}k", (bitrate * 1.2) as u32),
                "-bufsize".to_string(),
                format!("{}k", (bitrate * 2.0) as u32),
            ];
            if encoder == "libvpx-vp9" {
                args.extend(["-deadline".to_string(), "good".to_string()]);
            } else {
                args.extend(["-preset".to_string(), "slow".to_string()]);
            }
            if encoder == "libx265" {
                args.extend([
                    "-x265-params".to_string(),
                    format!("pass={}:stats={}.log", pass, passlog_prefix.to_string_lossy()),
                ]);
            } else {
                args.extend([
                    "-pass".to_string(),
                    pass.to_string(),
                    "-passlogfile".to_string(),
                    path_arg(passlog_prefix),
                ]);
            }
            args
        };

        let mut analysis = rate_args(1);
        analysis.extend([
            "-an".to_string(),
            "-stats".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-y".to_string(),
            NULL_DEVICE.to_string(),
        ]);

        let mut encode = rate_args(2);
        encode.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", audio_bitrate_kbps),
        ]);
        encode.extend(container_args(self.settings.format));
        encode.extend(["-stats".to_string(), "-y".to_string(), path_arg(output)]);

        TwoPassCommand {
            analysis,
            encode,
            encoder: encoder.to_string(),
            bitrate_kbps,
        }
    }
}
