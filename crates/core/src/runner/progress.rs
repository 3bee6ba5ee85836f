//! Progress parsing and terminal rendering.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex_lite::Regex;

/// `time=HH:MM:SS.ff` from ffmpeg's periodic stats line.
static STATS_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})").expect("valid stats time pattern")
});

/// `out_time_ms=<microseconds>` from ffmpeg's `-progress` output.
static PROGRESS_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_ms=(\d+)").expect("valid progress time pattern"));

/// Markers of the closing report ffmpeg prints once it has flushed its output.
const SUMMARY_MARKERS: [&str; 4] = ["video:", "audio:", "subtitle:", "global headers:"];

/// Progress bar resolution (tenths of a percent).
const BAR_LENGTH: u64 = 1000;

/// A position reported by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Media time encoded so far.
    pub elapsed_secs: f64,
}

impl ProgressSample {
    /// Percentage of `total_secs` encoded, capped at 100. Zero when the total
    /// is unknown.
    pub fn percent(&self, total_secs: f64) -> f64 {
        if total_secs > 0.0 {
            (self.elapsed_secs / total_secs * 100.0).min(100.0)
        } else {
            0.0
        }
    }
}

/// Extracts progress from one line of transcoder diagnostics.
pub trait ProgressParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Option<ProgressSample>;

    /// Whether the line belongs to the transcoder's final summary.
    fn is_summary(&self, line: &str) -> bool;
}

/// Parser for ffmpeg's `-stats` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegStatsParser;

impl ProgressParser for FfmpegStatsParser {
    fn parse_line(&self, line: &str) -> Option<ProgressSample> {
        if let Some(caps) = STATS_TIME.captures(line) {
            let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
            let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
            let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
            return Some(ProgressSample {
                elapsed_secs: hours * 3600.0 + minutes * 60.0 + seconds,
            });
        }

        let caps = PROGRESS_TIME.captures(line.trim())?;
        let micros: f64 = caps.get(1)?.as_str().parse().ok()?;
        Some(ProgressSample {
            elapsed_secs: micros / 1_000_000.0,
        })
    }

    fn is_summary(&self, line: &str) -> bool {
        let lower = line.to_ascii_lowercase();
        SUMMARY_MARKERS.iter().any(|marker| lower.contains(marker))
    }
}

/// Formats seconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || seconds.is_nan() {
        return "calculating...".to_string();
    }

    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Where progress bars are drawn.
///
/// Cloning shares the underlying [`MultiProgress`], so bars from parallel
/// workers stack instead of overwriting each other.
#[derive(Debug, Clone, Default)]
pub struct ProgressDisplay {
    multi: Option<MultiProgress>,
}

impl ProgressDisplay {
    /// Draws to the terminal.
    pub fn terminal() -> Self {
        Self {
            multi: Some(MultiProgress::new()),
        }
    }

    /// Draws nothing.
    pub fn hidden() -> Self {
        Self { multi: None }
    }

    /// Runs `f` with the bars cleared, so terminal output lands above them.
    pub fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.multi {
            Some(multi) => multi.suspend(f),
            None => f(),
        }
    }

    /// Starts a bar for one run.
    pub fn start(&self, label: &str, total_secs: f64) -> RunProgress {
        let bar = match &self.multi {
            Some(multi) => multi.add(ProgressBar::new(BAR_LENGTH)),
            None => ProgressBar::hidden(),
        };
        let style = ProgressStyle::with_template("{prefix:30} │ {bar:40} │ {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉░");
        bar.set_style(style);
        bar.set_prefix(truncate_label(label, 30));

        RunProgress {
            bar,
            total_secs,
            last_rendered: None,
        }
    }
}

fn truncate_label(label: &str, width: usize) -> String {
    label.chars().take(width).collect()
}

/// The bar of one in-flight run.
#[derive(Debug)]
pub struct RunProgress {
    bar: ProgressBar,
    total_secs: f64,
    last_rendered: Option<f64>,
}

impl RunProgress {
    /// Redraws if `percent` moved at least `min_delta` since the last draw.
    /// Returns whether a redraw happened.
    pub fn update(&mut self, sample: ProgressSample, percent: f64, min_delta: f64) -> bool {
        if let Some(last) = self.last_rendered {
            if percent - last < min_delta {
                return false;
            }
        }
        self.render(sample.elapsed_secs, percent);
        true
    }

    fn render(&mut self, current_secs: f64, percent: f64) {
        let elapsed = self.bar.elapsed().as_secs_f64();
        let eta = if percent > 0.0 {
            elapsed / (percent / 100.0) - elapsed
        } else {
            -1.0
        };

        self.bar.set_position((percent * 10.0).round() as u64);
        self.bar.set_message(format!(
            "{:5.1}% │ {}/{} │ ETA: {}",
            percent,
            format_duration(current_secs),
            format_duration(self.total_secs),
            format_duration(eta)
        ));
        self.last_rendered = Some(percent);
    }

    /// Shows the bar as complete.
    pub fn complete(&mut self) {
        self.bar.set_position(BAR_LENGTH);
        self.bar.set_message("100.0% │ Complete!");
        self.last_rendered = Some(100.0);
    }

    /// Removes the bar once the run has ended.
    pub fn finish(self) {
        self.bar.finish_and_clear();
    }

    /// Percent last drawn, if any.
    pub fn last_rendered(&self) -> Option<f64> {
        self.last_rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats_line() {
        let parser = FfmpegStatsParser;
        let line = "frame=  240 fps= 60 q=28.0 size=    1024kB time=00:01:02.50 bitrate=1342.2kbits/s speed=2.01x";
        let sample = parser.parse_line(line).unwrap();
        assert!((sample.elapsed_secs - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_progress_key() {
        let parser = FfmpegStatsParser;
        let sample = parser.parse_line("out_time_ms=1500000").unwrap();
        assert!((sample.elapsed_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_unrelated_lines() {
        let parser = FfmpegStatsParser;
        assert!(parser.parse_line("Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':").is_none());
        assert!(parser.parse_line("time=N/A bitrate=N/A").is_none());
        assert!(parser.parse_line("").is_none());
    }

    #[test]
    fn test_summary_markers() {
        let parser = FfmpegStatsParser;
        assert!(parser.is_summary(
            "video:1520kB audio:94kB subtitle:0kB other streams:0kB global headers:0kB muxing overhead: 0.3%"
        ));
        assert!(parser.is_summary("[aac] Audio: qavg: 512.3"));
        assert!(!parser.is_summary("frame=  10 fps=0.0 time=00:00:00.40"));
    }

    #[test]
    fn test_percent() {
        let sample = ProgressSample { elapsed_secs: 30.0 };
        assert_eq!(sample.percent(60.0), 50.0);
        assert_eq!(sample.percent(20.0), 100.0);
        assert_eq!(sample.percent(0.0), 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3.9), "3s");
        assert_eq!(format_duration(123.0), "2m 3s");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
        assert_eq!(format_duration(-1.0), "calculating...");
    }

    #[test]
    fn test_render_delta() {
        let display = ProgressDisplay::hidden();
        let mut progress = display.start("clip.mp4", 100.0);
        let sample = ProgressSample { elapsed_secs: 10.0 };

        assert!(progress.update(sample, 10.0, 0.1));
        assert!(!progress.update(sample, 10.05, 0.1));
        assert!(progress.update(sample, 10.2, 0.1));
        assert_eq!(progress.last_rendered(), Some(10.2));
        progress.finish();
    }

    #[test]
    fn test_suspend_runs_closure() {
        assert_eq!(ProgressDisplay::hidden().suspend(|| 7), 7);

        let display = ProgressDisplay::terminal();
        let progress = display.start("clip.mp4", 10.0);
        assert_eq!(display.suspend(|| "logged"), "logged");
        progress.finish();
    }
}
