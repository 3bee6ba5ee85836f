//! Finding source videos and creating synthetic samples.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::error::BatchError;
use crate::media::Transcoder;

/// File extensions treated as video sources.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "flv", "wmv", "webm", "m4v", "mpg", "mpeg",
];

/// A discovered source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub filename: String,
    pub path: PathBuf,
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Lists video files directly inside `folder`, sorted by name.
pub async fn discover_videos(folder: &Path) -> Result<Vec<VideoFile>, std::io::Error> {
    let mut entries = tokio::fs::read_dir(folder).await?;
    let mut videos = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_video_file(&path) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        videos.push(VideoFile { filename, path });
    }

    videos.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(videos)
}

/// Resolves `names` against `available`, keeping the requested order.
///
/// Returns every unknown name at once when any is missing.
pub fn select_videos(available: &[VideoFile], names: &[String]) -> Result<Vec<VideoFile>, Vec<String>> {
    let lookup: HashMap<&str, &VideoFile> = available
        .iter()
        .map(|v| (v.filename.as_str(), v))
        .collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|n| !lookup.contains_key(n.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    Ok(names
        .iter()
        .filter_map(|n| lookup.get(n.as_str()).map(|v| (*v).clone()))
        .collect())
}

/// Synthetic clips covering wide, tall, and square sources.
pub const SAMPLE_VIDEOS: &[(&str, u32, u32)] = &[
    ("wide_test_video.mp4", 800, 400),
    ("tall_test_video.mp4", 400, 800),
    ("square_test_video.mp4", 600, 600),
];

const SAMPLE_DURATION_SECS: u32 = 5;

/// Arguments that render a solid-colour clip with a test tone.
pub fn sample_args(output: &Path, width: u32, height: u32, duration_secs: u32) -> Vec<String> {
    vec![
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("color=c=0xB44682:s={}x{}:r=30:d={}", width, height, duration_secs),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("sine=frequency=1000:duration={}", duration_secs),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Writes the sample clips into `folder` and returns those created.
///
/// A clip that fails to render is logged and skipped. A transcoder that
/// cannot be started aborts.
pub async fn generate_samples(
    transcoder: &dyn Transcoder,
    folder: &Path,
) -> Result<Vec<VideoFile>, BatchError> {
    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|source| BatchError::OutputDirectory {
            path: folder.to_path_buf(),
            source,
        })?;

    let mut created = Vec::new();
    for (filename, width, height) in SAMPLE_VIDEOS {
        let path = folder.join(filename);
        let args = sample_args(&path, *width, *height, SAMPLE_DURATION_SECS);
        match transcoder.invoke(&args).await {
            Ok(output) if output.success() => {
                info!(file = %filename, width, height, "Created test video");
                created.push(VideoFile {
                    filename: filename.to_string(),
                    path,
                });
            }
            Ok(output) => {
                warn!(file = %filename, exit_code = ?output.exit_code, "Failed to create test video");
            }
            Err(e) => return Err(BatchError::Tool(e)),
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBehavior, MockTranscoder};

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MP4", "a.mkv", "notes.txt", "c.webm", "cover.png"] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let videos = discover_videos(dir.path()).await.unwrap();
        let names: Vec<_> = videos.iter().map(|v| v.filename.as_str()).collect();
        assert_eq!(names, vec!["a.mkv", "b.MP4", "c.webm"]);
    }

    #[tokio::test]
    async fn test_discover_missing_folder() {
        assert!(discover_videos(Path::new("/nonexistent/input")).await.is_err());
    }

    #[test]
    fn test_select_reports_all_missing() {
        let available = vec![
            VideoFile {
                filename: "a.mp4".to_string(),
                path: PathBuf::from("/in/a.mp4"),
            },
            VideoFile {
                filename: "b.mp4".to_string(),
                path: PathBuf::from("/in/b.mp4"),
            },
        ];

        let picked = select_videos(&available, &["b.mp4".to_string(), "a.mp4".to_string()]).unwrap();
        assert_eq!(picked[0].filename, "b.mp4");

        let missing = select_videos(
            &available,
            &["x.mp4".to_string(), "a.mp4".to_string(), "y.mov".to_string()],
        )
        .unwrap_err();
        assert_eq!(missing, vec!["x.mp4".to_string(), "y.mov".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTranscoder::new();
        mock.set_behavior("tall_test", MockBehavior::Fail { exit_code: 1 }).await;

        let created = generate_samples(&mock, dir.path()).await.unwrap();
        let names: Vec<_> = created.iter().map(|v| v.filename.as_str()).collect();
        assert_eq!(names, vec!["wide_test_video.mp4", "square_test_video.mp4"]);

        let calls = mock.invocations().await;
        assert_eq!(calls.len(), 3);
        assert!(calls[0].contains(&"color=c=0xB44682:s=800x400:r=30:d=5".to_string()));
        assert!(dir.path().join("wide_test_video.mp4").exists());
    }

    #[tokio::test]
    async fn test_generate_samples_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTranscoder::new();
        mock.set_invoke_error(true).await;
        assert!(generate_samples(&mock, dir.path()).await.is_err());
    }
}
