use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chapters::ParsedChapter;

/// Install locations checked when a tool is not on PATH
const COMMON_TOOL_DIRS: [&str; 4] = ["/opt/homebrew/bin", "/opt/local/bin", "/usr/local/bin", "/usr/bin"];

/// Media information relevant to chapter editing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub filename: String,
    /// Total duration in milliseconds
    pub duration: u64,
    pub format: String,
    pub chapters: Vec<ParsedChapter>,
}

/// Reads duration and chapters of a media file with ffprobe
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
}

impl MediaProbe {
    pub fn new(ffprobe: PathBuf) -> Self {
        Self { ffprobe }
    }

    /// Probe a media file
    pub async fn probe(&self, media_path: &Path) -> Result<MediaInfo> {
        if !media_path.exists() {
            return Err(anyhow!("Media file not found: {}", media_path.display()));
        }

        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_chapters"])
            .arg(media_path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe.display()))?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", media_path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info = parse_ffprobe_json(media_path, &json_str)?;

        info!(
            "📹 Probed {}: {} chapters, {:.1}s, {}",
            info.filename,
            info.chapters.len(),
            info.duration as f64 / 1000.0,
            info.format
        );

        Ok(info)
    }
}

/// Build `MediaInfo` from `ffprobe -show_format -show_chapters` JSON output
pub fn parse_ffprobe_json(media_path: &Path, json_str: &str) -> Result<MediaInfo> {
    let ffprobe_data: serde_json::Value = serde_json::from_str(json_str)?;
    let format = &ffprobe_data["format"];

    let duration = format["duration"]
        .as_str()
        .and_then(seconds_to_millis)
        .unwrap_or(0);

    let chapters = ffprobe_data["chapters"]
        .as_array()
        .map(|chapters| {
            chapters
                .iter()
                .enumerate()
                .filter_map(|(index, chapter)| {
                    let start = chapter["start_time"].as_str().and_then(seconds_to_millis)?;
                    let end = chapter["end_time"]
                        .as_str()
                        .and_then(seconds_to_millis)
                        .unwrap_or(start);
                    let name = chapter["tags"]["title"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Chapter {}", index + 1));
                    Some(ParsedChapter::new(name, start, end.saturating_sub(start)))
                })
                .collect()
        })
        .unwrap_or_default();

    debug!("Parsed ffprobe output for {}", media_path.display());

    Ok(MediaInfo {
        path: media_path.to_path_buf(),
        filename: media_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default(),
        duration,
        format: format["format_name"].as_str().unwrap_or("unknown").to_string(),
        chapters,
    })
}

/// "12.345000" → 12345
fn seconds_to_millis(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

/// Find an external tool: configured path first, then PATH, then common install dirs
pub fn locate_tool(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = which::which(name) {
        debug!("🔎 Found {} on PATH: {}", name, path.display());
        return Some(path);
    }

    COMMON_TOOL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chapters": [
            {"id": 0, "time_base": "1/1000", "start": 0, "start_time": "0.000000",
             "end": 65000, "end_time": "65.000000", "tags": {"title": "Introduction"}},
            {"id": 1, "time_base": "1/1000", "start": 65000, "start_time": "65.000000",
             "end": 190500, "end_time": "190.500000", "tags": {"title": "Grips"}},
            {"id": 2, "time_base": "1/1000", "start": 190500, "start_time": "190.500000",
             "end": 300000, "end_time": "300.000000"}
        ],
        "format": {
            "filename": "/videos/guard.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "300.021333"
        }
    }"#;

    #[test]
    fn test_parse_ffprobe_json() {
        let info = parse_ffprobe_json(Path::new("/videos/guard.mp4"), SAMPLE).unwrap();

        assert_eq!(info.filename, "guard.mp4");
        assert_eq!(info.duration, 300_021);
        assert_eq!(info.format, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(
            info.chapters,
            vec![
                ParsedChapter::new("Introduction", 0, 65_000),
                ParsedChapter::new("Grips", 65_000, 125_500),
                ParsedChapter::new("Chapter 3", 190_500, 109_500),
            ]
        );
    }

    #[test]
    fn test_parse_ffprobe_json_without_chapters() {
        let info = parse_ffprobe_json(Path::new("a.mkv"), r#"{"format": {"duration": "1.5"}}"#).unwrap();
        assert!(info.chapters.is_empty());
        assert_eq!(info.duration, 1500);
        assert_eq!(info.format, "unknown");
    }

    #[test]
    fn test_parse_ffprobe_json_rejects_garbage() {
        assert!(parse_ffprobe_json(Path::new("a.mkv"), "not json").is_err());
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis("0.000000"), Some(0));
        assert_eq!(seconds_to_millis("12.3456"), Some(12_346));
        assert_eq!(seconds_to_millis("-1"), None);
        assert_eq!(seconds_to_millis("n/a"), None);
    }

    #[test]
    fn test_locate_tool_prefers_configured() {
        let configured = Path::new("/custom/ffmpeg");
        assert_eq!(locate_tool("ffmpeg", Some(configured)), Some(configured.to_path_buf()));
        assert_eq!(locate_tool("definitely-not-a-real-tool-xyz", None), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let probe = MediaProbe::new(PathBuf::from("ffprobe"));
        assert!(probe.probe(Path::new("/nonexistent/clip.mp4")).await.is_err());
    }
}
