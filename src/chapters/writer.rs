/// Writes edited chapters back into a media file through FFmpeg
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of stderr lines kept when FFmpeg fails
const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to write chapters file {path}: {source}")]
    WriteChapters {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg failed: {detail}")]
    Tool { detail: String },

    #[error("Failed to delete original file {path}: {source}")]
    ReplaceDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    ReplaceRename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SaveError {
    /// Message shown to the user for this failure point
    pub fn user_message(&self) -> String {
        match self {
            SaveError::WriteChapters { .. } => "Error while writing chapters file".to_string(),
            SaveError::Tool { detail } => format!("Error while updating output file (error: {})", detail),
            SaveError::ReplaceDelete { .. } => "Error while updating output file (while deleting)".to_string(),
            SaveError::ReplaceRename { .. } => "Error while updating output file (while renaming)".to_string(),
        }
    }
}

/// Successful save summary
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub media_path: PathBuf,
    pub chapter_count: usize,
    pub elapsed: Duration,
}

impl SaveOutcome {
    pub fn user_message(&self) -> &'static str {
        "Chapters updated successfully!"
    }
}

/// Save flow: sidecar file, FFmpeg stream copy, then swap the result into place
#[derive(Debug, Clone)]
pub struct ChapterWriter {
    ffmpeg: PathBuf,
    sidecar_suffix: String,
    temp_infix: String,
}

impl ChapterWriter {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            sidecar_suffix: "chapters".to_string(),
            temp_infix: "tmp".to_string(),
        }
    }

    pub fn with_sidecar_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.sidecar_suffix = suffix.into();
        self
    }

    pub fn with_temp_infix(mut self, infix: impl Into<String>) -> Self {
        self.temp_infix = infix.into();
        self
    }

    /// `movie.mp4` → `movie.mp4.chapters`
    pub fn sidecar_path(&self, media: &Path) -> PathBuf {
        let mut name = media.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.sidecar_suffix);
        PathBuf::from(name)
    }

    /// `movie.mp4` → `movie.tmp.mp4`; the extension tells FFmpeg which muxer to use
    pub fn temp_output_path(&self, media: &Path) -> PathBuf {
        let stem = media.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let name = match media.extension() {
            Some(ext) => format!("{}.{}.{}", stem, self.temp_infix, ext.to_string_lossy()),
            None => format!("{}.{}", stem, self.temp_infix),
        };
        media.with_file_name(name)
    }

    /// Arguments passed to FFmpeg for one save
    pub fn ffmpeg_args(&self, media: &Path, sidecar: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            media.to_string_lossy().to_string(),
            "-i".to_string(),
            sidecar.to_string_lossy().to_string(),
            "-map_metadata".to_string(),
            "1".to_string(),
            "-map_chapters".to_string(),
            "1".to_string(),
            "-codec".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Rewrite `media` with the chapters in `document`.
    ///
    /// The sidecar is removed whatever happens. The original file is only
    /// touched once FFmpeg has produced the new one.
    pub async fn save(&self, media: &Path, document: &str, chapter_count: usize) -> Result<SaveOutcome, SaveError> {
        let start = Instant::now();
        let sidecar = self.sidecar_path(media);
        let output = self.temp_output_path(media);

        info!("💾 Writing {} chapters to {}", chapter_count, media.display());

        if let Err(source) = tokio::fs::write(&sidecar, document).await {
            remove_if_exists(&sidecar).await;
            return Err(SaveError::WriteChapters { path: sidecar, source });
        }
        debug!("📝 Chapters file written: {}", sidecar.display());

        let result = self.run_ffmpeg(media, &sidecar, &output).await;
        remove_if_exists(&sidecar).await;

        if let Err(e) = result {
            remove_if_exists(&output).await;
            return Err(e);
        }

        if let Err(source) = tokio::fs::remove_file(media).await {
            // Original still in place, the new file is of no use
            remove_if_exists(&output).await;
            return Err(SaveError::ReplaceDelete { path: media.to_path_buf(), source });
        }

        if let Err(source) = tokio::fs::rename(&output, media).await {
            return Err(SaveError::ReplaceRename {
                from: output,
                to: media.to_path_buf(),
                source,
            });
        }

        let elapsed = start.elapsed();
        info!("✅ Chapters updated in {:.2}s: {}", elapsed.as_secs_f64(), media.display());

        Ok(SaveOutcome {
            media_path: media.to_path_buf(),
            chapter_count,
            elapsed,
        })
    }

    async fn run_ffmpeg(&self, media: &Path, sidecar: &Path, output: &Path) -> Result<(), SaveError> {
        let args = self.ffmpeg_args(media, sidecar, output);
        debug!("🎬 {} {}", self.ffmpeg.display(), args.join(" "));

        let result = tokio::process::Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SaveError::Tool {
                detail: format!("cannot run {}: {}", self.ffmpeg.display(), e),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = stderr_tail(&stderr);
            warn!("FFmpeg exited with {}: {}", result.status, tail);
            return Err(SaveError::Tool {
                detail: format!("{} ({})", result.status, tail),
            });
        }

        Ok(())
    }
}

/// Last few non-empty lines of FFmpeg's stderr
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join(" | ")
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("🗑️ Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_and_temp_paths() {
        let writer = ChapterWriter::new(PathBuf::from("ffmpeg"));
        let media = Path::new("/videos/Armbars Vol 1.mkv");

        assert_eq!(writer.sidecar_path(media), PathBuf::from("/videos/Armbars Vol 1.mkv.chapters"));
        assert_eq!(writer.temp_output_path(media), PathBuf::from("/videos/Armbars Vol 1.tmp.mkv"));

        let custom = writer.with_sidecar_suffix("ffmeta").with_temp_infix("edit");
        assert_eq!(custom.sidecar_path(media), PathBuf::from("/videos/Armbars Vol 1.mkv.ffmeta"));
        assert_eq!(custom.temp_output_path(media), PathBuf::from("/videos/Armbars Vol 1.edit.mkv"));
    }

    #[test]
    fn test_temp_path_without_extension() {
        let writer = ChapterWriter::new(PathBuf::from("ffmpeg"));
        assert_eq!(writer.temp_output_path(Path::new("/tmp/movie")), PathBuf::from("/tmp/movie.tmp"));
    }

    #[test]
    fn test_ffmpeg_args() {
        let writer = ChapterWriter::new(PathBuf::from("ffmpeg"));
        let args = writer.ffmpeg_args(Path::new("in.mp4"), Path::new("in.mp4.chapters"), Path::new("in.tmp.mp4"));
        assert_eq!(
            args,
            vec![
                "-y", "-i", "in.mp4", "-i", "in.mp4.chapters", "-map_metadata", "1",
                "-map_chapters", "1", "-codec", "copy", "in.tmp.mp4",
            ]
        );
    }

    #[test]
    fn test_user_messages() {
        let io = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");

        let write = SaveError::WriteChapters { path: PathBuf::from("x"), source: io() };
        assert_eq!(write.user_message(), "Error while writing chapters file");

        let delete = SaveError::ReplaceDelete { path: PathBuf::from("x"), source: io() };
        assert_eq!(delete.user_message(), "Error while updating output file (while deleting)");

        let rename = SaveError::ReplaceRename { from: PathBuf::from("a"), to: PathBuf::from("b"), source: io() };
        assert_eq!(rename.user_message(), "Error while updating output file (while renaming)");

        let tool = SaveError::Tool { detail: "boom".to_string() };
        assert_eq!(tool.user_message(), "Error while updating output file (error: boom)");
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = (1..=12).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n\n");
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 5"));
        assert!(tail.ends_with("line 12"));
    }

    #[tokio::test]
    async fn test_missing_tool_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("clip.mp4");
        tokio::fs::write(&media, b"video").await.unwrap();

        let writer = ChapterWriter::new(dir.path().join("no-such-ffmpeg"));
        let err = writer.save(&media, ";FFMETADATA1", 0).await.unwrap_err();

        assert!(matches!(err, SaveError::Tool { .. }));
        assert!(media.exists());
        assert!(!writer.sidecar_path(&media).exists());
    }

    #[tokio::test]
    async fn test_unwritable_sidecar() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("missing-dir").join("clip.mp4");

        let writer = ChapterWriter::new(PathBuf::from("ffmpeg"));
        let err = writer.save(&media, ";FFMETADATA1", 0).await.unwrap_err();
        assert!(matches!(err, SaveError::WriteChapters { .. }));
    }
}
