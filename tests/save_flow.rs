//! Save flow against a stand-in ffmpeg script
#![cfg(unix)]

use easy_chapters::chapters::parse_ffmetadata;
use easy_chapters::{ChapterStore, ChapterWriter, ParsedChapter, SaveError};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a script that copies the media (`$3`) and the chapters file (`$5`)
/// into the output (last argument), then exits with `exit_code`.
fn fake_ffmpeg(dir: &Path, exit_code: i32) -> PathBuf {
    let script = dir.join("fake-ffmpeg");
    let body = format!(
        "#!/bin/sh\n\
         for last in \"$@\"; do :; done\n\
         if [ {code} -ne 0 ]; then echo 'Invalid data found when processing input' >&2; exit {code}; fi\n\
         cat \"$3\" \"$5\" > \"$last\"\n",
        code = exit_code
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn shell_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let script = dir.join(name);
    std::fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn store() -> ChapterStore {
    let mut store = ChapterStore::new();
    store.load(
        vec![
            ParsedChapter::new("Intro", 0, 1000),
            ParsedChapter::new(" Single leg ", 1000, 4000),
        ],
        5000,
    );
    store
}

#[tokio::test]
async fn test_save_replaces_original() {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("takedowns.mp4");
    std::fs::write(&media, "VIDEO\n").unwrap();

    let writer = ChapterWriter::new(fake_ffmpeg(temp_dir.path(), 0));
    let store = store();
    let outcome = writer.save(&media, &store.to_ffmetadata(), store.len()).await.unwrap();

    assert_eq!(outcome.media_path, media);
    assert_eq!(outcome.chapter_count, 2);
    assert_eq!(outcome.user_message(), "Chapters updated successfully!");

    // Original replaced by the tool output, helpers cleaned up
    let rewritten = std::fs::read_to_string(&media).unwrap();
    assert!(rewritten.starts_with("VIDEO\n;FFMETADATA1"));
    assert!(!writer.sidecar_path(&media).exists());
    assert!(!writer.temp_output_path(&media).exists());

    // What the tool received round-trips to the same offsets
    let document = rewritten.trim_start_matches("VIDEO\n");
    let offsets: Vec<u64> = parse_ffmetadata(document).unwrap().iter().map(|c| c.offset).collect();
    let expected: Vec<u64> = store.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, expected);
    assert!(document.ends_with("title=Single leg"));
}

#[tokio::test]
async fn test_tool_failure_keeps_original() {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("escapes.mkv");
    std::fs::write(&media, "VIDEO").unwrap();

    let writer = ChapterWriter::new(fake_ffmpeg(temp_dir.path(), 1)).with_sidecar_suffix("meta");
    let err = writer.save(&media, &store().to_ffmetadata(), 2).await.unwrap_err();

    match &err {
        SaveError::Tool { detail } => assert!(detail.contains("Invalid data found")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.user_message().starts_with("Error while updating output file (error:"));

    assert_eq!(std::fs::read_to_string(&media).unwrap(), "VIDEO");
    assert!(!temp_dir.path().join("escapes.mkv.meta").exists());
    assert!(!writer.temp_output_path(&media).exists());
}

#[tokio::test]
async fn test_missing_original_fails_while_deleting() {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("gone.mp4");

    // The tool "succeeds" even though the input does not exist
    let script = shell_script(temp_dir.path(), "ok-ffmpeg", "for last in \"$@\"; do :; done\n: > \"$last\"\n");

    let writer = ChapterWriter::new(script);
    let err = writer.save(&media, ";FFMETADATA1", 0).await.unwrap_err();

    assert!(matches!(err, SaveError::ReplaceDelete { .. }));
    assert_eq!(err.user_message(), "Error while updating output file (while deleting)");
    assert!(!writer.sidecar_path(&media).exists());
    assert!(!writer.temp_output_path(&media).exists());
}

#[tokio::test]
async fn test_missing_output_fails_while_renaming() {
    let temp_dir = TempDir::new().unwrap();
    let media = temp_dir.path().join("guard-pass.mp4");
    std::fs::write(&media, "VIDEO").unwrap();

    // Exits cleanly without producing the output file
    let script = shell_script(temp_dir.path(), "silent-ffmpeg", "exit 0\n");

    let writer = ChapterWriter::new(script);
    let err = writer.save(&media, &store().to_ffmetadata(), 2).await.unwrap_err();

    match &err {
        SaveError::ReplaceRename { from, to, .. } => {
            assert_eq!(from, &writer.temp_output_path(&media));
            assert_eq!(to, &media);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.user_message(), "Error while updating output file (while renaming)");
    assert!(!writer.sidecar_path(&media).exists());
}
