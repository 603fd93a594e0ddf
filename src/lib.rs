/// Easy Chapters - Rust Implementation
///
/// Chapter marker editing for video files. Chapters are read with ffprobe,
/// edited in memory, and written back into the file with an FFmpeg stream copy.

pub mod chapters;
pub mod config;
pub mod player;
pub mod session;
pub mod video;

// Re-export main types for easy access
pub use crate::chapters::{
    Chapter, ChapterId, ChapterStore, ChapterWriter, NextChapter, ParsedChapter, PlayerDelegate,
    SaveError, SaveOutcome,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::player::{Modifier, PlaybackRate, PlayerController, PlayerEngine, ProgressMonitor, SeekSteps};
pub use crate::session::{PlayerEvent, PlayerEvents, Session};
pub use crate::video::{locate_tool, MediaInfo, MediaProbe};
