/// Chapter model and editing
///
/// This module holds the in-memory chapter store for the loaded media, the
/// FFMETADATA reader/writer used to hand chapters to FFmpeg, and the save flow
/// that rewrites the media file with the edited chapters.

pub mod store;
pub mod metadata;
pub mod timecode;
pub mod writer;

// Re-export main types
pub use store::{ChapterStore, PlayerDelegate};
pub use metadata::{parse_ffmetadata, to_ffmetadata, MetadataError};
pub use timecode::{format_offset, parse_offset, TimecodeError};
pub use writer::{ChapterWriter, SaveError, SaveOutcome};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Stable identifier of a chapter, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterId(Uuid);

impl ChapterId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named marker on the media timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    /// Display name, edited freely by the user
    pub name: String,
    /// Start offset in milliseconds from the beginning of the media
    pub offset: u64,
}

impl Chapter {
    /// Create a chapter with a newly generated identifier
    pub fn new(name: impl Into<String>, offset: u64) -> Self {
        Self {
            id: ChapterId::new(),
            name: name.into(),
            offset,
        }
    }

    pub fn id(&self) -> ChapterId {
        self.id
    }

    /// Offset rendered as `HH:MM:SS.mmm`
    pub fn offset_formatted(&self) -> String {
        format_offset(self.offset)
    }
}

// Identity only: two chapters with the same name and offset are still distinct.
impl PartialEq for Chapter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Chapter {}

impl Hash for Chapter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Chapter as reported by a media probe or read from an FFMETADATA document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedChapter {
    /// Chapter title
    pub name: String,
    /// Start offset in milliseconds
    pub offset: u64,
    /// Length in milliseconds; not kept once the chapter enters a store
    pub duration: u64,
}

impl ParsedChapter {
    pub fn new(name: impl Into<String>, offset: u64, duration: u64) -> Self {
        Self {
            name: name.into(),
            offset,
            duration,
        }
    }
}

/// Result of asking for the chapter that follows another one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextChapter<'a> {
    /// The following chapter in offset order
    Found(&'a Chapter),
    /// The given chapter is the last one
    IsLast,
    /// No chapter with the given identifier exists
    UnknownId,
}

impl<'a> NextChapter<'a> {
    /// Collapse both "none" outcomes into `None`
    pub fn chapter(self) -> Option<&'a Chapter> {
        match self {
            NextChapter::Found(chapter) => Some(chapter),
            NextChapter::IsLast | NextChapter::UnknownId => None,
        }
    }
}
