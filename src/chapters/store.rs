/// In-memory chapter list for the loaded media
use super::{metadata, Chapter, ChapterId, NextChapter, ParsedChapter};
use tracing::{debug, info};

/// Callbacks a playback engine issues while loading media
pub trait PlayerDelegate {
    /// Media is being replaced; previous chapters are void
    fn on_reset(&mut self);

    /// Media is playable
    fn on_ready(&mut self);

    /// Chapters were read from the media
    fn on_chapters_parsed(&mut self, chapters: Vec<ParsedChapter>, duration: u64);
}

/// Ordered chapters of one media file, kept sorted by start offset
#[derive(Debug, Clone, Default)]
pub struct ChapterStore {
    chapters: Vec<Chapter>,
    /// Total media duration in milliseconds
    duration: u64,
    ready: bool,
}

impl ChapterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with chapters read from the media
    pub fn load(&mut self, parsed: Vec<ParsedChapter>, duration: u64) {
        self.chapters = parsed
            .into_iter()
            .map(|chapter| Chapter::new(chapter.name, chapter.offset))
            .collect();
        self.chapters.sort_by_key(|chapter| chapter.offset);
        self.duration = duration;
        info!("📚 Loaded {} chapters ({} ms of media)", self.chapters.len(), duration);
    }

    /// Clear all chapters and mark the store as not ready
    pub fn reset(&mut self) {
        self.chapters.clear();
        self.duration = 0;
        self.ready = false;
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }

    /// Chapter at a one-based position, as shown in listings
    pub fn get(&self, position: usize) -> Option<&Chapter> {
        position.checked_sub(1).and_then(|index| self.chapters.get(index))
    }

    /// Find a chapter by identifier
    pub fn lookup(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id() == id)
    }

    /// Chapter following `id` in offset order
    pub fn next(&self, id: ChapterId) -> NextChapter<'_> {
        match self.position_of(id) {
            None => NextChapter::UnknownId,
            Some(index) => match self.chapters.get(index + 1) {
                Some(chapter) => NextChapter::Found(chapter),
                None => NextChapter::IsLast,
            },
        }
    }

    /// Chapter playing at `position`: the last one starting at or before it
    pub fn current(&self, position: u64) -> Option<&Chapter> {
        self.chapters
            .iter()
            .take_while(|chapter| chapter.offset <= position)
            .last()
    }

    /// Insert a placeholder chapter at `offset`.
    ///
    /// The chapter goes before the first chapter with a strictly greater
    /// offset, so it lands after any chapters sharing the same offset.
    pub fn add(&mut self, offset: u64) -> &Chapter {
        let index = self
            .chapters
            .iter()
            .position(|chapter| chapter.offset > offset)
            .unwrap_or(self.chapters.len());

        let chapter = Chapter::new(format!("Chapter {}", index + 1), offset);
        debug!("➕ Adding {} at {} ms", chapter.name, offset);
        self.chapters.insert(index, chapter);
        &self.chapters[index]
    }

    /// Change the display name; unknown identifiers are ignored
    pub fn rename(&mut self, id: ChapterId, name: impl Into<String>) {
        if let Some(chapter) = self.chapters.iter_mut().find(|chapter| chapter.id() == id) {
            chapter.name = name.into();
        }
    }

    /// Change the start offset and restore ordering; unknown identifiers are ignored
    pub fn move_to(&mut self, id: ChapterId, offset: u64) {
        if let Some(chapter) = self.chapters.iter_mut().find(|chapter| chapter.id() == id) {
            chapter.offset = offset;
            // Vec::sort_by_key is stable, equal offsets keep their relative order
            self.chapters.sort_by_key(|chapter| chapter.offset);
        }
    }

    /// Delete a chapter; unknown identifiers are ignored
    pub fn remove(&mut self, id: ChapterId) {
        self.chapters.retain(|chapter| chapter.id() != id);
    }

    /// FFMETADATA document for the current chapters
    pub fn to_ffmetadata(&self) -> String {
        metadata::to_ffmetadata(&self.chapters, self.duration)
    }

    fn position_of(&self, id: ChapterId) -> Option<usize> {
        self.chapters.iter().position(|chapter| chapter.id() == id)
    }
}

impl PlayerDelegate for ChapterStore {
    fn on_reset(&mut self) {
        self.reset();
    }

    fn on_ready(&mut self) {
        self.mark_ready();
    }

    fn on_chapters_parsed(&mut self, chapters: Vec<ParsedChapter>, duration: u64) {
        self.load(chapters, duration);
    }
}
