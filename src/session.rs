use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::chapters::{ChapterId, ChapterStore, NextChapter, ParsedChapter, PlayerDelegate};

/// Player notification waiting to be applied on the editing thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Reset,
    Ready,
    ChaptersParsed {
        chapters: Vec<ParsedChapter>,
        duration: u64,
    },
}

/// Thread-safe handle a player wrapper uses to report media events.
///
/// Events are queued and only reach the store when the owning [`Session`]
/// pumps them.
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerEvents {
    fn send(&self, event: PlayerEvent) {
        if self.sender.send(event).is_err() {
            debug!("Session closed, dropping player event");
        }
    }
}

impl PlayerDelegate for PlayerEvents {
    fn on_reset(&mut self) {
        self.send(PlayerEvent::Reset);
    }

    fn on_ready(&mut self) {
        self.send(PlayerEvent::Ready);
    }

    fn on_chapters_parsed(&mut self, chapters: Vec<ParsedChapter>, duration: u64) {
        self.send(PlayerEvent::ChaptersParsed { chapters, duration });
    }
}

/// Editing state of the open document
///
/// Owns the chapter store. Every change bumps a revision number that
/// observers receive through [`Session::subscribe`].
#[derive(Debug)]
pub struct Session {
    store: ChapterStore,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    revision: watch::Sender<u64>,
}

impl Session {
    pub fn new() -> (Self, PlayerEvents) {
        let (sender, events) = mpsc::unbounded_channel();
        let (revision, _) = watch::channel(0);
        let session = Self {
            store: ChapterStore::new(),
            events,
            revision,
        };
        (session, PlayerEvents { sender })
    }

    pub fn store(&self) -> &ChapterStore {
        &self.store
    }

    /// Receive the revision number after each change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Apply every queued player event; returns how many were applied
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next player event and apply it.
    ///
    /// Returns `None` once every [`PlayerEvents`] handle is dropped.
    pub async fn next_event(&mut self) -> Option<PlayerEvent> {
        let event = self.events.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    fn apply(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Reset => {
                debug!("🔄 Player reset");
                self.store.on_reset();
            }
            PlayerEvent::Ready => {
                info!("▶️ Media ready");
                self.store.on_ready();
            }
            PlayerEvent::ChaptersParsed { chapters, duration } => {
                self.store.on_chapters_parsed(chapters, duration);
            }
        }
        self.bump();
    }

    pub fn add(&mut self, offset: u64) -> ChapterId {
        let id = self.store.add(offset).id();
        self.bump();
        id
    }

    pub fn rename(&mut self, id: ChapterId, name: impl Into<String>) {
        self.store.rename(id, name);
        self.bump();
    }

    pub fn move_to(&mut self, id: ChapterId, offset: u64) {
        self.store.move_to(id, offset);
        self.bump();
    }

    pub fn remove(&mut self, id: ChapterId) {
        self.store.remove(id);
        self.bump();
    }

    pub fn reset(&mut self) {
        self.store.reset();
        self.bump();
    }

    /// Rename `id` and return the chapter to edit next, if any
    pub fn rename_and_advance(&mut self, id: ChapterId, name: impl Into<String>) -> Option<ChapterId> {
        self.rename(id, name);
        match self.store.next(id) {
            NextChapter::Found(next) => Some(next.id()),
            NextChapter::IsLast | NextChapter::UnknownId => None,
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
