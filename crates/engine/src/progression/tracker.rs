use tracing::info;

use super::resolver::SceneTransitionResolver;
use super::store::ProgressionStore;
use crate::scene::{LoadTicket, SceneLoader};

pub const MIN_CHAPTER: u32 = 1;
pub const MAX_CHAPTER: u32 = 4;

pub fn clamp_chapter(chapter: i64) -> u32 {
    chapter.clamp(i64::from(MIN_CHAPTER), i64::from(MAX_CHAPTER)) as u32
}

/// Case-insensitive search for `chapter1`..`chapter4` in the scene name.
pub fn derive_chapter_from_scene(scene_id: &str) -> u32 {
    let lowered = scene_id.to_ascii_lowercase();
    (MIN_CHAPTER..=MAX_CHAPTER)
        .find(|chapter| lowered.contains(&format!("chapter{chapter}")))
        .unwrap_or(MIN_CHAPTER)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionTracker {
    current_chapter: u32,
    current_checkpoint_id: String,
}

impl Default for ProgressionTracker {
    fn default() -> Self {
        Self {
            current_chapter: MIN_CHAPTER,
            current_checkpoint_id: String::new(),
        }
    }
}

impl ProgressionTracker {
    pub fn current_chapter(&self) -> u32 {
        self.current_chapter
    }

    pub fn set_current_chapter(&mut self, chapter: i64) -> u32 {
        self.current_chapter = clamp_chapter(chapter);
        self.current_chapter
    }

    pub fn current_checkpoint_id(&self) -> &str {
        &self.current_checkpoint_id
    }

    /// Forwards to the store and mirrors the id locally. An empty id is
    /// ignored on both sides, matching `ProgressionStore::save_checkpoint`.
    pub fn set_checkpoint(&mut self, store: &mut ProgressionStore, checkpoint_id: &str) {
        store.save_checkpoint(checkpoint_id);
        if !checkpoint_id.is_empty() {
            self.current_checkpoint_id = checkpoint_id.to_string();
        }
    }

    /// Forgets the mirrored checkpoint, for use after the store is reset.
    pub fn clear_checkpoint(&mut self) {
        self.current_checkpoint_id.clear();
    }

    /// Chapter bookkeeping after a scene finished loading: the scene name
    /// decides the current chapter, which is then unlocked for good.
    pub fn on_scene_entered(&mut self, scene_id: &str, store: &mut ProgressionStore) -> u32 {
        let chapter = self.set_current_chapter(i64::from(derive_chapter_from_scene(scene_id)));
        store.unlock_chapter(chapter);
        info!(scene = %scene_id, chapter, "chapter_entered");
        chapter
    }

    pub fn on_player_death(
        &self,
        resolver: &mut SceneTransitionResolver,
        store: &mut ProgressionStore,
        loader: &mut SceneLoader,
        active_scene_id: Option<&str>,
    ) -> Option<LoadTicket> {
        info!(
            chapter = self.current_chapter,
            checkpoint = %store.load_checkpoint(),
            "player_died_respawning"
        );
        resolver.resume_at_last_checkpoint(store, loader, active_scene_id)
    }
}
