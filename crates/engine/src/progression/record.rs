use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::tracker::MIN_CHAPTER;

/// Everything that survives a restart. Missing fields decode to their
/// defaults so older or hand-edited save files still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionRecord {
    pub last_scene: String,
    pub last_checkpoint: String,
    pub highest_chapter_unlocked: u32,
    pub discovered_checkpoints: BTreeSet<String>,
}

impl Default for ProgressionRecord {
    fn default() -> Self {
        Self {
            last_scene: String::new(),
            last_checkpoint: String::new(),
            highest_chapter_unlocked: MIN_CHAPTER,
            discovered_checkpoints: BTreeSet::new(),
        }
    }
}

impl ProgressionRecord {
    pub(crate) fn normalized(mut self) -> Self {
        self.highest_chapter_unlocked = self.highest_chapter_unlocked.max(MIN_CHAPTER);
        self.discovered_checkpoints.retain(|id| !id.is_empty());
        self
    }
}
