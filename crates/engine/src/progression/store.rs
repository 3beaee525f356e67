use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::ProgressionRecord;
use crate::persistence::write_text_atomic;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("failed to read progression record {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode progression record {path} at `{field}`: {source}")]
    Decode {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode progression record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write progression record {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable progression for one save slot.
///
/// Every mutation that changes a persisted field rewrites the whole record.
/// Storage failures are logged and swallowed: the in-memory record stays
/// authoritative and the next mutation retries the full write.
#[derive(Debug)]
pub struct ProgressionStore {
    record: ProgressionRecord,
    path: Option<PathBuf>,
    write_pending: bool,
}

impl ProgressionStore {
    /// Load-or-default. A missing, unreadable or corrupt file opens as an
    /// empty record.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = match read_record(&path) {
            Ok(Some(record)) => {
                info!(
                    path = %path.display(),
                    last_scene = %record.last_scene,
                    last_checkpoint = %record.last_checkpoint,
                    highest_chapter_unlocked = record.highest_chapter_unlocked,
                    discovered = record.discovered_checkpoints.len(),
                    "progression_loaded"
                );
                record
            }
            Ok(None) => {
                info!(path = %path.display(), "progression_missing_starting_fresh");
                ProgressionRecord::default()
            }
            Err(error) => {
                warn!(error = %error, "progression_unreadable_starting_fresh");
                ProgressionRecord::default()
            }
        };

        Self {
            record,
            path: Some(path),
            write_pending: false,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            record: ProgressionRecord::default(),
            path: None,
            write_pending: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self) -> &ProgressionRecord {
        &self.record
    }

    /// True while durable storage lags behind the in-memory record.
    pub fn write_pending(&self) -> bool {
        self.write_pending
    }

    pub fn save_last_scene(&mut self, scene_id: &str) {
        let changed = self.record.last_scene != scene_id;
        if changed {
            self.record.last_scene = scene_id.to_string();
        }
        self.commit(changed);
    }

    pub fn save_checkpoint(&mut self, checkpoint_id: &str) {
        if checkpoint_id.is_empty() {
            return;
        }
        let mut changed = false;
        if self.record.last_checkpoint != checkpoint_id {
            self.record.last_checkpoint = checkpoint_id.to_string();
            changed = true;
        }
        if !self.record.discovered_checkpoints.contains(checkpoint_id) {
            self.record
                .discovered_checkpoints
                .insert(checkpoint_id.to_string());
            changed = true;
        }
        self.commit(changed);
    }

    /// Keeps "current scene" and "current checkpoint" moving together.
    pub fn record_checkpoint_reached(&mut self, scene_id: &str, checkpoint_id: &str) {
        if !scene_id.is_empty() {
            self.save_last_scene(scene_id);
        }
        self.save_checkpoint(checkpoint_id);
    }

    pub fn load_last_scene(&self) -> &str {
        &self.record.last_scene
    }

    pub fn load_checkpoint(&self) -> &str {
        &self.record.last_checkpoint
    }

    pub fn discovered_checkpoints(&self) -> &BTreeSet<String> {
        &self.record.discovered_checkpoints
    }

    pub fn is_checkpoint_discovered(&self, checkpoint_id: &str) -> bool {
        self.record.discovered_checkpoints.contains(checkpoint_id)
    }

    /// Raises the unlocked chapter, never lowers it. The value is taken as
    /// given; clamping to the valid chapter range is `ProgressionTracker`'s job.
    pub fn unlock_chapter(&mut self, chapter: u32) {
        let changed = chapter > self.record.highest_chapter_unlocked;
        if changed {
            info!(
                from = self.record.highest_chapter_unlocked,
                to = chapter,
                "chapter_unlocked"
            );
            self.record.highest_chapter_unlocked = chapter;
        }
        self.commit(changed);
    }

    pub fn highest_chapter_unlocked(&self) -> u32 {
        self.record.highest_chapter_unlocked
    }

    pub fn reset_all(&mut self) {
        info!("progression_reset");
        self.record = ProgressionRecord::default();
        self.persist();
    }

    /// Rewrites the full record now. Returns whether durable storage is
    /// current afterwards.
    pub fn flush(&mut self) -> bool {
        self.persist();
        !self.write_pending
    }

    fn commit(&mut self, changed: bool) {
        if changed || self.write_pending {
            self.persist();
        }
    }

    fn persist(&mut self) {
        let Some(path) = self.path.as_deref() else {
            self.write_pending = false;
            return;
        };

        match write_record(path, &self.record) {
            Ok(()) => {
                if self.write_pending {
                    info!(path = %path.display(), "progression_write_recovered");
                } else {
                    debug!(path = %path.display(), "progression_written");
                }
                self.write_pending = false;
            }
            Err(error) => {
                warn!(error = %error, "progression_write_failed_keeping_memory_state");
                self.write_pending = true;
            }
        }
    }
}

fn read_record(path: &Path) -> Result<Option<ProgressionRecord>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let record = serde_path_to_error::deserialize::<_, ProgressionRecord>(&mut deserializer)
        .map_err(|error| {
            let field = error.path().to_string();
            StoreError::Decode {
                path: path.to_path_buf(),
                field,
                source: error.into_inner(),
            }
        })?;
    Ok(Some(record.normalized()))
}

fn write_record(path: &Path, record: &ProgressionRecord) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(record).map_err(StoreError::Encode)?;
    write_text_atomic(path, &text).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn reaching_first_checkpoint_updates_scene_checkpoint_and_set() {
        let mut store = ProgressionStore::in_memory();
        store.record_checkpoint_reached("Forest", "CP1");
        assert_eq!(store.load_last_scene(), "Forest");
        assert_eq!(store.load_checkpoint(), "CP1");
        assert_eq!(store.discovered_checkpoints(), &ids(&["CP1"]));
    }

    #[test]
    fn discovered_set_matches_distinct_ids_and_last_call_wins() {
        let mut store = ProgressionStore::in_memory();
        let calls = [
            ("Forest", "CP1"),
            ("Forest", "CP2"),
            ("Cave", "CP1"),
            ("Cave", "CP3"),
            ("Cave", "CP2"),
        ];
        for (scene, checkpoint) in calls {
            store.record_checkpoint_reached(scene, checkpoint);
        }
        assert_eq!(store.discovered_checkpoints(), &ids(&["CP1", "CP2", "CP3"]));
        assert_eq!(store.load_checkpoint(), "CP2");
        assert_eq!(store.load_last_scene(), "Cave");
    }

    #[test]
    fn empty_scene_keeps_previous_scene() {
        let mut store = ProgressionStore::in_memory();
        store.record_checkpoint_reached("Forest", "CP1");
        store.record_checkpoint_reached("", "CP2");
        assert_eq!(store.load_last_scene(), "Forest");
        assert_eq!(store.load_checkpoint(), "CP2");
    }

    #[test]
    fn empty_checkpoint_is_a_no_op() {
        let mut store = ProgressionStore::in_memory();
        store.save_checkpoint("CP1");
        store.save_checkpoint("");
        assert_eq!(store.load_checkpoint(), "CP1");
        assert_eq!(store.discovered_checkpoints().len(), 1);
    }

    #[test]
    fn save_checkpoint_twice_matches_once() {
        let mut once = ProgressionStore::in_memory();
        once.save_checkpoint("CP1");
        let mut twice = ProgressionStore::in_memory();
        twice.save_checkpoint("CP1");
        twice.save_checkpoint("CP1");
        assert_eq!(once.record(), twice.record());
    }

    #[test]
    fn last_checkpoint_tracks_most_recent_not_newest() {
        let mut store = ProgressionStore::in_memory();
        store.save_checkpoint("CP1");
        store.save_checkpoint("CP2");
        store.save_checkpoint("CP1");
        assert_eq!(store.load_checkpoint(), "CP1");
    }

    #[test]
    fn unlock_chapter_is_monotonic() {
        let cases = [(1, 1), (3, 2), (2, 4), (4, 4), (0, 0)];
        for (a, b) in cases {
            let mut store = ProgressionStore::in_memory();
            let prior = store.highest_chapter_unlocked();
            store.unlock_chapter(a);
            store.unlock_chapter(b);
            assert_eq!(store.highest_chapter_unlocked(), prior.max(a).max(b));
        }
    }

    #[test]
    fn reset_all_restores_defaults() {
        let mut store = ProgressionStore::in_memory();
        store.record_checkpoint_reached("Forest", "CP1");
        store.unlock_chapter(3);
        store.reset_all();
        assert!(store.discovered_checkpoints().is_empty());
        assert_eq!(store.highest_chapter_unlocked(), 1);
        assert_eq!(store.load_last_scene(), "");
        assert_eq!(store.load_checkpoint(), "");
    }

    #[test]
    fn record_survives_reopen() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("saves").join("slot0.progress.json");
        {
            let mut store = ProgressionStore::open(&path);
            store.record_checkpoint_reached("cave_chapter2", "CP_Entrance");
            store.save_checkpoint("CP_Exit");
            store.unlock_chapter(2);
        }
        let reopened = ProgressionStore::open(&path);
        assert_eq!(reopened.load_last_scene(), "cave_chapter2");
        assert_eq!(reopened.load_checkpoint(), "CP_Exit");
        assert_eq!(reopened.highest_chapter_unlocked(), 2);
        assert_eq!(
            reopened.discovered_checkpoints(),
            &ids(&["CP_Entrance", "CP_Exit"])
        );
    }

    #[test]
    fn reset_is_persisted_immediately() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot0.progress.json");
        let mut store = ProgressionStore::open(&path);
        store.record_checkpoint_reached("Forest", "CP1");
        store.reset_all();

        let reopened = ProgressionStore::open(&path);
        assert_eq!(reopened.record(), &ProgressionRecord::default());
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot0.progress.json");
        fs::write(&path, "{ not json").expect("write");
        let store = ProgressionStore::open(&path);
        assert_eq!(store.record(), &ProgressionRecord::default());
    }

    #[test]
    fn wrong_field_type_opens_empty() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot0.progress.json");
        fs::write(&path, r#"{"highest_chapter_unlocked":"three"}"#).expect("write");
        let store = ProgressionStore::open(&path);
        assert_eq!(store.highest_chapter_unlocked(), 1);
    }

    #[test]
    fn decode_error_names_the_failing_field() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot0.progress.json");
        fs::write(&path, r#"{"discovered_checkpoints":[1]}"#).expect("write");
        let error = read_record(&path).expect_err("decode should fail");
        let message = error.to_string();
        assert!(message.contains("discovered_checkpoints"), "{message}");
    }

    #[test]
    fn unreadable_path_opens_empty() {
        let temp = TempDir::new().expect("temp");
        let store = ProgressionStore::open(temp.path());
        assert_eq!(store.record(), &ProgressionRecord::default());
    }

    #[test]
    fn failed_write_keeps_memory_and_heals_on_next_mutation() {
        let temp = TempDir::new().expect("temp");
        let blocker = temp.path().join("saves");
        fs::write(&blocker, "not a directory").expect("blocker");
        let path = blocker.join("slot0.progress.json");

        let mut store = ProgressionStore::open(&path);
        store.record_checkpoint_reached("Forest", "CP1");
        assert!(store.write_pending());
        assert_eq!(store.load_checkpoint(), "CP1");

        fs::remove_file(&blocker).expect("remove blocker");
        store.unlock_chapter(2);
        assert!(!store.write_pending());

        let reopened = ProgressionStore::open(&path);
        assert_eq!(reopened.load_last_scene(), "Forest");
        assert_eq!(reopened.load_checkpoint(), "CP1");
        assert_eq!(reopened.highest_chapter_unlocked(), 2);
    }

    #[test]
    fn unchanged_mutation_retries_a_pending_write() {
        let temp = TempDir::new().expect("temp");
        let blocker = temp.path().join("saves");
        fs::write(&blocker, "not a directory").expect("blocker");
        let path = blocker.join("slot0.progress.json");

        let mut store = ProgressionStore::open(&path);
        store.save_checkpoint("CP1");
        assert!(store.write_pending());

        fs::remove_file(&blocker).expect("remove blocker");
        store.save_checkpoint("CP1");
        assert!(!store.write_pending());
        assert_eq!(ProgressionStore::open(&path).load_checkpoint(), "CP1");
    }

    #[test]
    fn flush_reports_durability() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot0.progress.json");
        let mut store = ProgressionStore::open(&path);
        assert!(store.flush());
        assert!(path.is_file());
    }

    #[test]
    fn in_memory_store_never_reports_pending_writes() {
        let mut store = ProgressionStore::in_memory();
        store.save_last_scene("Forest");
        assert!(!store.write_pending());
        assert!(store.flush());
        assert!(store.path().is_none());
    }
}
