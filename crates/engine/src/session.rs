use std::env;

use tracing::{debug, info, warn};

use crate::progression::{
    PlacementOutcome, ProgressionStore, ProgressionTracker, SceneTransitionResolver,
    DEFAULT_TRIGGER_RADIUS,
};
use crate::scene::{
    LoadEvent, LoadTicket, SceneCatalog, SceneLoadError, SceneLoader, SceneWorld, TriggerTracker,
    Vec2,
};
use crate::AppPaths;

pub const SAVE_SLOT_ENV_VAR: &str = "LANTERN_SAVE_SLOT";
pub const START_SCENE_ENV_VAR: &str = "LANTERN_START_SCENE";

const DEFAULT_SAVE_SLOT: &str = "slot0";
const DEFAULT_START_SCENE: &str = "forest_chapter1";
const DEFAULT_MAX_LOAD_POLLS: u32 = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub save_slot: String,
    pub start_scene: String,
    pub default_trigger_radius: f32,
    pub max_load_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_slot: DEFAULT_SAVE_SLOT.to_string(),
            start_scene: DEFAULT_START_SCENE.to_string(),
            default_trigger_radius: DEFAULT_TRIGGER_RADIUS,
            max_load_polls: DEFAULT_MAX_LOAD_POLLS,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            save_slot: non_empty_env(SAVE_SLOT_ENV_VAR).unwrap_or(defaults.save_slot),
            start_scene: non_empty_env(START_SCENE_ENV_VAR).unwrap_or(defaults.start_scene),
            ..defaults
        }
    }

    pub fn save_file_name(&self) -> String {
        format!("{}.progress.json", self.save_slot)
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SceneEntered {
        scene_id: String,
        chapter: u32,
        placement: PlacementOutcome,
    },
    SceneLoadFailed {
        scene_id: String,
        message: String,
    },
    CheckpointReached {
        scene_id: String,
        checkpoint_id: String,
    },
}

/// The single logical owner of progression state. Everything runs on the
/// caller's thread; the store is lent out by `&mut` for each operation.
#[derive(Debug)]
pub struct GameSession {
    config: SessionConfig,
    store: ProgressionStore,
    loader: SceneLoader,
    resolver: SceneTransitionResolver,
    tracker: ProgressionTracker,
    triggers: TriggerTracker,
    active: Option<SceneWorld>,
}

impl GameSession {
    pub fn new(config: SessionConfig, store: ProgressionStore, catalog: SceneCatalog) -> Self {
        let loader = SceneLoader::new(catalog, config.default_trigger_radius);
        Self {
            config,
            store,
            loader,
            resolver: SceneTransitionResolver::new(),
            tracker: ProgressionTracker::default(),
            triggers: TriggerTracker::default(),
            active: None,
        }
    }

    pub fn open(app_paths: &AppPaths, config: SessionConfig) -> Result<Self, SceneLoadError> {
        let catalog = SceneCatalog::discover(&app_paths.scenes_dir)?;
        let store = ProgressionStore::open(app_paths.saves_dir.join(config.save_file_name()));
        info!(
            scenes = catalog.len(),
            save_slot = %config.save_slot,
            "session_opened"
        );
        Ok(Self::new(config, store, catalog))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &ProgressionStore {
        &self.store
    }

    pub fn tracker(&self) -> &ProgressionTracker {
        &self.tracker
    }

    pub fn resolver(&self) -> &SceneTransitionResolver {
        &self.resolver
    }

    pub fn catalog(&self) -> &SceneCatalog {
        self.loader.catalog()
    }

    pub fn active_world(&self) -> Option<&SceneWorld> {
        self.active.as_ref()
    }

    pub fn active_scene_id(&self) -> Option<&str> {
        self.active.as_ref().map(SceneWorld::scene_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn new_game(&mut self) -> LoadTicket {
        let start_scene = self.config.start_scene.clone();
        self.load_scene(&start_scene, "")
    }

    pub fn continue_game(&mut self) -> Option<LoadTicket> {
        let active_scene_id = self.active.as_ref().map(SceneWorld::scene_id);
        self.resolver
            .resume_at_last_checkpoint(&mut self.store, &mut self.loader, active_scene_id)
    }

    pub fn load_scene(&mut self, scene_id: &str, checkpoint_id: &str) -> LoadTicket {
        self.resolver
            .load_scene(&mut self.store, &mut self.loader, scene_id, checkpoint_id)
    }

    pub fn player_died(&mut self) -> Option<LoadTicket> {
        let active_scene_id = self.active.as_ref().map(SceneWorld::scene_id);
        self.tracker.on_player_death(
            &mut self.resolver,
            &mut self.store,
            &mut self.loader,
            active_scene_id,
        )
    }

    pub fn unlock_chapter(&mut self, chapter: u32) {
        self.store.unlock_chapter(chapter);
    }

    pub fn reset_progress(&mut self) {
        self.store.reset_all();
        self.tracker.clear_checkpoint();
    }

    pub fn move_player(&mut self, dx: f32, dy: f32) -> Option<Vec2> {
        let world = self.active.as_mut()?;
        let next = world.player_position()?.offset(dx, dy);
        world.set_player_position(next)
    }

    pub fn teleport_player(&mut self, position: Vec2) -> Option<Vec2> {
        self.active.as_mut()?.set_player_position(position)
    }

    /// One cooperative step: advance the pending load, deliver its outcome,
    /// then run trigger regions against the active scene.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let Some(event) = self.loader.poll() {
            events.push(self.apply_load_event(event));
        }
        self.run_triggers(&mut events);
        events
    }

    /// Ticks until no load is pending or the configured poll budget runs out.
    pub fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        let mut events = self.tick();
        let mut polls = 1;
        while self.loader.is_loading() && polls < self.config.max_load_polls {
            events.extend(self.tick());
            polls += 1;
        }
        if self.loader.is_loading() {
            warn!(polls, "scene_load_still_pending_after_poll_budget");
        }
        events
    }

    /// Final flush of the progression record. Returns whether durable
    /// storage is current.
    pub fn shutdown(&mut self) -> bool {
        let flushed = self.store.flush();
        info!(flushed, "session_shutdown");
        flushed
    }

    fn apply_load_event(&mut self, event: LoadEvent) -> SessionEvent {
        match event {
            LoadEvent::Completed(loaded) => {
                let mut world = loaded.world;
                let placement = self.resolver.handle_load_completed(loaded.ticket, &mut world);
                let scene_id = world.scene_id().to_string();
                let chapter = self.tracker.on_scene_entered(&scene_id, &mut self.store);
                self.triggers.reset();
                self.active = Some(world);
                SessionEvent::SceneEntered {
                    scene_id,
                    chapter,
                    placement,
                }
            }
            LoadEvent::Failed {
                ticket,
                scene_id,
                error,
            } => {
                self.resolver.handle_load_failed(ticket);
                SessionEvent::SceneLoadFailed {
                    scene_id,
                    message: error.to_string(),
                }
            }
        }
    }

    fn run_triggers(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(world) = self.active.as_ref() else {
            return;
        };

        for enter in self.triggers.update(world) {
            let (Some(region), Some(body)) =
                (world.find_entity(enter.region), world.find_entity(enter.body))
            else {
                continue;
            };
            let Some(marker) = region.checkpoint() else {
                continue;
            };
            if !marker.on_body_entered(body, world.scene_id(), &mut self.store) {
                continue;
            }
            self.tracker
                .set_checkpoint(&mut self.store, marker.identifier());
            debug!(checkpoint = %marker.identifier(), "tracker_checkpoint_mirrored");
            events.push(SessionEvent::CheckpointReached {
                scene_id: world.scene_id().to_string(),
                checkpoint_id: marker.identifier().to_string(),
            });
        }
    }
}
