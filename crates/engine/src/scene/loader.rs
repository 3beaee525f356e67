use tracing::{debug, info, warn};

use super::catalog::{parse_scene_document, SceneCatalog, SceneDef, SceneLoadError};
use super::world::SceneWorld;

/// Identifies one load request. Completion and failure events carry the
/// ticket of the request they finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct LoadedScene {
    pub ticket: LoadTicket,
    pub world: SceneWorld,
}

#[derive(Debug)]
pub enum LoadEvent {
    Completed(LoadedScene),
    Failed {
        ticket: LoadTicket,
        scene_id: String,
        error: SceneLoadError,
    },
}

impl LoadEvent {
    pub fn ticket(&self) -> LoadTicket {
        match self {
            LoadEvent::Completed(loaded) => loaded.ticket,
            LoadEvent::Failed { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug)]
enum LoadStage {
    ReadSource,
    Parse { raw: String },
    Instantiate { def: SceneDef },
}

#[derive(Debug)]
struct PendingLoad {
    ticket: LoadTicket,
    scene_id: String,
    stage: LoadStage,
}

/// Loads scenes a stage per `poll`, so the caller keeps ticking other work
/// while a load is in flight. At most one load is pending; a new request
/// supersedes the previous one.
#[derive(Debug)]
pub struct SceneLoader {
    catalog: SceneCatalog,
    default_trigger_radius: f32,
    pending: Option<PendingLoad>,
    next_ticket: u64,
}

impl SceneLoader {
    pub fn new(catalog: SceneCatalog, default_trigger_radius: f32) -> Self {
        Self {
            catalog,
            default_trigger_radius,
            pending: None,
            next_ticket: 1,
        }
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_ticket(&self) -> Option<LoadTicket> {
        self.pending.as_ref().map(|pending| pending.ticket)
    }

    pub fn request(&mut self, scene_id: &str) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);

        if let Some(superseded) = self.pending.take() {
            warn!(
                superseded_scene = %superseded.scene_id,
                superseded_ticket = superseded.ticket.0,
                scene = %scene_id,
                "scene_load_superseded"
            );
        }

        info!(scene = %scene_id, ticket = ticket.0, "scene_load_requested");
        self.pending = Some(PendingLoad {
            ticket,
            scene_id: scene_id.to_string(),
            stage: LoadStage::ReadSource,
        });
        ticket
    }

    /// Advances the pending load by one stage. Returns an event once the
    /// load completes or fails.
    pub fn poll(&mut self) -> Option<LoadEvent> {
        let PendingLoad {
            ticket,
            scene_id,
            stage,
        } = self.pending.take()?;

        let next_stage = match stage {
            LoadStage::ReadSource => self
                .catalog
                .read_source(&scene_id)
                .map(|raw| LoadStage::Parse { raw }),
            LoadStage::Parse { raw } => {
                parse_scene_document(&scene_id, &raw).map(|def| LoadStage::Instantiate { def })
            }
            LoadStage::Instantiate { def } => {
                let world = def.instantiate(self.default_trigger_radius);
                info!(
                    scene = %scene_id,
                    ticket = ticket.0,
                    entity_count = world.entity_count(),
                    "scene_load_completed"
                );
                return Some(LoadEvent::Completed(LoadedScene { ticket, world }));
            }
        };

        match next_stage {
            Ok(stage) => {
                debug!(scene = %scene_id, ticket = ticket.0, "scene_load_stage_advanced");
                self.pending = Some(PendingLoad {
                    ticket,
                    scene_id,
                    stage,
                });
                None
            }
            Err(error) => {
                warn!(
                    scene = %scene_id,
                    ticket = ticket.0,
                    error = %error,
                    "scene_load_failed"
                );
                Some(LoadEvent::Failed {
                    ticket,
                    scene_id,
                    error,
                })
            }
        }
    }
}
