use tracing::{debug, info};

use super::store::ProgressionStore;
use crate::scene::{Entity, EntityId, SceneWorld, Vec2};

pub const DEFAULT_TRIGGER_RADIUS: f32 = 1.0;

/// A save-point placed in a scene. Passive on both ends: it reports itself
/// when the player walks in, and it is a placement target after a load.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMarker {
    identifier: String,
    is_default_for_scene: bool,
    trigger_radius: f32,
}

impl CheckpointMarker {
    /// The identifier is the explicit override when it is non-blank,
    /// otherwise the marker's entity name.
    pub fn new(entity_name: &str, explicit_id: Option<&str>, is_default_for_scene: bool) -> Self {
        let identifier = explicit_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(entity_name)
            .to_string();
        Self {
            identifier,
            is_default_for_scene,
            trigger_radius: DEFAULT_TRIGGER_RADIUS,
        }
    }

    pub fn with_trigger_radius(mut self, radius: f32) -> Self {
        if radius.is_finite() && radius > 0.0 {
            self.trigger_radius = radius;
        }
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_default_for_scene(&self) -> bool {
        self.is_default_for_scene
    }

    pub fn trigger_radius(&self) -> f32 {
        self.trigger_radius
    }

    /// Proximity handler. Only the controlled player counts; any other body
    /// is ignored. Returns whether progression was recorded.
    pub fn on_body_entered(
        &self,
        body: &Entity,
        scene_id: &str,
        store: &mut ProgressionStore,
    ) -> bool {
        if !body.is_player() {
            debug!(
                checkpoint = %self.identifier,
                body = %body.name,
                "checkpoint_ignored_non_player_body"
            );
            return false;
        }

        store.record_checkpoint_reached(scene_id, &self.identifier);
        info!(
            scene = %scene_id,
            checkpoint = %self.identifier,
            "checkpoint_reached"
        );
        true
    }
}

/// Moves the player actor onto the marker entity `marker`. Returns the new
/// player position, or `None` if `marker` is not a checkpoint or the scene
/// has no player.
pub fn place_actor_here(world: &mut SceneWorld, marker: EntityId) -> Option<Vec2> {
    let entity = world.find_entity(marker)?;
    let identifier = entity.checkpoint()?.identifier().to_string();
    let position = entity.transform.position;

    let placed = world.set_player_position(position)?;
    info!(
        scene = %world.scene_id(),
        checkpoint = %identifier,
        x = placed.x,
        y = placed.y,
        "actor_placed_at_checkpoint"
    );
    Some(placed)
}
