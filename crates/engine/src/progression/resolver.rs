use tracing::{debug, info, warn};

use super::checkpoint::place_actor_here;
use super::store::ProgressionStore;
use crate::scene::{EntityId, LoadTicket, SceneLoader, SceneWorld, Vec2};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    /// Holds the one-shot completion handler: the ticket it answers to and
    /// the checkpoint it should place at.
    AwaitingLoad {
        ticket: LoadTicket,
        scene_id: String,
        checkpoint_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Placed { checkpoint_id: String, position: Vec2 },
    /// No marker matched; the scene's authored spawn stands.
    NoMatch,
    /// The event did not belong to the pending load, or nothing was pending.
    Ignored,
}

#[derive(Debug, Default)]
pub struct SceneTransitionResolver {
    state: TransitionState,
}

impl SceneTransitionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn is_awaiting_load(&self) -> bool {
        matches!(self.state, TransitionState::AwaitingLoad { .. })
    }

    /// Records the destination before the load starts, then requests the load
    /// and arms the one-shot completion handler for it. Calling this while a
    /// load is pending supersedes that load.
    pub fn load_scene(
        &mut self,
        store: &mut ProgressionStore,
        loader: &mut SceneLoader,
        scene_id: &str,
        checkpoint_id: &str,
    ) -> LoadTicket {
        store.save_last_scene(scene_id);
        store.save_checkpoint(checkpoint_id);

        if let TransitionState::AwaitingLoad {
            scene_id: pending_scene,
            ..
        } = &self.state
        {
            warn!(
                pending_scene = %pending_scene,
                scene = %scene_id,
                "transition_requested_while_awaiting_load"
            );
        }

        // Completion is only delivered by a later `poll`.
        let ticket = loader.request(scene_id);
        self.state = TransitionState::AwaitingLoad {
            ticket,
            scene_id: scene_id.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
        };
        info!(
            scene = %scene_id,
            checkpoint = %checkpoint_id,
            ticket = ticket.value(),
            "transition_started"
        );
        ticket
    }

    /// One-shot completion handler. Disarms itself before doing anything
    /// else, so a repeated notification for the same load is a no-op.
    pub fn handle_load_completed(
        &mut self,
        ticket: LoadTicket,
        world: &mut SceneWorld,
    ) -> PlacementOutcome {
        let TransitionState::AwaitingLoad {
            ticket: pending_ticket,
            scene_id,
            checkpoint_id,
        } = std::mem::take(&mut self.state)
        else {
            debug!(
                ticket = ticket.value(),
                "load_completion_ignored_nothing_pending"
            );
            return PlacementOutcome::Ignored;
        };

        if pending_ticket != ticket {
            debug!(
                ticket = ticket.value(),
                pending_ticket = pending_ticket.value(),
                "load_completion_ignored_other_ticket"
            );
            self.state = TransitionState::AwaitingLoad {
                ticket: pending_ticket,
                scene_id,
                checkpoint_id,
            };
            return PlacementOutcome::Ignored;
        }

        let Some(target) = select_target(world, &checkpoint_id) else {
            debug!(
                scene = %scene_id,
                checkpoint = %checkpoint_id,
                "checkpoint_not_found_keeping_authored_spawn"
            );
            return PlacementOutcome::NoMatch;
        };

        match place_actor_here(world, target) {
            Some(position) => {
                let checkpoint_id = world
                    .find_entity(target)
                    .and_then(|entity| entity.checkpoint())
                    .map(|marker| marker.identifier().to_string())
                    .unwrap_or(checkpoint_id);
                PlacementOutcome::Placed {
                    checkpoint_id,
                    position,
                }
            }
            None => {
                warn!(scene = %scene_id, "checkpoint_found_but_scene_has_no_player");
                PlacementOutcome::NoMatch
            }
        }
    }

    /// Drops the pending handler when its load failed. Returns whether the
    /// failure belonged to the pending load.
    pub fn handle_load_failed(&mut self, ticket: LoadTicket) -> bool {
        match &self.state {
            TransitionState::AwaitingLoad {
                ticket: pending_ticket,
                scene_id,
                ..
            } if *pending_ticket == ticket => {
                warn!(scene = %scene_id, ticket = ticket.value(), "transition_aborted_load_failed");
                self.state = TransitionState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Re-enters the last recorded scene at the last recorded checkpoint,
    /// falling back to `active_scene_id` when no scene was recorded yet.
    /// Returns `None` when there is no scene to go to.
    pub fn resume_at_last_checkpoint(
        &mut self,
        store: &mut ProgressionStore,
        loader: &mut SceneLoader,
        active_scene_id: Option<&str>,
    ) -> Option<LoadTicket> {
        let mut scene_id = store.load_last_scene().to_string();
        if scene_id.is_empty() {
            scene_id = active_scene_id.unwrap_or_default().to_string();
        }
        if scene_id.is_empty() {
            warn!("resume_skipped_no_scene_recorded");
            return None;
        }

        let checkpoint_id = store.load_checkpoint().to_string();
        Some(self.load_scene(store, loader, &scene_id, &checkpoint_id))
    }
}

/// Explicit identifier first match, else the first default marker. Markers
/// are considered in authoring order.
pub fn select_target(world: &SceneWorld, checkpoint_id: &str) -> Option<EntityId> {
    if !checkpoint_id.is_empty() {
        return world
            .checkpoint_markers()
            .find(|(_, marker)| marker.identifier() == checkpoint_id)
            .map(|(entity, _)| entity.id);
    }

    world
        .checkpoint_markers()
        .find(|(_, marker)| marker.is_default_for_scene())
        .map(|(entity, _)| entity.id)
}
