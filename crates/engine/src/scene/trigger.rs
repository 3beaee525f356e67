use std::collections::HashSet;

use super::world::{EntityId, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEnter {
    pub region: EntityId,
    pub body: EntityId,
}

/// Edge detector for checkpoint trigger regions. A body produces one enter
/// event when it moves inside a region's radius and another only after it
/// has left and come back.
#[derive(Debug, Default)]
pub struct TriggerTracker {
    occupied: HashSet<(EntityId, EntityId)>,
}

impl TriggerTracker {
    pub fn reset(&mut self) {
        self.occupied.clear();
    }

    pub fn update(&mut self, world: &SceneWorld) -> Vec<TriggerEnter> {
        let mut inside_now = HashSet::new();
        let mut entered = Vec::new();

        for (region, marker) in world.checkpoint_markers() {
            let center = region.transform.position;
            for body in world.entities() {
                if body.checkpoint().is_some() {
                    continue;
                }
                if body.transform.position.distance(center) > marker.trigger_radius() {
                    continue;
                }
                let pair = (region.id, body.id);
                inside_now.insert(pair);
                if !self.occupied.contains(&pair) {
                    entered.push(TriggerEnter {
                        region: region.id,
                        body: body.id,
                    });
                }
            }
        }

        self.occupied = inside_now;
        entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::CheckpointMarker;
    use crate::scene::Vec2;

    fn world() -> (SceneWorld, EntityId, EntityId) {
        let mut world = SceneWorld::new("forest_chapter1");
        let player = world.spawn_player("Hero", Vec2::new(-10.0, 0.0));
        let region = world.spawn_checkpoint(
            "Bridge",
            Vec2::new(0.0, 0.0),
            CheckpointMarker::new("Bridge", None, false).with_trigger_radius(1.0),
        );
        world.apply_pending();
        (world, player, region)
    }

    #[test]
    fn entering_fires_once_while_inside() {
        let (mut world, player, region) = world();
        let mut triggers = TriggerTracker::default();
        assert!(triggers.update(&world).is_empty());

        world.set_player_position(Vec2::new(0.5, 0.0));
        assert_eq!(
            triggers.update(&world),
            vec![TriggerEnter {
                region,
                body: player
            }]
        );

        world.set_player_position(Vec2::new(0.0, 0.5));
        assert!(triggers.update(&world).is_empty());
    }

    #[test]
    fn leaving_and_returning_fires_again() {
        let (mut world, _, _) = world();
        let mut triggers = TriggerTracker::default();

        world.set_player_position(Vec2::ZERO);
        assert_eq!(triggers.update(&world).len(), 1);
        world.set_player_position(Vec2::new(5.0, 0.0));
        assert!(triggers.update(&world).is_empty());
        world.set_player_position(Vec2::ZERO);
        assert_eq!(triggers.update(&world).len(), 1);
    }

    #[test]
    fn reset_forgets_occupancy() {
        let (mut world, _, _) = world();
        let mut triggers = TriggerTracker::default();
        world.set_player_position(Vec2::ZERO);
        assert_eq!(triggers.update(&world).len(), 1);
        triggers.reset();
        assert_eq!(triggers.update(&world).len(), 1);
    }

    #[test]
    fn radius_boundary_counts_as_inside() {
        let (mut world, _, _) = world();
        let mut triggers = TriggerTracker::default();
        world.set_player_position(Vec2::new(1.0, 0.0));
        assert_eq!(triggers.update(&world).len(), 1);
    }
}
