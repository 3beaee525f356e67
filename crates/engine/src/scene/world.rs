use crate::progression::CheckpointMarker;

/// Tag carried by the controlled player actor. Trigger regions and placement
/// only ever act on bodies that carry it.
pub const PLAYER_TAG: &str = "Player";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self { position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player,
    Checkpoint(CheckpointMarker),
    Prop,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub transform: Transform,
    pub tags: Vec<String>,
    pub kind: EntityKind,
}

impl Entity {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn is_player(&self) -> bool {
        self.has_tag(PLAYER_TAG)
    }

    pub fn checkpoint(&self) -> Option<&CheckpointMarker> {
        match &self.kind {
            EntityKind::Checkpoint(marker) => Some(marker),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entities of one loaded scene. Spawns are deferred until
/// `apply_pending` so systems iterating `entities()` see a stable set.
#[derive(Debug, Default)]
pub struct SceneWorld {
    scene_id: String,
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
}

impl SceneWorld {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            ..Self::default()
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn spawn_player(&mut self, name: impl Into<String>, position: Vec2) -> EntityId {
        self.spawn(
            name,
            Transform::at(position),
            EntityKind::Player,
            vec![PLAYER_TAG.to_string()],
        )
    }

    pub fn spawn_checkpoint(
        &mut self,
        name: impl Into<String>,
        position: Vec2,
        marker: CheckpointMarker,
    ) -> EntityId {
        self.spawn(
            name,
            Transform::at(position),
            EntityKind::Checkpoint(marker),
            Vec::new(),
        )
    }

    pub fn spawn_prop(&mut self, name: impl Into<String>, position: Vec2) -> EntityId {
        self.spawn(name, Transform::at(position), EntityKind::Prop, Vec::new())
    }

    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        kind: EntityKind,
        tags: Vec<String>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            name: name.into(),
            transform,
            tags,
            kind,
        });
        id
    }

    pub fn apply_pending(&mut self) {
        self.entities.append(&mut self.pending_spawns);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|entity| entity.is_player())
            .map(|entity| entity.id)
    }

    pub fn player_position(&self) -> Option<Vec2> {
        self.entities
            .iter()
            .find(|entity| entity.is_player())
            .map(|entity| entity.transform.position)
    }

    /// Moves the player actor; returns the new position, or `None` when the
    /// scene has no player.
    pub fn set_player_position(&mut self, position: Vec2) -> Option<Vec2> {
        let player = self.entities.iter_mut().find(|entity| entity.is_player())?;
        player.transform.position = position;
        Some(position)
    }

    /// Checkpoint markers in authoring (spawn) order.
    pub fn checkpoint_markers(&self) -> impl Iterator<Item = (&Entity, &CheckpointMarker)> {
        self.entities
            .iter()
            .filter_map(|entity| entity.checkpoint().map(|marker| (entity, marker)))
    }
}
