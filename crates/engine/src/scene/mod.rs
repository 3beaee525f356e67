mod catalog;
mod loader;
mod trigger;
mod world;

pub use catalog::{
    parse_scene_document, EntityDef, SceneCatalog, SceneDef, SceneLoadError, SourceLocation,
};
pub use loader::{LoadEvent, LoadTicket, LoadedScene, SceneLoader};
pub use trigger::{TriggerEnter, TriggerTracker};
pub use world::{
    Entity, EntityId, EntityIdAllocator, EntityKind, SceneWorld, Transform, Vec2, PLAYER_TAG,
};
