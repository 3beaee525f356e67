mod checkpoint;
mod record;
mod resolver;
mod store;
mod tracker;

pub use checkpoint::{place_actor_here, CheckpointMarker, DEFAULT_TRIGGER_RADIUS};
pub use record::ProgressionRecord;
pub use resolver::{select_target, PlacementOutcome, SceneTransitionResolver, TransitionState};
pub use store::ProgressionStore;
pub use tracker::{
    clamp_chapter, derive_chapter_from_scene, ProgressionTracker, MAX_CHAPTER, MIN_CHAPTER,
};
