use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod persistence;
pub mod progression;
pub mod scene;
mod session;

pub use progression::{
    clamp_chapter, derive_chapter_from_scene, place_actor_here, select_target, CheckpointMarker,
    PlacementOutcome, ProgressionRecord, ProgressionStore, ProgressionTracker,
    SceneTransitionResolver, TransitionState, DEFAULT_TRIGGER_RADIUS, MAX_CHAPTER, MIN_CHAPTER,
};
pub use scene::{
    parse_scene_document, Entity, EntityDef, EntityId, EntityKind, LoadEvent, LoadTicket,
    LoadedScene, SceneCatalog, SceneDef, SceneLoadError, SceneLoader, SceneWorld, SourceLocation,
    Transform, TriggerEnter, TriggerTracker, Vec2, PLAYER_TAG,
};
pub use session::{
    GameSession, SessionConfig, SessionEvent, SAVE_SLOT_ENV_VAR, START_SCENE_ENV_VAR,
};

pub const ROOT_ENV_VAR: &str = "LANTERN_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub scenes_dir: PathBuf,
    pub saves_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "LANTERN_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\lantern\"\n\
Bash/zsh: export {env_var}=\"/path/to/lantern\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(root)
}

pub fn app_paths_for_root(root: PathBuf) -> Result<AppPaths, StartupError> {
    let assets_dir = root.join("assets");
    let scenes_dir = assets_dir.join("scenes");
    let saves_dir = root.join("saves");

    fs::create_dir_all(&saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: saves_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        assets_dir,
        scenes_dir,
        saves_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => root_from_override(Path::new(&value)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_root_above(exe_dir)
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

/// An explicit root is trusted only if it looks like the project checkout.
fn root_from_override(raw: &Path) -> Result<PathBuf, StartupError> {
    let root = normalize_path(raw);
    if is_repo_marker(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidEnvRoot { path: root })
    }
}

fn find_root_above(start_dir: &Path) -> Result<PathBuf, StartupError> {
    start_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: normalize_path(start_dir),
            env_var: ROOT_ENV_VAR,
        })
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
