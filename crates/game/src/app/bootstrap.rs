use lantern_engine::{resolve_app_paths, GameSession, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::commands::CommandRegistry;

pub(crate) struct AppWiring {
    pub(crate) session: GameSession,
    pub(crate) registry: CommandRegistry,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Lantern Startup ===");

    let app_paths = resolve_app_paths().map_err(|error| format!("resolve app paths: {error}"))?;
    let config = SessionConfig::from_env();
    info!(
        root = %app_paths.root.display(),
        save_slot = %config.save_slot,
        start_scene = %config.start_scene,
        "startup_config_resolved"
    );

    let session = GameSession::open(&app_paths, config)
        .map_err(|error| format!("open session: {error}"))?;

    Ok(AppWiring {
        session,
        registry: CommandRegistry::with_session_builtins(),
    })
}

// Logs go to stderr so command output on stdout stays scriptable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
