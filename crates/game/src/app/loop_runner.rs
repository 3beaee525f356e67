use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use lantern_engine::{GameSession, PlacementOutcome, SessionEvent, Vec2};
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::commands::{CommandRegistry, SessionCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        mut session,
        registry,
    } = app;

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(err) = run_lines(&mut session, &registry, stdin.lock(), stdout.lock()) {
        error!(error = %err, "console_io_failed");
    }

    if session.shutdown() {
        ExitCode::SUCCESS
    } else {
        warn!("progression_not_persisted_on_exit");
        ExitCode::FAILURE
    }
}

fn run_lines<R: BufRead, W: Write>(
    session: &mut GameSession,
    registry: &CommandRegistry,
    input: R,
    mut output: W,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = match registry.parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(output, "{err}")?;
                continue;
            }
        };

        let (lines, flow) = execute(session, registry, command);
        for text in lines {
            writeln!(output, "{text}")?;
        }
        output.flush()?;
        if flow == Flow::Quit {
            info!("console_quit_requested");
            break;
        }
    }
    Ok(())
}

fn execute(
    session: &mut GameSession,
    registry: &CommandRegistry,
    command: SessionCommand,
) -> (Vec<String>, Flow) {
    let mut lines = Vec::new();
    match command {
        SessionCommand::Help => lines.extend(registry.help_lines()),
        SessionCommand::NewGame => {
            session.new_game();
        }
        SessionCommand::Continue => {
            if session.continue_game().is_none() {
                lines.push("nothing to continue".to_string());
            }
        }
        SessionCommand::Load {
            scene_id,
            checkpoint_id,
        } => {
            session.load_scene(&scene_id, &checkpoint_id);
        }
        SessionCommand::Move { dx, dy } => match session.move_player(dx, dy) {
            Some(position) => lines.push(format!("player at {}", format_position(position))),
            None => lines.push("no player in scene".to_string()),
        },
        SessionCommand::Teleport { x, y } => {
            match session.teleport_player(Vec2::new(x, y)) {
                Some(position) => lines.push(format!("player at {}", format_position(position))),
                None => lines.push("no player in scene".to_string()),
            }
        }
        SessionCommand::Die => {
            if session.player_died().is_none() {
                lines.push("no checkpoint to respawn at".to_string());
            }
        }
        SessionCommand::Unlock { chapter } => {
            session.unlock_chapter(chapter);
            lines.push(format!(
                "highest chapter unlocked: {}",
                session.store().highest_chapter_unlocked()
            ));
        }
        SessionCommand::Reset => {
            session.reset_progress();
            lines.push("progression reset".to_string());
        }
        SessionCommand::Status => lines.extend(status_lines(session)),
        SessionCommand::Scenes => {
            lines.extend(session.catalog().scene_ids().map(ToString::to_string));
        }
        SessionCommand::Wait => {}
        SessionCommand::Quit => return (lines, Flow::Quit),
    }

    lines.extend(session.run_until_idle().iter().map(describe_event));
    (lines, Flow::Continue)
}

fn status_lines(session: &GameSession) -> Vec<String> {
    let store = session.store();
    let discovered = store
        .discovered_checkpoints()
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let player = session
        .active_world()
        .and_then(|world| world.player_position())
        .map(format_position)
        .unwrap_or_else(|| "-".to_string());

    vec![
        format!("scene: {}", session.active_scene_id().unwrap_or("-")),
        format!("player: {player}"),
        format!("chapter: {}", session.tracker().current_chapter()),
        format!("last_scene: {}", store.load_last_scene()),
        format!("last_checkpoint: {}", store.load_checkpoint()),
        format!("highest_chapter: {}", store.highest_chapter_unlocked()),
        format!("discovered: [{discovered}]"),
    ]
}

fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::SceneEntered {
            scene_id,
            chapter,
            placement,
        } => {
            let placement = match placement {
                PlacementOutcome::Placed {
                    checkpoint_id,
                    position,
                } => format!("at {checkpoint_id} {}", format_position(*position)),
                PlacementOutcome::NoMatch => "at authored spawn".to_string(),
                PlacementOutcome::Ignored => "without placement".to_string(),
            };
            format!("entered {scene_id} (chapter {chapter}) {placement}")
        }
        SessionEvent::SceneLoadFailed { scene_id, message } => {
            format!("load failed for {scene_id}: {message}")
        }
        SessionEvent::CheckpointReached {
            scene_id,
            checkpoint_id,
        } => format!("checkpoint {checkpoint_id} reached in {scene_id}"),
    }
}

fn format_position(position: Vec2) -> String {
    format!("({:.2}, {:.2})", position.x, position.y)
}
