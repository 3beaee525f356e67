use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Help,
    NewGame,
    Continue,
    Load {
        scene_id: String,
        checkpoint_id: String,
    },
    Move {
        dx: f32,
        dy: f32,
    },
    Teleport {
        x: f32,
        y: f32,
    },
    Die,
    Unlock {
        chapter: u32,
    },
    Reset,
    Status,
    Scenes,
    Wait,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.usage.is_empty() {
            write!(f, "error: {}. try: help", self.reason)
        } else {
            write!(f, "error: {}. usage: {}", self.reason, self.usage)
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<SessionCommand, CommandParseError>;
type BuiltinParseFn = fn(&[String]) -> Result<SessionCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_session_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, &str, &str, BuiltinParseFn); 13] = [
            ("help", "List commands", "", parse_help_command),
            ("new", "Start a new game in the start scene", "", parse_new_command),
            (
                "continue",
                "Resume at the last recorded checkpoint",
                "",
                parse_continue_command,
            ),
            (
                "load",
                "Load a scene, optionally at a checkpoint",
                "<scene_id:string> [checkpoint_id:string]",
                parse_load_command,
            ),
            (
                "move",
                "Move the player by an offset",
                "<dx:f32> <dy:f32>",
                parse_move_command,
            ),
            (
                "teleport",
                "Put the player at a position",
                "<x:f32> <y:f32>",
                parse_teleport_command,
            ),
            ("die", "Kill the player and respawn", "", parse_die_command),
            (
                "unlock",
                "Unlock a chapter",
                "<chapter:u32>",
                parse_unlock_command,
            ),
            ("reset", "Erase all progression", "", parse_reset_command),
            ("status", "Show progression state", "", parse_status_command),
            ("scenes", "List known scenes", "", parse_scenes_command),
            ("wait", "Advance one tick", "", parse_wait_command),
            ("quit", "Flush progression and exit", "", parse_quit_command),
        ];
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<SessionCommand, CommandParseError> + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    /// `Ok(None)` for blank lines.
    pub(crate) fn parse_line(
        &self,
        raw_line: &str,
    ) -> Result<Option<SessionCommand>, CommandParseError> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let tokens = tokenize_line(trimmed).map_err(|reason| CommandParseError {
            reason,
            usage: String::new(),
        })?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(CommandParseError {
                reason: format!("unknown command '{command_name}'"),
                usage: String::new(),
            });
        };

        (spec.parse)(args).map(Some)
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }

    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(SessionCommand::Help)
}

fn parse_new_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "new")?;
    Ok(SessionCommand::NewGame)
}

fn parse_continue_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "continue")?;
    Ok(SessionCommand::Continue)
}

fn parse_load_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let usage = "load <scene_id> [checkpoint_id]";
    match args {
        [scene_id] => Ok(SessionCommand::Load {
            scene_id: scene_id.clone(),
            checkpoint_id: String::new(),
        }),
        [scene_id, checkpoint_id] => Ok(SessionCommand::Load {
            scene_id: scene_id.clone(),
            checkpoint_id: checkpoint_id.clone(),
        }),
        _ => Err(CommandParseError {
            reason: "expected <scene_id> or <scene_id> <checkpoint_id>".to_string(),
            usage: usage.to_string(),
        }),
    }
}

fn parse_move_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let (dx, dy) = parse_xy(args, "dx", "dy", "move <dx> <dy>")?;
    Ok(SessionCommand::Move { dx, dy })
}

fn parse_teleport_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let (x, y) = parse_xy(args, "x", "y", "teleport <x> <y>")?;
    Ok(SessionCommand::Teleport { x, y })
}

fn parse_die_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "die")?;
    Ok(SessionCommand::Die)
}

fn parse_unlock_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let usage = "unlock <chapter>";
    let [raw] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one argument <chapter>".to_string(),
            usage: usage.to_string(),
        });
    };
    let chapter = raw.parse::<u32>().map_err(|_| CommandParseError {
        reason: format!("invalid chapter '{raw}' (expected u32)"),
        usage: usage.to_string(),
    })?;
    Ok(SessionCommand::Unlock { chapter })
}

fn parse_reset_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "reset")?;
    Ok(SessionCommand::Reset)
}

fn parse_status_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(SessionCommand::Status)
}

fn parse_scenes_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "scenes")?;
    Ok(SessionCommand::Scenes)
}

fn parse_wait_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "wait")?;
    Ok(SessionCommand::Wait)
}

fn parse_quit_command(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(SessionCommand::Quit)
}

fn parse_xy(
    args: &[String],
    x_name: &str,
    y_name: &str,
    usage: &str,
) -> Result<(f32, f32), CommandParseError> {
    let [raw_x, raw_y] = args else {
        return Err(CommandParseError {
            reason: format!("expected <{x_name}> <{y_name}>"),
            usage: usage.to_string(),
        });
    };
    let parse = |raw: &str, name: &str| {
        raw.parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| CommandParseError {
                reason: format!("invalid {name} '{raw}' (expected f32)"),
                usage: usage.to_string(),
            })
    };
    Ok((parse(raw_x, x_name)?, parse(raw_y, y_name)?))
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError {
            reason: "unexpected extra arguments".to_string(),
            usage: usage.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<SessionCommand>, CommandParseError> {
        CommandRegistry::with_session_builtins().parse_line(line)
    }

    #[test]
    fn help_lists_commands_in_registration_order() {
        let lines = CommandRegistry::with_session_builtins().help_lines();
        assert_eq!(lines[0], "help - List commands");
        assert_eq!(lines[1], "new - Start a new game in the start scene");
        assert_eq!(
            lines[3],
            "load <scene_id:string> [checkpoint_id:string] - Load a scene, optionally at a checkpoint"
        );
        assert_eq!(lines.last().map(String::as_str), Some("quit - Flush progression and exit"));
    }

    #[test]
    fn blank_line_is_not_a_command() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn command_names_are_case_insensitive() {
        assert_eq!(parse("NEW"), Ok(Some(SessionCommand::NewGame)));
        assert_eq!(parse("Continue"), Ok(Some(SessionCommand::Continue)));
    }

    #[test]
    fn load_accepts_optional_checkpoint() {
        assert_eq!(
            parse("load cave_chapter2"),
            Ok(Some(SessionCommand::Load {
                scene_id: "cave_chapter2".to_string(),
                checkpoint_id: String::new(),
            }))
        );
        assert_eq!(
            parse("load cave_chapter2 \"CP Entrance\""),
            Ok(Some(SessionCommand::Load {
                scene_id: "cave_chapter2".to_string(),
                checkpoint_id: "CP Entrance".to_string(),
            }))
        );
    }

    #[test]
    fn move_and_teleport_parse_coordinates() {
        assert_eq!(
            parse("move 1.5 -2"),
            Ok(Some(SessionCommand::Move { dx: 1.5, dy: -2.0 }))
        );
        assert_eq!(
            parse("teleport 0 4"),
            Ok(Some(SessionCommand::Teleport { x: 0.0, y: 4.0 }))
        );
    }

    #[test]
    fn bad_args_report_usage_hint() {
        let error = parse("move north 1").expect_err("bad dx");
        assert_eq!(
            error.to_string(),
            "error: invalid dx 'north' (expected f32). usage: move <dx> <dy>"
        );
        let error = parse("unlock -1").expect_err("bad chapter");
        assert_eq!(
            error.to_string(),
            "error: invalid chapter '-1' (expected u32). usage: unlock <chapter>"
        );
        let error = parse("die now").expect_err("extra");
        assert_eq!(
            error.to_string(),
            "error: unexpected extra arguments. usage: die"
        );
    }

    #[test]
    fn unknown_command_reports_clear_error() {
        let error = parse("fly").expect_err("unknown");
        assert_eq!(error.to_string(), "error: unknown command 'fly'. try: help");
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let error = parse("load \"cave").expect_err("quote");
        assert_eq!(
            error.to_string(),
            "error: unterminated quoted string. try: help"
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = CommandRegistry::with_session_builtins();
        let result = registry.register("Quit", "again", "", parse_quit_command);
        assert_eq!(
            result,
            Err("duplicate command registration: Quit".to_string())
        );
    }
}
