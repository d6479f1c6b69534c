/// One operator command, lowered from a whitespace-split text line.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    Teleport { player_id: u32, position: [f32; 3] },
    Heal { player_id: u32 },
    Kill { player_id: u32 },
    SetTime { hour: f32 },
    SetSpeed { multiplier: f32 },
    Pause,
    Unpause,
    SetWeather { weather_id: u32 },
    NextDay,
    SpawnItem { item_type: u32, position: [f32; 3] },
    SpawnNpc { template_name: String, position: [f32; 3] },
    List,
    Stats,
    Info,
    Help,
    Debug,
    Clear,
    Kick { player_id: u32 },
    Ban { player_id: u32 },
    SetAdmin { player_id: u32, admin: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command} expects at least {expected} argument(s)")]
    MissingArgument { command: String, expected: usize },
    #[error("{command}: invalid argument {value:?}")]
    InvalidArgument { command: String, value: String },
}

fn parse_u32(command: &str, value: &str) -> Result<u32, AdminParseError> {
    value.parse().map_err(|_| AdminParseError::InvalidArgument {
        command: command.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(command: &str, value: &str) -> Result<f32, AdminParseError> {
    value.parse().map_err(|_| AdminParseError::InvalidArgument {
        command: command.to_string(),
        value: value.to_string(),
    })
}

fn parse_position(command: &str, args: &[&str]) -> Result<[f32; 3], AdminParseError> {
    if args.len() < 3 {
        return Err(AdminParseError::MissingArgument {
            command: command.to_string(),
            expected: 3,
        });
    }
    Ok([
        parse_f32(command, args[0])?,
        parse_f32(command, args[1])?,
        parse_f32(command, args[2])?,
    ])
}

fn require(command: &str, args: &[&str], count: usize) -> Result<(), AdminParseError> {
    if args.len() < count {
        Err(AdminParseError::MissingArgument {
            command: command.to_string(),
            expected: count,
        })
    } else {
        Ok(())
    }
}

/// Whitespace-split parser; unknown commands return an error result.
/// Command names are case-insensitive.
pub fn parse_command(line: &str) -> Result<AdminCommand, AdminParseError> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().ok_or(AdminParseError::Empty)?.to_ascii_lowercase();
    let args: Vec<&str> = tokens.collect();

    match name.as_str() {
        "teleport" => {
            require(&name, &args, 4)?;
            Ok(AdminCommand::Teleport {
                player_id: parse_u32(&name, args[0])?,
                position: parse_position(&name, &args[1..])?,
            })
        }
        "heal" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::Heal { player_id: parse_u32(&name, args[0])? })
        }
        "kill" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::Kill { player_id: parse_u32(&name, args[0])? })
        }
        "settime" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::SetTime { hour: parse_f32(&name, args[0])? })
        }
        "setspeed" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::SetSpeed { multiplier: parse_f32(&name, args[0])? })
        }
        "pause" => Ok(AdminCommand::Pause),
        "unpause" => Ok(AdminCommand::Unpause),
        "setweather" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::SetWeather { weather_id: parse_u32(&name, args[0])? })
        }
        "nextday" => Ok(AdminCommand::NextDay),
        "spawnitem" => {
            require(&name, &args, 4)?;
            Ok(AdminCommand::SpawnItem {
                item_type: parse_u32(&name, args[0])?,
                position: parse_position(&name, &args[1..])?,
            })
        }
        "spawnnpc" => {
            require(&name, &args, 4)?;
            Ok(AdminCommand::SpawnNpc {
                template_name: args[0].to_string(),
                position: parse_position(&name, &args[1..])?,
            })
        }
        "list" => Ok(AdminCommand::List),
        "stats" => Ok(AdminCommand::Stats),
        "info" => Ok(AdminCommand::Info),
        "help" => Ok(AdminCommand::Help),
        "debug" => Ok(AdminCommand::Debug),
        "clear" => Ok(AdminCommand::Clear),
        "kick" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::Kick { player_id: parse_u32(&name, args[0])? })
        }
        "ban" => {
            require(&name, &args, 1)?;
            Ok(AdminCommand::Ban { player_id: parse_u32(&name, args[0])? })
        }
        "setadmin" => {
            require(&name, &args, 2)?;
            Ok(AdminCommand::SetAdmin {
                player_id: parse_u32(&name, args[0])?,
                admin: matches!(args[1], "true" | "1" | "on"),
            })
        }
        other => Err(AdminParseError::UnknownCommand(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teleport_parses_player_id_and_position() {
        let cmd = parse_command("teleport 100 0 200.5 5").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Teleport { player_id: 100, position: [0.0, 200.5, 5.0] }
        );
    }

    #[test]
    fn command_name_is_case_insensitive() {
        assert_eq!(parse_command("PAUSE").unwrap(), AdminCommand::Pause);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            parse_command("nuke 1"),
            Err(AdminParseError::UnknownCommand(cmd)) if cmd == "nuke"
        ));
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(matches!(
            parse_command("teleport 100"),
            Err(AdminParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn invalid_numeric_argument_is_rejected() {
        assert!(matches!(
            parse_command("heal notaplayer"),
            Err(AdminParseError::InvalidArgument { .. })
        ));
    }
}
