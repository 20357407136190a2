//! Console commands
//!
//! Both binaries read one command per line from stdin and hand the parsed
//! [`LocalCommand`] to their peer.

use crate::error::CommandError;
use crate::state::Color;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Roll,
    Move(u8),
    Select(usize),
    AddSlot(Option<String>),
    RemoveSlot(usize),
    RenameSlot(usize, String),
    RecolorSlot(usize, Color),
    SetAvatar(usize, Option<String>),
    Start,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  roll                    roll the dice on your turn
  move <token>            move token 0-3 after a roll
  select <slot>           claim a player slot (players)
  add [name]              add a player slot (host)
  remove <slot>           remove an unclaimed slot (host)
  rename <slot> <name>    rename a slot (host)
  color <slot> <color>    recolor a slot (host)
  avatar <slot> [ref]     set or clear a slot's avatar (host)
  start                   start the game (host)
  show                    print the board
  help                    print this help
  quit                    leave";

impl FromStr for LocalCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err(CommandError::Empty);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "roll" | "r" => LocalCommand::Roll,
            "move" | "m" => LocalCommand::Move(number(parts.next(), "move")?),
            "select" => LocalCommand::Select(number(parts.next(), "select")?),
            "add" => LocalCommand::AddSlot(rest(parts)),
            "remove" => LocalCommand::RemoveSlot(number(parts.next(), "remove")?),
            "rename" => {
                let index = number(parts.next(), "rename")?;
                let name = rest(parts).ok_or(CommandError::MissingArgument("rename"))?;
                LocalCommand::RenameSlot(index, name)
            }
            "color" => {
                let index = number(parts.next(), "color")?;
                let color = parts
                    .next()
                    .ok_or(CommandError::MissingArgument("color"))?
                    .parse()?;
                LocalCommand::RecolorSlot(index, color)
            }
            "avatar" => {
                let index = number(parts.next(), "avatar")?;
                LocalCommand::SetAvatar(index, rest(parts))
            }
            "start" => LocalCommand::Start,
            "show" | "board" => LocalCommand::Show,
            "help" | "?" => LocalCommand::Help,
            "quit" | "exit" | "q" => LocalCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

fn number<T: FromStr>(arg: Option<&str>, command: &'static str) -> Result<T, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(command))?;
    arg.parse()
        .map_err(|_| CommandError::InvalidNumber(arg.to_string()))
}

fn rest<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = parts.collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play_commands() {
        assert_eq!("roll".parse(), Ok(LocalCommand::Roll));
        assert_eq!("  MOVE 2 ".parse(), Ok(LocalCommand::Move(2)));
        assert_eq!("select 1".parse(), Ok(LocalCommand::Select(1)));
        assert_eq!("q".parse(), Ok(LocalCommand::Quit));
    }

    #[test]
    fn test_parse_lobby_commands() {
        assert_eq!("add".parse(), Ok(LocalCommand::AddSlot(None)));
        assert_eq!(
            "add Mary Ann".parse(),
            Ok(LocalCommand::AddSlot(Some("Mary Ann".to_string())))
        );
        assert_eq!(
            "rename 0 Bob".parse(),
            Ok(LocalCommand::RenameSlot(0, "Bob".to_string()))
        );
        assert_eq!(
            "color 1 Blue".parse(),
            Ok(LocalCommand::RecolorSlot(1, Color::Blue))
        );
        assert_eq!("avatar 2".parse(), Ok(LocalCommand::SetAvatar(2, None)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<LocalCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "move".parse::<LocalCommand>(),
            Err(CommandError::MissingArgument("move"))
        );
        assert_eq!(
            "move x".parse::<LocalCommand>(),
            Err(CommandError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            "dance".parse::<LocalCommand>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
        assert!(matches!(
            "color 0 purple".parse::<LocalCommand>(),
            Err(CommandError::Color(_))
        ));
        assert_eq!(
            "rename 0".parse::<LocalCommand>(),
            Err(CommandError::MissingArgument("rename"))
        );
    }
}
