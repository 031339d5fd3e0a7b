//! User commands typed at the client prompt.

use crate::SessionError;

/// One command line, with its argument count already checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `nick <name>`
    Nick(String),
    /// `roomlist`
    RoomList,
    /// `enter <room>`
    Enter(String),
    /// `create <room>`
    Create(String),
    /// `info [room]`, the current room when omitted
    Info(Option<String>),
    /// `send <words...>`
    Send(String),
    /// `exit`
    Exit,
    /// `rename <name>`
    Rename(String),
    /// `quit`
    Quit,
    /// `help`
    Help,
}

/// Shown by the `help` command.
pub const HELP: &str = "\
List of commands:
  nick <nickname>   register a nickname
  roomlist          list every room with its members
  enter <room>      enter a room
  create <room>     create a new room
  info [room]       show a room's members and last message
  send <message>    send a message to your room
  rename <name>     rename the room you are in
  exit              leave the room you are in
  quit              leave the application
  help              show this list";

impl Command {
    /// Parses one input line.
    ///
    /// Returns `Ok(None)` for a blank line. Words are separated by runs of
    /// whitespace; `send` joins its words back with single spaces.
    pub fn parse(line: &str) -> Result<Option<Self>, SessionError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match word {
            "nick" => Self::Nick(exactly_one(&args, "nick <nickname>")?),
            "roomlist" => no_args(&args, "roomlist", Self::RoomList)?,
            "enter" => Self::Enter(exactly_one(&args, "enter <room>")?),
            "create" => Self::Create(exactly_one(&args, "create <room>")?),
            "info" => match args.as_slice() {
                [] => Self::Info(None),
                [room] => Self::Info(Some(room.to_string())),
                _ => return Err(SessionError::Usage("info [room]")),
            },
            "send" => {
                if args.is_empty() {
                    return Err(SessionError::Usage("send <message>"));
                }
                Self::Send(args.join(" "))
            }
            "exit" => no_args(&args, "exit", Self::Exit)?,
            "rename" => Self::Rename(exactly_one(&args, "rename <name>")?),
            "quit" => no_args(&args, "quit", Self::Quit)?,
            "help" => no_args(&args, "help", Self::Help)?,
            other => return Err(SessionError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }

    /// The command word, as typed.
    pub fn word(&self) -> &'static str {
        match self {
            Self::Nick(_) => "nick",
            Self::RoomList => "roomlist",
            Self::Enter(_) => "enter",
            Self::Create(_) => "create",
            Self::Info(_) => "info",
            Self::Send(_) => "send",
            Self::Exit => "exit",
            Self::Rename(_) => "rename",
            Self::Quit => "quit",
            Self::Help => "help",
        }
    }
}

fn exactly_one(args: &[&str], usage: &'static str) -> Result<String, SessionError> {
    match args {
        [arg] => Ok(arg.to_string()),
        _ => Err(SessionError::Usage(usage)),
    }
}

fn no_args(
    args: &[&str],
    usage: &'static str,
    command: Command,
) -> Result<Command, SessionError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(SessionError::Usage(usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line_is_no_command() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   \t ").unwrap(), None);
    }

    #[test]
    fn test_parse_single_argument_commands() {
        assert_eq!(parse("nick alice"), Command::Nick("alice".into()));
        assert_eq!(parse("  enter   R1 "), Command::Enter("R1".into()));
        assert_eq!(parse("create R2"), Command::Create("R2".into()));
        assert_eq!(parse("rename R3"), Command::Rename("R3".into()));
    }

    #[test]
    fn test_parse_no_argument_commands() {
        assert_eq!(parse("roomlist"), Command::RoomList);
        assert_eq!(parse("exit"), Command::Exit);
        assert_eq!(parse("quit"), Command::Quit);
        assert_eq!(parse("help"), Command::Help);
    }

    #[test]
    fn test_info_room_is_optional() {
        assert_eq!(parse("info"), Command::Info(None));
        assert_eq!(parse("info R1"), Command::Info(Some("R1".into())));
        assert!(matches!(
            Command::parse("info R1 R2"),
            Err(SessionError::Usage(_))
        ));
    }

    #[test]
    fn test_send_joins_words_with_single_spaces() {
        assert_eq!(
            parse("send  hello   big\tworld "),
            Command::Send("hello big world".into())
        );
        assert!(matches!(Command::parse("send"), Err(SessionError::Usage(_))));
    }

    #[test]
    fn test_wrong_argument_counts() {
        for line in ["nick", "nick a b", "enter", "create a b", "rename", "exit now", "roomlist x"] {
            assert!(
                matches!(Command::parse(line), Err(SessionError::Usage(_))),
                "{line:?} should be a usage error"
            );
        }
    }

    #[test]
    fn test_unknown_command() {
        match Command::parse("dance now") {
            Err(SessionError::UnknownCommand(word)) => assert_eq!(word, "dance"),
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_word_matches_parsed_keyword() {
        for line in ["nick a", "roomlist", "enter a", "create a", "info", "send x", "exit", "rename a", "quit", "help"] {
            let first = line.split(' ').next().unwrap();
            assert_eq!(parse(line).word(), first);
        }
    }
}
