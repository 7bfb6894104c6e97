use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CommandError;
use crate::paging::ViewMode;

/// One line of the text protocol, `name(arg1,arg2,...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddImages { tag: i32, paths: Vec<PathBuf> },
    GotoTag(i32),
    RemoveTag(i32),
    /// Move by this many pages.
    GotoOffset(i32),
    ChangeMode(ViewMode),
    Quit,
}

fn split_call(line: &str) -> Result<(&str, Vec<&str>), CommandError> {
    let line = line.trim();
    let Some(open) = line.find('(') else {
        return Ok((line, Vec::new()));
    };
    let inner = line[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| CommandError::Malformed(line.to_string()))?;
    let name = line[..open].trim_end();
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };
    Ok((name, args))
}

fn arg<'a>(args: &[&'a str], command: &'static str, position: usize) -> Result<&'a str, CommandError> {
    args.get(position)
        .copied()
        .ok_or(CommandError::MissingArgument { command, position })
}

fn int_arg(args: &[&str], command: &'static str, position: usize) -> Result<i32, CommandError> {
    let raw = arg(args, command, position)?;
    raw.parse().map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (name, args) = split_call(line)?;
        match name {
            "add_images" => Ok(Command::AddImages {
                tag: int_arg(&args, "add_images", 0)?,
                paths: args[1..]
                    .iter()
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| PathBuf::from(unquote(raw)))
                    .collect(),
            }),
            "goto_tag" => Ok(Command::GotoTag(int_arg(&args, "goto_tag", 0)?)),
            "remove_tag" => Ok(Command::RemoveTag(int_arg(&args, "remove_tag", 0)?)),
            "goto_offset" => Ok(Command::GotoOffset(int_arg(&args, "goto_offset", 0)?)),
            "change_mode" => Ok(Command::ChangeMode(arg(&args, "change_mode", 0)?.parse()?)),
            "quit" => Ok(Command::Quit),
            "" => Err(CommandError::Malformed(line.to_string())),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}

/// A line written to stdout for whoever drives the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    CurrentMode(ViewMode),
    /// Paths of the images drawn this frame, in draw order.
    CurrentImage(Vec<PathBuf>),
    /// Navigation hit the end of the collection in this direction.
    LastInDir(i32),
    ChangeChapter,
    GetInfo,
}

impl fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputEvent::CurrentMode(mode) => write!(f, "current_mode={}", mode),
            OutputEvent::CurrentImage(paths) => {
                f.write_str("current_image=")?;
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\t")?;
                    }
                    write!(f, "{}", path.display())?;
                }
                Ok(())
            }
            OutputEvent::LastInDir(dir) => write!(f, "last_in_dir={}", dir),
            OutputEvent::ChangeChapter => f.write_str("changechapter"),
            OutputEvent::GetInfo => f.write_str("getinfo"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("quit", Command::Quit ; "bare name")]
    #[test_case("quit()", Command::Quit ; "empty parens")]
    #[test_case("goto_tag(3)", Command::GotoTag(3) ; "goto tag")]
    #[test_case("remove_tag( -2 )", Command::RemoveTag(-2) ; "negative tag with spaces")]
    #[test_case("goto_offset(-1)", Command::GotoOffset(-1) ; "backward offset")]
    #[test_case("change_mode(vertical)", Command::ChangeMode(ViewMode::Vertical) ; "mode")]
    #[test_case("  goto_offset(2)\r", Command::GotoOffset(2) ; "surrounding whitespace")]
    fn parses(line: &str, expected: Command) {
        assert_eq!(line.parse::<Command>(), Ok(expected));
    }

    #[test]
    fn add_images_keeps_path_order() {
        let parsed: Command = r#"add_images(5,x.jpg, "dir/with space.png",y.jpg)"#.parse().unwrap();
        assert_eq!(
            parsed,
            Command::AddImages {
                tag: 5,
                paths: vec!["x.jpg".into(), "dir/with space.png".into(), "y.jpg".into()],
            }
        );

        let empty: Command = "add_images(1)".parse().unwrap();
        assert_eq!(empty, Command::AddImages { tag: 1, paths: vec![] });
    }

    #[test_case("", CommandError::Malformed(String::new()) ; "empty line")]
    #[test_case("goto_tag(1", CommandError::Malformed("goto_tag(1".into()) ; "unclosed")]
    #[test_case("jump(1)", CommandError::UnknownCommand("jump".into()) ; "unknown")]
    #[test_case("goto_tag()", CommandError::MissingArgument { command: "goto_tag", position: 0 } ; "missing")]
    #[test_case("goto_offset(two)", CommandError::InvalidNumber("two".into()) ; "not a number")]
    #[test_case("add_images(x,a.png)", CommandError::InvalidNumber("x".into()) ; "bad tag")]
    #[test_case("change_mode(webtoon)", CommandError::UnknownMode("webtoon".into()) ; "bad mode")]
    fn rejects(line: &str, expected: CommandError) {
        assert_eq!(line.parse::<Command>(), Err(expected));
    }

    #[test]
    fn output_lines() {
        assert_eq!(OutputEvent::CurrentMode(ViewMode::Manga).to_string(), "current_mode=manga");
        assert_eq!(
            OutputEvent::CurrentImage(vec!["b.png".into(), "a.png".into()]).to_string(),
            "current_image=b.png\ta.png"
        );
        assert_eq!(OutputEvent::LastInDir(-1).to_string(), "last_in_dir=-1");
        assert_eq!(OutputEvent::ChangeChapter.to_string(), "changechapter");
        assert_eq!(OutputEvent::GetInfo.to_string(), "getinfo");
    }
}
