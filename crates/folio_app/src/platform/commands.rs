use folio_core::{Point, Tool};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  doc <id>                      select the document to ask about
  ask <question>                stream an answer
  cancel                        abort the running answer
  page <n> | next | prev        navigate the viewer
  cite <n>                      jump to a page cited by the last answer
  zoom + | zoom -               change render scale
  snip on | snip off            arm or disarm the snippet tool
  drag <x0> <y0> <x1> <y1>      drag a selection over the page (viewer pixels)
  folder <name>                 create a bookmark folder
  mv <id> <folder> [from]       file a snippet into a folder
  unfile <id> <from>            move a snippet back to the root
  toggle <id> [parent]          show or hide a snippet on the canvas
  rename <id> <name> [parent]   rename a folder or snippet
  rm <id> [parent]              delete (asks for confirmation)
  tool select|draw|note|erase   pick the canvas tool
  mark | clear                  apply the canvas tool once, wipe annotations
  tree | canvas | status        show bookmarks, canvas or viewer state
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectDocument(String),
    Ask(String),
    Cancel,
    Page(String),
    Cite(u32),
    Next,
    Prev,
    ZoomIn,
    ZoomOut,
    Snip(bool),
    Drag { from: Point, to: Point },
    Folder(String),
    Move {
        id: String,
        folder: String,
        from: Option<String>,
    },
    Unfile { id: String, from: String },
    Toggle { id: String, parent: Option<String> },
    Rename {
        id: String,
        name: String,
        parent: Option<String>,
    },
    Remove { id: String, parent: Option<String> },
    Tool(Tool),
    Mark,
    ClearCanvas,
    Tree,
    Canvas,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb {
        "" => return Err(ParseError::Empty),
        "doc" => match args.as_slice() {
            [id] => Command::SelectDocument(id.to_string()),
            _ => return Err(ParseError::Usage("doc <id>")),
        },
        "ask" if !rest.is_empty() => Command::Ask(rest.to_string()),
        "ask" => return Err(ParseError::Usage("ask <question>")),
        "cancel" => Command::Cancel,
        "page" if !rest.is_empty() => Command::Page(rest.to_string()),
        "page" => return Err(ParseError::Usage("page <n>")),
        "cite" => match args.as_slice() {
            [page] => page
                .parse::<u32>()
                .map(Command::Cite)
                .map_err(|_| ParseError::Usage("cite <n>"))?,
            _ => return Err(ParseError::Usage("cite <n>")),
        },
        "next" => Command::Next,
        "prev" => Command::Prev,
        "zoom" => match rest {
            "+" | "in" => Command::ZoomIn,
            "-" | "out" => Command::ZoomOut,
            _ => return Err(ParseError::Usage("zoom + | zoom -")),
        },
        "snip" => match rest {
            "on" => Command::Snip(true),
            "off" => Command::Snip(false),
            _ => return Err(ParseError::Usage("snip on | snip off")),
        },
        "drag" => parse_drag(&args).ok_or(ParseError::Usage("drag <x0> <y0> <x1> <y1>"))?,
        "folder" if !rest.is_empty() => Command::Folder(rest.to_string()),
        "folder" => return Err(ParseError::Usage("folder <name>")),
        "mv" => match args.as_slice() {
            [id, folder] => Command::Move {
                id: id.to_string(),
                folder: folder.to_string(),
                from: None,
            },
            [id, folder, from] => Command::Move {
                id: id.to_string(),
                folder: folder.to_string(),
                from: Some(from.to_string()),
            },
            _ => return Err(ParseError::Usage("mv <id> <folder> [from]")),
        },
        "unfile" => match args.as_slice() {
            [id, from] => Command::Unfile {
                id: id.to_string(),
                from: from.to_string(),
            },
            _ => return Err(ParseError::Usage("unfile <id> <from>")),
        },
        "toggle" => match args.as_slice() {
            [id] => Command::Toggle {
                id: id.to_string(),
                parent: None,
            },
            [id, parent] => Command::Toggle {
                id: id.to_string(),
                parent: Some(parent.to_string()),
            },
            _ => return Err(ParseError::Usage("toggle <id> [parent]")),
        },
        "rename" => match args.as_slice() {
            [id, name] => Command::Rename {
                id: id.to_string(),
                name: name.to_string(),
                parent: None,
            },
            [id, name, parent] => Command::Rename {
                id: id.to_string(),
                name: name.to_string(),
                parent: Some(parent.to_string()),
            },
            _ => return Err(ParseError::Usage("rename <id> <name> [parent]")),
        },
        "rm" => match args.as_slice() {
            [id] => Command::Remove {
                id: id.to_string(),
                parent: None,
            },
            [id, parent] => Command::Remove {
                id: id.to_string(),
                parent: Some(parent.to_string()),
            },
            _ => return Err(ParseError::Usage("rm <id> [parent]")),
        },
        "tool" => match rest {
            "select" => Command::Tool(Tool::Select),
            "draw" => Command::Tool(Tool::Draw),
            "note" => Command::Tool(Tool::Note),
            "erase" => Command::Tool(Tool::Erase),
            _ => return Err(ParseError::Usage("tool select|draw|note|erase")),
        },
        "mark" => Command::Mark,
        "clear" => Command::ClearCanvas,
        "tree" => Command::Tree,
        "canvas" => Command::Canvas,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn parse_drag(args: &[&str]) -> Option<Command> {
    let coords: Vec<f64> = args
        .iter()
        .map(|arg| arg.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<_>>()?;
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some(Command::Drag {
            from: Point::new(*x0, *y0),
            to: Point::new(*x1, *y1),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn free_text_commands_keep_the_whole_rest() {
        assert_eq!(
            parse_command("ask  what changed in Q3? "),
            Ok(Command::Ask("what changed in Q3?".into()))
        );
        assert_eq!(
            parse_command("folder Revenue charts"),
            Ok(Command::Folder("Revenue charts".into()))
        );
        assert_eq!(parse_command("page x1"), Ok(Command::Page("x1".into())));
    }

    #[test]
    fn optional_parent_arguments() {
        assert_eq!(
            parse_command("mv snip-1-0 folder-2-0"),
            Ok(Command::Move {
                id: "snip-1-0".into(),
                folder: "folder-2-0".into(),
                from: None
            })
        );
        assert_eq!(
            parse_command("rm snip-1-0 folder-2-0"),
            Ok(Command::Remove {
                id: "snip-1-0".into(),
                parent: Some("folder-2-0".into())
            })
        );
        assert_eq!(
            parse_command("toggle a b c"),
            Err(ParseError::Usage("toggle <id> [parent]"))
        );
    }

    #[test]
    fn drag_needs_four_numbers() {
        assert_eq!(
            parse_command("drag 10 20 110.5 80"),
            Ok(Command::Drag {
                from: Point::new(10.0, 20.0),
                to: Point::new(110.5, 80.0)
            })
        );
        assert!(parse_command("drag 1 2 3").is_err());
        assert!(parse_command("drag 1 2 3 NaN").is_err());
    }

    #[test]
    fn bad_input_is_explained() {
        assert_eq!(parse_command("   "), Err(ParseError::Empty));
        assert_eq!(parse_command("ask"), Err(ParseError::Usage("ask <question>")));
        assert_eq!(
            parse_command("fly away"),
            Err(ParseError::Unknown("fly".into()))
        );
        assert_eq!(parse_command("zoom +"), Ok(Command::ZoomIn));
        assert_eq!(parse_command("snip maybe").unwrap_err().to_string(), "usage: snip on | snip off");
    }

    #[test]
    fn citations_and_canvas_tools() {
        assert_eq!(parse_command("cite 12"), Ok(Command::Cite(12)));
        assert_eq!(parse_command("cite -1"), Err(ParseError::Usage("cite <n>")));
        assert_eq!(parse_command("cite"), Err(ParseError::Usage("cite <n>")));
        assert_eq!(parse_command("tool note"), Ok(Command::Tool(Tool::Note)));
        assert_eq!(
            parse_command("tool pen"),
            Err(ParseError::Usage("tool select|draw|note|erase"))
        );
        assert_eq!(parse_command("clear"), Ok(Command::ClearCanvas));
    }
}
