//! Splitting a command line into an argument vector and redirection targets.
#![forbid(unsafe_code)]

use std::{fmt, path::PathBuf};

/// Maximum number of arguments kept from a single command line.
pub(crate) const MAX_ARGS: usize = 128;

const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Quit,
    Jobs,
    Bg,
    Fg,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "quit" => Some(Self::Quit),
            "jobs" => Some(Self::Jobs),
            "bg" => Some(Self::Bg),
            "fg" => Some(Self::Fg),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Jobs => "jobs",
            Self::Bg => "bg",
            Self::Fg => "fg",
        }
    }
}

/// A command line of the form `command [arguments...] [< infile] [> outfile] [&]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedCommand {
    /// Never empty.
    pub argv: Vec<String>,
    pub infile: Option<PathBuf>,
    pub outfile: Option<PathBuf>,
    pub background: bool,
    pub builtin: Option<Builtin>,
}

impl ParsedCommand {
    pub(crate) fn program(&self) -> &str {
        &self.argv[0]
    }

    pub(crate) fn arguments(&self) -> &[String] {
        &self.argv[1..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnmatchedQuote(char),
    AmbiguousRedirection,
    MissingRedirectionTarget,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnmatchedQuote(quote) => write!(f, "Error: unmatched {quote}."),
            ParseError::AmbiguousRedirection => f.write_str("Error: Ambiguous I/O redirection"),
            ParseError::MissingRedirectionTarget => {
                f.write_str("Error: must provide file name for redirection")
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Argument,
    Input,
    Output,
    Both,
}

impl Slot {
    fn with_input(self) -> Self {
        match self {
            Slot::Argument | Slot::Input => Slot::Input,
            Slot::Output | Slot::Both => Slot::Both,
        }
    }

    fn with_output(self) -> Self {
        match self {
            Slot::Argument | Slot::Output => Slot::Output,
            Slot::Input | Slot::Both => Slot::Both,
        }
    }
}

/// Parse a command line.
///
/// Returns `Ok(None)` for lines that contain no command. Tokens are separated by white space; a
/// token that starts with a single or double quote extends to the matching quote.
pub(crate) fn parse_line(line: &str) -> Result<Option<ParsedCommand>, ParseError> {
    let mut argv = Vec::new();
    let mut infile = None;
    let mut outfile = None;
    let mut slot = Slot::Argument;
    let mut rest = line;

    loop {
        rest = rest.trim_start_matches(DELIMITERS);
        let Some(first) = rest.chars().next() else {
            break;
        };

        match first {
            '<' => {
                if infile.is_some() {
                    return Err(ParseError::AmbiguousRedirection);
                }
                slot = slot.with_input();
                rest = &rest[1..];
                continue;
            }
            '>' => {
                if outfile.is_some() {
                    return Err(ParseError::AmbiguousRedirection);
                }
                slot = slot.with_output();
                rest = &rest[1..];
                continue;
            }
            _ => {}
        }

        let token;
        if first == '\'' || first == '"' {
            let quoted = &rest[1..];
            let end = quoted
                .find(first)
                .ok_or(ParseError::UnmatchedQuote(first))?;
            token = &quoted[..end];
            rest = &quoted[end + 1..];
        } else {
            let end = rest.find(DELIMITERS).unwrap_or(rest.len());
            token = &rest[..end];
            rest = &rest[end..];
        }

        match slot {
            Slot::Argument => argv.push(token.to_owned()),
            Slot::Input => infile = Some(PathBuf::from(token)),
            Slot::Output => outfile = Some(PathBuf::from(token)),
            Slot::Both => return Err(ParseError::AmbiguousRedirection),
        }
        slot = Slot::Argument;

        if argv.len() >= MAX_ARGS - 1 {
            break;
        }
    }

    if slot != Slot::Argument {
        return Err(ParseError::MissingRedirectionTarget);
    }

    let background = argv.last().is_some_and(|arg| arg == "&");
    if background {
        argv.pop();
    }

    let Some(name) = argv.first() else {
        return Ok(None);
    };
    let builtin = Builtin::from_name(name);

    Ok(Some(ParsedCommand {
        argv,
        infile,
        outfile,
        background,
        builtin,
    }))
}
