//! `/run` and `/rerun` grammar parsing.
//!
//! Every purely blank line of a `/run` message is dropped before anything else
//! is parsed, including blank lines inside the submitted code. Existing clients
//! depend on this, so it is kept even though it alters programs whose meaning
//! relies on blank lines.

use runbot_core::is_blank;

pub const RUN_COMMAND_PREFIX: &str = "/run";
pub const RERUN_COMMAND_PREFIX: &str = "/rerun";
pub const FENCE_MARKER: &str = "```";
const RERUN_STDIN_SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `ParsedCommand` values.
pub enum ParsedCommand {
    Help,
    List,
    Run {
        language: String,
        args: Vec<String>,
        code: String,
        stdin: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Arguments and stdin supplied with a `/rerun` request.
pub struct RerunRequest {
    pub args: Vec<String>,
    pub stdin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `CommandKind` values.
pub enum CommandKind {
    Run,
    Rerun,
}

/// Classifies a message body by its command prefix. `/rerun` is checked first.
///
/// The prefix must open the content; leading whitespace disqualifies it.
pub fn command_kind(content: &str) -> Option<CommandKind> {
    if content.starts_with(RERUN_COMMAND_PREFIX) {
        Some(CommandKind::Rerun)
    } else if content.starts_with(RUN_COMMAND_PREFIX) {
        Some(CommandKind::Run)
    } else {
        None
    }
}

pub fn is_run_command(content: &str) -> bool {
    command_kind(content) == Some(CommandKind::Run)
}

/// Parses a `/run` message. Returns `None` when the message has no non-blank line.
pub fn parse_run_command(content: &str) -> Option<ParsedCommand> {
    let lines = content
        .lines()
        .filter(|line| !is_blank(line))
        .collect::<Vec<_>>();
    let (command_line, body_lines) = lines.split_first()?;

    let command_line = command_line.trim();
    let language = command_line
        .strip_prefix(RUN_COMMAND_PREFIX)
        .unwrap_or(command_line)
        .trim();
    match language {
        "help" => return Some(ParsedCommand::Help),
        "lang" => return Some(ParsedCommand::List),
        _ => {}
    }

    let body = body_lines.join("\n");
    let (args, code, stdin) = if body.matches(FENCE_MARKER).count() >= 2 {
        split_fenced_body(&body)
    } else {
        (Vec::new(), body, String::new())
    };

    Some(ParsedCommand::Run {
        language: language.to_string(),
        args,
        code,
        stdin,
    })
}

/// Splits `args ``` code ``` stdin`. Fence markers after the second one stay in stdin.
fn split_fenced_body(body: &str) -> (Vec<String>, String, String) {
    let mut segments = body.split(FENCE_MARKER);
    let head = segments.next().unwrap_or_default();
    let code = segments.next().unwrap_or_default();
    let tail = segments.collect::<Vec<_>>().join(FENCE_MARKER);

    let args = head
        .split('\n')
        .filter(|line| !is_blank(line))
        .map(str::to_string)
        .collect();
    let code = code.strip_prefix('\n').unwrap_or(code);
    let code = code.strip_suffix('\n').unwrap_or(code);
    let stdin = tail.strip_prefix('\n').unwrap_or(&tail);

    (args, code.to_string(), stdin.to_string())
}

/// Parses a `/rerun` message. Never fails; a bare marker yields empty args and stdin.
pub fn parse_rerun_command(content: &str) -> RerunRequest {
    let lines = content.split('\n').skip(1).collect::<Vec<_>>();
    if lines.iter().all(|line| is_blank(line)) {
        return RerunRequest::default();
    }

    let separator = lines
        .iter()
        .position(|line| line.trim_end_matches('\r') == RERUN_STDIN_SEPARATOR);
    let (arg_lines, stdin) = match separator {
        Some(index) => (&lines[..index], lines[index + 1..].join("\n")),
        None => (&lines[..], String::new()),
    };
    let args = arg_lines
        .iter()
        .filter(|line| !is_blank(line))
        .map(|line| line.to_string())
        .collect();

    RerunRequest { args, stdin }
}
