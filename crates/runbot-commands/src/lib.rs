//! Command protocol helpers for runbot.
//!
//! Parses `/run` and `/rerun` message bodies, adapts parsed code to the
//! execution backend, reduces execution results to reply text and composes
//! threaded reply events.

pub mod command_parser;
pub mod command_text;
pub mod reply_composer;
pub mod result_format;
pub mod script_builder;

pub use command_parser::{
    command_kind, is_run_command, parse_rerun_command, parse_run_command, CommandKind,
    ParsedCommand, RerunRequest, FENCE_MARKER, RERUN_COMMAND_PREFIX, RUN_COMMAND_PREFIX,
};
pub use command_text::{
    render_help_text, render_language_list, render_malformed_command, render_rerun_not_found,
};
pub use reply_composer::compose_reply_post;
pub use result_format::{format_execution_result, GENERIC_EXECUTION_ERROR};
pub use script_builder::{build_script, LanguageEntry, LanguageTable, NAMED_SOURCE_LANGUAGE};
