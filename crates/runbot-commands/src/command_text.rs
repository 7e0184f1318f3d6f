//! Fixed reply texts for `/run help`, `/run lang` and rejected commands.

use crate::LanguageTable;

pub fn render_help_text() -> String {
    [
        "Supported commands:",
        "- `/run help` shows this message",
        "- `/run lang` lists the available languages",
        "",
        "Run code (args one per line, then the code block, then stdin):",
        "/run <language>",
        "<arg>",
        "```",
        "<code>",
        "```",
        "<stdin>",
        "",
        "Legacy form without args or stdin:",
        "/run <language>",
        "<code>",
        "",
        "Re-run the /run command this thread replies to with new args and stdin:",
        "/rerun",
        "<arg>",
        "---",
        "<stdin>",
        "",
        "Note: blank lines in /run messages are ignored, including inside code.",
    ]
    .join("\n")
}

pub fn render_language_list(languages: &LanguageTable) -> String {
    let entries = languages.canonical_languages();
    if entries.is_empty() {
        return "No languages are currently available.".to_string();
    }
    let mut lines = vec![format!("Available languages ({}):", entries.len())];
    lines.extend(
        entries
            .into_iter()
            .map(|entry| format!("- {} {}", entry.language, entry.version)),
    );
    lines.join("\n")
}

pub fn render_malformed_command() -> String {
    "Malformed command. Send `/run help` for usage.".to_string()
}

pub fn render_rerun_not_found() -> String {
    "Could not find the original /run command for this thread.".to_string()
}
