use crate::markdown;
use crate::transcript::Entry;
use std::path::Path;

pub const EMPTY_PLACEHOLDER: &str =
    "<p class=\"empty\">No conversation yet. Enter a requirement to get started.</p>";

/// Projects the whole transcript to an HTML fragment.
pub fn render_transcript(entries: &[Entry]) -> String {
    if entries.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }

    entries.iter().map(render_entry).collect()
}

fn render_entry(entry: &Entry) -> String {
    let title = entry.label();
    // Substring test, not a parse: any fence switches to the markdown path.
    if markdown::has_fence(&entry.content) {
        format!(
            "<div class=\"history-entry\"><h3>{}</h3><div class=\"agent-block\">{}</div></div>",
            title,
            markdown::to_html(&entry.content)
        )
    } else {
        format!(
            "<div class=\"history-entry\"><h3>{}</h3><p>{}</p></div>",
            title,
            escape_html(&entry.content)
        )
    }
}

/// Escapes text content. Quotes are left alone; use `escape_attr` for
/// attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

/// Writes a rendered fragment, creating parent directories as needed.
pub fn write_snapshot(path: &Path, html: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
}
