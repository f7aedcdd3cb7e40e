//! HTML rendering of the test history.

use std::fmt::Write;

use crate::history::{HistoryEntry, Outcome};

/// Render the history page. Entries appear in the order given.
pub fn render_history(title: &str, entries: &[HistoryEntry]) -> String {
    let mut items = String::new();
    for entry in entries {
        let color = match entry.result {
            Outcome::Success => "#22c55e",
            Outcome::Failure => "#ef4444",
        };

        let commit = match &entry.commit_url {
            Some(url) => format!(
                r#"<a href="{}">{}</a>"#,
                escape_html(url),
                escape_html(short_id(&entry.commit_id))
            ),
            None => escape_html(short_id(&entry.commit_id)),
        };

        let author = entry
            .commit_author
            .as_ref()
            .map(|a| match &a.email {
                Some(email) => format!("{} &lt;{}&gt;", escape_html(&a.name), escape_html(email)),
                None => escape_html(&a.name),
            })
            .unwrap_or_default();

        let _ = write!(
            items,
            r#"<li>
    <h2><span style="color: {}; font-weight: bold;">[{}]</span> {} {}</h2>
    <p>{}<br><small>{}</small></p>
    <p>{}</p>
    <pre>{}</pre>
</li>
"#,
            color,
            entry.result.label(),
            entry.id.as_deref().map(escape_html).unwrap_or_default(),
            commit,
            author,
            entry.time.format("%Y-%m-%d %H:%M:%S UTC"),
            escape_html(entry.commit_message.as_deref().unwrap_or_default()),
            escape_html(&entry.stdout),
        );
    }

    if items.is_empty() {
        items = r#"<li style="color:#666;">No runs yet</li>"#.to_string();
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ background: white; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 16px; padding: 12px; }}
        h2 {{ font-size: 16px; margin: 0 0 8px 0; }}
        pre {{ background: #1e1e1e; color: #ddd; padding: 8px; overflow-x: auto; }}
        small {{ color: #888; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <ul>
{items}    </ul>
</body>
</html>"#,
        title = escape_html(title),
        items = items,
    )
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
