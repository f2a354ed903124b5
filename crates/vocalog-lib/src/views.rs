//! HTML views: the static recorder page and the history table.

use vocalog_core::types::Transcript;

/// Recorder and TTS page served at `/`.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Render every transcript as a table row with an inline player.
pub fn history_page(rows: &[Transcript]) -> String {
    let mut body = String::new();
    if rows.is_empty() {
        body.push_str(r#"<tr><td colspan="5">No transcripts yet.</td></tr>"#);
    }
    for row in rows {
        let dir = if row.language.starts_with("ar") { "rtl" } else { "ltr" };
        body.push_str(&format!(
            r#"<tr><td>{id}</td><td dir="{dir}">{content}</td><td>{lang}</td><td>{ts}</td><td><audio controls preload="none" src="/audio/{id}"></audio></td></tr>"#,
            id = row.id,
            content = html_escape(&row.content),
            lang = html_escape(&row.language),
            ts = html_escape(&row.timestamp),
        ));
        body.push('\n');
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>vocalog — history</title>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }}
  </style>
</head>
<body>
  <h1>History</h1>
  <p><a href="/">Back</a></p>
  <table>
    <thead><tr><th>ID</th><th>Text</th><th>Language</th><th>Time</th><th>Audio</th></tr></thead>
    <tbody>
{body}    </tbody>
  </table>
</body>
</html>
"#
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
