use crate::model::RichText;
use regex::Regex;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static YOUTUBE_WATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.*youtube.*/watch\?v=([^&]+)").unwrap());
static YOUTUBE_EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.*youtube.*/embed/([^?]+)").unwrap());
static YOUTUBE_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://youtu\.be/([^?&/]+)").unwrap());

/// Escape text for use in element content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a rich-text field, one element per styled or linked run
pub fn format_text(runs: &[RichText]) -> String {
    runs.iter().map(format_run).collect()
}

fn format_run(run: &RichText) -> String {
    let text = escape(&run.plain_text).replace('\n', "<br/>");
    let classes = run.annotations.classes().join(" ");
    match run.link() {
        Some(href) => format!(
            r#"<a href="{}" target="_blank" class="{}">{}</a>"#,
            escape(href),
            classes,
            text
        ),
        None if !classes.is_empty() => format!(r#"<span class="{}">{}</span>"#, classes, text),
        None => text,
    }
}

/// Anchor-safe form of a heading or title: lowercase, every run of other
/// characters than ASCII letters and digits collapsed to one `-`
pub fn text_to_slug(text: &str) -> String {
    NON_ALNUM
        .replace_all(&text.to_lowercase(), "-")
        .into_owned()
}

/// Video id of a YouTube watch, embed or short link
pub fn youtube_id(url: &str) -> Option<&str> {
    let captures = YOUTUBE_WATCH
        .captures(url)
        .or_else(|| YOUTUBE_EMBED.captures(url))
        .or_else(|| YOUTUBE_SHORT.captures(url));
    ::log::debug!("YOUTUBE check {} {}", url, captures.is_some());
    captures.and_then(|c| c.get(1)).map(|m| m.as_str())
}
