//! HTML rendering of pages and block sequences.
//!
//! Rendering is a pure function of the blocks and the [`UrlMap`]: every media
//! reference is looked up by block id and a missing entry is an error, so the
//! resource cache has to be populated before anything is rendered.

pub mod prepare;
pub mod text;

use crate::error::RenderError;
use crate::model::{Block, BlockKind, BlockTag, Heading, Page, icon_text, plain_text};
use crate::utils::resource_basename;
use std::collections::HashMap;
use text::{escape, format_text, text_to_slug, youtube_id};

pub use prepare::{assign_slug, cache_page_resources, preprocess_page, with_table_of_contents};

/// Resolved locations of pages, blocks and remote resources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlMap {
    entries: HashMap<String, String>,
}

impl UrlMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, location: impl Into<String>) {
        self.entries.insert(key.into(), location.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Location recorded for `key`, an error when there is none
    pub fn resolve(&self, key: &str) -> Result<&str, RenderError> {
        self.get(key)
            .ok_or_else(|| RenderError::MissingUrl(key.to_string()))
    }

    pub fn contains_location(&self, location: &str) -> bool {
        self.entries.values().any(|v| v == location)
    }

    pub fn extend(&mut self, other: UrlMap) {
        self.entries.extend(other.entries);
    }

    /// Copy with every location prefixed, e.g. by the public site root
    pub fn with_prefix(&self, prefix: &str) -> UrlMap {
        UrlMap {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), format!("{}{}", prefix, v)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render a complete HTML document for `page`
pub fn render_page(page: &Page, urls: &UrlMap, stylesheet: &str) -> Result<String, RenderError> {
    let title = format_text(page.title());
    let mut html = String::new();
    html.push_str(
        r#"<html><head><meta name="viewport" content="width=device-width, initial-scale=1.0">"#,
    );
    html.push_str(&format!("<title>{}</title>", escape(&page.title_text())));
    html.push_str(&format!(r#"<link rel="stylesheet" href="{}">"#, escape(stylesheet)));
    html.push_str("</head><body>");
    html.push_str(r#"<div class="connect-page"><header class="connect-header">"#);
    if let Some(cover) = &page.info.cover {
        html.push_str(&format!(r#"<img src="{}">"#, escape(urls.resolve(cover.url())?)));
    }
    html.push_str(&format!(
        " <h1>{} {}</h1>",
        icon_text(page.info.icon.as_ref()),
        title
    ));
    html.push_str(r#"</header><div class="connect-body">"#);
    html.push_str(&render_blocks(&page.blocks, urls)?);
    html.push_str("</div></div></body></html>");
    Ok(html)
}

/// Render a sequence of blocks, one fragment per line
pub fn render_blocks(blocks: &[Block], urls: &UrlMap) -> Result<String, RenderError> {
    let fragments = blocks
        .iter()
        .map(|b| render_block(b, urls))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fragments.join("\n"))
}

/// Render one block. Unknown kinds become a visible comment.
pub fn render_block(block: &Block, urls: &UrlMap) -> Result<String, RenderError> {
    let html = match &block.kind {
        BlockKind::Paragraph { paragraph } => format!(
            r#"<div class="connect-paragraph">{}</div>"#,
            format_text(&paragraph.rich_text)
        ),
        BlockKind::Heading1 { heading_1 } => render_heading("h2", heading_1),
        BlockKind::Heading2 { heading_2 } => render_heading("h3", heading_2),
        BlockKind::Heading3 { heading_3 } => render_heading("h4", heading_3),
        BlockKind::BulletedListItem { bulleted_list_item } => format!(
            r#"<div class="connect-bulleted-item">{}</div>"#,
            format_text(&bulleted_list_item.rich_text)
        ),
        BlockKind::NumberedListItem { numbered_list_item } => format!(
            r#"<div class="connect-numbered-item">{}</div>"#,
            format_text(&numbered_list_item.rich_text)
        ),
        BlockKind::Image { image } => {
            let src = urls.resolve(&block.id)?;
            let href = image.link.as_deref().unwrap_or(src);
            render_figure(href, src, &format_text(&image.caption))
        }
        BlockKind::File { file } => format!(
            r#"<a class="connect-file" href="{}" target="_blank">&#x1F4E6; {}</a>"#,
            escape(urls.resolve(&block.id)?),
            escape(&resource_basename(file.source.url()))
        ),
        BlockKind::Video { video } => {
            let src = match youtube_id(video.source.url()) {
                Some(id) => format!("https://www.youtube.com/embed/{}", id),
                None => video.source.url().to_string(),
            };
            format!(
                r#"<iframe width="560" height="315" src="{}" title="Video player" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share" allowfullscreen></iframe>"#,
                escape(&src)
            )
        }
        BlockKind::Embed { embed } => format!(
            r#"<iframe class="connect-embed" src="{}"></iframe>"#,
            escape(&embed.url)
        ),
        BlockKind::Divider => "<hr/>".to_string(),
        BlockKind::Callout { callout } => format!(
            concat!(
                r#"<div class="connect-callout"><div class="connect-callout-header">"#,
                "<span>{}</span><span>{}</span></div>",
                r#"<div class="connect-callout-body">{}</div><div class="connect-callout-footer"></div></div>"#
            ),
            icon_text(callout.icon.as_ref()),
            format_text(&callout.rich_text),
            render_blocks(block.children(), urls)?
        ),
        BlockKind::Column => {
            let first_is_image = block
                .children()
                .first()
                .is_some_and(|c| c.tag() == BlockTag::Image);
            format!(
                r#"<div class="connect-column {}">{}</div>"#,
                if first_is_image { "column-image" } else { "" },
                render_blocks(block.children(), urls)?
            )
        }
        BlockKind::ColumnList => format!(
            r#"<div class="connect-column-list">{}</div>"#,
            render_blocks(block.children(), urls)?
        ),
        BlockKind::ChildPage { child_page } => match urls.get(&block.id) {
            Some(href) => format!(
                r#"<div class="connect-childpage"><a href="{}">{}</a></div>"#,
                escape(href),
                escape(&child_page.title)
            ),
            None => format!(
                r#"<div class="connect-childpage">{}</div>"#,
                escape(&child_page.title)
            ),
        },
        BlockKind::LinkToPage { link_to_page } => {
            let target = link_to_page
                .page_id
                .as_deref()
                .or(link_to_page.database_id.as_deref())
                .unwrap_or_default();
            let href = urls.get(target).unwrap_or(target);
            format!(r#"<a href="{}">{}</a>"#, escape(href), escape(target))
        }
        BlockKind::TableOfContents { table_of_contents } => format!(
            r#"<div class="connect-toc">{}</div>"#,
            table_of_contents
                .headings
                .iter()
                .map(|h| format!(r##"<a href="#{}">{}</a>"##, text_to_slug(h), escape(h)))
                .collect::<Vec<_>>()
                .join("<br/>")
        ),
        BlockKind::SummaryDrop => String::new(),
        BlockKind::SummaryHoist => render_blocks(block.children(), urls)?,
        BlockKind::SummaryThumbnail { summary_thumbnail } => {
            render_figure(&summary_thumbnail.link, &summary_thumbnail.src, "")
        }
        BlockKind::Unsupported => format!("<!-- UNKNOWN block {} -->", escape(&block.id)),
    };
    Ok(html)
}

/// Headings get a named anchor, or link elsewhere when a link was assigned
fn render_heading(tag: &str, heading: &Heading) -> String {
    let text = format_text(&heading.rich_text);
    match &heading.link {
        Some(link) => format!(r#"<{tag}><a href="{}">{}</a></{tag}>"#, escape(link), text),
        None => format!(
            r#"<{tag}><a name="{}"></a>{}</{tag}>"#,
            text_to_slug(&plain_text(&heading.rich_text)),
            text
        ),
    }
}

fn render_figure(href: &str, src: &str, caption: &str) -> String {
    let mut html = format!(
        r#"<div class="connect-figure"><a href="{}" target="_blank"><img src="{}"/></a>"#,
        escape(href),
        escape(src)
    );
    if !caption.is_empty() {
        html.push_str(&format!(r#"<div class="connect-caption">{}</div>"#, caption));
    }
    html.push_str("</div>");
    html
}
