//! Mail-ready digest of a page.
//!
//! Articles from the summarizer are rendered one after the other, then the
//! placeholders left in them are resolved in a fixed order: read-more
//! markers become links, article placeholders become the permalink, and
//! full-page image variants are swapped for the smaller mail variant. CSS is
//! inlined last since most mail clients drop `<style>` elements.

use crate::config::PublisherConfig;
use crate::error::RenderError;
use crate::model::BlockTag;
use crate::render::text::{escape, text_to_slug};
use crate::render::{UrlMap, render_blocks};
use crate::summarize::{ARTICLE_SLUG_PLACEHOLDER, Article, READ_MORE_MARKER};
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

static SCALED_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"-s(\d+)\.((?i:jpg|jpeg|png|gif))""#).unwrap());
static CSS_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Labels and image sizes used when assembling a digest
#[derive(Debug, Clone, PartialEq)]
pub struct DigestOptions {
    pub read_more_inline: String,
    pub read_more_trailing: String,
    /// Full-page and mail variant sizes, when both are produced
    pub image_sizes: Option<(u32, u32)>,
}

impl DigestOptions {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            read_more_inline: config.read_more_inline.clone(),
            read_more_trailing: config.read_more_trailing.clone(),
            image_sizes: config.page_image_size().zip(config.digest_image_size()),
        }
    }
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self::from_config(&PublisherConfig::default())
    }
}

/// Render every article into one `connect-mail` block; the first article is
/// the lead. `urls` should hold absolute locations.
pub fn assemble_digest(
    articles: &[Article],
    page_url: &str,
    urls: &UrlMap,
    options: &DigestOptions,
) -> Result<String, RenderError> {
    let mut html = String::from(r#"<div class="connect-mail">"#);
    for (index, article) in articles.iter().enumerate() {
        html.push_str(&format!(
            r#"<div class="connect-{}">{}</div>"#,
            if index == 0 { "lead" } else { "article" },
            render_article(article, page_url, urls, options)?
        ));
    }
    html.push_str("</div>");
    Ok(html)
}

/// Render one article and resolve the placeholders it carries
pub fn render_article(
    article: &Article,
    page_url: &str,
    urls: &UrlMap,
    options: &DigestOptions,
) -> Result<String, RenderError> {
    let mut html = render_blocks(&article.blocks, urls)?;

    if html.contains(READ_MORE_MARKER) {
        let more = format!(
            r#"&nbsp;<a href="{}">{}</a>"#,
            ARTICLE_SLUG_PLACEHOLDER,
            escape(&options.read_more_inline)
        );
        html = html.replace(READ_MORE_MARKER, &more);
    } else if article.truncated {
        html.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            ARTICLE_SLUG_PLACEHOLDER,
            escape(&options.read_more_trailing)
        ));
    }

    let permalink = match article_anchor(article) {
        Some(anchor) => format!("{}#{}", page_url, anchor),
        None => page_url.to_string(),
    };
    html = html.replace(ARTICLE_SLUG_PLACEHOLDER, &escape(&permalink));

    Ok(match options.image_sizes {
        Some((page_size, mail_size)) => swap_image_size(&html, page_size, mail_size),
        None => html,
    })
}

/// Anchor of the article's heading on the full page
fn article_anchor(article: &Article) -> Option<String> {
    article
        .blocks
        .iter()
        .find(|b| b.tag() == BlockTag::Heading1)
        .map(|b| text_to_slug(&b.plain_text()))
}

/// Point quoted references to the `from` variant of an image at its `to` variant
pub fn swap_image_size(html: &str, from: u32, to: u32) -> String {
    SCALED_IMAGE
        .replace_all(html, |c: &Captures<'_>| {
            if c[1] == from.to_string() {
                format!("-s{}.{}\"", to, &c[2])
            } else {
                c[0].to_string()
            }
        })
        .into_owned()
}

/// Inline `css` and wrap the digest into a standalone mail document
pub fn mailable_digest(digest: &str, css: &str, inliner: &impl StyleInliner) -> String {
    format!(
        concat!(
            r#"<html><head><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>"#,
            "<body>{}</body></html>"
        ),
        inliner.inline(digest, css)
    )
}

/// Moves stylesheet rules into `style` attributes
pub trait StyleInliner {
    fn inline(&self, html: &str, css: &str) -> String;
}

/// A plain style rule
#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    pub selector: String,
    pub declarations: String,
}

/// Extract the rules that can be applied statically: comments, at-rules and
/// selectors with pseudo-classes are left out
pub fn parse_css(css: &str) -> Vec<CssRule> {
    let css = CSS_COMMENT.replace_all(css, "");
    let mut rules = Vec::new();
    let mut rest: &str = &css;

    while let Some(open) = rest.find('{') {
        let prelude = rest[..open].rsplit(';').next().unwrap_or_default().trim();

        let mut depth = 0;
        let mut close = None;
        for (i, c) in rest[open..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            ::log::warn!("Unbalanced braces in stylesheet after {:?}", prelude);
            break;
        };

        if !prelude.starts_with('@') {
            let declarations = rest[open + 1..close]
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            for selector in prelude.split(',').map(str::trim) {
                if selector.is_empty() || selector.contains(':') || declarations.is_empty() {
                    continue;
                }
                rules.push(CssRule {
                    selector: selector.to_string(),
                    declarations: declarations.clone(),
                });
            }
        }
        rest = &rest[close + 1..];
    }
    rules
}

/// Inliner matching rules with scraper's selector engine. Rules apply in
/// stylesheet order and an existing `style` attribute comes last.
#[derive(Debug, Clone, Default)]
pub struct SelectorInliner;

impl StyleInliner for SelectorInliner {
    fn inline(&self, html: &str, css: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut matched = HashMap::new();

        for rule in parse_css(css) {
            let selector = match Selector::parse(&rule.selector) {
                Ok(selector) => selector,
                Err(e) => {
                    ::log::debug!("Skipping selector {}: {:?}", rule.selector, e);
                    continue;
                }
            };
            for element in fragment.select(&selector) {
                matched
                    .entry(element.id())
                    .or_insert_with(Vec::new)
                    .push(rule.declarations.clone());
            }
        }

        let style_of = |element: &ElementRef<'_>| -> Option<String> {
            let mut parts = matched.get(&element.id()).cloned()?;
            if let Some(existing) = element.value().attr("style") {
                parts.push(existing.to_string());
            }
            Some(parts.join("; "))
        };

        let mut out = String::new();
        write_children(fragment.root_element(), &style_of, &mut out);
        out
    }
}

fn write_children<'a, F>(parent: ElementRef<'a>, style_of: &F, out: &mut String)
where
    F: Fn(&ElementRef<'a>) -> Option<String>,
{
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            write_element(element, style_of, out);
            continue;
        }
        match child.value() {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
}

fn write_element<'a, F>(element: ElementRef<'a>, style_of: &F, out: &mut String)
where
    F: Fn(&ElementRef<'a>) -> Option<String>,
{
    let name = element.value().name();
    let style = style_of(&element);

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if attr == "style" && style.is_some() {
            continue;
        }
        out.push_str(&format!(r#" {}="{}""#, attr, escape(value)));
    }
    if let Some(style) = &style {
        out.push_str(&format!(r#" style="{}""#, escape(style)));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(element, style_of, out);
    out.push_str(&format!("</{}>", name));
}
