//! In-memory form of a page and its nested blocks.
//!
//! The serde layout follows the content API's wire shape: every block carries a
//! `type` tag and a payload stored under a key named after that tag
//! (`{"type": "paragraph", "paragraph": {...}}`). Deserializing an API response
//! and deserializing the persisted crawl cache are therefore the same
//! operation.

pub mod walk;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use walk::{Flow, Visit, rewrite, walk, walk_mut};

/// Style flags attached to a run of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "default".to_string()
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            color: default_color(),
        }
    }
}

impl Annotations {
    /// CSS classes for the active flags. Colors are not rendered.
    pub fn classes(&self) -> Vec<&'static str> {
        [
            (self.bold, "snippet-bold"),
            (self.italic, "snippet-italic"),
            (self.strikethrough, "snippet-strikethrough"),
            (self.underline, "snippet-underline"),
            (self.code, "snippet-code"),
        ]
        .into_iter()
        .filter_map(|(on, class)| on.then_some(class))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link: Option<Link>,
}

/// One styled run of a rich-text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl RichText {
    /// Unstyled run without a link
    pub fn plain(text: &str) -> Self {
        Self {
            plain_text: text.to_string(),
            annotations: Annotations::default(),
            text: Some(TextContent {
                content: text.to_string(),
                link: None,
            }),
            href: None,
        }
    }

    /// Target of the run, preferring the inline text link over a mention href
    pub fn link(&self) -> Option<&str> {
        self.text
            .as_ref()
            .and_then(|t| t.link.as_ref())
            .map(|l| l.url.as_str())
            .or(self.href.as_deref())
    }
}

/// Concatenated plain text of a rich-text field
pub fn plain_text(runs: &[RichText]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

/// Paragraphs and list items. Older API versions name the field `text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default, alias = "text")]
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    #[serde(default, alias = "text")]
    pub rich_text: Vec<RichText>,
    /// Set by the summarizer to redirect the heading to the full article
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUrl {
    pub url: String,
}

/// Where a media payload lives: hosted by the content service or external
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    External { external: FileUrl },
    File { file: FileUrl },
}

impl MediaSource {
    pub fn url(&self) -> &str {
        match self {
            MediaSource::External { external } => &external.url,
            MediaSource::File { file } => &file.url,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, MediaSource::External { .. })
    }
}

/// Payload of image, file and video blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(flatten)]
    pub source: MediaSource,
    #[serde(default)]
    pub caption: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Icon {
    Emoji { emoji: String },
    External { external: FileUrl },
    File { file: FileUrl },
    #[serde(other)]
    Other,
}

impl Icon {
    pub fn emoji(&self) -> Option<&str> {
        match self {
            Icon::Emoji { emoji } => Some(emoji),
            _ => None,
        }
    }
}

/// Render an optional icon as its emoji, empty for anything else
pub fn icon_text(icon: Option<&Icon>) -> &str {
    icon.and_then(Icon::emoji).unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Callout {
    #[serde(default, alias = "text")]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPage {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkToPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub url: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOfContents {
    /// Heading texts of the whole page, filled in before rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
}

/// Static preview standing in for a video in summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub link: String,
    pub src: String,
}

/// Kind-specific part of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph {
        paragraph: TextBlock,
    },
    #[serde(rename = "heading_1")]
    Heading1 {
        heading_1: Heading,
    },
    #[serde(rename = "heading_2")]
    Heading2 {
        heading_2: Heading,
    },
    #[serde(rename = "heading_3")]
    Heading3 {
        heading_3: Heading,
    },
    BulletedListItem {
        bulleted_list_item: TextBlock,
    },
    NumberedListItem {
        numbered_list_item: TextBlock,
    },
    Image {
        image: Media,
    },
    File {
        file: Media,
    },
    Video {
        video: Media,
    },
    Embed {
        embed: Embed,
    },
    Divider,
    Callout {
        callout: Callout,
    },
    Column,
    ColumnList,
    ChildPage {
        child_page: ChildPage,
    },
    LinkToPage {
        link_to_page: LinkToPage,
    },
    TableOfContents {
        table_of_contents: TableOfContents,
    },
    /// Removed from summaries, renders nothing
    SummaryDrop,
    /// Replaced by its children in summaries
    SummaryHoist,
    SummaryThumbnail {
        summary_thumbnail: Thumbnail,
    },
    #[serde(other)]
    Unsupported,
}

/// Payload-free discriminant of [`BlockKind`], used to filter traversals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    BulletedListItem,
    NumberedListItem,
    Image,
    File,
    Video,
    Embed,
    Divider,
    Callout,
    Column,
    ColumnList,
    ChildPage,
    LinkToPage,
    TableOfContents,
    SummaryDrop,
    SummaryHoist,
    SummaryThumbnail,
    Unsupported,
}

impl BlockKind {
    pub fn tag(&self) -> BlockTag {
        match self {
            BlockKind::Paragraph { .. } => BlockTag::Paragraph,
            BlockKind::Heading1 { .. } => BlockTag::Heading1,
            BlockKind::Heading2 { .. } => BlockTag::Heading2,
            BlockKind::Heading3 { .. } => BlockTag::Heading3,
            BlockKind::BulletedListItem { .. } => BlockTag::BulletedListItem,
            BlockKind::NumberedListItem { .. } => BlockTag::NumberedListItem,
            BlockKind::Image { .. } => BlockTag::Image,
            BlockKind::File { .. } => BlockTag::File,
            BlockKind::Video { .. } => BlockTag::Video,
            BlockKind::Embed { .. } => BlockTag::Embed,
            BlockKind::Divider => BlockTag::Divider,
            BlockKind::Callout { .. } => BlockTag::Callout,
            BlockKind::Column => BlockTag::Column,
            BlockKind::ColumnList => BlockTag::ColumnList,
            BlockKind::ChildPage { .. } => BlockTag::ChildPage,
            BlockKind::LinkToPage { .. } => BlockTag::LinkToPage,
            BlockKind::TableOfContents { .. } => BlockTag::TableOfContents,
            BlockKind::SummaryDrop => BlockTag::SummaryDrop,
            BlockKind::SummaryHoist => BlockTag::SummaryHoist,
            BlockKind::SummaryThumbnail { .. } => BlockTag::SummaryThumbnail,
            BlockKind::Unsupported => BlockTag::Unsupported,
        }
    }

    pub fn paragraph(text: &str) -> Self {
        BlockKind::Paragraph {
            paragraph: TextBlock {
                rich_text: vec![RichText::plain(text)],
                color: None,
            },
        }
    }

    pub fn heading(text: &str) -> Self {
        BlockKind::Heading1 {
            heading_1: Heading {
                rich_text: vec![RichText::plain(text)],
                link: None,
            },
        }
    }

    pub fn image(url: &str) -> Self {
        BlockKind::Image {
            image: Media {
                source: MediaSource::External {
                    external: FileUrl {
                        url: url.to_string(),
                    },
                },
                caption: Vec::new(),
                link: None,
            },
        }
    }

    pub fn callout(text: &str, emoji: &str) -> Self {
        BlockKind::Callout {
            callout: Callout {
                rich_text: vec![RichText::plain(text)],
                icon: Some(Icon::Emoji {
                    emoji: emoji.to_string(),
                }),
                color: None,
            },
        }
    }
}

/// One node of the content tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: BlockKind,
    /// `None` for leaves, `Some` once a container's children were fetched
    #[serde(default)]
    pub children: Option<Vec<Block>>,
}

impl Block {
    pub fn new(id: &str, kind: BlockKind) -> Self {
        Self {
            id: id.to_string(),
            has_children: false,
            last_edited_time: None,
            kind,
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.has_children = !children.is_empty();
        self.children = Some(children);
        self
    }

    pub fn tag(&self) -> BlockTag {
        self.kind.tag()
    }

    /// Rich text of the kinds that carry a text body
    pub fn rich_text(&self) -> Option<&[RichText]> {
        match &self.kind {
            BlockKind::Paragraph { paragraph: t }
            | BlockKind::BulletedListItem {
                bulleted_list_item: t,
            }
            | BlockKind::NumberedListItem {
                numbered_list_item: t,
            } => Some(&t.rich_text),
            BlockKind::Heading1 { heading_1: h }
            | BlockKind::Heading2 { heading_2: h }
            | BlockKind::Heading3 { heading_3: h } => Some(&h.rich_text),
            BlockKind::Callout { callout } => Some(&callout.rich_text),
            _ => None,
        }
    }

    pub fn rich_text_mut(&mut self) -> Option<&mut Vec<RichText>> {
        match &mut self.kind {
            BlockKind::Paragraph { paragraph: t }
            | BlockKind::BulletedListItem {
                bulleted_list_item: t,
            }
            | BlockKind::NumberedListItem {
                numbered_list_item: t,
            } => Some(&mut t.rich_text),
            BlockKind::Heading1 { heading_1: h }
            | BlockKind::Heading2 { heading_2: h }
            | BlockKind::Heading3 { heading_3: h } => Some(&mut h.rich_text),
            BlockKind::Callout { callout } => Some(&mut callout.rich_text),
            _ => None,
        }
    }

    pub fn plain_text(&self) -> String {
        self.rich_text().map(plain_text).unwrap_or_default()
    }

    pub fn children(&self) -> &[Block] {
        self.children.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleProperty {
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageProperties {
    #[serde(default)]
    pub title: TitleProperty,
}

/// Page metadata as returned by the content API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub id: String,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub cover: Option<MediaSource>,
    #[serde(default)]
    pub properties: PageProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: String,
    pub title: Vec<RichText>,
}

/// A root document: metadata plus its ordered blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub info: PageInfo,
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

impl Page {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn title(&self) -> &[RichText] {
        &self.info.properties.title.title
    }

    pub fn title_text(&self) -> String {
        plain_text(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_block() {
        let json = r#"{
            "object": "block",
            "id": "b1",
            "type": "paragraph",
            "has_children": false,
            "last_edited_time": "2024-03-01T10:00:00.000Z",
            "paragraph": {
                "rich_text": [{
                    "type": "text",
                    "text": {"content": "Hello", "link": {"url": "https://example.com"}},
                    "annotations": {"bold": true, "italic": false, "strikethrough": false,
                                    "underline": false, "code": false, "color": "default"},
                    "plain_text": "Hello",
                    "href": "https://example.com"
                }],
                "color": "default"
            }
        }"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.id, "b1");
        assert_eq!(block.tag(), BlockTag::Paragraph);
        assert!(block.children.is_none());
        let runs = block.rich_text().unwrap();
        assert_eq!(runs[0].link(), Some("https://example.com"));
        assert_eq!(runs[0].annotations.classes(), vec!["snippet-bold"]);
    }

    #[test]
    fn test_legacy_text_field_and_unknown_kind() {
        let json = r#"[
            {"id": "h", "type": "heading_1", "heading_1": {"text": [{"plain_text": "Title"}]}},
            {"id": "x", "type": "synced_block", "synced_block": {"synced_from": null}},
            {"id": "d", "type": "divider", "divider": {}}
        ]"#;
        let blocks: Vec<Block> = serde_json::from_str(json).unwrap();
        assert_eq!(blocks[0].plain_text(), "Title");
        assert_eq!(blocks[1].kind, BlockKind::Unsupported);
        assert_eq!(blocks[2].kind, BlockKind::Divider);
    }

    #[test]
    fn test_media_and_icon_payloads() {
        let json = r#"{
            "id": "i1", "type": "image",
            "image": {"type": "file", "file": {"url": "https://files.example/a.png", "expiry_time": "x"},
                      "caption": []}
        }"#;
        let block: Block = serde_json::from_str(json).unwrap();
        match &block.kind {
            BlockKind::Image { image } => {
                assert_eq!(image.source.url(), "https://files.example/a.png");
                assert!(!image.source.is_external());
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let icon: Icon = serde_json::from_str(r#"{"type": "emoji", "emoji": "📰"}"#).unwrap();
        assert_eq!(icon_text(Some(&icon)), "📰");
        let icon: Icon = serde_json::from_str(r#"{"type": "custom_emoji"}"#).unwrap();
        assert_eq!(icon_text(Some(&icon)), "");
    }

    #[test]
    fn test_children_survive_cache_round_trip() {
        let block = Block::new("c", BlockKind::callout("Note", "💡"))
            .with_children(vec![Block::new("p", BlockKind::paragraph("inside"))]);
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);

        let empty = Block::new("col", BlockKind::Column).with_children(Vec::new());
        let back: Block = serde_json::from_str(&serde_json::to_string(&empty).unwrap()).unwrap();
        assert_eq!(back.children, Some(Vec::new()));
    }
}
