pub mod cache;
pub mod notion;
pub mod tree;

use crate::error::CrawlError;
use crate::model::{Block, PageInfo};
use serde::{Deserialize, Serialize};

pub use tree::TreeCrawler;

/// One page of a block's children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrenBatch {
    /// Blocks in document order
    pub results: Vec<Block>,

    /// Cursor to pass back for the next batch
    #[serde(default)]
    pub next_cursor: Option<String>,

    /// Whether more children follow this batch
    #[serde(default)]
    pub has_more: bool,
}

/// A document graph the crawler can read pages and block children from.
///
/// Calls are awaited one at a time; implementations do not need to be
/// shareable across tasks.
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    /// Fetch the metadata of a page
    async fn retrieve_page(&self, page_id: &str) -> Result<PageInfo, CrawlError>;

    /// Fetch up to `page_size` children of a block, starting at `cursor`
    async fn list_children(
        &self,
        block_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<ChildrenBatch, CrawlError>;
}

/// Canonical form of a page or block id: API responses are dashed, page URLs are not
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Extract a page id from a page URL or a bare id.
///
/// Page URLs end with the title slug followed by the 32 hex digit id, e.g.
/// `https://www.notion.so/Weekly-News-0123456789abcdef0123456789abcdef`.
pub fn page_id_from_arg(arg: &str) -> String {
    let bare = normalize_id(arg);
    if bare.len() == 32 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return bare;
    }
    let last = match url::Url::parse(arg) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => arg.to_string(),
    };
    last.rsplit('-').next().unwrap_or(&last).to_string()
}
