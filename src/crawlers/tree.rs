use crate::crawlers::{ContentSource, normalize_id};
use crate::error::CrawlError;
use crate::model::{Block, BlockKind, BlockTag, Page, ParentRef, Visit, walk};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Builds complete page trees from a [`ContentSource`].
///
/// Every container is fetched to the end of its pagination before the page
/// is considered materialized; any failed call aborts the crawl.
pub struct TreeCrawler<'s, S> {
    source: &'s S,
    page_size: u32,
}

/// A child page reference found while scanning a fetched page
struct Discovered {
    id: String,
    title: String,
    parent: ParentRef,
}

impl<'s, S: ContentSource> TreeCrawler<'s, S> {
    pub fn new(source: &'s S, page_size: u32) -> Self {
        Self { source, page_size }
    }

    /// Fetch a page and its whole block tree, stopping at child pages
    pub async fn fetch_page(&self, page_id: &str) -> Result<Page, CrawlError> {
        let info = self.source.retrieve_page(page_id).await?;
        let blocks = self.fetch_blocks(page_id).await?;
        Ok(Page {
            info,
            blocks,
            parent: None,
        })
    }

    async fn fetch_blocks(&self, block_id: &str) -> Result<Vec<Block>, CrawlError> {
        let mut blocks = self.fetch_children(block_id).await?;
        for block in &mut blocks {
            // A child page's content belongs to its own page fetch
            block.children = if block.has_children && block.tag() != BlockTag::ChildPage {
                Some(Box::pin(self.fetch_blocks(&block.id)).await?)
            } else {
                None
            };
        }
        Ok(blocks)
    }

    /// Drain the pagination of one block's children
    async fn fetch_children(&self, block_id: &str) -> Result<Vec<Block>, CrawlError> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            ::log::debug!("FETCH BLOCKS {} cursor {:?}", block_id, cursor);
            let batch = self
                .source
                .list_children(block_id, self.page_size, cursor.as_deref())
                .await?;
            results.extend(batch.results);

            if !batch.has_more {
                break;
            }
            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(CrawlError::IncompletePagination {
                        block_id: block_id.to_string(),
                    });
                }
            }
        }
        Ok(results)
    }

    /// Crawl the root page, then repeatedly fetch child pages edited on or
    /// after `cutoff` until a pass discovers nothing new.
    pub async fn crawl(&self, root_id: &str, cutoff: NaiveDate) -> Result<Vec<Page>, CrawlError> {
        ::log::info!("Crawling {} for pages edited since {}", root_id, cutoff);

        let root = self.fetch_page(root_id).await?;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize_id(root_id));
        visited.insert(normalize_id(root.id()));

        let mut pages = vec![root];
        let mut scanned = 0;
        loop {
            let mut discovered = Vec::new();
            for page in &pages[scanned..] {
                for child in recent_child_pages(page, cutoff) {
                    if visited.insert(normalize_id(&child.id)) {
                        discovered.push(child);
                    }
                }
            }
            scanned = pages.len();

            if discovered.is_empty() {
                break;
            }
            for child in discovered {
                ::log::info!(
                    "CRAWL page {} -> {}",
                    crate::model::plain_text(&child.parent.title),
                    child.title
                );
                let mut page = self.fetch_page(&child.id).await?;
                page.parent = Some(child.parent);
                pages.push(page);
            }
        }

        ::log::info!("Crawled {} pages", pages.len());
        Ok(pages)
    }
}

/// Child page references of `page` edited on or after `cutoff`.
///
/// A reference without an edit time is kept: it cannot be shown to be stale.
fn recent_child_pages(page: &Page, cutoff: NaiveDate) -> Vec<Discovered> {
    let mut found = Vec::new();
    walk(
        &page.blocks,
        Some(&[BlockTag::ChildPage]),
        &mut |block: &Block, _: &Visit<'_>| {
            let recent = block
                .last_edited_time
                .is_none_or(|edited| edited.date_naive() >= cutoff);
            if !recent {
                ::log::debug!("Skipping stale child page {}", block.id);
                return;
            }
            if let BlockKind::ChildPage { child_page } = &block.kind {
                found.push(Discovered {
                    id: block.id.clone(),
                    title: child_page.title.clone(),
                    parent: ParentRef {
                        id: page.id().to_string(),
                        title: page.title().to_vec(),
                    },
                });
            }
        },
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::ChildrenBatch;
    use crate::model::{ChildPage, PageInfo, PageProperties, RichText, TitleProperty};
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory document graph paginating children by index
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, PageInfo>,
        children: HashMap<String, Vec<Block>>,
        broken_cursor: Option<String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn page(&mut self, id: &str, title: &str, blocks: Vec<Block>) {
            self.pages.insert(
                id.to_string(),
                PageInfo {
                    id: id.to_string(),
                    last_edited_time: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                    icon: None,
                    cover: None,
                    properties: PageProperties {
                        title: TitleProperty {
                            title: vec![RichText::plain(title)],
                        },
                    },
                },
            );
            self.children.insert(id.to_string(), blocks);
        }

        fn container(&mut self, id: &str, blocks: Vec<Block>) {
            self.children.insert(id.to_string(), blocks);
        }

        fn retrievals(&self, id: &str) -> usize {
            let key = format!("page:{}", id);
            self.calls.borrow().iter().filter(|c| **c == key).count()
        }
    }

    impl ContentSource for FakeSource {
        async fn retrieve_page(&self, page_id: &str) -> Result<PageInfo, CrawlError> {
            self.calls.borrow_mut().push(format!("page:{}", page_id));
            self.pages.get(page_id).cloned().ok_or(CrawlError::Status {
                what: page_id.to_string(),
                status: 404,
            })
        }

        async fn list_children(
            &self,
            block_id: &str,
            page_size: u32,
            cursor: Option<&str>,
        ) -> Result<ChildrenBatch, CrawlError> {
            self.calls
                .borrow_mut()
                .push(format!("children:{}:{:?}", block_id, cursor));
            let all = self.children.get(block_id).ok_or(CrawlError::Status {
                what: block_id.to_string(),
                status: 404,
            })?;
            let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (start + page_size as usize).min(all.len());
            let has_more = end < all.len();
            let next_cursor = if has_more && self.broken_cursor.as_deref() != Some(block_id) {
                Some(end.to_string())
            } else {
                None
            };
            Ok(ChildrenBatch {
                results: all[start..end].to_vec(),
                next_cursor,
                has_more,
            })
        }
    }

    fn para(id: &str) -> Block {
        Block::new(id, BlockKind::paragraph(id))
    }

    fn child_page(id: &str, title: &str, edited: (i32, u32, u32)) -> Block {
        let mut block = Block::new(
            id,
            BlockKind::ChildPage {
                child_page: ChildPage {
                    title: title.to_string(),
                },
            },
        );
        block.has_children = true;
        block.last_edited_time = Some(
            Utc.with_ymd_and_hms(edited.0, edited.1, edited.2, 12, 0, 0)
                .unwrap(),
        );
        block
    }

    fn container(id: &str, kind: BlockKind) -> Block {
        let mut block = Block::new(id, kind);
        block.has_children = true;
        block
    }

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_pagination_is_drained_in_order() {
        let mut source = FakeSource::default();
        source.page("root", "Root", (1..=5).map(|i| para(&format!("p{}", i))).collect());

        let crawler = TreeCrawler::new(&source, 2);
        let page = crawler.fetch_page("root").await.unwrap();

        let ids: Vec<_> = page.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p4", "p5"]);
        let child_calls = source
            .calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("children:root"))
            .count();
        assert_eq!(child_calls, 3);
    }

    #[tokio::test]
    async fn test_containers_recurse_but_child_pages_do_not() {
        let mut source = FakeSource::default();
        source.page(
            "root",
            "Root",
            vec![
                container("cl", BlockKind::ColumnList),
                child_page("sub", "Sub", (2023, 6, 1)),
            ],
        );
        source.container(
            "cl",
            vec![container("c1", BlockKind::Column), container("c2", BlockKind::Column)],
        );
        source.container("c1", vec![para("left")]);
        source.container("c2", vec![para("right")]);

        let crawler = TreeCrawler::new(&source, 100);
        let page = crawler.fetch_page("root").await.unwrap();

        let columns = page.blocks[0].children();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].children()[0].id, "right");
        assert!(page.blocks[1].children.is_none());
        assert!(!source.calls.borrow().iter().any(|c| c.starts_with("children:sub")));
    }

    #[tokio::test]
    async fn test_crawl_reaches_fixed_point_visiting_each_page_once() {
        let mut source = FakeSource::default();
        source.page(
            "root",
            "Root",
            vec![
                child_page("a", "A", (2024, 2, 1)),
                container("call", BlockKind::callout("see", "👉")),
            ],
        );
        source.container("call", vec![child_page("b", "B", (2024, 2, 2))]);
        source.page("a", "A", vec![child_page("c", "C", (2024, 3, 1))]);
        source.page("b", "B", vec![child_page("a", "A", (2024, 2, 1))]);
        source.page(
            "c",
            "C",
            vec![child_page("root", "Root", (2024, 3, 1)), child_page("b", "B", (2024, 2, 2))],
        );

        let crawler = TreeCrawler::new(&source, 100);
        let pages = crawler.crawl("root", cutoff()).await.unwrap();

        let ids: Vec<_> = pages.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["root", "a", "b", "c"]);
        for id in ["root", "a", "b", "c"] {
            assert_eq!(source.retrievals(id), 1, "page {} fetched once", id);
        }
        let parent = pages[3].parent.as_ref().unwrap();
        assert_eq!(parent.id, "a");
        assert_eq!(crate::model::plain_text(&parent.title), "A");
    }

    #[tokio::test]
    async fn test_stale_child_pages_are_not_expanded() {
        let mut source = FakeSource::default();
        source.page(
            "root",
            "Root",
            vec![
                child_page("old", "Old", (2023, 12, 31)),
                child_page("new", "New", (2024, 1, 1)),
            ],
        );
        source.page("new", "New", vec![para("fresh")]);

        let crawler = TreeCrawler::new(&source, 100);
        let pages = crawler.crawl("root", cutoff()).await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].id(), "new");
        assert_eq!(source.retrievals("old"), 0);
    }

    #[tokio::test]
    async fn test_missing_cursor_is_an_incomplete_page() {
        let mut source = FakeSource::default();
        source.page("root", "Root", (1..=3).map(|i| para(&format!("p{}", i))).collect());
        source.broken_cursor = Some("root".to_string());

        let crawler = TreeCrawler::new(&source, 2);
        let err = crawler.fetch_page("root").await.unwrap_err();
        assert!(matches!(
            err,
            CrawlError::IncompletePagination { ref block_id } if block_id == "root"
        ));
    }

    #[tokio::test]
    async fn test_failed_child_page_fetch_aborts_crawl() {
        let mut source = FakeSource::default();
        source.page("root", "Root", vec![child_page("gone", "Gone", (2024, 4, 1))]);

        let crawler = TreeCrawler::new(&source, 100);
        let result = crawler.crawl("root", cutoff()).await;
        assert!(matches!(result, Err(CrawlError::Status { status: 404, .. })));
    }
}
