//! Passes that run over the whole page set before anything is rendered.

use super::UrlMap;
use super::text::text_to_slug;
use crate::error::ResourceError;
use crate::model::{Block, BlockKind, BlockTag, MediaSource, Page, Visit, rewrite, walk};
use crate::resources::{ImageScaler, ResourceCache, ResourceFetcher};

/// Record the output file name of `page`, `<title slug>.html`, suffixing `-1`
/// until it is not taken by a page seen earlier
pub fn assign_slug(page: &Page, urls: &mut UrlMap) -> String {
    let mut slug = text_to_slug(&page.title_text());
    while urls.contains_location(&format!("{}.html", slug)) {
        slug.push_str("-1");
    }
    let file = format!("{}.html", slug);
    urls.insert(page.id(), file.clone());
    file
}

/// Cache the cover and every image and file block of `page`, recording the
/// local names in `urls`. Covers are keyed by their remote URL, blocks by id.
pub async fn cache_page_resources<F, S>(
    page: &Page,
    urls: &mut UrlMap,
    resources: &ResourceCache<F, S>,
) -> Result<(), ResourceError>
where
    F: ResourceFetcher,
    S: ImageScaler,
{
    if let Some(cover) = &page.info.cover {
        let owner = format!("{}-cover", page.id());
        let name = resources.ensure_cached(&owner, cover).await?;
        urls.insert(cover.url(), name);
    }

    let mut media: Vec<(String, MediaSource)> = Vec::new();
    walk(
        &page.blocks,
        Some(&[BlockTag::Image, BlockTag::File]),
        &mut |block: &Block, _: &Visit<'_>| match &block.kind {
            BlockKind::Image { image: m } | BlockKind::File { file: m } => {
                media.push((block.id.clone(), m.source.clone()));
            }
            _ => {}
        },
    );

    for (id, source) in media {
        let name = resources.ensure_cached(&id, &source).await?;
        urls.insert(id, name);
    }
    Ok(())
}

/// Slug and resources of one page, in the order rendering needs them
pub async fn preprocess_page<F, S>(
    page: &Page,
    urls: &mut UrlMap,
    resources: &ResourceCache<F, S>,
) -> Result<String, ResourceError>
where
    F: ResourceFetcher,
    S: ImageScaler,
{
    let slug = assign_slug(page, urls);
    ::log::info!("PREPARE {} -> {}", page.title_text(), slug);
    cache_page_resources(page, urls, resources).await?;
    Ok(slug)
}

/// Copy of `page` whose table-of-contents blocks list the page's top-level
/// headings in document order
pub fn with_table_of_contents(page: &Page) -> Page {
    let mut headings = Vec::new();
    walk(
        &page.blocks,
        Some(&[BlockTag::Heading1]),
        &mut |block: &Block, _: &Visit<'_>| headings.push(block.plain_text()),
    );
    ::log::debug!("HEADINGS {:?}", headings);

    let blocks = rewrite(
        &page.blocks,
        Some(&[BlockTag::TableOfContents]),
        &mut |block: &mut Block, _: &Visit<'_>| {
            if let BlockKind::TableOfContents { table_of_contents } = &mut block.kind {
                table_of_contents.headings = headings.clone();
            }
        },
    );

    Page {
        info: page.info.clone(),
        blocks,
        parent: page.parent.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        FileUrl, Media, PageInfo, PageProperties, RichText, TableOfContents, TitleProperty,
    };
    use crate::resources::BoxError;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use std::time::Duration;

    struct OkFetcher;

    impl ResourceFetcher for OkFetcher {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<(u16, Vec<u8>), BoxError> {
            Ok((200, b"data".to_vec()))
        }
    }

    struct NoScaler;

    impl ImageScaler for NoScaler {
        async fn scale(
            &self,
            _input: &Path,
            _output: &Path,
            _max_dim: u32,
        ) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn page(id: &str, title: &str, blocks: Vec<Block>) -> Page {
        Page {
            info: PageInfo {
                id: id.to_string(),
                last_edited_time: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
                icon: None,
                cover: None,
                properties: PageProperties {
                    title: TitleProperty {
                        title: vec![RichText::plain(title)],
                    },
                },
            },
            blocks,
            parent: None,
        }
    }

    fn toc(id: &str) -> Block {
        Block::new(
            id,
            BlockKind::TableOfContents {
                table_of_contents: TableOfContents::default(),
            },
        )
    }

    #[test]
    fn test_slugs_are_unique_across_pages() {
        let mut urls = UrlMap::new();
        let mut slug = |id: &str, title: &str| assign_slug(&page(id, title, vec![]), &mut urls);
        assert_eq!(slug("a", "Weekly News"), "weekly-news.html");
        assert_eq!(slug("b", "Weekly news"), "weekly-news-1.html");
        assert_eq!(slug("c", "weekly NEWS"), "weekly-news-1-1.html");
        assert_eq!(urls.get("b"), Some("weekly-news-1.html"));
    }

    #[test]
    fn test_table_of_contents_is_filled_on_a_copy() {
        let source = page(
            "p",
            "Digest",
            vec![
                Block::new("c", BlockKind::callout("In this issue", "📌"))
                    .with_children(vec![toc("t")]),
                Block::new("h1", BlockKind::heading("First")),
                Block::new("col", BlockKind::Column)
                    .with_children(vec![Block::new("h2", BlockKind::heading("Nested"))]),
                Block::new("h3", BlockKind::heading("Last")),
            ],
        );

        let annotated = with_table_of_contents(&source);
        match &annotated.blocks[0].children()[0].kind {
            BlockKind::TableOfContents { table_of_contents } => {
                assert_eq!(table_of_contents.headings, vec!["First", "Nested", "Last"]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &source.blocks[0].children()[0].kind {
            BlockKind::TableOfContents { table_of_contents } => {
                assert!(table_of_contents.headings.is_empty());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_preprocess_records_every_media_reference() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResourceCache::new(dir.path(), OkFetcher, NoScaler).with_sizes(vec![1024, 320]);
        let file = Block::new(
            "f",
            BlockKind::File {
                file: Media {
                    source: MediaSource::File {
                        file: FileUrl {
                            url: "https://files.example/minutes.pdf".to_string(),
                        },
                    },
                    caption: Vec::new(),
                    link: None,
                },
            },
        );
        let mut source = page(
            "p",
            "Digest",
            vec![
                Block::new("i", BlockKind::image("https://img.example/a.jpg")),
                Block::new("cl", BlockKind::ColumnList).with_children(vec![file]),
            ],
        );
        source.info.cover = Some(MediaSource::External {
            external: FileUrl {
                url: "https://img.example/cover.png".to_string(),
            },
        });

        let mut urls = UrlMap::new();
        let slug = preprocess_page(&source, &mut urls, &cache).await.unwrap();

        assert_eq!(slug, "digest.html");
        assert_eq!(urls.get("p"), Some("digest.html"));
        assert_eq!(urls.get("i"), Some("i-a-s1024.jpg"));
        assert_eq!(urls.get("f"), Some("f-minutes.pdf"));
        assert_eq!(
            urls.get("https://img.example/cover.png"),
            Some("p-cover-cover-s1024.png")
        );
        assert_eq!(urls.len(), 4);
    }
}
