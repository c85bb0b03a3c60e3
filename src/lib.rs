// Re-export modules
pub mod config;
pub mod crawlers;
pub mod digest;
pub mod error;
pub mod mail;
pub mod model;
pub mod render;
pub mod resources;
pub mod summarize;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::PublisherConfig;
pub use model::{Block, BlockKind, Page};

use chrono::{Days, Local, NaiveDate};
use crawlers::cache::{cache_path, load_pages, merge_pages, report_cached, save_pages};
use crawlers::notion::NotionClient;
use crawlers::{ContentSource, TreeCrawler, normalize_id, page_id_from_arg};
use digest::{DigestOptions, SelectorInliner, assemble_digest, mailable_digest};
use render::{UrlMap, preprocess_page, render_page, with_table_of_contents};
use resources::{ConvertScaler, HttpFetcher, ImageScaler, ResourceCache, ResourceFetcher};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Look back this far when no incremental window is given
const FULL_HISTORY_DAYS: u64 = 9999;

/// Builder for a publishing run over the page tree below one root page
pub struct Publisher {
    root_id: String,
    config: PublisherConfig,
    fetch: bool,
    since_days: Option<u64>,
    cache_file: PathBuf,
}

impl Publisher {
    /// Create a publisher for a root page URL or id
    pub fn new(root: &str) -> Self {
        let root_id = page_id_from_arg(root);
        let cache_file = cache_path(&root_id);
        Self {
            root_id,
            config: PublisherConfig::default(),
            fetch: false,
            since_days: None,
            cache_file,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Refresh pages from the content API instead of only using the cache
    pub fn with_fetch(mut self, fetch: bool) -> Self {
        self.fetch = fetch;
        self
    }

    /// Only refresh pages edited in the last `days` days and merge them into the cache
    pub fn with_since(mut self, days: Option<u64>) -> Self {
        self.since_days = days;
        self
    }

    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let config = PublisherConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Keep the crawl cache somewhere else than `<root id>-cache.json`
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = path.into();
        self
    }

    /// Oldest edit date a crawl starting on `today` refreshes
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        let days = self.since_days.unwrap_or(FULL_HISTORY_DAYS);
        today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
    }

    /// Cached pages, logging which ones a crawl would refresh
    pub fn cached_pages(&self, cutoff: NaiveDate) -> Vec<Page> {
        let pages = load_pages(&self.cache_file);
        report_cached(&pages, cutoff);
        pages
    }

    /// Crawl `source` and update the cache. An incremental run merges the
    /// fresh pages into `cached`; a full run replaces them.
    pub async fn refresh<S: ContentSource>(
        &self,
        source: &S,
        cached: Vec<Page>,
        cutoff: NaiveDate,
    ) -> Result<Vec<Page>, Box<dyn Error>> {
        let fresh = TreeCrawler::new(source, self.config.notion.page_size)
            .crawl(&self.root_id, cutoff)
            .await?;
        let pages = if self.since_days.is_some() {
            merge_pages(cached, fresh)
        } else {
            fresh
        };
        save_pages(&self.cache_file, &pages)?;
        Ok(pages)
    }

    /// Render every page and its digest into the output directory, returning
    /// the written files
    pub async fn publish<F, S>(
        &self,
        pages: &[Page],
        resources: &ResourceCache<F, S>,
    ) -> Result<Vec<PathBuf>, Box<dyn Error>>
    where
        F: ResourceFetcher,
        S: ImageScaler,
    {
        let out_dir = Path::new(&self.config.out_dir);
        fs::create_dir_all(out_dir)?;

        let mut urls = UrlMap::new();
        for page in pages {
            preprocess_page(page, &mut urls, resources).await?;
        }
        let absolute = urls.with_prefix(&self.config.site_root);

        let css = match fs::read_to_string(&self.config.digest_stylesheet) {
            Ok(css) => css,
            Err(e) => {
                ::log::warn!(
                    "Digests will not be styled, cannot read {}: {}",
                    self.config.digest_stylesheet,
                    e
                );
                String::new()
            }
        };
        let options = DigestOptions::from_config(&self.config);

        let mut written = Vec::new();
        for page in pages {
            let slug = urls.resolve(page.id())?.to_string();
            let annotated = with_table_of_contents(page);

            let html = render_page(&annotated, &urls, &self.config.stylesheet)?;
            written.push(write_output(out_dir, &slug, &html)?);
            if normalize_id(page.id()) == self.root_id {
                written.push(write_output(out_dir, "index.html", &html)?);
            }

            let page_url = format!("{}{}", self.config.site_root, slug);
            let articles = summarize::summarize(&annotated, &self.config.summary);
            let digest = assemble_digest(&articles, &page_url, &absolute, &options)?;
            let mail = mailable_digest(&digest, &css, &SelectorInliner);
            written.push(write_output(out_dir, &format!("{}.summary.html", slug), &mail)?);

            ::log::info!(
                "PUBLISHED {} as {} with {} articles",
                page.title_text(),
                slug,
                articles.len()
            );
        }
        Ok(written)
    }

    /// Run against the Notion API, the network and ImageMagick
    pub async fn run(&self) -> Result<Vec<PathBuf>, Box<dyn Error>> {
        let cutoff = self.cutoff(Local::now().date_naive());
        ::log::info!("Root is {}, refreshing pages edited since {}", self.root_id, cutoff);

        let mut pages = self.cached_pages(cutoff);
        if self.fetch {
            let client = NotionClient::from_env(&self.config.notion)?;
            pages = self.refresh(&client, pages, cutoff).await?;
        }
        for page in &pages {
            ::log::info!(
                "PAGE: {} {}",
                page.title_text(),
                page.info.last_edited_time.date_naive()
            );
        }

        let resources = ResourceCache::new(
            &self.config.out_dir,
            HttpFetcher::new(),
            ConvertScaler::default(),
        )
        .with_timeout(self.config.resource_timeout_secs)
        .with_sizes(self.config.derivative_sizes.clone());
        self.publish(&pages, &resources).await
    }
}

fn write_output(dir: &Path, name: &str, contents: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    ::log::debug!("Wrote {}", path.display());
    Ok(path)
}
