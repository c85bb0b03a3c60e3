//! Persisted crawl results.
//!
//! The cache is a JSON array of pages. An incremental crawl only refetches
//! recently edited pages, so its result is merged into the cached set by page
//! id, the fresh copy replacing the cached one.

use crate::crawlers::normalize_id;
use crate::model::Page;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Cache file used for a root page id
pub fn cache_path(root_id: &str) -> PathBuf {
    PathBuf::from(format!("{}-cache.json", root_id))
}

/// Load cached pages, treating a missing or unreadable cache as empty
pub fn load_pages(path: &Path) -> Vec<Page> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            ::log::info!("No crawl cache at {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(pages) => pages,
        Err(e) => {
            ::log::warn!("Ignoring unreadable crawl cache {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Write pages to the cache through a temporary file so readers never see a partial cache
pub fn save_pages(path: &Path, pages: &[Page]) -> io::Result<()> {
    let json = serde_json::to_string(pages).map_err(io::Error::other)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    ::log::info!("Saved {} pages to {}", pages.len(), path.display());
    Ok(())
}

/// Combine cached pages with freshly crawled ones; a fresh page replaces any
/// cached page with the same id and no id ever appears twice.
pub fn merge_pages(cached: Vec<Page>, fresh: Vec<Page>) -> Vec<Page> {
    let fresh_ids: HashSet<String> = fresh.iter().map(|p| normalize_id(p.id())).collect();
    let mut merged: Vec<Page> = cached
        .into_iter()
        .filter(|p| !fresh_ids.contains(&normalize_id(p.id())))
        .collect();
    ::log::info!(
        "Merging {} fresh pages into {} kept cached pages",
        fresh.len(),
        merged.len()
    );
    merged.extend(fresh);
    merged
}

/// Log which cached pages predate the cutoff and which a crawl will refresh
pub fn report_cached(pages: &[Page], cutoff: NaiveDate) {
    for page in pages {
        let edited = page.info.last_edited_time.date_naive();
        if edited < cutoff {
            ::log::info!("SKIP: {} {}", page.title_text(), edited);
        } else {
            ::log::info!("REFRESH: {} {}", page.title_text(), edited);
        }
    }
}
