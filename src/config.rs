use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Configuration for the content API client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Base URL of the API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Value sent in the `Notion-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Number of children requested per call
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeout of a single API call in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Word and image allowances used when summarizing a page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryBudget {
    /// Images kept per article
    #[serde(default = "default_images_per_article")]
    pub images_per_article: i64,

    /// Words kept per article
    #[serde(default = "default_words_per_article")]
    pub words_per_article: i64,

    /// Word allowance multiplier of the lead article
    #[serde(default = "default_lead_multiplier")]
    pub lead_multiplier: i64,

    /// A block that overruns the allowance by fewer words is kept whole
    #[serde(default = "default_excess_tolerance")]
    pub excess_tolerance: i64,

    /// Words granted back by an evergreen callout
    #[serde(default = "default_callout_words")]
    pub callout_words: i64,

    /// Images granted back by an evergreen callout
    #[serde(default = "default_callout_images")]
    pub callout_images: i64,
}

/// Configuration of the whole publishing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Directory receiving rendered pages and cached resources
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Public URL the output directory is served from
    #[serde(default = "default_site_root")]
    pub site_root: String,

    /// Stylesheet referenced by full pages
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,

    /// Local stylesheet inlined into digests
    #[serde(default = "default_digest_stylesheet")]
    pub digest_stylesheet: String,

    /// Timeout for resource downloads in seconds
    #[serde(default = "default_resource_timeout")]
    pub resource_timeout_secs: u64,

    /// Bounding box sizes of the downscaled image variants, full-page size first
    #[serde(default = "default_derivative_sizes")]
    pub derivative_sizes: Vec<u32>,

    /// Label of the link replacing a truncated text tail
    #[serde(default = "default_read_more_inline")]
    pub read_more_inline: String,

    /// Label of the link appended after a truncated article
    #[serde(default = "default_read_more_trailing")]
    pub read_more_trailing: String,

    #[serde(default)]
    pub summary: SummaryBudget,

    #[serde(default)]
    pub notion: NotionConfig,
}

fn default_api_url() -> String {
    "https://api.notion.com".to_string()
}

fn default_api_version() -> String {
    "2022-06-28".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_images_per_article() -> i64 {
    1
}

fn default_words_per_article() -> i64 {
    75
}

fn default_lead_multiplier() -> i64 {
    10
}

fn default_excess_tolerance() -> i64 {
    25
}

fn default_callout_words() -> i64 {
    10000
}

fn default_callout_images() -> i64 {
    10
}

fn default_out_dir() -> String {
    "docs/".to_string()
}

fn default_site_root() -> String {
    "https://example.com/".to_string()
}

fn default_stylesheet() -> String {
    "connect.css".to_string()
}

fn default_digest_stylesheet() -> String {
    "resources/connect.css".to_string()
}

fn default_resource_timeout() -> u64 {
    10
}

fn default_derivative_sizes() -> Vec<u32> {
    vec![1024, 320]
}

fn default_read_more_inline() -> String {
    "read more...".to_string()
}

fn default_read_more_trailing() -> String {
    "Read more...".to_string()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SummaryBudget {
    fn default() -> Self {
        Self {
            images_per_article: default_images_per_article(),
            words_per_article: default_words_per_article(),
            lead_multiplier: default_lead_multiplier(),
            excess_tolerance: default_excess_tolerance(),
            callout_words: default_callout_words(),
            callout_images: default_callout_images(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            site_root: default_site_root(),
            stylesheet: default_stylesheet(),
            digest_stylesheet: default_digest_stylesheet(),
            resource_timeout_secs: default_resource_timeout(),
            derivative_sizes: default_derivative_sizes(),
            read_more_inline: default_read_more_inline(),
            read_more_trailing: default_read_more_trailing(),
            summary: SummaryBudget::default(),
            notion: NotionConfig::default(),
        }
    }
}

impl PublisherConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Full-page image variant size, if any variants are produced
    pub fn page_image_size(&self) -> Option<u32> {
        self.derivative_sizes.first().copied()
    }

    /// Mail image variant size, if a second variant is produced
    pub fn digest_image_size(&self) -> Option<u32> {
        self.derivative_sizes.get(1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"site_root": "https://news.example.org/", "summary": {"words_per_article": 40}}"#;
        let config: PublisherConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.site_root, "https://news.example.org/");
        assert_eq!(config.summary.words_per_article, 40);
        assert_eq!(config.summary.lead_multiplier, 10);
        assert_eq!(config.notion.page_size, 100);
        assert_eq!(config.page_image_size(), Some(1024));
        assert_eq!(config.digest_image_size(), Some(320));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publisher.json");
        std::fs::write(&path, r#"{"out_dir": "site/", "derivative_sizes": [800]}"#).unwrap();

        let config = PublisherConfig::from_file(&path).unwrap();
        assert_eq!(config.out_dir, "site/");
        assert_eq!(config.digest_image_size(), None);
        assert!(PublisherConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
