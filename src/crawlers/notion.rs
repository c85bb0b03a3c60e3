use crate::config::NotionConfig;
use crate::crawlers::{ChildrenBatch, ContentSource};
use crate::error::CrawlError;
use crate::model::PageInfo;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Content source backed by the Notion REST API
pub struct NotionClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    secret: String,
}

impl NotionClient {
    /// Create a client authenticating with the given integration secret
    pub fn new(secret: &str, config: &NotionConfig) -> Result<Self, CrawlError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| CrawlError::Transport {
                what: "http client".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            secret: secret.to_string(),
        })
    }

    /// Create a client from the `NOTION_SECRET` environment variable
    pub fn from_env(config: &NotionConfig) -> Result<Self, CrawlError> {
        match std::env::var("NOTION_SECRET") {
            Ok(secret) if !secret.is_empty() => Self::new(&secret, config),
            _ => Err(CrawlError::MissingSecret),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, CrawlError> {
        let url = format!("{}{}", self.api_url, path);
        ::log::trace!("GET {} {:?}", url, query);

        let transport = |source| CrawlError::Transport {
            what: what.to_string(),
            source,
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret)
            .header("Notion-Version", &self.api_version)
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                what: what.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        serde_json::from_str(&body).map_err(|source| CrawlError::Decode {
            what: what.to_string(),
            source,
        })
    }
}

impl ContentSource for NotionClient {
    async fn retrieve_page(&self, page_id: &str) -> Result<PageInfo, CrawlError> {
        self.get_json(
            &format!("/v1/pages/{}", page_id),
            &[],
            &format!("page {}", page_id),
        )
        .await
    }

    async fn list_children(
        &self,
        block_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<ChildrenBatch, CrawlError> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        self.get_json(
            &format!("/v1/blocks/{}/children", block_id),
            &query,
            &format!("children of {}", block_id),
        )
        .await
    }
}
