use thiserror::Error;

/// Failures while acquiring the content tree. Any of them aborts the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("request for {what} failed: {source}")]
    Transport {
        what: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {what} returned status {status}")]
    Status { what: String, status: u16 },

    #[error("could not decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("children of block {block_id} reported more results without a cursor")]
    IncompletePagination { block_id: String },

    #[error("no secret token, set NOTION_SECRET")]
    MissingSecret,
}

/// Failures of the resource cache that cannot be skipped
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cache directory error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while producing HTML
#[derive(Debug, Error)]
pub enum RenderError {
    /// The url map was not populated for an id before rendering
    #[error("no url recorded for {0}")]
    MissingUrl(String),
}

/// Failures while preparing or dispatching mail
#[derive(Debug, Error)]
pub enum MailError {
    #[error("no recipients specified")]
    NoRecipients,

    #[error("batch sending requires BCC recipients only")]
    BatchNeedsBcc,

    #[error("message contains a redacted email address")]
    RedactedAddress,

    #[error("no access token, set GMAIL_ACCESS_TOKEN")]
    MissingToken,

    #[error("mail api request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail api returned status {status}: {body}")]
    Status { status: u16, body: String },
}
