//! Mail dispatch of a rendered digest.
//!
//! Every message is first stored as a draft; it is only sent when the
//! dispatcher was created with `commit`. Large audiences go out in batches of
//! BCC recipients so no batch exposes the list.

use crate::error::MailError;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use scraper::{ElementRef, Html, Node};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::io;
use std::path::Path;

/// What a page shows in place of an address it hid; mailing it would be useless
pub const REDACTED_MARKER: &str = "[email&#160;protected]";

const BOUNDARY: &str = "digest-press-alternative";

const BLOCK_ELEMENTS: [&str; 14] = [
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "hr", "table", "header",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

/// Read a text file written in UTF-8 or Latin-1
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    })
}

/// Addresses named by a command line value: a file with one address per
/// line, or else a comma separated list. Lines without `@` and lines
/// starting with `REJECT-` are skipped.
pub fn load_addresses(source: &str) -> io::Result<Vec<String>> {
    let path = Path::new(source);
    if !path.is_file() {
        return Ok(source
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect());
    }
    let addresses: Vec<String> = read_text(path)?
        .lines()
        .map(str::trim)
        .filter(|a| a.contains('@') && !a.starts_with("REJECT-"))
        .map(str::to_string)
        .collect();
    ::log::info!("Loaded {} addresses from {}", addresses.len(), source);
    Ok(addresses)
}

/// A digest ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub subject: String,
    pub html: String,
}

impl MailMessage {
    /// Refuses bodies in which an address was redacted
    pub fn new(from: &str, subject: &str, html: &str) -> Result<Self, MailError> {
        if html.contains(REDACTED_MARKER) {
            return Err(MailError::RedactedAddress);
        }
        Ok(Self {
            from: from.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        })
    }

    /// Append the body of `footer` to the message body
    pub fn with_footer(mut self, footer: &str) -> Self {
        let document = Html::parse_document(footer);
        let content = document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
            .map(|body| body.inner_html())
            .unwrap_or_else(|| footer.to_string());

        match self.html.rfind("</body>") {
            Some(end) => self.html.insert_str(end, &content),
            None => self.html.push_str(&content),
        }
        self
    }

    /// Text alternative of the body
    pub fn plain_text(&self) -> String {
        html_to_text(&self.html)
    }

    /// Full multipart/alternative message. Without direct recipients the
    /// message is addressed to its sender.
    pub fn to_mime(&self, recipients: &Recipients) -> String {
        let to = if recipients.to.is_empty() {
            self.from.clone()
        } else {
            recipients.to.join(", ")
        };

        let mut mime = String::new();
        mime.push_str(&format!("From: {}\r\n", self.from));
        mime.push_str(&format!("To: {}\r\n", to));
        if !recipients.cc.is_empty() {
            mime.push_str(&format!("Cc: {}\r\n", recipients.cc.join(", ")));
        }
        if !recipients.bcc.is_empty() {
            mime.push_str(&format!("Bcc: {}\r\n", recipients.bcc.join(", ")));
        }
        mime.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        mime.push_str("MIME-Version: 1.0\r\n");
        mime.push_str(&format!(
            "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
            BOUNDARY
        ));
        for (subtype, body) in [("plain", self.plain_text()), ("html", self.html.clone())] {
            mime.push_str(&format!("--{}\r\n", BOUNDARY));
            mime.push_str(&format!("Content-Type: text/{}; charset=\"utf-8\"\r\n", subtype));
            mime.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            mime.push_str(&wrap_base64(&STANDARD.encode(body)));
        }
        mime.push_str(&format!("--{}--\r\n", BOUNDARY));
        mime
    }
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value))
    }
}

fn wrap_base64(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(76)
        .map(|line| format!("{}\r\n", String::from_utf8_lossy(line)))
        .collect()
}

/// Readable text of an HTML document, one line per block element
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_text(document.root_element(), &mut text);

    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if matches!(name, "head" | "style" | "script") {
        return;
    }
    for child in element.children() {
        if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(&text.replace('\u{a0}', " "));
        }
    }
    if BLOCK_ELEMENTS.contains(&name) {
        out.push('\n');
    }
}

/// Stores and sends drafts
#[allow(async_fn_in_trait)]
pub trait Mailer {
    /// Store a raw RFC 822 message as a draft and return its id
    async fn create_draft(&self, raw: &str) -> Result<String, MailError>;

    /// Send a stored draft
    async fn send_draft(&self, draft_id: &str) -> Result<(), MailError>;
}

#[derive(Debug, Deserialize)]
struct Draft {
    id: String,
}

/// Mailer over the Gmail REST API, authorized with an OAuth access token
#[derive(Debug, Clone)]
pub struct GmailMailer {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GmailMailer {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: "https://gmail.googleapis.com".to_string(),
            token: token.to_string(),
        }
    }

    /// Token from `GMAIL_ACCESS_TOKEN`
    pub fn from_env() -> Result<Self, MailError> {
        match std::env::var("GMAIL_ACCESS_TOKEN") {
            Ok(token) if !token.is_empty() => Ok(Self::new(&token)),
            _ => Err(MailError::MissingToken),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, MailError> {
        let response = self
            .http
            .post(format!("{}/gmail/v1/users/me/{}", self.api_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl Mailer for GmailMailer {
    async fn create_draft(&self, raw: &str) -> Result<String, MailError> {
        let body = json!({ "message": { "raw": URL_SAFE.encode(raw) } });
        let draft: Draft = self.post("drafts", body).await?.json().await?;
        Ok(draft.id)
    }

    async fn send_draft(&self, draft_id: &str) -> Result<(), MailError> {
        self.post("drafts/send", json!({ "id": draft_id })).await?;
        Ok(())
    }
}

/// Creates drafts and, when committed, sends them
pub struct Dispatcher<'m, M> {
    mailer: &'m M,
    commit: bool,
}

impl<'m, M: Mailer> Dispatcher<'m, M> {
    pub fn new(mailer: &'m M, commit: bool) -> Self {
        Self { mailer, commit }
    }

    pub async fn send(
        &self,
        message: &MailMessage,
        recipients: &Recipients,
    ) -> Result<(), MailError> {
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let draft_id = self.mailer.create_draft(&message.to_mime(recipients)).await?;
        ::log::info!("Created draft {} for {} recipients", draft_id, recipients.len());

        if self.commit {
            self.mailer.send_draft(&draft_id).await?;
            ::log::info!("Sent draft {}", draft_id);
        } else {
            ::log::info!("Not sending without --commit");
        }
        Ok(())
    }

    /// Send to BCC recipients in groups of at most `batch_size`, returning
    /// the number of batches
    pub async fn batch_send(
        &self,
        message: &MailMessage,
        recipients: &Recipients,
        batch_size: usize,
    ) -> Result<usize, MailError> {
        if !recipients.to.is_empty() || !recipients.cc.is_empty() || recipients.bcc.is_empty() {
            return Err(MailError::BatchNeedsBcc);
        }
        let mut batches = 0;
        for chunk in recipients.bcc.chunks(batch_size.max(1)) {
            ::log::info!("Sending to {}", chunk.len());
            let batch = Recipients {
                bcc: chunk.to_vec(),
                ..Recipients::default()
            };
            self.send(message, &batch).await?;
            batches += 1;
        }
        Ok(batches)
    }
}
