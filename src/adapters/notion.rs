//! Notion adapter.
//!
//! Each note becomes one page under a fixed parent page, with the note title
//! as the page title and the content as a single paragraph block.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, instrument};

use super::{ensure_success, AdapterError, Integration};
use crate::domain::{NoteItem, Outcome, PageReceipt, Receipt};

const INTEGRATION: &str = "notion";
const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion's limit for a single rich-text content string
const MAX_TEXT_CHARS: usize = 2000;

/// Notion pages client bound to one parent page
pub struct NotionClient {
    base_url: String,
    api_key: String,
    parent_page_id: String,
    client: reqwest::Client,
}

impl NotionClient {
    pub fn new(
        api_key: impl Into<String>,
        parent_page_id: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            parent_page_id: parent_page_id.into(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a page; returns the page URL and the raw API reply
    pub async fn create_page(&self, note: &NoteItem) -> Result<PageReceipt, AdapterError> {
        let body = page_body(&self.parent_page_id, note);

        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        let page: serde_json::Value = ensure_success(INTEGRATION, response)
            .await?
            .json()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        Ok(PageReceipt {
            url: page.get("url").and_then(|u| u.as_str()).map(str::to_string),
            page_data: page,
        })
    }
}

/// Split content into chunks Notion accepts, on char boundaries
fn text_chunks(content: &str) -> Vec<String> {
    if content.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(MAX_TEXT_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn page_body(parent_page_id: &str, note: &NoteItem) -> serde_json::Value {
    let rich_text: Vec<serde_json::Value> = text_chunks(&note.content)
        .into_iter()
        .map(|chunk| json!({"type": "text", "text": {"content": chunk}}))
        .collect();

    json!({
        "parent": {"type": "page_id", "page_id": parent_page_id},
        "properties": {
            "title": [
                {"type": "text", "text": {"content": note.title}}
            ]
        },
        "children": [
            {
                "object": "block",
                "type": "paragraph",
                "paragraph": {"rich_text": rich_text}
            }
        ]
    })
}

#[async_trait]
impl Integration<NoteItem> for NotionClient {
    fn name(&self) -> &str {
        INTEGRATION
    }

    #[instrument(skip(self, note), fields(title = %note.title))]
    async fn create(&self, note: &NoteItem) -> Outcome {
        match self.create_page(note).await {
            Ok(receipt) => {
                debug!(url = ?receipt.url, "Created Notion page");
                Outcome::Created(Receipt::Page(receipt))
            }
            Err(e) => {
                error!(error = %e, "Failed to create Notion page");
                Outcome::failed(e.to_string())
            }
        }
    }
}
