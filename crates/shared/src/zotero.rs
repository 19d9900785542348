use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::corpus::CorpusPaper;

const PAGE_SIZE: usize = 100;
const PAPER_ITEM_TYPES: &str = "conferencePaper || journalArticle || preprint";

#[derive(Debug, Deserialize)]
struct ZoteroItem {
    data: ItemData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemData {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    abstract_note: String,
    #[serde(default)]
    date_added: String,
    #[serde(default)]
    collections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ZoteroCollection {
    data: CollectionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionData {
    key: String,
    name: String,
    /// `false` for top-level collections, otherwise the parent key.
    #[serde(default)]
    parent_collection: serde_json::Value,
}

pub struct ZoteroClient {
    client: Client,
    base_url: String,
    user_id: String,
    api_key: String,
    page_delay: Duration,
}

impl ZoteroClient {
    pub fn new(user_id: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: "https://api.zotero.org".to_string(),
            user_id,
            api_key,
            page_delay: Duration::from_millis(500),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Map of collection key to its full slash-joined path.
    pub async fn fetch_collections(&self) -> Result<HashMap<String, String>> {
        let collections: Vec<ZoteroCollection> = self
            .fetch_all("collections", &[])
            .await
            .context("Failed to fetch Zotero collections")?;

        let nodes: HashMap<String, (String, Option<String>)> = collections
            .into_iter()
            .map(|c| {
                let parent = c.data.parent_collection.as_str().map(String::from);
                (c.data.key, (c.data.name, parent))
            })
            .collect();

        Ok(nodes
            .keys()
            .map(|key| (key.clone(), collection_path(key, &nodes)))
            .collect())
    }

    /// Fetch every paper-like item carrying an abstract.
    pub async fn fetch_corpus(&self) -> Result<Vec<CorpusPaper>> {
        let collections = self.fetch_collections().await?;

        let items: Vec<ZoteroItem> = self
            .fetch_all("items", &[("itemType", PAPER_ITEM_TYPES)])
            .await
            .context("Failed to fetch Zotero items")?;

        let total = items.len();
        let corpus: Vec<CorpusPaper> = items
            .into_iter()
            .filter(|item| !item.data.abstract_note.trim().is_empty())
            .map(|item| {
                let data = item.data;
                let date_added = DateTime::parse_from_rfc3339(&data.date_added)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                let paths = data
                    .collections
                    .iter()
                    .filter_map(|key| collections.get(key).cloned())
                    .collect();

                CorpusPaper {
                    key: data.key,
                    title: data.title,
                    abstract_text: data.abstract_note,
                    date_added,
                    paths,
                }
            })
            .collect();

        tracing::info!(
            fetched = total,
            with_abstract = corpus.len(),
            "Loaded Zotero corpus"
        );

        Ok(corpus)
    }

    async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut start = 0;

        loop {
            let mut url = url::Url::parse(&format!(
                "{}/users/{}/{}",
                self.base_url, self.user_id, resource
            ))
            .context("Invalid Zotero API URL")?;
            url.query_pairs_mut()
                .append_pair("format", "json")
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("start", &start.to_string())
                .extend_pairs(params);

            let response = self
                .client
                .get(url)
                .header("Zotero-API-Key", &self.api_key)
                .header("Zotero-API-Version", "3")
                .send()
                .await
                .context("Failed to reach the Zotero API")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("unknown error"));
                anyhow::bail!("Zotero API returned error: {} - {}", status, error_text);
            }

            let page = response
                .json::<Vec<T>>()
                .await
                .context("Failed to parse Zotero API response")?;

            let count = page.len();
            all.extend(page);

            if count < PAGE_SIZE {
                break;
            }

            start += count;
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(all)
    }
}

fn collection_path(key: &str, nodes: &HashMap<String, (String, Option<String>)>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(key.to_string());
    let mut seen = std::collections::HashSet::new();

    while let Some(k) = current {
        if !seen.insert(k.clone()) {
            break;
        }
        match nodes.get(&k) {
            Some((name, parent)) => {
                segments.push(name.clone());
                current = parent.clone();
            }
            None => break,
        }
    }

    segments.reverse();
    segments.join("/")
}
