//! arXiv Atom API client.
//!
//! Candidates for a day are selected with a `submittedDate` window over the
//! configured categories and paged with `start`/`max_results`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PAGE_SIZE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArxivPaper {
    /// Versionless identifier, e.g. `2401.01234`.
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub abs_url: String,
    pub pdf_url: String,
}

/// Categories from an `ARXIV_QUERY` value such as `cs.AI+cs.CL`.
pub fn parse_categories(query: &str) -> Vec<String> {
    query
        .split('+')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// `(cat:a OR cat:b) AND submittedDate:[YYYYMMDD0000 TO YYYYMMDD2359]`
pub fn build_search_query(categories: &[String], date: NaiveDate) -> String {
    let cats = categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| format!("cat:{}", c))
        .collect::<Vec<_>>()
        .join(" OR ");
    let day = date.format("%Y%m%d");
    format!("({}) AND submittedDate:[{}0000 TO {}2359]", cats, day, day)
}

pub struct ArxivClient {
    client: Client,
    endpoint: String,
    max_results: usize,
    page_delay: Duration,
    retry_delay: Duration,
}

impl ArxivClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("arxiv-digest/0.1")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: "https://export.arxiv.org/api/query".to_string(),
            max_results: 200,
            // arXiv asks clients to wait 3 seconds between calls
            page_delay: Duration::from_secs(3),
            retry_delay: Duration::from_secs(10),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_delays(mut self, page_delay: Duration, retry_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self.retry_delay = retry_delay;
        self
    }

    pub async fn fetch_papers_by_date(
        &self,
        categories: &[String],
        date: NaiveDate,
    ) -> Result<Vec<ArxivPaper>> {
        if categories.iter().all(|c| c.trim().is_empty()) {
            anyhow::bail!("No arXiv categories configured");
        }

        let search_query = build_search_query(categories, date);
        let mut papers: Vec<ArxivPaper> = Vec::new();
        let mut start = 0;

        while start < self.max_results {
            let page_size = PAGE_SIZE.min(self.max_results - start);
            let body = self.fetch_page(&search_query, start, page_size).await?;
            let feed = parse_feed(&body).context("Failed to parse arXiv Atom feed")?;

            let count = feed.papers.len();
            papers.extend(feed.papers);
            start += count;

            let exhausted = feed.total_results.is_some_and(|total| start >= total);
            if count < page_size || exhausted {
                break;
            }

            tokio::time::sleep(self.page_delay).await;
        }

        // Entries can repeat across pages when new submissions shift the window
        let mut seen = std::collections::HashSet::new();
        papers.retain(|p| seen.insert(p.arxiv_id.clone()));

        tracing::info!(%date, count = papers.len(), "Fetched arXiv candidates");
        Ok(papers)
    }

    async fn fetch_page(
        &self,
        search_query: &str,
        start: usize,
        page_size: usize,
    ) -> Result<String> {
        let mut url = url::Url::parse(&self.endpoint).context("Invalid arXiv endpoint")?;
        url.query_pairs_mut()
            .append_pair("search_query", search_query)
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &page_size.to_string())
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending");

        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = self.retry_delay * 2_u32.pow(attempt - 1);
                tracing::warn!(attempt, ?backoff, "Retrying arXiv request");
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .context("Failed to read arXiv response body");
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err =
                            Some(anyhow::anyhow!("arXiv API error {}: {}", status, error_text));
                        continue;
                    }
                    anyhow::bail!("arXiv API error {}: {}", status, error_text);
                }
                Err(e) => {
                    last_err =
                        Some(anyhow::Error::new(e).context("Failed to reach the arXiv API"));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("arXiv request failed after retries")))
    }
}

#[derive(Debug, Default)]
pub struct Feed {
    pub total_results: Option<usize>,
    pub papers: Vec<ArxivPaper>,
}

#[derive(Default)]
struct EntryBuilder {
    id_url: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    categories: Vec<String>,
    pdf_url: Option<String>,
}

impl EntryBuilder {
    fn finish(self) -> Option<ArxivPaper> {
        let tail = self.id_url.rsplit_once("/abs/").map(|(_, t)| t)?;
        let arxiv_id = strip_version(tail.trim_matches('/')).to_string();
        if arxiv_id.is_empty() {
            return None;
        }

        let published = DateTime::parse_from_rfc3339(self.published.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc));

        Some(ArxivPaper {
            pdf_url: self
                .pdf_url
                .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", arxiv_id)),
            abs_url: format!("https://arxiv.org/abs/{}", arxiv_id),
            arxiv_id,
            title: normalize_ws(&self.title),
            summary: normalize_ws(&self.summary),
            authors: self.authors,
            categories: self.categories,
            published,
        })
    }
}

fn strip_version(id: &str) -> &str {
    match id.rsplit_once('v') {
        Some((base, version))
            if !base.is_empty()
                && !version.is_empty()
                && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

/// Parse an arXiv Atom feed. Tags are matched on their local name so the
/// `opensearch:` and `arxiv:` prefixes don't matter.
pub fn parse_feed(body: &str) -> Result<Feed> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("XML error at position {}", reader.buffer_position()))?;

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "entry" => entry = Some(EntryBuilder::default()),
                    "author" => in_author = true,
                    _ => {}
                }
                if let Some(cur) = entry.as_mut() {
                    handle_attributes(cur, &name, &e);
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if let Some(cur) = entry.as_mut() {
                    handle_attributes(cur, &name, &e);
                }
            }
            Event::Text(t) => {
                let chunk = t.unescape().context("Invalid XML text")?;
                text.push_str(&chunk);
            }
            Event::CData(t) => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let value = std::mem::take(&mut text);

                match (entry.as_mut(), name.as_str()) {
                    (None, "totalResults") => {
                        feed.total_results = value.trim().parse().ok();
                    }
                    (Some(_), "entry") => {
                        if let Some(paper) = entry.take().and_then(EntryBuilder::finish) {
                            feed.papers.push(paper);
                        }
                    }
                    (Some(_), "author") => in_author = false,
                    (Some(cur), "id") => cur.id_url = value.trim().to_string(),
                    (Some(cur), "title") => cur.title = value,
                    (Some(cur), "summary") => cur.summary = value,
                    (Some(cur), "published") => cur.published = value,
                    (Some(cur), "name") if in_author => {
                        let author = normalize_ws(&value);
                        if !author.is_empty() {
                            cur.authors.push(author);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn handle_attributes(cur: &mut EntryBuilder, name: &str, e: &BytesStart<'_>) {
    match name {
        "category" => {
            if let Some(term) = attribute(e, b"term").filter(|t| !t.trim().is_empty()) {
                if !cur.categories.contains(&term) {
                    cur.categories.push(term);
                }
            }
        }
        "link" => {
            let is_pdf = attribute(e, b"title").as_deref() == Some("pdf")
                || attribute(e, b"type").as_deref() == Some("application/pdf");
            if is_pdf {
                cur.pdf_url = attribute(e, b"href");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query</title>
  <opensearch:totalResults>2</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2401.01234v2</id>
    <published>2024-01-02T18:00:00Z</published>
    <title>Sparse   Attention
      for Long Documents</title>
    <summary>  We study sparse attention &amp; long inputs. </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2401.01234v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.01234v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/cs/9901001v1</id>
    <published>2024-01-02T10:00:00Z</published>
    <title>Old Style Identifier</title>
    <summary>Abstract two.</summary>
    <author><name>Grace Hopper</name></author>
  </entry>
</feed>"#;

    #[test]
    fn categories_split_on_plus() {
        assert_eq!(
            parse_categories("cs.AI+cs.CL + cs.LG"),
            vec!["cs.AI", "cs.CL", "cs.LG"]
        );
        assert!(parse_categories(" + ").is_empty());
    }

    #[test]
    fn search_query_has_category_and_date_window() {
        let cats = vec!["cs.AI".to_string(), " cs.CL ".to_string()];
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            build_search_query(&cats, date),
            "(cat:cs.AI OR cat:cs.CL) AND submittedDate:[202403090000 TO 202403092359]"
        );
    }

    #[test]
    fn feed_entries_are_parsed() {
        let feed = parse_feed(FEED).unwrap();
        assert_eq!(feed.total_results, Some(2));
        assert_eq!(feed.papers.len(), 2);

        let first = &feed.papers[0];
        assert_eq!(first.arxiv_id, "2401.01234");
        assert_eq!(first.title, "Sparse Attention for Long Documents");
        assert_eq!(first.summary, "We study sparse attention & long inputs.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.categories, vec!["cs.CL", "cs.LG"]);
        assert_eq!(first.pdf_url, "http://arxiv.org/pdf/2401.01234v2");
        assert_eq!(first.abs_url, "https://arxiv.org/abs/2401.01234");
        assert!(first.published.is_some());
    }

    #[test]
    fn old_style_ids_and_missing_pdf_links() {
        let feed = parse_feed(FEED).unwrap();
        let second = &feed.papers[1];
        assert_eq!(second.arxiv_id, "cs/9901001");
        assert_eq!(second.pdf_url, "https://arxiv.org/pdf/cs/9901001");
    }

    #[test]
    fn empty_feed_has_no_papers() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:totalResults></feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.total_results, Some(0));
        assert!(feed.papers.is_empty());
    }

    #[test]
    fn version_suffix_is_stripped_only_when_numeric() {
        assert_eq!(strip_version("2401.01234v12"), "2401.01234");
        assert_eq!(strip_version("2401.01234"), "2401.01234");
        assert_eq!(strip_version("solv-int/9901001"), "solv-int/9901001");
    }
}
