use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::ranker::ScoredPaper;

const MAX_ATTEMPTS: u32 = 5;
/// Abstracts longer than this are cut before they go into a prompt.
pub const MAX_ABSTRACT_CHARS: usize = 10000;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

/// Minimal client for an OpenAI-compatible chat completions endpoint.
pub struct LlmClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    semaphore: Arc<Semaphore>,
    retry_delay: Duration,
}

impl LlmClient {
    pub fn new(api_base: &str, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        // Reduce concurrency to avoid rate limits
        let semaphore = Arc::new(Semaphore::new(2));

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            semaphore,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send a system + user exchange and return the reply text.
    pub async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let _permit = self.semaphore.acquire().await?;

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.try_chat(system, user, max_tokens).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let is_rate_limit = is_rate_limited(&e);
                    if attempt + 1 == MAX_ATTEMPTS {
                        last_err = Some(e);
                        break;
                    }

                    // Longer backoff for rate limits
                    let backoff = if is_rate_limit {
                        self.retry_delay * 15 * (attempt + 1)
                    } else {
                        self.retry_delay * 2_u32.pow(attempt)
                    };
                    tracing::warn!(error = %e, ?backoff, "LLM request failed, retrying");
                    last_err = Some(e);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Max retries reached")))
    }

    async fn try_chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send request to the LLM API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(ApiError {
                status: status.as_u16(),
                body: error_text,
            }
            .into());
        }

        let chat = response
            .json::<ChatResponse>()
            .await
            .context("Failed to parse LLM API response")?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default())
    }
}

/// Non-success HTTP reply from the chat endpoint.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLM API error {}: {}", self.status, self.body)
    }
}

impl std::error::Error for ApiError {}

fn is_rate_limited(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(|e| e.status == 429)
}

/// Truncate to at most `max` bytes, respecting UTF-8 boundaries.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Writes one-sentence TLDRs for ranked papers.
pub struct TldrGenerator<'a> {
    llm: &'a LlmClient,
    language: String,
}

impl<'a> TldrGenerator<'a> {
    pub fn new(llm: &'a LlmClient, language: impl Into<String>) -> Self {
        Self {
            llm,
            language: language.into(),
        }
    }

    pub async fn generate(&self, paper: &ScoredPaper) -> Result<String> {
        let system = "You are an assistant who perfectly summarizes scientific paper, \
                      and gives the core idea of the paper to the user.";
        let prompt = format!(
            "Given the title and abstract of a paper, generate a one-sentence TLDR summary in {}:\n\n\
             Title: {}\n\nAbstract: {}",
            self.language,
            paper.paper.title,
            truncate_utf8(&paper.paper.summary, MAX_ABSTRACT_CHARS)
        );

        let reply = self.llm.chat(system, &prompt, 256).await?;
        let tldr = reply.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        if tldr.is_empty() {
            anyhow::bail!("LLM returned an empty TLDR");
        }
        Ok(tldr.to_string())
    }

    /// Fill in `tldr` for every paper; failures leave it empty.
    pub async fn summarize_parallel(&self, papers: &mut [ScoredPaper]) {
        let results: Vec<(usize, Option<String>)> = stream::iter(papers.iter().enumerate())
            .map(|(idx, paper)| async move {
                match self.generate(paper).await {
                    Ok(tldr) => (idx, Some(tldr)),
                    Err(e) => {
                        tracing::warn!(
                            arxiv_id = %paper.paper.arxiv_id,
                            error = %e,
                            "TLDR generation failed"
                        );
                        (idx, None)
                    }
                }
            })
            .buffer_unordered(2) // Reduced to 2 to avoid rate limits
            .collect()
            .await;

        for (idx, tldr) in results {
            papers[idx].tldr = tldr;
        }
    }
}
