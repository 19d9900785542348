//! Per-day fetch → rank → summarize → render → deliver flow.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::arxiv::{parse_categories, ArxivClient, ArxivPaper};
use crate::corpus::CorpusPaper;
use crate::digest::DigestRenderer;
use crate::embedding::Embedder;
use crate::llm::{LlmClient, TldrGenerator};
use crate::mailer::EmailSender;
use crate::models::DigestData;
use crate::ranker::RelevanceRanker;
use crate::rescorer::LlmRescorer;

/// Where candidate papers come from.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn fetch(&self, query: &str, date: NaiveDate) -> Result<Vec<ArxivPaper>>;
}

/// Where rendered digests go.
#[async_trait]
pub trait DigestSink: Send + Sync {
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub data: DigestData,
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn fetch(&self, query: &str, date: NaiveDate) -> Result<Vec<ArxivPaper>> {
        self.fetch_papers_by_date(&parse_categories(query), date).await
    }
}

#[async_trait]
impl DigestSink for EmailSender {
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        self.send(&digest.subject, &digest.html, &digest.text).await
    }
}

#[async_trait]
impl<T: DigestSink + ?Sized> DigestSink for Box<T> {
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        (**self).deliver(digest).await
    }
}

/// Delivers to every sink in order, stopping at the first failure.
#[async_trait]
impl DigestSink for Vec<Box<dyn DigestSink>> {
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        for sink in self {
            sink.deliver(digest).await?;
        }
        Ok(())
    }
}

/// Every day from `start` to `end`, inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        anyhow::bail!("Start date {} is after end date {}", start, end);
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Delivered { papers: usize },
    NoPapers,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DayReport {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
}

/// Optional chat-model steps applied after ranking.
pub struct LlmSteps {
    pub client: LlmClient,
    pub tldr: bool,
    pub rescore: bool,
    pub language: String,
}

pub struct DigestPipeline<S, E, D> {
    source: S,
    ranker: RelevanceRanker<E>,
    sink: D,
    corpus: Vec<CorpusPaper>,
    query: String,
    max_papers: usize,
    llm: Option<LlmSteps>,
}

impl<S, E, D> DigestPipeline<S, E, D>
where
    S: PaperSource,
    E: Embedder,
    D: DigestSink,
{
    pub fn new(
        source: S,
        ranker: RelevanceRanker<E>,
        sink: D,
        corpus: Vec<CorpusPaper>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            source,
            ranker,
            sink,
            corpus,
            query: query.into(),
            max_papers: 100,
            llm: None,
        }
    }

    pub fn with_max_papers(mut self, max_papers: usize) -> Self {
        self.max_papers = max_papers;
        self
    }

    pub fn with_llm(mut self, steps: LlmSteps) -> Self {
        self.llm = Some(steps);
        self
    }

    pub async fn run_day(&self, date: NaiveDate) -> Result<DayOutcome> {
        let candidates = self
            .source
            .fetch(&self.query, date)
            .await
            .with_context(|| format!("Failed to fetch papers for {}", date))?;

        if candidates.is_empty() {
            tracing::info!(%date, "No papers found");
            return Ok(DayOutcome::NoPapers);
        }

        let mut ranked = self
            .ranker
            .rank(&self.corpus, candidates, self.max_papers)
            .await?;

        if let Some(steps) = &self.llm {
            if steps.rescore {
                ranked = LlmRescorer::new(&steps.client)
                    .rescore(ranked, &self.corpus)
                    .await;
            }
            if steps.tldr {
                TldrGenerator::new(&steps.client, steps.language.as_str())
                    .summarize_parallel(&mut ranked)
                    .await;
            }
        }

        let digest = RenderedDigest {
            subject: DigestRenderer::subject(date),
            html: DigestRenderer::render_html(&ranked, date),
            text: DigestRenderer::render_text(&ranked, date),
            data: DigestData::new(date, self.query.clone(), ranked),
        };

        self.sink
            .deliver(&digest)
            .await
            .with_context(|| format!("Failed to deliver digest for {}", date))?;

        Ok(DayOutcome::Delivered {
            papers: digest.data.papers.len(),
        })
    }

    /// Run every day in the range. A failed day is recorded and the run goes on.
    pub async fn run_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DayReport>> {
        let mut reports = Vec::new();

        for date in date_range(start, end)? {
            tracing::info!(%date, "Processing");
            let outcome = match self.run_day(date).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let message = format!("{:#}", e);
                    tracing::error!(%date, error = %message, "Day failed");
                    DayOutcome::Failed(message)
                }
            };
            reports.push(DayReport { date, outcome });
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<String> = date_range(start, end)
            .unwrap()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(days, vec!["2024-02-28", "2024-02-29", "2024-03-01"]);
    }

    #[test]
    fn single_day_range() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_range(day, day).unwrap(), vec![day]);
    }

    #[test]
    fn reversed_range_is_an_error() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(date_range(start, end).is_err());
    }
}
