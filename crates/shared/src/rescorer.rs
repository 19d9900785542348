use anyhow::Result;
use futures::stream::{self, StreamExt};

use crate::corpus::CorpusPaper;
use crate::llm::{truncate_utf8, LlmClient, MAX_ABSTRACT_CHARS};
use crate::ranker::{sort_by_score, ScoredPaper};

const PROFILE_SIZE: usize = 20;
/// Share of the final score that comes from the embedding ranking.
const EMBEDDING_WEIGHT: f32 = 0.5;

/// Blends the embedding score with a relevance rating from the chat model.
pub struct LlmRescorer<'a> {
    llm: &'a LlmClient,
}

impl<'a> LlmRescorer<'a> {
    pub fn new(llm: &'a LlmClient) -> Self {
        Self { llm }
    }

    pub async fn rescore(
        &self,
        mut ranked: Vec<ScoredPaper>,
        corpus: &[CorpusPaper],
    ) -> Vec<ScoredPaper> {
        if ranked.is_empty() {
            return ranked;
        }

        let profile = reading_profile(corpus);

        let ratings: Vec<(usize, Option<f32>)> = stream::iter(ranked.iter().enumerate())
            .map(|(idx, paper)| {
                let profile = profile.as_str();
                async move {
                    match self.rate(profile, paper).await {
                        Ok(rating) => (idx, Some(rating)),
                        Err(e) => {
                            tracing::warn!(
                                arxiv_id = %paper.paper.arxiv_id,
                                error = %e,
                                "Rating failed, keeping embedding score"
                            );
                            (idx, None)
                        }
                    }
                }
            })
            .buffer_unordered(2)
            .collect()
            .await;

        for (idx, rating) in ratings {
            if let Some(rating) = rating {
                let paper = &mut ranked[idx];
                paper.score = EMBEDDING_WEIGHT * paper.score + (1.0 - EMBEDDING_WEIGHT) * rating;
            }
        }

        sort_by_score(&mut ranked);
        ranked
    }

    async fn rate(&self, profile: &str, paper: &ScoredPaper) -> Result<f32> {
        let system = "You rate how relevant a new research paper is to a reader. \
                      Answer with a single number from 0 to 10 and nothing else.";
        let prompt = format!(
            "Papers the reader added to their library recently:\n{}\n\n\
             New paper:\nTitle: {}\nAbstract: {}\n\n\
             How relevant is the new paper to this reader (0-10)?",
            profile,
            paper.paper.title,
            truncate_utf8(&paper.paper.summary, MAX_ABSTRACT_CHARS)
        );

        let reply = self.llm.chat(system, &prompt, 8).await?;
        parse_rating(&reply).ok_or_else(|| anyhow::anyhow!("Unparseable rating: {:?}", reply))
    }
}

/// Titles of the most recently added corpus papers, one per line.
fn reading_profile(corpus: &[CorpusPaper]) -> String {
    let mut recent: Vec<&CorpusPaper> = corpus.iter().collect();
    recent.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    recent
        .iter()
        .take(PROFILE_SIZE)
        .map(|p| format!("- {}", p.title))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First number in the reply, clamped to `[0, 10]`.
fn parse_rating(reply: &str) -> Option<f32> {
    let start = reply.find(|c: char| c.is_ascii_digit())?;
    let number: String = reply[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number
        .trim_end_matches('.')
        .parse::<f32>()
        .ok()
        .map(|r| r.clamp(0.0, 10.0))
}
