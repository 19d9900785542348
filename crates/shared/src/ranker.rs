//! Relevance ranking of arXiv candidates against the reading corpus.
//!
//! Each candidate is scored by its cosine similarity to every corpus paper,
//! weighted so that recently added papers count more:
//!
//! ```text
//! w_i     = 1 / (1 + log10(i + 1))      (i = 0 is the newest corpus paper)
//! score_c = 10 * Σ_i (w_i / Σ_j w_j) * cos(c, corpus_i)
//! ```
//!
//! Texts the embedder could not embed are skipped on both sides. When nothing
//! is left on either side, ranking fails instead of producing an empty list.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::arxiv::ArxivPaper;
use crate::corpus::CorpusPaper;
use crate::embedding::{cosine_similarity, Embedder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: ArxivPaper,
    pub score: f32,
    #[serde(default)]
    pub tldr: Option<String>,
}

/// Normalized time-decay weights, newest first.
pub fn time_decay_weights(n: usize) -> Vec<f32> {
    let raw: Vec<f32> = (0..n)
        .map(|i| 1.0 / (1.0 + ((i + 1) as f32).log10()))
        .collect();
    let total: f32 = raw.iter().sum();
    if total <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|w| w / total).collect()
}

/// Score each candidate vector against the (newest-first) corpus vectors.
pub fn score_candidates(corpus_vectors: &[Vec<f32>], candidate_vectors: &[Vec<f32>]) -> Vec<f32> {
    let weights = time_decay_weights(corpus_vectors.len());

    candidate_vectors
        .iter()
        .map(|candidate| {
            let weighted: f32 = corpus_vectors
                .iter()
                .zip(&weights)
                .map(|(doc, w)| w * cosine_similarity(candidate, doc))
                .sum();
            weighted * 10.0
        })
        .collect()
}

/// Sort by score descending, keeping input order for ties. NaN sorts last.
pub fn sort_by_score(papers: &mut [ScoredPaper]) {
    papers.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (false, false) => b.score.total_cmp(&a.score),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
}

pub struct RelevanceRanker<E> {
    embedder: E,
}

impl<E: Embedder> RelevanceRanker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Rank `candidates` against `corpus` and keep the best `top_n`.
    pub async fn rank(
        &self,
        corpus: &[CorpusPaper],
        candidates: Vec<ArxivPaper>,
        top_n: usize,
    ) -> Result<Vec<ScoredPaper>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        if corpus.is_empty() {
            bail!("Cannot rank papers against an empty corpus");
        }

        let mut ordered: Vec<&CorpusPaper> = corpus.iter().collect();
        ordered.sort_by(|a, b| b.date_added.cmp(&a.date_added));

        let corpus_texts: Vec<String> = ordered.iter().map(|p| p.abstract_text.clone()).collect();
        let corpus_vectors: Vec<Vec<f32>> = self
            .embedder
            .embed(&corpus_texts)
            .await
            .context("Failed to embed corpus")?
            .into_iter()
            .flatten()
            .collect();

        if corpus_vectors.is_empty() {
            bail!("No corpus paper could be embedded");
        }
        if corpus_vectors.len() < ordered.len() {
            tracing::warn!(
                skipped = ordered.len() - corpus_vectors.len(),
                "Corpus papers without embeddings were skipped"
            );
        }

        let candidate_texts: Vec<String> = candidates.iter().map(|p| p.summary.clone()).collect();
        let candidate_embeddings = self
            .embedder
            .embed(&candidate_texts)
            .await
            .context("Failed to embed candidates")?;

        let (kept, vectors): (Vec<ArxivPaper>, Vec<Vec<f32>>) = candidates
            .into_iter()
            .zip(candidate_embeddings)
            .filter_map(|(paper, vector)| match vector {
                Some(v) => Some((paper, v)),
                None => {
                    tracing::warn!(arxiv_id = %paper.arxiv_id, "Skipping candidate without embedding");
                    None
                }
            })
            .unzip();

        if kept.is_empty() {
            bail!("No candidate paper could be embedded");
        }

        let scores = score_candidates(&corpus_vectors, &vectors);

        let mut ranked: Vec<ScoredPaper> = kept
            .into_iter()
            .zip(scores)
            .map(|(paper, score)| ScoredPaper {
                paper,
                score,
                tldr: None,
            })
            .collect();

        sort_by_score(&mut ranked);
        ranked.truncate(top_n);

        tracing::info!(
            corpus = corpus_vectors.len(),
            ranked = ranked.len(),
            model = self.embedder.model_name(),
            "Ranked candidates"
        );

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_normalized_and_decreasing() {
        let w = time_decay_weights(5);
        let total: f32 = w.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(w.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn single_weight_is_one() {
        assert_eq!(time_decay_weights(1), vec![1.0]);
        assert!(time_decay_weights(0).is_empty());
    }

    #[test]
    fn identical_candidate_scores_ten() {
        let corpus = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let scores = score_candidates(&corpus, &[vec![2.0, 0.0]]);
        assert!((scores[0] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn newer_corpus_papers_dominate() {
        // newest paper points along x, older along y
        let corpus = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let scores = score_candidates(&corpus, &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(scores[0] > scores[1]);
    }

    fn scored(id: &str, score: f32) -> ScoredPaper {
        ScoredPaper {
            paper: ArxivPaper {
                arxiv_id: id.to_string(),
                title: id.to_string(),
                summary: String::new(),
                authors: vec![],
                categories: vec![],
                published: None,
                abs_url: String::new(),
                pdf_url: String::new(),
            },
            score,
            tldr: None,
        }
    }

    #[test]
    fn sort_is_descending_stable_and_nan_last() {
        let mut papers = vec![
            scored("a", 1.0),
            scored("b", f32::NAN),
            scored("c", 3.0),
            scored("d", 1.0),
        ];
        sort_by_score(&mut papers);
        let ids: Vec<&str> = papers.iter().map(|p| p.paper.arxiv_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "d", "b"]);
    }
}
