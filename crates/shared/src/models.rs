use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ranker::ScoredPaper;

pub const DIGEST_VERSION: &str = "1.0";

/// Snapshot of one day's ranked digest, saved next to the rendered HTML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestData {
    pub version: String,
    pub created_at: String,
    pub date: NaiveDate,
    pub query: String,
    pub papers: Vec<ScoredPaper>,
}

impl DigestData {
    pub fn new(date: NaiveDate, query: impl Into<String>, papers: Vec<ScoredPaper>) -> Self {
        Self {
            version: DIGEST_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            date,
            query: query.into(),
            papers,
        }
    }
}
