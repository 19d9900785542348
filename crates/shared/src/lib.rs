// Public modules
pub mod arxiv;
pub mod config;
pub mod corpus;
pub mod digest;
pub mod embedding;
pub mod io;
pub mod llm;
pub mod mailer;
pub mod models;
pub mod pipeline;
pub mod ranker;
pub mod rescorer;
pub mod zotero;

// Re-export commonly used types
pub use arxiv::{ArxivClient, ArxivPaper};
pub use config::Config;
pub use corpus::{filter_corpus, CorpusPaper, IgnoreFilter};
pub use digest::DigestRenderer;
pub use embedding::{Embedder, OpenAiEmbedder};
pub use io::{get_default_digest_dir, list_digest_files, load_digest, save_digest, FileSink};
pub use llm::{LlmClient, TldrGenerator};
pub use mailer::EmailSender;
pub use models::DigestData;
pub use pipeline::{
    date_range, DayOutcome, DayReport, DigestPipeline, DigestSink, LlmSteps, PaperSource,
    RenderedDigest,
};
pub use ranker::{RelevanceRanker, ScoredPaper};
pub use rescorer::LlmRescorer;
pub use zotero::ZoteroClient;
