use anyhow::{Context, Result};
use std::env;

const SETUP_HINT: &str = "To fix this, create ~/.config/arxiv-digest/.env with:\n  \
    ZOTERO_ID=your_user_id\n  \
    ZOTERO_KEY=your_api_key\n  \
    ARXIV_QUERY=cs.AI+cs.CL\n  \
    SMTP_SERVER=smtp.example.com\n  \
    SMTP_PORT=465\n  \
    SENDER=you@example.com\n  \
    RECEIVER=you@example.com\n  \
    SENDER_PASSWORD=your_smtp_password\n  \
    OPENAI_API_KEY=your_key_here\n\n\
    Get your Zotero user ID and API key from: https://www.zotero.org/settings/keys";

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub receiver: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub embedding_model: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub zotero_id: String,
    pub zotero_key: String,
    pub zotero_ignore: Option<String>,
    pub arxiv_query: String,
    pub smtp: SmtpConfig,
    pub max_paper_num: usize,
    pub use_llm_api: bool,
    pub use_llm_rescore: bool,
    pub llm: LlmConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} not found.\n\n{}", key, SETUP_HINT))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            optional(key)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let smtp_port = required("SMTP_PORT")?
            .trim()
            .parse::<u16>()
            .context("SMTP_PORT must be a port number")?;

        let max_paper_num = match optional("MAX_PAPER_NUM") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .context("MAX_PAPER_NUM must be a non-negative integer")?,
            None => 100,
        };

        Ok(Self {
            zotero_id: required("ZOTERO_ID")?,
            zotero_key: required("ZOTERO_KEY")?,
            zotero_ignore: optional("ZOTERO_IGNORE"),
            arxiv_query: required("ARXIV_QUERY")?,
            smtp: SmtpConfig {
                server: required("SMTP_SERVER")?,
                port: smtp_port,
                sender: required("SENDER")?,
                receiver: required("RECEIVER")?,
                password: required("SENDER_PASSWORD")?,
            },
            max_paper_num,
            use_llm_api: flag("USE_LLM_API"),
            use_llm_rescore: flag("USE_LLM_RESCORE"),
            llm: LlmConfig {
                api_key: required("OPENAI_API_KEY")?,
                api_base: optional("OPENAI_API_BASE")
                    .map(|b| b.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: optional("MODEL_NAME").unwrap_or_else(|| "gpt-4o".to_string()),
                embedding_model: optional("EMBEDDING_MODEL")
                    .unwrap_or_else(|| "text-embedding-3-small".to_string()),
                language: optional("LANGUAGE").unwrap_or_else(|| "English".to_string()),
            },
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/arxiv-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("arxiv-digest").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() && dotenvy::from_path(&home_path).is_ok() {
                return;
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}
