use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{DigestData, DIGEST_VERSION};
use crate::pipeline::{DigestSink, RenderedDigest};

/// Get the default directory for storing digest files
pub fn get_default_digest_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("arxiv-digest")
        .join("digests");

    fs::create_dir_all(&data_dir).context("Failed to create digests directory")?;

    Ok(data_dir)
}

pub fn digest_file_stem(data: &DigestData) -> String {
    format!("digest-{}", data.date.format("%Y-%m-%d"))
}

/// Save digest data to a JSON file in `dir`
pub fn save_digest(data: &DigestData, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let filepath = dir.join(format!("{}.json", digest_file_stem(data)));

    let json = serde_json::to_string_pretty(data).context("Failed to serialize digest data")?;

    fs::write(&filepath, json).context("Failed to write digest file")?;

    Ok(filepath)
}

/// Load digest data from a JSON file
pub fn load_digest(filepath: &Path) -> Result<DigestData> {
    if !filepath.exists() {
        anyhow::bail!("Digest file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read digest file: {}", filepath.display()))?;

    let data: DigestData = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse digest JSON from {}. The file may be corrupted or not a valid digest file.",
            filepath.display()
        )
    })?;

    if data.version != DIGEST_VERSION {
        anyhow::bail!(
            "Unsupported digest file version: {}. Expected {}. Please regenerate the digest with arxiv-digest.",
            data.version,
            DIGEST_VERSION
        );
    }

    Ok(data)
}

/// List all digest snapshots in `dir`, newest digest date first
pub fn list_digest_files(dir: &Path) -> Result<Vec<(PathBuf, DigestData)>> {
    let mut files = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir).context("Failed to read digests directory")? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_digest(&path) {
                    Ok(data) => files.push((path, data)),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Skipping unreadable digest file"
                        );
                    }
                }
            }
        }
    }

    files.sort_by(|a, b| b.1.date.cmp(&a.1.date));

    Ok(files)
}

/// Delivers digests by writing the HTML and its JSON snapshot to a directory.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DigestSink for FileSink {
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        let json_path = save_digest(&digest.data, &self.dir)?;
        let html_path = self
            .dir
            .join(format!("{}.html", digest_file_stem(&digest.data)));
        fs::write(&html_path, &digest.html)
            .with_context(|| format!("Failed to write {}", html_path.display()))?;

        tracing::info!(
            html = %html_path.display(),
            json = %json_path.display(),
            "Digest written"
        );
        Ok(())
    }
}
