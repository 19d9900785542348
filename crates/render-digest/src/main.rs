use anyhow::{Context, Result};
use clap::Parser;
use shared::{get_default_digest_dir, list_digest_files, load_digest, DigestRenderer};
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render-digest")]
#[command(about = "Render a saved arXiv digest snapshot to HTML")]
struct Args {
    /// Path to the digest JSON file (if not provided, will list saved digests)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Where to write the HTML (defaults to the JSON path with an .html extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the plain-text version instead of writing HTML
    #[arg(long)]
    text: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let digest_file = match args.file {
        Some(path) => path,
        None => select_digest_file()?,
    };

    println!("📖 Reading digest: {}", digest_file.display());
    let data = load_digest(&digest_file)?;
    println!(
        "✓ {} papers for {} ({})",
        data.papers.len(),
        data.date,
        data.query
    );

    if args.text {
        println!("\n{}", DigestRenderer::render_text(&data.papers, data.date));
        return Ok(());
    }

    let html = DigestRenderer::render_html(&data.papers, data.date);
    let output = args
        .output
        .unwrap_or_else(|| digest_file.with_extension("html"));
    fs::write(&output, html)
        .with_context(|| format!("Failed to write HTML file: {}", output.display()))?;

    println!("\n✅ HTML saved to: {}", output.display());
    Ok(())
}

fn select_digest_file() -> Result<PathBuf> {
    let digest_dir = get_default_digest_dir()?;
    let files = list_digest_files(&digest_dir)?;

    if files.is_empty() {
        anyhow::bail!("No saved digests found in {}", digest_dir.display());
    }

    println!("Available digests:\n");
    for (i, (path, data)) in files.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!(
            "  {}) {} ({} papers, {})",
            i + 1,
            filename,
            data.papers.len(),
            data.query
        );
    }

    print!("\nSelect file (1-{}): ", files.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let selection: usize = input
        .trim()
        .parse()
        .context("Invalid selection. Please enter a number.")?;

    if selection < 1 || selection > files.len() {
        anyhow::bail!("Selection out of range. Please choose 1-{}", files.len());
    }

    Ok(files[selection - 1].0.clone())
}
