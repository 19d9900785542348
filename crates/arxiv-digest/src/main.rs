use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use shared::{
    filter_corpus, ArxivClient, Config, DayOutcome, DigestPipeline, DigestSink, EmailSender,
    FileSink, IgnoreFilter, LlmClient, LlmSteps, OpenAiEmbedder, RelevanceRanker, ZoteroClient,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arxiv-digest")]
#[command(about = "Rank new arXiv papers against your Zotero library and email a daily digest")]
struct Args {
    /// First day to process (YYYY-MM-DD)
    #[arg(long)]
    start_date: NaiveDate,

    /// Last day to process, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end_date: NaiveDate,

    /// Write digests to disk instead of sending email
    #[arg(long)]
    dry_run: bool,

    /// Directory for HTML and JSON digests (also kept alongside email when set)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    println!("\n📚 Loading Zotero corpus...");
    let zotero = ZoteroClient::new(config.zotero_id.clone(), config.zotero_key.clone())?;
    let mut corpus = zotero
        .fetch_corpus()
        .await
        .context("Failed to load Zotero corpus")?;

    if let Some(patterns) = &config.zotero_ignore {
        let filter = IgnoreFilter::parse(patterns).context("Invalid ZOTERO_IGNORE")?;
        corpus = filter_corpus(corpus, &filter);
    }

    if corpus.is_empty() {
        anyhow::bail!("No papers with abstracts found in the Zotero library.");
    }
    println!("✓ Loaded {} papers from Zotero", corpus.len());

    let embedder = OpenAiEmbedder::new(
        &config.llm.api_base,
        config.llm.api_key.clone(),
        config.llm.embedding_model.clone(),
    )?;

    let mut sinks: Vec<Box<dyn DigestSink>> = Vec::new();
    if args.dry_run || args.output_dir.is_some() {
        let dir = match &args.output_dir {
            Some(dir) => dir.clone(),
            None => shared::get_default_digest_dir()?,
        };
        println!("📝 Digests will be written to {}", dir.display());
        sinks.push(Box::new(FileSink::new(dir)));
    }
    if !args.dry_run {
        sinks.push(Box::new(EmailSender::new(config.smtp.clone())));
    }

    let mut pipeline = DigestPipeline::new(
        ArxivClient::new()?,
        RelevanceRanker::new(embedder),
        sinks,
        corpus,
        config.arxiv_query.clone(),
    )
    .with_max_papers(config.max_paper_num);

    if config.use_llm_api || config.use_llm_rescore {
        let client = LlmClient::new(
            &config.llm.api_base,
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        )?;
        pipeline = pipeline.with_llm(LlmSteps {
            client,
            tldr: config.use_llm_api,
            rescore: config.use_llm_rescore,
            language: config.llm.language.clone(),
        });
    }

    println!(
        "\n🔎 Processing {} to {} for {}...",
        args.start_date, args.end_date, config.arxiv_query
    );
    let reports = pipeline.run_range(args.start_date, args.end_date).await?;

    let mut failures = 0;
    for report in &reports {
        match &report.outcome {
            DayOutcome::Delivered { papers } => {
                println!("✓ {}: digest with {} papers delivered", report.date, papers)
            }
            DayOutcome::NoPapers => println!("- {}: no papers found", report.date),
            DayOutcome::Failed(reason) => {
                failures += 1;
                println!("✗ {}: {}", report.date, reason);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} days failed", failures, reports.len());
    }

    println!("\n✅ Done!");
    Ok(())
}
