//! Demo binary for tokio-emotion-orchestrator
//!
//! Classifies the texts given on the command line, or one text per stdin
//! line, and prints one JSON object per input.
//!
//! ## Environment Variables
//!
//! - `EMOTION_CONFIG`: path to a TOML config (same as `--config`)
//! - `LOG_FORMAT=json`: structured JSON output (production)
//! - `RUST_LOG=info`: log level filter

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tokio_emotion_orchestrator::config::{self, loader};
use tokio_emotion_orchestrator::{
    init_tracing, metrics, Classification, ClassifierConfig, EmotionOrchestrator,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "emotion-orchestrator",
    version,
    about = "Classify text emotions over a resilient provider chain"
)]
struct Cli {
    /// TOML configuration file. Built-in defaults (lexicon only) when absent.
    #[arg(short, long, env = "EMOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Print the configuration JSON Schema and exit.
    #[arg(long)]
    print_schema: bool,

    /// Print Prometheus metrics to stderr when done.
    #[arg(long)]
    metrics: bool,

    /// Texts to classify. Reads stdin lines when none are given.
    texts: Vec<String>,
}

#[derive(Serialize)]
struct OutputLine<'a> {
    text: &'a str,
    #[serde(flatten)]
    classification: &'a Classification,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_schema {
        println!("{}", config::export_schema()?);
        return Ok(());
    }

    let _ = init_tracing();
    metrics::init_metrics()?;

    let config = match &cli.config {
        Some(path) => loader::load_from_file(path)?,
        None => ClassifierConfig::default(),
    };
    let orchestrator = EmotionOrchestrator::from_config(&config)?;
    info!(chain = ?orchestrator.provider_chain(), "starting emotion-orchestrator demo");

    let subscription = orchestrator.subscribe(|event| {
        info!(
            key = %event.key,
            emotion = %event.classification.emotion(),
            confidence = event.classification.confidence(),
            provider = event.classification.provider_used(),
            "classification event"
        );
    });

    let texts = if cli.texts.is_empty() {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let mut texts = Vec::new();
        while let Some(line) = lines.next_line().await? {
            texts.push(line);
        }
        texts
    } else {
        cli.texts
    };

    let results = orchestrator.classify_batch(&texts).await;
    for (text, classification) in texts.iter().zip(&results) {
        let line = OutputLine {
            text,
            classification,
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    let health = orchestrator.health();
    let stats = orchestrator.stats();
    info!(
        healthy = health.healthy,
        cached = stats.cache.entries,
        subscribers = stats.subscribers,
        "demo complete"
    );
    subscription.unsubscribe();

    if cli.metrics {
        eprintln!("{}", metrics::gather());
    }

    Ok(())
}
