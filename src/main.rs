//! CLI entry point for the digestor tool.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use digestor_core::{
    BatchRunner, ExtractContext, ExtractionExecutor, ExtractionOutcome, LoadedConfig, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, ConfigCommand, ExtractArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Results go to stdout; logs stay on stderr so output can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Config {
            command: ConfigCommand::Show,
        } => show_config(&loaded),
        Command::Plan { url, json } => {
            let executor = build_executor(&loaded)?;
            let plan = executor.planner().plan(&url)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("url = {}", plan.url);
                println!("matched = {}", plan.source);
                println!("primary = {}", plan.primary);
                println!("fallback = [{}]", plan.fallback_chain.join(", "));
                println!("timeout_ms = {}", plan.effective_timeout.as_millis());
            }
            Ok(())
        }
        Command::Test { url, title, json } => {
            let executor = build_executor(&loaded)?;
            let context = title.map_or_else(ExtractContext::new, ExtractContext::with_title);
            let report = executor.test_extraction(&url, &context).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(())
        }
        Command::Extract(extract) => run_extract(&loaded, extract, args.quiet).await,
    }
}

fn build_executor(loaded: &LoadedConfig) -> Result<ExtractionExecutor> {
    loaded
        .config
        .build_executor()
        .context("Extraction catalog is misconfigured")
}

fn show_config(loaded: &LoadedConfig) -> Result<()> {
    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("# config_path = {resolved_path}");
    println!(
        "# config_file = {}",
        if loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    print!(
        "{}",
        toml::to_string_pretty(&loaded.config).context("Failed to render configuration")?
    );
    Ok(())
}

async fn run_extract(loaded: &LoadedConfig, extract: ExtractArgs, quiet: bool) -> Result<()> {
    let urls = if extract.urls.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe URLs via stdin or pass as arguments.");
            info!("Example: echo 'https://example.com/post' | digestor extract");
            return Ok(());
        }
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ToString::to_string)
            .collect()
    } else {
        extract.urls
    };

    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let executor = Arc::new(build_executor(loaded)?);
    let runner = BatchRunner::new(Arc::clone(&executor), usize::from(extract.concurrency))?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling in-flight extractions");
            ctrl_c.cancel();
        }
    });

    let progress = if !quiet && io::stderr().is_terminal() {
        let bar = ProgressBar::new(urls.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    info!(urls = urls.len(), concurrency = runner.concurrency(), "Extracting");
    let report = runner
        .run(urls, &ExtractContext::new(), &cancel, |outcome| {
            if let Some(bar) = &progress {
                bar.inc(1);
                bar.set_message(outcome.url().to_string());
            }
        })
        .await?;
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    for outcome in &report.outcomes {
        if extract.json {
            println!("{}", serde_json::to_string(outcome)?);
        } else {
            println!("{}", summary_line(outcome));
        }
    }

    let summary = report.summary;
    info!(
        extracted = summary.extracted,
        failed = summary.failed,
        cached = summary.cached,
        cancelled = summary.cancelled,
        "Extraction complete"
    );

    if extract.metrics {
        println!(
            "{}",
            serde_json::to_string_pretty(&executor.metrics_report())?
        );
    }
    Ok(())
}

fn summary_line(outcome: &ExtractionOutcome) -> String {
    match outcome {
        ExtractionOutcome::Extracted(article) => format!(
            "OK    {} [{} at {}] {} chars{}",
            article.url,
            article.extractor,
            article.level,
            article.text.chars().count(),
            article
                .title()
                .map(|title| format!(" \"{title}\""))
                .unwrap_or_default()
        ),
        ExtractionOutcome::Failed(failure) => {
            let tried = failure.attempted_extractors();
            let tried = if tried.is_empty() {
                "-".to_string()
            } else {
                tried.join(", ")
            };
            format!("FAIL  {} [{:?}] tried: {tried}", failure.url, failure.reason)
        }
    }
}
