//! One-shot analysis from the command line.
//!
//! Usage: analyze_url <product-url> [--no-recommendations] [--offline]
//!
//! Prints the same JSON the HTTP endpoint returns. `--offline` scores the
//! built-in sample reviews instead of fetching the page.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use shoppers_verdict::api::AnalysisResponse;
use shoppers_verdict::source::{HttpReviewSource, ReviewSource, SampleReviewSource};
use shoppers_verdict::store::{JsonFileBackend, ReviewStore};
use shoppers_verdict::{Analyzer, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let url = match args.iter().find(|a| !a.starts_with("--")) {
        Some(url) => url.clone(),
        None => bail!("usage: analyze_url <product-url> [--no-recommendations] [--offline]"),
    };
    let include_recommendations = !args.iter().any(|a| a == "--no-recommendations");
    let offline = args.iter().any(|a| a == "--offline");

    let settings = Settings::from_env()?;
    let store = match &settings.cache_file {
        Some(path) => ReviewStore::with_backend(&settings, Arc::new(JsonFileBackend::new(path))).await?,
        None => ReviewStore::new(&settings),
    };
    let source: Arc<dyn ReviewSource> = if offline {
        Arc::new(SampleReviewSource::new())
    } else {
        Arc::new(HttpReviewSource::new(settings.fetch_timeout, settings.max_reviews)?)
    };

    let started = Instant::now();
    let analyzer = Analyzer::new(settings, Arc::new(store), source);
    let outcome = analyzer.analyze(&url, include_recommendations).await?;
    let response = AnalysisResponse::from_outcome(outcome, started.elapsed().as_secs_f64());

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
