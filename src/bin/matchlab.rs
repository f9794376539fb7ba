//! Research harness for the matching engine.
//!
//! Loads a JSON corpus of item reports into in-memory stores, ranks candidates
//! for one query item, and prints the scored results with their explanations.
//!
//! Run with: `cargo run --bin matchlab -- <items.json> <query-item-id> [top-k]`
//!
//! The corpus file is a JSON array of item snapshots in the crate's `Item`
//! serialization format. Nothing is persisted; this is a preview caller.

use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use refind::matching::engine::{MatchingBackends, MatchingEngine, RankingOptions};
use refind::matching::{Item, ItemId, MatchingConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

fn usage() -> &'static str {
    "usage: matchlab <items.json> <query-item-id> [top-k]"
}

async fn run(corpus_path: &str, query_id: ItemId, top_k: Option<usize>) -> Result<()> {
    let raw = std::fs::read_to_string(corpus_path)
        .with_context(|| format!("reading corpus file {corpus_path}"))?;
    let items: Vec<Item> = serde_json::from_str(&raw).context("parsing corpus JSON")?;
    if items.is_empty() {
        bail!("corpus is empty");
    }

    let backends = MatchingBackends::in_memory();
    let corpus_len = items.len();
    for item in &items {
        backends
            .items
            .put(item)
            .await
            .with_context(|| format!("seeding item {}", item.id))?;
    }

    let engine = MatchingEngine::new(MatchingConfig::default(), backends)
        .context("building matching engine")?;
    let options = RankingOptions {
        top_k,
        persist: false,
    };
    let outcome = engine
        .rank_item(query_id, options)
        .await
        .context("ranking failed")?;

    println!("corpus: {corpus_len} items, query: {query_id}");
    if outcome.results.is_empty() {
        println!("no candidates survived retrieval and filtering");
        return Ok(());
    }

    for (rank, result) in outcome.results.iter().enumerate() {
        println!(
            "#{:<2} {:.3}  {}  {}",
            rank + 1,
            result.final_score,
            result.item.id,
            result.explanation
        );
        for (component, value) in result.breakdown.components() {
            println!("      {component:<10} {value:.3}");
        }
        if let Some(distance_km) = result.distance_km {
            println!("      {:<10} {distance_km:.2} km", "distance");
        }
        if let Some(hours) = result.time_diff_hours {
            println!("      {:<10} {hours:.1} h", "time delta");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("{}", usage());
        return ExitCode::FAILURE;
    }

    let query_id = match ItemId::from_str(&args[1]) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("invalid query item id {:?}: {err}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let top_k = match args.get(2).map(|raw| raw.parse::<usize>()) {
        None => None,
        Some(Ok(parsed)) => Some(parsed),
        Some(Err(err)) => {
            eprintln!("invalid top-k: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args[0], query_id, top_k).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("matchlab: {err:#}");
            ExitCode::FAILURE
        }
    }
}
