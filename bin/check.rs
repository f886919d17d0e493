use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bls_ingest::{DatasetProfile, IngestLimits, IngestMode, IngestPipeline, MemoryStore};
use bytes::Bytes;
use clap::{Arg, ArgAction, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = Command::new("check")
        .about("Run the ingestion pipeline on a local dataset file against an in-memory store and print the report")
        .arg(
            Arg::new("path")
                .long("path")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("replace")
                .long("replace")
                .help("Use full-replacement mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let path = matches.get_one::<PathBuf>("path").unwrap();
    let mode = if matches.get_flag("replace") {
        IngestMode::Replace
    } else {
        IngestMode::Incremental
    };

    let mut limits = IngestLimits::default();
    if let Some(batch_size) = matches.get_one::<usize>("batch-size") {
        limits.batch_size = *batch_size;
    }

    let payload = Bytes::from(tokio::fs::read(path).await?);
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.txt");

    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::with_config(store.clone(), DatasetProfile::default(), limits);

    let start = Instant::now();
    let report = pipeline.ingest(payload, filename, mode).await?;
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "source={} added={} updated={} failed={} stored={} elapsed={elapsed:.1}s",
        path.display(),
        report.added,
        report.updated,
        report.failed,
        store.len(),
    );
    for message in &report.errors {
        println!("  {message}");
    }
    Ok(())
}
