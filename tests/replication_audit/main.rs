//! End-to-end audit runs against fake RavenDB servers
//!
//! Each test starts a source server (and destination servers where the
//! per-destination strategy needs them), runs the command line audit into
//! a temporary directory and checks the CSV report.

mod fake_raven;

use audit_core::DestinationState;
use clap::Parser;
use fake_raven::{
    etag, scenario_documents, start_destination, start_source, SourceState, DESTINATION_DATABASE,
    SOURCE_DATABASE, UNREACHABLE_URL,
};
use not_yet_replicated::{run_with_shutdown, Cli};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

const HEADER: &str = "Id,Etag,EntityName,DestinationUrl";

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("not_yet_replicated=debug,audit_core=debug,ravendb_client=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn cli(source_url: &str, output_dir: &Path, extra: &[&str]) -> Cli {
    let output_dir = output_dir.to_string_lossy().to_string();
    let mut args = vec![
        "not-yet-replicated",
        source_url,
        SOURCE_DATABASE,
        "--output-dir",
        output_dir.as_str(),
        "--request-timeout",
        "5",
    ];
    args.extend_from_slice(extra);
    Cli::try_parse_from(args).unwrap()
}

fn report_lines(output_dir: &Path) -> Vec<String> {
    let path = output_dir.join(format!("Not-yet-replicated-at-{SOURCE_DATABASE}.csv"));
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Destinations D1 (acknowledged etag 1) and D2 (acknowledged etag 3) as
/// the source's replication statistics report them.
fn aggregated_source(d1: &str, d2: &str) -> SourceState {
    SourceState {
        documents: scenario_documents(),
        stats: vec![
            (d1.to_string(), Some(etag(1))),
            (d2.to_string(), Some(etag(3))),
        ],
        ..SourceState::default()
    }
}

#[tokio::test]
async fn test_lagging_destination_is_reported() -> anyhow::Result<()> {
    init_logging();
    let source = start_source(aggregated_source("http://d1:8080", "http://d2:8080")).await;
    let output_dir = TempDir::new()?;

    let outcome = run_with_shutdown(
        &cli(&source, output_dir.path(), &[]),
        std::future::pending(),
    )
    .await?;

    assert_eq!(
        report_lines(output_dir.path()),
        vec![
            HEADER.to_string(),
            format!("orders/1,{},Orders,http://d1:8080", etag(2)),
            format!("orders/2,{},Orders,http://d1:8080", etag(3)),
        ]
    );

    let summary = &outcome.summary;
    assert_eq!(summary.records_written, 2);
    assert_eq!(
        summary.destination("http://d2:8080").unwrap().state,
        DestinationState::Current
    );
    assert_eq!(outcome.report.rows_written, 2);
    Ok(())
}

#[tokio::test]
async fn test_per_destination_skips_unreachable_destination() -> anyhow::Result<()> {
    init_logging();
    let d1 = start_destination(etag(1)).await;
    let d2 = start_destination(etag(3)).await;
    let source = start_source(SourceState {
        documents: scenario_documents(),
        destinations: vec![
            (d1.clone(), DESTINATION_DATABASE.to_string()),
            (d2.clone(), DESTINATION_DATABASE.to_string()),
            (UNREACHABLE_URL.to_string(), DESTINATION_DATABASE.to_string()),
        ],
        ..SourceState::default()
    })
    .await;
    let output_dir = TempDir::new()?;

    let outcome = run_with_shutdown(
        &cli(&source, output_dir.path(), &["--strategy", "per-destination"]),
        std::future::pending(),
    )
    .await?;

    let lines = report_lines(output_dir.path());
    assert_eq!(lines.len(), 3);
    assert!(lines[1..].iter().all(|line| line.ends_with(&format!(",{d1}"))));

    let summary = &outcome.summary;
    assert_eq!(summary.destination(&d2).unwrap().state, DestinationState::Current);
    match &summary.destination(UNREACHABLE_URL).unwrap().state {
        DestinationState::Skipped { reason } => assert!(reason.contains("127.0.0.1:9")),
        other => panic!("unexpected state {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_reports() -> anyhow::Result<()> {
    init_logging();
    let source = start_source(aggregated_source("http://d1:8080", "http://d2:8080")).await;
    let output_dir = TempDir::new()?;
    let path = output_dir
        .path()
        .join(format!("Not-yet-replicated-at-{SOURCE_DATABASE}.csv"));
    let cli = cli(&source, output_dir.path(), &[]);

    run_with_shutdown(&cli, std::future::pending()).await?;
    let first = std::fs::read(&path)?;
    run_with_shutdown(&cli, std::future::pending()).await?;
    let second = std::fs::read(&path)?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_buffered_report_without_header() -> anyhow::Result<()> {
    init_logging();
    let source = start_source(aggregated_source("http://d1:8080", "http://d2:8080")).await;
    let output_dir = TempDir::new()?;

    run_with_shutdown(
        &cli(&source, output_dir.path(), &["--emit", "buffered", "--no-header"]),
        std::future::pending(),
    )
    .await?;

    let lines = report_lines(output_dir.path());
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("orders/1,"));
    Ok(())
}

#[tokio::test]
async fn test_empty_internal_prefix_reports_internal_documents() -> anyhow::Result<()> {
    init_logging();
    let source = start_source(SourceState {
        documents: scenario_documents(),
        stats: vec![("http://d1:8080".to_string(), None)],
        ..SourceState::default()
    })
    .await;
    let output_dir = TempDir::new()?;

    run_with_shutdown(
        &cli(&source, output_dir.path(), &["--internal-prefix", ""]),
        std::future::pending(),
    )
    .await?;

    let lines = report_lines(output_dir.path());
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], format!("Raven/Config,{},,http://d1:8080", etag(1)));
    Ok(())
}

#[tokio::test]
async fn test_missing_configuration_produces_header_only_report() -> anyhow::Result<()> {
    init_logging();
    let source = start_source(SourceState {
        documents: scenario_documents(),
        ..SourceState::default()
    })
    .await;
    let output_dir = TempDir::new()?;

    let outcome = run_with_shutdown(
        &cli(&source, output_dir.path(), &["--strategy", "per-destination"]),
        std::future::pending(),
    )
    .await?;

    assert_eq!(report_lines(output_dir.path()), vec![HEADER.to_string()]);
    assert!(outcome.summary.destinations.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_run_keeps_previous_report() -> anyhow::Result<()> {
    init_logging();
    let output_dir = TempDir::new()?;
    let path = output_dir
        .path()
        .join(format!("Not-yet-replicated-at-{SOURCE_DATABASE}.csv"));
    std::fs::write(&path, "previous report\n")?;

    let result = run_with_shutdown(
        &cli(UNREACHABLE_URL, output_dir.path(), &[]),
        std::future::pending(),
    )
    .await;

    let error = result.unwrap_err();
    assert!(format!("{error:#}").contains("127.0.0.1:9"));
    assert_eq!(std::fs::read_to_string(&path)?, "previous report\n");
    assert_eq!(std::fs::read_dir(output_dir.path())?.count(), 1);
    Ok(())
}

/// Serve one page of two documents, then stop answering and shut the run
/// down once the next page is requested.
async fn interrupted_run(emit: &str) -> anyhow::Result<()> {
    init_logging();
    let stalled = Arc::new(Notify::new());
    let mut documents = scenario_documents();
    documents.push(("orders/3".to_string(), etag(4)));
    documents.push(("orders/4".to_string(), etag(5)));
    let source = start_source(SourceState {
        documents,
        stats: vec![("http://d1:8080".to_string(), Some(etag(1)))],
        stall_after_first_page: Some(stalled.clone()),
        ..SourceState::default()
    })
    .await;
    let output_dir = TempDir::new()?;

    let outcome = run_with_shutdown(
        &cli(&source, output_dir.path(), &["--page-size", "2", "--emit", emit]),
        async move { stalled.notified().await },
    )
    .await?;

    assert!(outcome.interrupted());
    assert_eq!(outcome.report.rows_written, 2);
    assert_eq!(
        report_lines(output_dir.path()),
        vec![
            HEADER.to_string(),
            format!("orders/1,{},Orders,http://d1:8080", etag(2)),
            format!("orders/2,{},Orders,http://d1:8080", etag(3)),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_interrupted_streaming_run_keeps_rows_found() -> anyhow::Result<()> {
    interrupted_run("streaming").await
}

#[tokio::test]
async fn test_interrupted_buffered_run_keeps_rows_found() -> anyhow::Result<()> {
    interrupted_run("buffered").await
}
