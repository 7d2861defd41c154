//! Page Archiver
//!
//! Usage: `page-archiver <url> [html-file]`
//!
//! Captures the page (from the file when given, otherwise over HTTP), uploads
//! it and prints the upload report as JSON.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use page_archiver::correction::{ChatCompletionCorrector, TextCorrector};
use page_archiver::dom::{FilePage, HttpPage, PageSource};
use page_archiver::error::PipelineError;
use page_archiver::logging::{init_tracing, ActivityLog};
use page_archiver::storage::HttpObjectStore;
use page_archiver::{Config, PipelineOptions, UploadOrchestrator};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("page_archiver=debug");

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            if let Some(PipelineError::Upload(failure)) = e.downcast_ref::<PipelineError>() {
                for advice in &failure.recommendations {
                    eprintln!("hint: {}", advice);
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the stored copy passed its integrity checks
async fn run() -> anyhow::Result<bool> {
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .context("usage: page-archiver <url> [html-file]")?;
    let html_file = args.next();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting Page Archiver v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("S3 endpoint: {}", config.storage.endpoint);

    let options = PipelineOptions::from(&config.pipeline);
    let timeout = options.timeout;
    let store = HttpObjectStore::new(&config.storage)
        .context("Invalid storage configuration")?
        .with_timeout(timeout);

    let mut orchestrator =
        UploadOrchestrator::new(Arc::new(store), options).with_activity_log(ActivityLog::new());

    if config.pipeline.correct {
        if let Some(corrector) = &config.corrector {
            let corrector: Arc<dyn TextCorrector> =
                Arc::new(ChatCompletionCorrector::new(corrector, timeout));
            orchestrator = orchestrator.with_corrector(corrector);
        }
    }

    let source: Box<dyn PageSource> = match html_file {
        Some(path) => Box::new(FilePage::new(url, path)),
        None => Box::new(HttpPage::new(url, timeout)),
    };

    let report = orchestrator.run(source.as_ref()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_valid() {
        tracing::warn!(
            issues = report.integrity.issues.len(),
            "Stored copy failed integrity checks"
        );
    }
    Ok(report.is_valid())
}
