//! Wires settings, the remote client and the export engine into one run.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use space_export_core::export::constants::CACHE_FILE_NAME;
use space_export_core::{
    ConfluenceClient, ExportCache, ExportEngine, ExportTask, HttpClient, RunAggregator,
    SpaceService, discover_spaces,
};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config, exit_handler, terminal};
use crate::cli::Args;

pub(crate) async fn run_export() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let default_level = terminal::resolve_default_log_level(&args);
    let force_cli_level = terminal::should_force_cli_log_level(&args);
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(
        default_level,
        force_cli_level,
        no_color,
        args.log_file.as_deref(),
    )?;

    debug!(config = %args.config.display(), "CLI arguments parsed");

    let file_config = config::load_or_create(&args.config)?;
    let settings = config::resolve_settings(&args, &file_config)?;

    let started = Instant::now();
    info!(url = %settings.base_url, output_dir = %settings.output_dir.display(), "Space export starting");

    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                settings.output_dir.display()
            )
        })?;

    let service: Arc<dyn SpaceService> = Arc::new(
        ConfluenceClient::new(
            &settings.base_url,
            settings.credentials.clone(),
            settings.timeout,
            settings.insecure,
        )
        .context("Failed to create wiki client")?,
    );
    let client = HttpClient::new(
        settings.credentials.clone(),
        settings.timeout,
        settings.insecure,
    )
    .context("Failed to create download client")?;
    if settings.insecure {
        warn!("TLS certificate verification is disabled");
    }

    let spaces = discover_spaces(service.as_ref(), &settings.filter)
        .await
        .context("Failed to discover spaces")?;
    if spaces.is_empty() {
        info!("No spaces to export");
        return Ok(ProcessExit::Success);
    }

    let cache = Arc::new(ExportCache::load(settings.output_dir.join(CACHE_FILE_NAME)).await);
    let task = Arc::new(ExportTask::new(
        service,
        client,
        cache,
        settings.output_dir.clone(),
    ));
    let engine = ExportEngine::new(settings.concurrency)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let show_progress = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let aggregator = RunAggregator::new(spaces.len(), show_progress);

    let summary = engine
        .run(spaces, task, aggregator, Arc::clone(&interrupted))
        .await?;

    let elapsed = started.elapsed();
    if summary.interrupted() {
        warn!(
            succeeded = summary.succeeded(),
            elapsed_secs = elapsed.as_secs(),
            "Export interrupted. Run again to continue; finished spaces are cached."
        );
    } else {
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            elapsed_secs = elapsed.as_secs(),
            "Export complete"
        );
    }

    Ok(exit_handler::determine_exit_outcome(&summary))
}
