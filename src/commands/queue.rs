//! # Queue Command Implementation
//!
//! Feeds many sync requests through the background queue, the same way a
//! server would trigger them, and waits for all of them to finish.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use catalog_sync::queue::{QueueOptions, SyncQueue};
use catalog_sync::sync::{SyncRequest, TemplateRequest};

use crate::cli::GlobalArgs;

/// Synchronize many templates concurrently
#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Template sources to synchronize
    #[arg(value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Read additional sources from a file, one per line
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Template version ids to re-sync
    #[arg(long = "resync", value_name = "VERSION_ID")]
    pub resync: Vec<u64>,

    /// Project the templates belong to
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,
}

impl QueueArgs {
    fn requests(&self) -> Result<Vec<SyncRequest>> {
        let mut sources = self.sources.clone();
        if let Some(file) = &self.file {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            sources.extend(read_sources(&content));
        }

        let mut requests: Vec<SyncRequest> = sources
            .into_iter()
            .map(|source| {
                SyncRequest::Template(TemplateRequest {
                    project_id: self.project.clone(),
                    ..TemplateRequest::new(source)
                })
            })
            .collect();
        requests.extend(self.resync.iter().map(|&id| SyncRequest::TemplateVersion { id }));
        Ok(requests)
    }
}

/// Non-empty lines that are not `#` comments.
fn read_sources(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Execute the queue command
pub fn execute(args: QueueArgs, global: &GlobalArgs) -> Result<()> {
    let requests = args.requests()?;
    if requests.is_empty() {
        anyhow::bail!("Nothing to synchronize: pass sources, --file or --resync");
    }

    let synchronizer = Arc::new(global.synchronizer()?);
    let mut options = QueueOptions::from(synchronizer.config());
    options.capacity = options.capacity.max(requests.len());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let summary = runtime.block_on(async move {
        let queue = SyncQueue::start(synchronizer, options);
        for request in requests {
            if let Err(e) = queue.submit(request.clone()) {
                log::error!("Could not queue {}: {}", request, e);
            }
        }
        queue.shutdown().await
    });

    println!(
        "Queue finished: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    if summary.failed > 0 {
        anyhow::bail!("{} sync jobs failed", summary.failed);
    }
    Ok(())
}
