//! Request replay through a fresh worker.
//!
//! The request file is a JSON array:
//!
//! ```json
//! [
//!   { "url": "/" },
//!   { "url": "/static/js/bundle.js", "destination": "script" },
//!   { "url": "/api/cart", "method": "POST", "body": "{\"sku\": 7}" }
//! ]
//! ```

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context as _, Result};
use edge_cache::{CacheStatus, MemoryStore, ResourceClass};
use edge_core::{Destination, FetchRequest, Method};
use edge_data::{HttpFetch, NetworkFetch};
use edge_observability::MetricsSnapshot;
use edge_worker::{Dispatcher, ServiceWorker};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

use super::ReplayArgs;
use crate::context::Context;
use crate::output::{format_millis, status_badge};

/// One request in a replay file.
#[derive(Debug, Clone, Deserialize)]
struct ReplayEntry {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    destination: Destination,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ReplayEntry {
    fn into_request(self) -> Result<FetchRequest> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| anyhow!("Invalid method '{}' for {}", self.method, self.url))?;

        let mut request = FetchRequest::new(method, self.url).with_destination(self.destination);
        if let Some(body) = self.body {
            request = request.with_body(body);
        }
        Ok(request)
    }
}

/// How one replayed request was answered.
#[derive(Debug, Serialize)]
struct ReplayRecord {
    method: String,
    url: String,
    http_status: Option<u16>,
    cache_status: Option<CacheStatus>,
    class: Option<ResourceClass>,
    partition: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    version: String,
    precached: usize,
    purged: Vec<String>,
    elapsed_ms: u128,
    requests: Vec<ReplayRecord>,
    metrics: MetricsSnapshot,
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read replay file: {}", path.display()))?;
    let requests = parse_requests(&content)
        .with_context(|| format!("Failed to parse replay file: {}", path.display()))?;

    let origin = ctx.origin(args.origin.as_deref())?;
    ctx.output.debug(&format!("Origin: {}", origin));
    let mut config = ctx.config.worker.clone();
    if config.origin.is_none() {
        config.origin = Some(origin.to_string());
    }
    let fetch: Arc<dyn NetworkFetch> = Arc::new(HttpFetch::new(origin)?);

    let worker = ServiceWorker::builder(config, fetch)
        .store(Arc::new(MemoryStore::new()))
        .build()?;

    let started = Instant::now();

    ctx.output.header(&format!("Installing version {}", worker.config().version));
    let installed = worker.on_install().await?;
    ctx.output.kv("Precached", &installed.precached.to_string());

    let activated = worker.on_activate().await?;
    ctx.output.kv("State", &worker.state().to_string());
    for name in &activated.purged {
        ctx.output.debug(&format!("Purged partition {}", name));
    }

    if args.sweep {
        worker.start_sweep().await?;
    }

    ctx.output.header(&format!("Replaying {} request(s)", requests.len()));
    let progress = ctx.output.progress(requests.len() as u64, "replaying");
    let records = replay_requests(&worker, requests, args.wait_revalidation, &progress).await;
    progress.finish_and_clear();

    worker.shutdown().await;

    let report = ReplayReport {
        version: worker.config().version.clone(),
        precached: installed.precached,
        purged: activated.purged,
        elapsed_ms: started.elapsed().as_millis(),
        requests: records,
        metrics: worker.metrics().snapshot(),
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    print_report(&report, ctx);
    Ok(())
}

fn parse_requests(content: &str) -> Result<Vec<FetchRequest>> {
    let entries: Vec<ReplayEntry> = serde_json::from_str(content)?;
    entries.into_iter().map(ReplayEntry::into_request).collect()
}

async fn replay_requests(
    worker: &ServiceWorker,
    requests: Vec<FetchRequest>,
    wait_revalidation: bool,
    progress: &ProgressBar,
) -> Vec<ReplayRecord> {
    let mut records = Vec::with_capacity(requests.len());

    for request in requests {
        let method = request.method.to_string();
        let url = request.url.clone();
        progress.set_message(url.clone());

        let record = match worker.on_fetch(request).await {
            Ok(mut served) => {
                if let Some(handle) = served.revalidation.take() {
                    if wait_revalidation {
                        if let Err(e) = handle.await {
                            tracing::warn!(url = %url, error = %e, "revalidation task panicked");
                        }
                    }
                }
                ReplayRecord {
                    method,
                    url,
                    http_status: Some(served.response.status),
                    cache_status: Some(served.status),
                    class: served.class,
                    partition: served.partition,
                    error: None,
                }
            }
            Err(e) => ReplayRecord {
                method,
                url,
                http_status: None,
                cache_status: None,
                class: None,
                partition: None,
                error: Some(e.to_string()),
            },
        };

        records.push(record);
        progress.inc(1);
    }

    records
}

fn print_report(report: &ReplayReport, ctx: &Context) {
    let widths = [8, 6, 8, 18, 6];
    ctx.output
        .table_row(&["STATUS", "HTTP", "CLASS", "PARTITION", "METHOD", "URL"], &widths);

    for record in &report.requests {
        let badge = record
            .cache_status
            .map(status_badge)
            .unwrap_or_else(|| "ERROR".to_string());
        let http = record
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let class = record.class.map_or("-", |c| c.as_str());
        let partition = record.partition.as_deref().unwrap_or("-");
        let target = match &record.error {
            Some(e) => format!("{} ({})", record.url, e),
            None => record.url.clone(),
        };

        ctx.output.table_row(
            &[badge.as_str(), http.as_str(), class, partition, record.method.as_str(), target.as_str()],
            &widths,
        );
    }

    ctx.output.header("Summary");
    for line in report.metrics.to_summary().lines() {
        ctx.output.info(line);
    }
    ctx.output
        .success(&format!("Replayed in {}", format_millis(report.elapsed_ms)));
}
