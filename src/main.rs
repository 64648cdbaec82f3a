use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use frontier::config::Config;
use frontier::fetcher::DefaultPageFetcher;
use frontier::worker::{Worker, WorkerId};
use frontier::{Frontier, UrlRecord};

/// A worker that logs seed completion and otherwise does nothing with the
/// callback; fetching, parsing, and dedup remain external collaborators
/// per `SPEC_FULL.md` §1/§4.9.
struct LoggingWorker {
    id: WorkerId,
}

impl LoggingWorker {
    fn new() -> Arc<Self> {
        Arc::new(LoggingWorker { id: WorkerId::new() })
    }
}

impl Worker for LoggingWorker {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn on_seed_end(&self, seed_docid: u64) {
        tracing::info!(seed_docid, "seed finished");
    }
}

fn demo_seeds(args: &[String]) -> Vec<UrlRecord> {
    if args.is_empty() {
        return vec![
            UrlRecord::seed(1, 0, "https://example.com/", "example.com"),
            UrlRecord::seed(2, 0, "https://example.org/", "example.org"),
        ];
    }
    args.iter()
        .enumerate()
        .map(|(i, url)| {
            let docid = i as u64 + 1;
            let host = url::Url::parse(url)
                .ok()
                .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
                .unwrap_or_else(|| "unknown".to_string());
            UrlRecord::seed(docid, 0, url.clone(), host)
        })
        .collect()
}

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("failed to load configuration from environment");
    tracing::info!(storage_folder = ?config.storage_folder, resumable = config.resumable, "starting frontier");

    let fetcher = Arc::new(DefaultPageFetcher::new(config.politeness_delay));
    let crawl = Arc::new(
        Frontier::open(&config.storage_folder, config.politeness_delay, config.resumable, fetcher)
            .expect("failed to open frontier storage"),
    );

    let seeds = demo_seeds(&std::env::args().skip(1).collect::<Vec<_>>());
    let rejected = crawl.schedule_all(seeds).expect("failed to schedule seed URLs");
    if !rejected.is_empty() {
        tracing::warn!(count = rejected.len(), "some seed URLs were already present");
    }

    let mut handles = Vec::new();
    for _ in 0..config.num_worker_threads.max(1) {
        let crawl = crawl.clone();
        let worker = LoggingWorker::new();
        let worker_id = crawl.register_worker(worker);
        handles.push(thread::spawn(move || worker_loop(crawl, worker_id)));
    }

    loop {
        thread::sleep(Duration::from_millis(100));
        if crawl.queue_size() == 0 && crawl.num_in_progress() == 0 {
            break;
        }
    }
    crawl.finish();

    for handle in handles {
        let _ = handle.join();
    }
    tracing::info!("frontier drained, exiting");
}

fn worker_loop(crawl: Arc<Frontier>, worker_id: WorkerId) {
    while let Some(url) = crawl.get_next_url(worker_id) {
        tracing::debug!(docid = url.docid, url = %url.url, "fetching (simulated)");
        thread::sleep(Duration::from_millis(10));
        if let Err(err) = crawl.set_processed(worker_id, &url) {
            tracing::error!(%err, docid = url.docid, "failed to mark processed");
        }
    }
}
