//! The frontier facade: `schedule`, `schedule_all`, `get_next_url`,
//! `set_processed`, `abandon`, `remove_offspring`, `finish`, plus the
//! read-only counters, per `SPEC_FULL.md` §4.4–§4.6.
//!
//! A single mutex `M` (`state`) guards every piece of mutable in-memory
//! state — host registry, offspring counter cache, in-progress table. All
//! public operations hold it for their full duration; only `get_next_url`
//! ever releases it, to wait on the condition variable `W` (`not_empty`).

pub mod validator;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{fatal_invariant, fatal_seed_mismatch, FrontierError};
use crate::fetcher::PageFetcher;
use crate::host_registry::HostRegistry;
use crate::key::CompositeKey;
use crate::offspring::OffspringCounter;
use crate::storage::Storage;
use crate::url_record::{SeedDocid, UrlRecord};
use crate::worker::{Worker, WorkerId};

/// A URL currently assigned to a worker: the host it came from (its queue
/// may since have gone empty), the key it was stored under, and the record
/// itself.
struct InProgressEntry {
    host: String,
    key: CompositeKey,
    record: UrlRecord,
}

pub(crate) struct FrontierState {
    pub(crate) registry: HostRegistry,
    in_progress: HashMap<WorkerId, InProgressEntry>,
    finished: bool,
}

impl FrontierState {
    pub(crate) fn in_progress_entries(&self) -> impl Iterator<Item = (CompositeKey, &UrlRecord)> {
        self.in_progress.values().map(|e| (e.key, &e.record))
    }
}

pub struct Frontier {
    storage: Storage,
    offspring: OffspringCounter,
    fetcher: Arc<dyn PageFetcher>,
    politeness_delay: Duration,
    state: Mutex<FrontierState>,
    not_empty: Condvar,
    workers: Mutex<Vec<Arc<dyn Worker>>>,
}

impl Frontier {
    /// Open (or resume) a frontier rooted at `storage_folder`. In resumable
    /// mode this rebuilds the in-memory host registry and offspring
    /// counter from a full scan of the persisted `urls`/`seed_count`
    /// stores — any URL that was in-progress when the process last exited
    /// is indistinguishable from a freshly queued one, and is simply
    /// re-offered by the dispatcher (§9 "Resumability").
    pub fn open(
        storage_folder: &Path,
        politeness_delay: Duration,
        resumable: bool,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, FrontierError> {
        let storage = Storage::open(storage_folder, resumable)?;
        let offspring = OffspringCounter::load_from(&storage)?;

        let mut registry = HostRegistry::new();
        let mut rebuilt = 0usize;
        for (key, record) in storage.iter_all()? {
            registry.enqueue(key, record);
            rebuilt += 1;
        }
        tracing::info!(rebuilt, resumable, "frontier opened");

        Ok(Frontier {
            storage,
            offspring,
            fetcher,
            politeness_delay,
            state: Mutex::new(FrontierState {
                registry,
                in_progress: HashMap::new(),
                finished: false,
            }),
            not_empty: Condvar::new(),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Register a worker for `on_seed_end` notifications and obtain its
    /// stable identifier. Call once per worker; reuse the returned id for
    /// every subsequent `get_next_url`/`set_processed`/`abandon` call from
    /// that worker.
    pub fn register_worker(&self, worker: Arc<dyn Worker>) -> WorkerId {
        let id = worker.id();
        self.workers.lock().unwrap().push(worker);
        id
    }

    pub fn schedule(&self, record: UrlRecord) -> Result<bool, FrontierError> {
        let mut guard = self.state.lock().unwrap();
        let accepted = self.schedule_locked(&mut guard, record)?;
        self.not_empty.notify_all();
        Ok(accepted)
    }

    /// Enqueue a batch under a single lock acquisition. Returns the
    /// records rejected as duplicates; a storage error aborts the whole
    /// batch and propagates, per §4.6.
    pub fn schedule_all(&self, records: Vec<UrlRecord>) -> Result<Vec<UrlRecord>, FrontierError> {
        let mut guard = self.state.lock().unwrap();
        let mut rejected = Vec::new();
        for record in records {
            let candidate = record.clone();
            if !self.schedule_locked(&mut guard, record)? {
                rejected.push(candidate);
            }
        }
        self.not_empty.notify_all();
        Ok(rejected)
    }

    fn schedule_locked(
        &self,
        state: &mut FrontierState,
        record: UrlRecord,
    ) -> Result<bool, FrontierError> {
        let key = CompositeKey::for_record(&record);
        if !self.storage.put_url(&key, &record)? {
            tracing::debug!(docid = record.docid, "schedule rejected: duplicate key");
            return Ok(false);
        }
        self.offspring.increment(&self.storage, record.seed_docid)?;
        state.registry.enqueue(key, record.clone());
        tracing::debug!(docid = record.docid, host = %record.host, "scheduled");
        Ok(true)
    }

    /// Block until a URL is eligible for `worker`, or `None` once `finish`
    /// has been called and nothing remains to hand out.
    pub fn get_next_url(&self, worker: WorkerId) -> Option<UrlRecord> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if guard.finished {
                return None;
            }
            if let Some(record) = self.try_dispatch(&mut guard, worker) {
                return Some(record);
            }
            let (next_guard, _timeout) = self
                .not_empty
                .wait_timeout(guard, self.politeness_delay)
                .unwrap();
            guard = next_guard;
        }
    }

    /// Scan the ready set for the politeness-eligible host whose head has
    /// the globally smallest composite key, and claim it. Holds `state`
    /// for the duration, per §5.
    fn try_dispatch(&self, state: &mut FrontierState, worker: WorkerId) -> Option<UrlRecord> {
        let now = Instant::now();
        let mut best: Option<(String, CompositeKey)> = None;

        for host in state.registry.ready_hosts() {
            let Some(queue) = state.registry.queue(host) else {
                continue;
            };
            let Some((key, _)) = queue.peek_head() else {
                continue;
            };
            if self.fetcher.next_fetch_time(host) > now {
                continue;
            }
            let better = match &best {
                Some((_, best_key)) => key < best_key,
                None => true,
            };
            if better {
                best = Some((host.to_string(), *key));
            }
        }

        let (host, _) = best?;
        let (key, record) = state.registry.claim_head(&host);
        self.fetcher.select(&host, &record.url);
        state.in_progress.insert(
            worker,
            InProgressEntry {
                host,
                key,
                record: record.clone(),
            },
        );
        tracing::debug!(docid = record.docid, %worker, "dispatched");
        Some(record)
    }

    pub fn set_processed(&self, worker: WorkerId, record: &UrlRecord) -> Result<(), FrontierError> {
        let mut guard = self.state.lock().unwrap();
        let assigned = guard
            .in_progress
            .remove(&worker)
            .unwrap_or_else(|| fatal_invariant("setProcessed", format!("{worker} has no assignment")));

        if assigned.record.docid != record.docid {
            fatal_invariant(
                "setProcessed",
                format!(
                    "{worker} assigned docid {} but completed docid {}",
                    assigned.record.docid, record.docid
                ),
            );
        }

        self.storage.delete_url(&assigned.key)?;
        let removed = guard.registry.release_head(&assigned.host, assigned.key, false);

        if let Some(removed_record) = removed {
            self.offspring.decrement(&self.storage, removed_record.seed_docid)?;
            self.maybe_notify_seed_end(removed_record.seed_docid);
        }

        tracing::debug!(docid = record.docid, %worker, "set processed");
        self.not_empty.notify_all();
        Ok(())
    }

    /// Release a claim without removing the URL; it becomes dispatchable
    /// again at its original position.
    pub fn abandon(&self, worker: WorkerId, record: &UrlRecord) {
        let mut guard = self.state.lock().unwrap();
        let assigned = guard
            .in_progress
            .remove(&worker)
            .unwrap_or_else(|| fatal_invariant("abandon", format!("{worker} has no assignment")));

        if assigned.record.docid != record.docid {
            fatal_invariant(
                "abandon",
                format!(
                    "{worker} assigned docid {} but abandoned docid {}",
                    assigned.record.docid, record.docid
                ),
            );
        }

        guard.registry.release_head(&assigned.host, assigned.key, true);
        self.fetcher.unselect(&assigned.host, &record.url);
        tracing::debug!(docid = record.docid, %worker, "abandoned");
        self.not_empty.notify_all();
    }

    /// Remove every live descendant of `seed_docid`. Fatal if the number
    /// of deletions doesn't match the counter's prior value — that's a
    /// bug in the accounting, not a runtime condition.
    pub fn remove_offspring(&self, seed_docid: SeedDocid) -> Result<usize, FrontierError> {
        let mut guard = self.state.lock().unwrap();
        let expected = self.offspring.get(seed_docid);

        let removed = self.storage.delete_where(|r| r.seed_docid == seed_docid)?;
        let mut hosts_touched: Vec<String> = removed.iter().map(|(_, r)| r.host.clone()).collect();
        hosts_touched.sort();
        hosts_touched.dedup();
        for host in &hosts_touched {
            guard
                .registry
                .remove_where(host, |r| r.seed_docid == seed_docid);
        }

        if removed.len() as i64 != expected {
            fatal_seed_mismatch(seed_docid, expected, removed.len());
        }

        self.offspring.reset(&self.storage, seed_docid, 0)?;
        tracing::warn!(seed_docid, removed = removed.len(), "removed offspring");
        self.not_empty.notify_all();

        if expected > 0 {
            self.notify_seed_end(seed_docid);
        }
        Ok(removed.len())
    }

    fn maybe_notify_seed_end(&self, seed_docid: SeedDocid) {
        if self.offspring.get(seed_docid) == 0 {
            self.notify_seed_end(seed_docid);
        }
    }

    fn notify_seed_end(&self, seed_docid: SeedDocid) {
        for worker in self.workers.lock().unwrap().iter() {
            worker.on_seed_end(seed_docid);
        }
    }

    /// Signal all blocked `get_next_url` callers to return `None` and
    /// stop handing out further work.
    pub fn finish(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.finished = true;
        self.not_empty.notify_all();
    }

    pub fn queue_size(&self) -> usize {
        let guard = self.state.lock().unwrap();
        guard.registry.total_len() + guard.in_progress.len()
    }

    pub fn num_in_progress(&self) -> usize {
        self.state.lock().unwrap().in_progress.len()
    }

    pub fn num_offspring(&self, seed_docid: SeedDocid) -> i64 {
        self.offspring.get(seed_docid)
    }

    /// Run the quantified invariants from `SPEC_FULL.md` §8 against the
    /// current state. Returns the list of violated invariants, empty if
    /// none.
    pub fn validate(&self) -> Result<Vec<String>, FrontierError> {
        let guard = self.state.lock().unwrap();
        validator::validate(&guard, &self.offspring, &self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DefaultPageFetcher;

    struct RecordingWorker {
        id: WorkerId,
        ended_seeds: Mutex<Vec<SeedDocid>>,
    }

    impl RecordingWorker {
        fn new() -> Arc<Self> {
            Arc::new(RecordingWorker {
                id: WorkerId::new(),
                ended_seeds: Mutex::new(Vec::new()),
            })
        }
    }

    impl Worker for RecordingWorker {
        fn id(&self) -> WorkerId {
            self.id
        }

        fn on_seed_end(&self, seed_docid: SeedDocid) {
            self.ended_seeds.lock().unwrap().push(seed_docid);
        }
    }

    fn open_frontier() -> (Frontier, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(DefaultPageFetcher::new(Duration::from_millis(0)));
        let frontier = Frontier::open(dir.path(), Duration::from_millis(50), true, fetcher).unwrap();
        (frontier, dir)
    }

    #[test]
    fn s1_priority_ordering() {
        let (frontier, _dir) = open_frontier();
        let worker = frontier.register_worker(RecordingWorker::new());

        let specs = [(1u64, 0i8), (2, -1), (3, -2), (5, 1), (4, 1)];
        for (docid, priority) in specs {
            let record = UrlRecord::child(
                docid,
                1,
                1,
                priority,
                0,
                format!("https://www.test.com/{docid}"),
                "www.test.com",
            );
            assert!(frontier.schedule(record).unwrap());
        }

        let mut order = Vec::new();
        for _ in 0..5 {
            let record = frontier.get_next_url(worker).unwrap();
            frontier.set_processed(worker, &record).unwrap();
            order.push(record.docid);
        }
        assert_eq!(order, vec![3, 2, 1, 4, 5]);
    }

    #[test]
    fn s2_head_tail_on_small_queue() {
        let (frontier, _dir) = open_frontier();
        let worker = frontier.register_worker(RecordingWorker::new());

        let seed = UrlRecord::seed(1, -2, "https://www.test.com/", "www.test.com");
        frontier.schedule(seed).unwrap();
        let child = UrlRecord::child(2, 1, 1, -1, 1, "https://www.test.com/c", "www.test.com");
        frontier.schedule(child).unwrap();

        let first = frontier.get_next_url(worker).unwrap();
        assert_eq!(first.docid, 1);
        frontier.set_processed(worker, &first).unwrap();

        let grandchild = UrlRecord::child(3, 1, 1, 0, 2, "https://www.test.com/g", "www.test.com");
        frontier.schedule(grandchild).unwrap();

        assert!(frontier.validate().unwrap().is_empty());

        let second = frontier.get_next_url(worker).unwrap();
        assert_eq!(second.docid, 2);
    }

    #[test]
    fn s3_batch_enqueue_and_offspring_removal() {
        let (frontier, _dir) = open_frontier();
        let worker = frontier.register_worker(RecordingWorker::new());

        let seed = UrlRecord::seed(1, -2, "https://www.test.com/", "www.test.com");
        frontier.schedule(seed).unwrap();
        let first = frontier.get_next_url(worker).unwrap();
        frontier.set_processed(worker, &first).unwrap();

        let siblings = vec![
            UrlRecord::child(2, 1, 1, -1, 2, "https://www.test.com/2", "www.test.com"),
            UrlRecord::child(3, 1, 1, -1, 2, "https://www.test.com/3", "www.test.com"),
            UrlRecord::child(4, 1, 1, -1, 2, "https://www.test.com/4", "www.test.com"),
        ];
        let rejected = frontier.schedule_all(siblings).unwrap();
        assert!(rejected.is_empty());
        assert_eq!(frontier.queue_size(), 3);

        let removed = frontier.remove_offspring(1).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(frontier.num_offspring(1), 0);
        assert_eq!(frontier.queue_size(), 0);
    }

    #[test]
    fn s5_abandon_requeues_without_touching_counters() {
        let (frontier, _dir) = open_frontier();
        let worker = frontier.register_worker(RecordingWorker::new());

        let seed = UrlRecord::seed(1, 0, "https://a.test/", "a.test");
        frontier.schedule(seed).unwrap();
        let before_count = frontier.num_offspring(1);
        let before_size = frontier.queue_size();

        let claimed = frontier.get_next_url(worker).unwrap();
        frontier.abandon(worker, &claimed);

        assert_eq!(frontier.num_offspring(1), before_count);
        assert_eq!(frontier.queue_size(), before_size);
        assert_eq!(frontier.num_in_progress(), 0);

        let again = frontier.get_next_url(worker).unwrap();
        assert_eq!(again.docid, claimed.docid);
    }

    #[test]
    fn s6_offspring_removal_mid_crawl_leaves_in_progress_url_as_a_no_op_completion() {
        let (frontier, _dir) = open_frontier();
        let worker = frontier.register_worker(RecordingWorker::new());

        let seed = UrlRecord::seed(10, 0, "https://a.test/", "a.test");
        frontier.schedule(seed).unwrap();
        for docid in [11u64, 12, 13, 14] {
            let r = UrlRecord::child(docid, 10, 10, 0, 1, format!("https://a.test/{docid}"), "a.test");
            frontier.schedule(r).unwrap();
        }

        let d1 = frontier.get_next_url(worker).unwrap();
        assert_eq!(d1.docid, 10);

        let removed = frontier.remove_offspring(10).unwrap();
        assert_eq!(removed, 5);
        assert_eq!(frontier.num_offspring(10), 0);
        assert!(frontier.validate().unwrap().is_empty());

        frontier.set_processed(worker, &d1).unwrap();
        assert_eq!(frontier.num_in_progress(), 0);
    }
}
