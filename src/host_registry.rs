//! Host registry: maps host → per-host queue, and tracks the "ready set" —
//! hosts with a non-empty queue and an unclaimed head — in FIFO order of
//! becoming ready.

use indexmap::IndexSet;
use std::collections::HashMap;

use crate::host_queue::PerHostQueue;
use crate::key::CompositeKey;
use crate::url_record::UrlRecord;

#[derive(Debug, Default)]
pub struct HostRegistry {
    queues: HashMap<String, PerHostQueue>,
    /// Hosts with a non-empty queue and `head_claimed() == false`, in the
    /// order they most recently became ready.
    ready: IndexSet<String>,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry::default()
    }

    /// Insert a URL into its host's queue, creating the queue lazily.
    /// Updates ready-set membership.
    pub fn enqueue(&mut self, key: CompositeKey, record: UrlRecord) -> bool {
        let host = record.host.clone();
        let queue = self.queues.entry(host.clone()).or_insert_with(PerHostQueue::new);
        let inserted = queue.enqueue(key, record);
        if inserted && !queue.head_claimed() {
            self.ready.insert(host);
        }
        inserted
    }

    pub fn queue(&self, host: &str) -> Option<&PerHostQueue> {
        self.queues.get(host)
    }

    pub fn queue_mut(&mut self, host: &str) -> Option<&mut PerHostQueue> {
        self.queues.get_mut(host)
    }

    /// Hosts currently eligible for dispatch, in FIFO-of-becoming-ready
    /// order.
    pub fn ready_hosts(&self) -> impl Iterator<Item = &str> {
        self.ready.iter().map(|s| s.as_str())
    }

    /// Claim the head of `host`. Panics (via the queue) if the host is not
    /// actually ready; callers must only pass hosts from `ready_hosts`.
    pub fn claim_head(&mut self, host: &str) -> (CompositeKey, UrlRecord) {
        self.ready.shift_remove(host);
        let queue = self
            .queues
            .get_mut(host)
            .expect("claim_head called for unregistered host");
        queue.claim_head()
    }

    /// Release a claim. If `requeue` is false the caller has already
    /// removed the entry from the queue (or it was already removed by a
    /// prior `removeOffspring`); either way, if the queue is still
    /// non-empty afterwards the host re-enters the ready set.
    /// Returns the removed record when `requeue` is false and the entry was
    /// still present (i.e. not already deleted by a prior
    /// `removeOffspring`); `None` otherwise.
    pub fn release_head(&mut self, host: &str, key: CompositeKey, requeue: bool) -> Option<UrlRecord> {
        let Some(queue) = self.queues.get_mut(host) else {
            return None;
        };
        let taken = if requeue {
            queue.release_claim(key);
            None
        } else {
            queue.take_claimed(key)
        };
        self.refresh_ready(host);
        taken
    }

    /// Remove every URL on `host` matching `pred`. Does not alter the
    /// claim pointer — see [`crate::host_queue::PerHostQueue::remove_where`].
    pub fn remove_where(&mut self, host: &str, pred: impl Fn(&UrlRecord) -> bool) -> Vec<UrlRecord> {
        let Some(queue) = self.queues.get_mut(host) else {
            return Vec::new();
        };
        let removed = queue.remove_where(pred);
        self.refresh_ready(host);
        removed
    }

    /// Re-evaluate whether `host` belongs in the ready set and drop it from
    /// the registry entirely if its queue is empty and nothing is claimed.
    fn refresh_ready(&mut self, host: &str) {
        let Some(queue) = self.queues.get(host) else {
            return;
        };
        if !queue.is_empty() && !queue.head_claimed() {
            self.ready.insert(host.to_string());
        } else {
            self.ready.shift_remove(host);
        }
        self.prune_if_dead(host);
    }

    fn prune_if_dead(&mut self, host: &str) {
        if let Some(queue) = self.queues.get(host) {
            if queue.is_empty() && !queue.head_claimed() {
                self.queues.remove(host);
                self.ready.shift_remove(host);
            }
        }
    }

    pub fn total_len(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &PerHostQueue)> {
        self.queues.iter().map(|(h, q)| (h.as_str(), q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(docid: u64, host: &str) -> UrlRecord {
        UrlRecord::child(docid, docid, docid, 0, 0, format!("https://{host}/{docid}"), host)
    }

    #[test]
    fn ready_set_is_fifo_of_becoming_ready() {
        let mut reg = HostRegistry::new();
        let a = rec(1, "a.test");
        let b = rec(2, "b.test");
        reg.enqueue(CompositeKey::for_record(&a), a);
        reg.enqueue(CompositeKey::for_record(&b), b);

        let order: Vec<&str> = reg.ready_hosts().collect();
        assert_eq!(order, vec!["a.test", "b.test"]);
    }

    #[test]
    fn claimed_host_leaves_ready_set_until_released() {
        let mut reg = HostRegistry::new();
        let a = rec(1, "a.test");
        reg.enqueue(CompositeKey::for_record(&a), a.clone());

        let (key, claimed) = reg.claim_head("a.test");
        assert_eq!(claimed.docid, 1);
        assert_eq!(reg.ready_hosts().count(), 0);

        reg.release_head("a.test", key, true);
        assert_eq!(reg.ready_hosts().collect::<Vec<_>>(), vec!["a.test"]);
    }

    #[test]
    fn empty_unclaimed_host_is_pruned() {
        let mut reg = HostRegistry::new();
        let a = rec(1, "a.test");
        let key = CompositeKey::for_record(&a);
        reg.enqueue(key, a);
        let (claimed_key, _) = reg.claim_head("a.test");
        reg.release_head("a.test", claimed_key, false);
        assert!(reg.queue("a.test").is_none());
    }
}
