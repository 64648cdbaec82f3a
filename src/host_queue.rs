//! Per-host queue: the pending URLs for one host, ordered by composite key.
//!
//! Entries live by value in a [`BTreeMap`] keyed on [`CompositeKey`]; there
//! is never a second, separately-tracked head/tail pointer. Claiming a head
//! does not remove it from the map — it only records *which* key is
//! claimed. This sidesteps the aliasing bug noted in `SPEC_FULL.md` §9
//! (stale cached pointers diverging from the map after a mutation): every
//! lookup recomputes the answer from the map itself.
//!
//! A lower-keyed URL enqueued while the current head is claimed is simply
//! inserted — it becomes the map's true minimum immediately, but the
//! claimed entry (tracked by `claimed_key`, not by map position) remains
//! the logical head until the claim is released. This matches §4.2: the
//! new arrival only becomes dispatchable once released with
//! `requeue = false`.

use std::collections::BTreeMap;

use crate::key::CompositeKey;
use crate::url_record::UrlRecord;

#[derive(Debug, Default)]
pub struct PerHostQueue {
    entries: BTreeMap<CompositeKey, UrlRecord>,
    claimed_key: Option<CompositeKey>,
}

impl PerHostQueue {
    pub fn new() -> Self {
        PerHostQueue {
            entries: BTreeMap::new(),
            claimed_key: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn head_claimed(&self) -> bool {
        self.claimed_key.is_some()
    }

    pub fn claimed_key(&self) -> Option<CompositeKey> {
        self.claimed_key
    }

    /// Insert a URL at the position dictated by its composite key. Returns
    /// `false` if the key is already present (cannot happen for distinct
    /// docids, but guarded against defensively).
    pub fn enqueue(&mut self, key: CompositeKey, record: UrlRecord) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, record);
        true
    }

    /// The smallest-keyed URL, if any. Only meaningful for hosts in the
    /// ready set (`claimed_key.is_none()`); a claimed host's logical head is
    /// tracked separately and must not be read via this method.
    pub fn peek_head(&self) -> Option<(&CompositeKey, &UrlRecord)> {
        self.entries.iter().next()
    }

    /// Claim the current minimum-keyed entry. Caller must have checked
    /// `!head_claimed()` and `!is_empty()` first.
    pub fn claim_head(&mut self) -> (CompositeKey, UrlRecord) {
        assert!(self.claimed_key.is_none(), "head already claimed");
        let (&key, record) = self.entries.iter().next().expect("queue is empty");
        self.claimed_key = Some(key);
        (key, record.clone())
    }

    /// Release a claim without removing the entry (`abandon`). The entry
    /// stays exactly where it was inserted, so a lower-keyed arrival during
    /// the claim correctly outranks it on the next dispatch.
    pub fn release_claim(&mut self, key: CompositeKey) {
        assert_eq!(self.claimed_key, Some(key), "release of a key that was not claimed");
        self.claimed_key = None;
    }

    /// Remove the claimed entry and release the claim (`setProcessed`).
    /// Returns `None` if the entry was already removed by a concurrent
    /// `removeOffspring` — a defined no-op per `SPEC_FULL.md` §4.5/§9.
    pub fn take_claimed(&mut self, key: CompositeKey) -> Option<UrlRecord> {
        assert_eq!(self.claimed_key, Some(key), "take of a key that was not claimed");
        self.claimed_key = None;
        self.entries.remove(&key)
    }

    /// Remove every entry matching `pred`, returning the removed records.
    /// Used by `removeOffspring`. A matched entry that happens to be the
    /// claimed one is removed from the map but `claimed_key` is left
    /// pointing at it, so the host stays unready until the owning worker
    /// eventually calls `setProcessed`/`abandon`.
    pub fn remove_where(&mut self, pred: impl Fn(&UrlRecord) -> bool) -> Vec<UrlRecord> {
        let doomed: Vec<CompositeKey> = self
            .entries
            .iter()
            .filter(|(_, record)| pred(record))
            .map(|(key, _)| *key)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for key in doomed {
            if let Some(record) = self.entries.remove(&key) {
                removed.push(record);
            }
        }
        removed
    }

    /// True iff the keys are strictly increasing with no duplicates.
    /// Trivially guaranteed by `BTreeMap`; exposed so the validator checks
    /// the invariant explicitly rather than assuming the data structure.
    pub fn is_strictly_sorted(&self) -> bool {
        let mut prev: Option<&CompositeKey> = None;
        for key in self.entries.keys() {
            if let Some(p) = prev {
                if p >= key {
                    return false;
                }
            }
            prev = Some(key);
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &UrlRecord)> {
        self.entries.iter()
    }
}
