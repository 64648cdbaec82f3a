//! Quantified invariants from `SPEC_FULL.md` §8, checked on demand against
//! a live [`crate::frontier::Frontier`] via `Frontier::validate`. Returns a
//! list of human-readable violations rather than failing fast, so a single
//! call surfaces everything wrong at once.

use std::collections::{HashMap, HashSet};

use super::FrontierState;
use crate::error::StorageError;
use crate::key::CompositeKey;
use crate::offspring::OffspringCounter;
use crate::storage::Storage;
use crate::url_record::SeedDocid;

pub(crate) fn validate(
    state: &FrontierState,
    offspring: &OffspringCounter,
    storage: &Storage,
) -> Result<Vec<String>, StorageError> {
    let mut violations = Vec::new();

    let mut seen_docids = HashSet::new();
    let mut live_keys: HashSet<CompositeKey> = HashSet::new();
    let mut live_counts: HashMap<SeedDocid, i64> = HashMap::new();

    for (host, queue) in state.registry.hosts() {
        if !queue.is_strictly_sorted() {
            violations.push(format!("host {host} queue is not strictly sorted by composite key"));
        }

        if let Some(claimed) = queue.claimed_key() {
            let claimed_still_present = queue.iter().any(|(k, _)| *k == claimed);
            if claimed_still_present {
                match queue.peek_head() {
                    Some((head_key, _)) if *head_key != claimed => {
                        violations.push(format!(
                            "host {host} has a claimed key that is not its queue head"
                        ));
                    }
                    None => violations.push(format!(
                        "host {host} reports a claimed key but has no head"
                    )),
                    _ => {}
                }
            }
            // If the claimed entry is absent, it was deleted out from under
            // the claim by `remove_offspring` — a defined recovery state
            // (§4.5/§9), not a violation.
        }

        for (key, record) in queue.iter() {
            if !seen_docids.insert(record.docid) {
                violations.push(format!(
                    "docid {} appears in more than one per-host queue",
                    record.docid
                ));
            }
            live_keys.insert(*key);
            *live_counts.entry(record.seed_docid).or_insert(0) += 1;
        }
    }

    let stored_keys: HashSet<CompositeKey> =
        storage.iter_all()?.into_iter().map(|(k, _)| k).collect();

    // An in-progress entry whose key is no longer on disk was deleted out
    // from under its claim by `remove_offspring` — the defined no-op
    // recovery state (§4.5/§9). It has already been subtracted from the
    // store and counter, so it must not be counted as live here either.
    for (key, record) in state.in_progress_entries() {
        if !stored_keys.contains(&key) {
            continue;
        }
        live_keys.insert(key);
        if seen_docids.insert(record.docid) {
            *live_counts.entry(record.seed_docid).or_insert(0) += 1;
        }
    }

    if live_keys != stored_keys {
        let missing_from_store = live_keys.difference(&stored_keys).count();
        let missing_from_memory = stored_keys.difference(&live_keys).count();
        violations.push(format!(
            "union of per-host queues and in-progress table disagrees with the ordered store \
             ({missing_from_store} keys in memory but not on disk, {missing_from_memory} on disk but not in memory)"
        ));
    }

    for (seed, live) in &live_counts {
        let counted = offspring.get(*seed);
        if counted != *live {
            violations.push(format!(
                "seed {seed}: counter reports {counted} live offspring but {live} are actually live"
            ));
        }
    }

    Ok(violations)
}
