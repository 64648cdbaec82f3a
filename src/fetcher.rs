//! The `PageFetcher` collaborator: politeness timing and in-flight
//! tracking per host, per `SPEC_FULL.md` §4.7.
//!
//! The frontier calls `next_fetch_time`/`select`/`unselect` around every
//! dispatch; it never fetches a page itself. A default dashmap-backed
//! implementation ships with the crate for the demo binary and tests —
//! production embedders are expected to supply their own, e.g. one backed
//! by a shared rate-limit service.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Politeness and concurrency gate consulted before a host's head is
/// dispatched. Implementations must be `Send + Sync`: the frontier may call
/// them from multiple worker threads concurrently.
pub trait PageFetcher: Send + Sync {
    /// The earliest instant `host` may be fetched again. Called while
    /// deciding whether a ready host's head is actually dispatchable right
    /// now; a future instant causes the frontier to wait rather than hand
    /// out the URL.
    fn next_fetch_time(&self, host: &str) -> Instant;

    /// Called exactly once, immediately before `url` is handed to a
    /// worker: sets `next_fetch_time(host) = now + politeness_delay`.
    fn select(&self, host: &str, url: &str);

    /// Called only when a selected URL is abandoned rather than
    /// completed: clears the temporary selection, resetting
    /// `next_fetch_time(host)` to "now" so the host becomes immediately
    /// eligible again instead of waiting out the politeness window it was
    /// charged for a fetch that never happened.
    fn unselect(&self, host: &str, url: &str);
}

/// Per-host fixed-delay politeness, tracked in a `DashMap` so lookups from
/// concurrent worker threads don't contend on a single lock.
pub struct DefaultPageFetcher {
    delay: Duration,
    next_fetch: DashMap<String, Instant>,
    in_flight: DashMap<String, ()>,
}

impl DefaultPageFetcher {
    pub fn new(delay: Duration) -> Self {
        DefaultPageFetcher {
            delay,
            next_fetch: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl PageFetcher for DefaultPageFetcher {
    fn next_fetch_time(&self, host: &str) -> Instant {
        self.next_fetch
            .get(host)
            .map(|t| *t)
            .unwrap_or_else(Instant::now)
    }

    fn select(&self, host: &str, url: &str) {
        self.in_flight.insert(url.to_string(), ());
        self.next_fetch
            .insert(host.to_string(), Instant::now() + self.delay);
    }

    fn unselect(&self, host: &str, url: &str) {
        self.in_flight.remove(url);
        self.next_fetch.insert(host.to_string(), Instant::now());
    }
}
