use crate::url_record::SeedDocid;

/// Errors surfaced by the embedded ordered stores (`urls` and `seed_count`).
///
/// A `StorageError` means the current transaction (if any) was aborted and
/// the in-memory caches were left untouched — callers must not assume any
/// partial effect was applied.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("backing store failed: {0}")]
    Backend(#[from] rocksdb::Error),

    #[error("failed to encode record for storage: {0}")]
    Encode(#[from] bincode::Error),

    #[error("column family {0:?} missing from storage handle")]
    MissingColumnFamily(&'static str),
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}

/// Top-level frontier error. Only storage failures are returned to callers;
/// invariant violations are fatal and never reach this type (see
/// [`fatal_invariant`]).
#[derive(Debug, thiserror::Error)]
pub enum FrontierError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A counter mismatch, worker/claim mismatch, or other condition that the
/// specification documents as a bug rather than a runtime error. The
/// diagnostic is logged and the process aborts — see `SPEC_FULL.md` §7.
pub fn fatal_invariant(context: &str, detail: impl std::fmt::Display) -> ! {
    tracing::error!(context, %detail, "invariant violation — aborting");
    panic!("invariant violation in {context}: {detail}");
}

pub fn fatal_seed_mismatch(seed: SeedDocid, expected: i64, observed: usize) -> ! {
    fatal_invariant(
        "removeOffspring counter mismatch",
        format!(
            "seed {seed} expected {expected} live offspring but deleted {observed} records"
        ),
    )
}
