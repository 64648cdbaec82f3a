use serde::{Deserialize, Serialize};

/// Unique 64-bit identifier assigned to a URL at discovery time.
pub type Docid = u64;

/// Docid of the seed a URL transitively descends from; equals the URL's own
/// docid for a seed.
pub type SeedDocid = u64;

/// A URL as carried by the frontier. Immutable once [`schedule`d][crate::frontier::Frontier::schedule].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub docid: Docid,
    pub seed_docid: SeedDocid,
    pub parent_docid: Docid,
    /// Smaller sorts first.
    pub priority: i8,
    /// Clamped to 255 when encoded into a composite key, but preserved here.
    pub depth: u16,
    pub url: String,
    /// Lowercased host derived from `url`; the per-host queue key.
    pub host: String,
}

impl UrlRecord {
    /// Convenience constructor for a seed URL: `seed_docid` and `parent_docid`
    /// both equal `docid`.
    pub fn seed(docid: Docid, priority: i8, url: impl Into<String>, host: impl Into<String>) -> Self {
        UrlRecord {
            docid,
            seed_docid: docid,
            parent_docid: docid,
            priority,
            depth: 0,
            url: url.into(),
            host: host.into(),
        }
    }

    /// Convenience constructor for a discovered child URL.
    pub fn child(
        docid: Docid,
        seed_docid: SeedDocid,
        parent_docid: Docid,
        priority: i8,
        depth: u16,
        url: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        UrlRecord {
            docid,
            seed_docid,
            parent_docid,
            priority,
            depth,
            url: url.into(),
            host: host.into(),
        }
    }
}
