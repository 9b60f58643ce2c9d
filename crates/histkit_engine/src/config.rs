//! Configuration for the sync engine.

use crate::retention::RetentionPolicy;
use histkit_core::Author;

/// Default namespace prefix for watermark keys.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "histkit.watermark.";

/// Configuration for one kit instance.
#[derive(Debug, Clone)]
pub struct KitConfig {
    /// The author this instance reads and writes as.
    pub current_author: Author,
    /// Every author sharing the log that this instance accounts for.
    pub authors: Vec<Author>,
    /// Write-only authors excluded from retention readiness. Their
    /// transactions are still deleted once all required authors pass
    /// them.
    pub batch_authors: Vec<Author>,
    /// Target views the default merge applies fetched changes to.
    pub views: Vec<String>,
    /// Prefix for watermark-store keys, so independent kit instances
    /// sharing one store use disjoint namespaces.
    pub namespace_prefix: String,
    /// When automatic retention may run.
    pub retention: RetentionPolicy,
}

impl KitConfig {
    /// Creates a configuration for `current_author`.
    ///
    /// The author set starts as just the current author; grow it with
    /// [`with_authors`](Self::with_authors).
    pub fn new(current_author: Author) -> Self {
        Self {
            authors: vec![current_author.clone()],
            current_author,
            batch_authors: Vec::new(),
            views: Vec::new(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            retention: RetentionPolicy::None,
        }
    }

    /// Sets the full author set.
    pub fn with_authors(mut self, authors: impl IntoIterator<Item = Author>) -> Self {
        self.authors = authors.into_iter().collect();
        self
    }

    /// Sets the batch (write-only) authors.
    pub fn with_batch_authors(mut self, authors: impl IntoIterator<Item = Author>) -> Self {
        self.batch_authors = authors.into_iter().collect();
        self
    }

    /// Sets the target views for the default merge.
    pub fn with_views(mut self, views: impl IntoIterator<Item = String>) -> Self {
        self.views = views.into_iter().collect();
        self
    }

    /// Sets the watermark key namespace prefix.
    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    /// Sets the retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// The configured author set, with the current author always
    /// included.
    ///
    /// Retention readiness is computed over this set (minus batch
    /// authors), so the current author's own watermark always
    /// participates in the minimum.
    pub fn all_authors(&self) -> Vec<Author> {
        let mut authors = self.authors.clone();
        if !authors.contains(&self.current_author) {
            authors.push(self.current_author.clone());
        }
        authors
    }
}
