use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion pipeline activity.
///
/// Each counter is bumped at the moment the corresponding stage is attempted,
/// so a rejected upload leaves the downstream counters untouched. That makes
/// the counters usable as evidence that no extraction or embedding ran for a
/// request that failed the format gate.
#[derive(Default)]
pub struct IngestMetrics {
    files_stored: AtomicU64,
    extractions_attempted: AtomicU64,
    embeddings_attempted: AtomicU64,
    uploads_completed: AtomicU64,
    uploads_failed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file fully staged by the sink.
    pub fn record_file_stored(&self) {
        self.files_stored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an extraction attempt (before the extractor runs).
    pub fn record_extraction_attempt(&self) {
        self.extractions_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an embedding attempt (before the provider is called).
    pub fn record_embedding_attempt(&self) {
        self.embeddings_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that traversed the full pipeline.
    pub fn record_completed(&self) {
        self.uploads_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that terminated at some stage with an error.
    pub fn record_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_stored: self.files_stored.load(Ordering::Relaxed),
            extractions_attempted: self.extractions_attempted.load(Ordering::Relaxed),
            embeddings_attempted: self.embeddings_attempted.load(Ordering::Relaxed),
            uploads_completed: self.uploads_completed.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of uploads fully staged to disk since startup.
    pub files_stored: u64,
    /// Number of extraction attempts dispatched.
    pub extractions_attempted: u64,
    /// Number of embedding attempts dispatched.
    pub embeddings_attempted: u64,
    /// Number of uploads that completed the full pipeline.
    pub uploads_completed: u64,
    /// Number of uploads that terminated with an error.
    pub uploads_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_stage_independently() {
        let metrics = IngestMetrics::new();
        metrics.record_file_stored();
        metrics.record_extraction_attempt();
        metrics.record_embedding_attempt();
        metrics.record_completed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_stored, 1);
        assert_eq!(snapshot.extractions_attempted, 1);
        assert_eq!(snapshot.embeddings_attempted, 1);
        assert_eq!(snapshot.uploads_completed, 1);
        assert_eq!(snapshot.uploads_failed, 0);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let snapshot = IngestMetrics::new().snapshot();
        assert_eq!(snapshot.files_stored, 0);
        assert_eq!(snapshot.extractions_attempted, 0);
        assert_eq!(snapshot.embeddings_attempted, 0);
        assert_eq!(snapshot.uploads_completed, 0);
        assert_eq!(snapshot.uploads_failed, 0);
    }
}
