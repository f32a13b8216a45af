//! Connection hygiene for PostgreSQL.
//!
//! Metadata queries can leave idle backends behind that the driver does not
//! reclaim promptly. The reaper counts executed queries and, every `threshold`
//! queries, hands back a maintenance statement that terminates idle backends of
//! the current database whose last query matches a recognizable pattern.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default pattern for the type-lookup queries drivers issue on new sessions.
pub const DEFAULT_REAPER_QUERY_PATTERN: &str = "%FROM pg_catalog.pg_type%";

/// Per-repository query counter with a periodic maintenance statement.
#[derive(Debug)]
pub struct BackendReaper {
    threshold: u64,
    query_pattern: String,
    executed: AtomicU64,
}

impl BackendReaper {
    /// A threshold of 0 disables the reaper.
    pub fn new(threshold: u64, query_pattern: impl Into<String>) -> Self {
        Self {
            threshold,
            query_pattern: query_pattern.into(),
            executed: AtomicU64::new(0),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Queries counted since the last sweep.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    /// Count one executed query. Returns `true` when this query reached the
    /// threshold, in which case the counter has already been reset to zero.
    pub fn record_query(&self) -> bool {
        if self.threshold == 0 {
            return false;
        }
        let threshold = self.threshold;
        let previous = self
            .executed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n + 1 >= threshold { 0 } else { n + 1 })
            });
        // The closure always returns Some, so this is always Ok
        matches!(previous, Ok(n) if n + 1 >= threshold)
    }

    /// Statement terminating idle backends left behind by type-lookup queries.
    ///
    /// Never targets the caller's own backend, and never a backend that still
    /// leads parallel workers.
    pub fn maintenance_sql(&self) -> String {
        format!(
            "SELECT pg_terminate_backend(a.pid) AS terminated\n\
             FROM pg_stat_activity a\n\
             WHERE a.datname = current_database()\n\
             AND a.pid <> pg_backend_pid()\n\
             AND a.state = 'idle'\n\
             AND a.query LIKE '{}'\n\
             AND NOT EXISTS (\n\
             SELECT 1 FROM pg_stat_activity w\n\
             WHERE w.leader_pid = a.pid AND w.pid <> a.pid\n\
             )",
            self.query_pattern.replace('\'', "''")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_query_fires_at_threshold() {
        let reaper = BackendReaper::new(3, DEFAULT_REAPER_QUERY_PATTERN);
        assert!(!reaper.record_query());
        assert!(!reaper.record_query());
        assert!(reaper.record_query());
        assert_eq!(reaper.executed(), 0);
        assert!(!reaper.record_query());
        assert_eq!(reaper.executed(), 1);
    }

    #[test]
    fn test_threshold_one_fires_every_query() {
        let reaper = BackendReaper::new(1, DEFAULT_REAPER_QUERY_PATTERN);
        assert!(reaper.record_query());
        assert!(reaper.record_query());
    }

    #[test]
    fn test_zero_threshold_disables() {
        let reaper = BackendReaper::new(0, DEFAULT_REAPER_QUERY_PATTERN);
        for _ in 0..100 {
            assert!(!reaper.record_query());
        }
        assert_eq!(reaper.executed(), 0);
    }

    #[test]
    fn test_concurrent_counting_fires_once_per_threshold() {
        let reaper = std::sync::Arc::new(BackendReaper::new(10, DEFAULT_REAPER_QUERY_PATTERN));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reaper = reaper.clone();
                std::thread::spawn(move || (0..25).filter(|_| reaper.record_query()).count())
            })
            .collect();
        let fired: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(fired, 10);
        assert_eq!(reaper.executed(), 0);
    }

    #[test]
    fn test_maintenance_sql_guards() {
        let sql = BackendReaper::new(50, DEFAULT_REAPER_QUERY_PATTERN).maintenance_sql();
        assert!(sql.contains("pg_terminate_backend(a.pid)"));
        assert!(sql.contains("a.datname = current_database()"));
        assert!(sql.contains("a.pid <> pg_backend_pid()"));
        assert!(sql.contains("a.state = 'idle'"));
        assert!(sql.contains("w.leader_pid = a.pid"));
        assert!(sql.contains("LIKE '%FROM pg_catalog.pg_type%'"));
    }

    #[test]
    fn test_maintenance_sql_escapes_pattern() {
        let sql = BackendReaper::new(5, "%it's%").maintenance_sql();
        assert!(sql.contains("LIKE '%it''s%'"));
    }
}
