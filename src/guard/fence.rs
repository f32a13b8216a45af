//! Caller-side session fencing.
//!
//! The repository only echoes the token it was given. A caller that may have
//! several loads of the same kind in flight uses a `SessionFence` to remember
//! the most recently dispatched token per kind and to drop any result that
//! arrives carrying an older one. Nothing is cancelled on the wire.

use crate::models::{QueryResults, SessionId};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// The kinds of load a caller dispatches independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Objects,
    Columns,
    ColumnValues,
    TableRows,
    RowCount,
}

/// Latest dispatched token per operation kind.
#[derive(Debug, Default)]
pub struct SessionFence {
    latest: Mutex<HashMap<OperationKind, SessionId>>,
}

impl SessionFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `kind`, superseding any earlier one.
    pub fn dispatch(&self, kind: OperationKind) -> SessionId {
        let token = SessionId::new();
        self.dispatch_with(kind, token.clone());
        token
    }

    /// Record a caller-chosen token as the latest for `kind`.
    pub fn dispatch_with(&self, kind: OperationKind, token: SessionId) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.insert(kind, token);
    }

    /// Whether `token` is still the most recent dispatch for `kind`.
    pub fn is_current(&self, kind: OperationKind, token: &SessionId) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.get(&kind) == Some(token)
    }

    /// Unwrap a result if it is current, or drop it as stale.
    pub fn accept<T>(&self, kind: OperationKind, results: QueryResults<T>) -> Option<T> {
        if self.is_current(kind, &results.session_id) {
            Some(results.data)
        } else {
            debug!(
                kind = ?kind,
                session_id = %results.session_id,
                "Dropping stale result"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_completion_applies_latest_only() {
        let fence = SessionFence::new();
        let a = fence.dispatch(OperationKind::TableRows);
        let b = fence.dispatch(OperationKind::TableRows);

        let mut applied = Vec::new();
        for results in [QueryResults::new(b, "B"), QueryResults::new(a, "A")] {
            if let Some(data) = fence.accept(OperationKind::TableRows, results) {
                applied.push(data);
            }
        }
        assert_eq!(applied, vec!["B"]);
    }

    #[test]
    fn test_kinds_are_independent() {
        let fence = SessionFence::new();
        let objects = fence.dispatch(OperationKind::Objects);
        let columns = fence.dispatch(OperationKind::Columns);
        assert!(fence.is_current(OperationKind::Objects, &objects));
        assert!(fence.is_current(OperationKind::Columns, &columns));
        assert!(!fence.is_current(OperationKind::Objects, &columns));
    }

    #[test]
    fn test_undispatched_kind_rejects() {
        let fence = SessionFence::new();
        assert!(!fence.is_current(OperationKind::RowCount, &SessionId::from("x")));
    }

    #[test]
    fn test_dispatch_with_caller_token() {
        let fence = SessionFence::new();
        fence.dispatch_with(OperationKind::ColumnValues, SessionId::from("gen-7"));
        let results = QueryResults::new(SessionId::from("gen-7"), 3);
        assert_eq!(fence.accept(OperationKind::ColumnValues, results), Some(3));
    }
}
