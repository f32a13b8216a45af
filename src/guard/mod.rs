//! Safety and concurrency guards.
//!
//! - `injection`: statement-stacking screen for filter fragments
//! - `gate`: serialized execution with bounded wait (SQL Server)
//! - `reaper`: idle-backend maintenance (PostgreSQL)
//! - `fence`: caller-side stale-result detection

pub mod fence;
pub mod gate;
pub mod injection;
pub mod reaper;

pub use fence::{OperationKind, SessionFence};
pub use gate::ExecutionGate;
pub use injection::{FilterCheckResult, check_filter, has_potential_sql_injection, screen_filter};
pub use reaper::{BackendReaper, DEFAULT_REAPER_QUERY_PATTERN};
