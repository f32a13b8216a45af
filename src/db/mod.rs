//! Database access layer.
//!
//! This module provides database access functionality:
//! - Connection pool management for each supported driver
//! - Query execution with timeout and row cap
//! - Row decoding into driver-neutral records
//! - Driver dispatch macro for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod types;

pub use executor::{QueryExecutor, QueryRunner};
pub use pool::{DbConnection, MssqlPool};
pub use types::{Record, RecordExt, RowSet, RowToRecord, display_value};
