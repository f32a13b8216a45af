//! Data models for the SQL data inspector.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod object;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, Provider};
pub use object::{
    DatabaseColumn, DatabaseColumnValue, DatabaseInfo, DatabaseObject, DatabaseObjectType,
};
pub use query::{
    ColumnSort, DEFAULT_PAGE_SIZE, HistogramOrder, OrderTerm, PageRequest, PageWindow,
    QueryResults, RowCount, SessionId, TableRows, ValueSort,
};
