//! SQL Data Inspector Library
//!
//! Query and introspection engine for browsing SQL Server, MySQL and
//! PostgreSQL databases: object and column listings, value histograms,
//! paged row reads and row counts.

pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod models;
pub mod repository;

pub use config::{Config, RepositoryOptions};
pub use error::{DbError, DbResult};
pub use repository::DbRepository;
