//! Configuration handling for the SQL data inspector.
//!
//! `RepositoryOptions` carries the engine policy knobs a repository is built
//! with. `Config` is the binary's CLI surface (arguments and environment
//! variables) and produces a `RepositoryOptions`.

use crate::guard::DEFAULT_REAPER_QUERY_PATTERN;
use crate::models::{ColumnSort, DatabaseObject, PageRequest, ValueSort};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COLUMNS_SHOW_PRIMARY_KEY_FIRST: bool = true;
pub const DEFAULT_COLUMNS_ORDER_ALPHABETICALLY: bool = false;
pub const DEFAULT_PAGE_SIZE: u32 = crate::models::DEFAULT_PAGE_SIZE;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ROWS: u32 = 10_000;

// SQL Server execution gate
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_LOCK_MAX_POLLS: u32 = 200;
pub const DEFAULT_LOCK_SETTLE_DELAY_MS: u64 = 500;

// PostgreSQL backend reaper
pub const DEFAULT_REAPER_THRESHOLD: u64 = 50;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Engine policy for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryOptions {
    /// Default column order puts primary-key columns first
    pub columns_show_primary_key_first: bool,
    /// Default column order is by name instead of declaration order
    pub columns_order_alphabetically: bool,
    /// Page size used when a request asks for a non-positive one
    pub default_page_size: u32,
    pub query_timeout_secs: u64,
    /// Rows beyond this are dropped from any single result
    pub max_rows: u32,
    pub lock_poll_interval_ms: u64,
    pub lock_max_polls: u32,
    pub lock_settle_delay_ms: u64,
    /// Queries between idle-backend sweeps; 0 disables sweeping
    pub reaper_threshold: u64,
    /// `LIKE` pattern matched against idle backends' last query
    pub reaper_query_pattern: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            columns_show_primary_key_first: DEFAULT_COLUMNS_SHOW_PRIMARY_KEY_FIRST,
            columns_order_alphabetically: DEFAULT_COLUMNS_ORDER_ALPHABETICALLY,
            default_page_size: DEFAULT_PAGE_SIZE,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            max_rows: DEFAULT_MAX_ROWS,
            lock_poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
            lock_max_polls: DEFAULT_LOCK_MAX_POLLS,
            lock_settle_delay_ms: DEFAULT_LOCK_SETTLE_DELAY_MS,
            reaper_threshold: DEFAULT_REAPER_THRESHOLD,
            reaper_query_pattern: DEFAULT_REAPER_QUERY_PATTERN.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl RepositoryOptions {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    pub fn lock_settle_delay(&self) -> Duration {
        Duration::from_millis(self.lock_settle_delay_ms)
    }

    /// Longest a query waits for the execution gate before proceeding anyway.
    pub fn lock_max_wait(&self) -> Duration {
        self.lock_poll_interval().saturating_mul(self.lock_max_polls)
    }

    /// Validate options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.max_rows == 0 {
            return Err("max_rows must be greater than 0".to_string());
        }
        if self.default_page_size == 0 {
            return Err("default_page_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// What the inspector binary should load.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Show provider, identifier quotes and server version
    Info,

    /// List tables and views
    Objects {
        /// Only list tables
        #[arg(long, conflicts_with = "views_only")]
        tables_only: bool,
        /// Only list views
        #[arg(long)]
        views_only: bool,
    },

    /// List the columns of a table or view
    Columns {
        /// Object as schema.name
        object: String,
        /// ascending, descending, or default
        #[arg(long, default_value = "default")]
        sort: String,
    },

    /// Show the distinct values of a column with their counts
    Values {
        /// Object as schema.name
        object: String,
        column: String,
        /// SQL condition appended as WHERE
        #[arg(long, default_value = "")]
        filter: String,
        /// Sort by value (true = ascending)
        #[arg(long)]
        sort_by_value: Option<bool>,
        /// Sort by count (true = ascending)
        #[arg(long)]
        sort_by_count: Option<bool>,
    },

    /// Show one page of rows
    Rows {
        /// Object as schema.name
        object: String,
        /// SQL condition appended as WHERE
        #[arg(long, default_value = "")]
        filter: String,
        /// Ordering column as name[:asc|:desc]; repeatable
        #[arg(long = "order-by", value_name = "COLUMN")]
        order_by: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 0)]
        page_size: i64,
    },

    /// Count rows matching a filter
    Count {
        /// Object as schema.name
        object: String,
        #[arg(long, default_value = "")]
        filter: String,
    },
}

/// Configuration for the inspector binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-data-inspector",
    about = "Browse tables, columns, value histograms and row pages of MSSQL, MySQL and PostgreSQL databases",
    version,
    author
)]
pub struct Config {
    /// Connection string: a mssql://, mysql:// or postgres:// URL, or an ADO.NET string for SQL Server
    #[arg(short = 'c', long = "connection", value_name = "URL", env = "INSPECTOR_CONNECTION")]
    pub connection: String,

    /// Provider identifier (MSSQL, MySQL, PGSQL); inferred from the connection string when omitted
    #[arg(short = 'p', long, env = "INSPECTOR_PROVIDER")]
    pub provider: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "INSPECTOR_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "INSPECTOR_JSON_LOGS")]
    pub json_logs: bool,

    /// Query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "INSPECTOR_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Maximum rows kept from any single query
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS, env = "INSPECTOR_MAX_ROWS")]
    pub max_rows: u32,

    /// Maximum pooled connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "INSPECTOR_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// List columns alphabetically by default instead of in declaration order
    #[arg(long, env = "INSPECTOR_COLUMNS_ALPHABETICAL")]
    pub columns_alphabetical: bool,

    /// Do not list primary-key columns first by default
    #[arg(long, env = "INSPECTOR_COLUMNS_KEYS_INLINE")]
    pub columns_keys_inline: bool,

    /// Queries between PostgreSQL idle-backend sweeps (0 disables)
    #[arg(long, default_value_t = DEFAULT_REAPER_THRESHOLD, env = "INSPECTOR_REAPER_THRESHOLD")]
    pub reaper_threshold: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Repository options derived from the CLI flags.
    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            columns_show_primary_key_first: !self.columns_keys_inline,
            columns_order_alphabetically: self.columns_alphabetical,
            query_timeout_secs: self.query_timeout,
            max_rows: self.max_rows,
            max_connections: self.max_connections,
            reaper_threshold: self.reaper_threshold,
            ..RepositoryOptions::default()
        }
    }
}

/// Parse `schema.name` into a table reference. A bare name has no schema.
///
/// The split is at the first dot, so object names may contain dots but
/// schema names may not. Whether it is a table or a view does not matter for
/// any query built from it.
pub fn parse_object(s: &str) -> Result<DatabaseObject, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Object name cannot be empty".to_string());
    }
    let (schema, name) = match s.split_once('.') {
        Some((schema, name)) => (schema.trim(), name.trim()),
        None => ("", s),
    };
    if name.is_empty() {
        return Err(format!("Missing object name in '{}'", s));
    }
    Ok(DatabaseObject::table(schema, name))
}

/// Parse `column[:asc|:desc]` ordering arguments into a page request.
pub fn page_request(
    filter: &str,
    order_by: &[String],
    page: i64,
    page_size: i64,
) -> Result<PageRequest, String> {
    let mut request = PageRequest::new(page, page_size).with_filter(filter);
    for term in order_by {
        let (column, ascending) = match term.rsplit_once(':') {
            Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => (column, true),
            Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => (column, false),
            _ => (term.as_str(), true),
        };
        if column.trim().is_empty() {
            return Err(format!("Missing column in ordering '{}'", term));
        }
        request = request.order_by(column.trim(), ascending);
    }
    Ok(request)
}

/// Column sort from a CLI string.
pub fn column_sort(s: &str) -> ColumnSort {
    s.parse().unwrap_or_default()
}

/// Histogram sort from the two optional CLI flags.
pub fn value_sort(by_value: Option<bool>, by_count: Option<bool>) -> ValueSort {
    ValueSort { by_value, by_count }
}
