//! Error types for the SQL data inspector.
//!
//! Only construction-time failures surface as `DbError` to callers of the
//! repository. Query execution failures are converted into empty results by the
//! execution gateway, but they still travel as `DbError` internally so they can
//! be logged with context.

use thiserror::Error;

const CHECK_CONNECTION_STRING: &str = "Verify the connection string, user name and password";
const CHECK_NETWORK: &str = "Make sure the server is reachable from this host";
const CHECK_QUERY_INPUT: &str = "Check the filter expression and the object and column names";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Cannot reach database: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Query rejected by server: {message}")]
    Database {
        message: String,
        /// SQLSTATE for sqlx drivers, the server error number for SQL Server
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("{operation} did not finish within {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid argument: {message}")]
    InvalidInput { message: String },

    #[error("Unsupported provider: '{provider}'. Expected one of MSSQL, MySQL, PGSQL")]
    UnsupportedProvider { provider: String },

    #[error("Unexpected failure: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Error reported by the server for a statement it received.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unsupported_provider(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            provider: provider.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// A hint for the user on how to fix the problem, when one is known.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } | Self::Database { suggestion, .. } => {
                Some(suggestion)
            }
            Self::UnsupportedProvider { .. } => {
                Some("Set the provider to MSSQL, MySQL or PGSQL, or use a recognizable URL scheme")
            }
            Self::Timeout { .. } => Some("Narrow the filter or raise the query timeout"),
            Self::InvalidInput { .. } | Self::Internal { .. } => None,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Bounded by `acquire_timeout_secs`, which the drivers do not report back.
fn pool_acquire_timeout() -> DbError {
    DbError::connection(
        "no pooled connection became available within the acquire timeout",
        "Raise max_connections or acquire_timeout_secs, or retry once other queries finish",
    )
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;

        match err {
            E::Database(server) => DbError::database(
                server.message(),
                server.code().map(|code| code.into_owned()),
                CHECK_QUERY_INPUT,
            ),
            E::Configuration(cause) => DbError::connection(cause.to_string(), CHECK_CONNECTION_STRING),
            E::Io(cause) => DbError::connection(format!("network: {}", cause), CHECK_NETWORK),
            E::Tls(cause) => DbError::connection(
                format!("TLS handshake: {}", cause),
                "Check the server certificate or build without TLS",
            ),
            E::Protocol(cause) => DbError::connection(
                format!("wire protocol: {}", cause),
                "Check that the server version is supported",
            ),
            E::PoolTimedOut => pool_acquire_timeout(),
            E::PoolClosed => DbError::connection("the pool was closed", "Open a new repository"),
            E::ColumnDecode { index, source } => {
                DbError::internal(format!("column {} could not be decoded: {}", index, source))
            }
            E::Decode(source) => DbError::internal(format!("value could not be decoded: {}", source)),
            other => DbError::internal(other.to_string()),
        }
    }
}

impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as E;

        match err {
            E::Server(token) => DbError::database(
                token.message().to_string(),
                Some(token.code().to_string()),
                CHECK_QUERY_INPUT,
            ),
            E::Io { .. } => DbError::connection(err.to_string(), CHECK_NETWORK),
            E::Tls(cause) => DbError::connection(
                format!("TLS handshake: {}", cause),
                "Add TrustServerCertificate=true or install the server certificate",
            ),
            E::Routing { host, port } => DbError::connection(
                format!("server redirected the session to {}:{}", host, port),
                "Connect to the redirected host directly",
            ),
            other => DbError::internal(format!("SQL Server driver: {}", other)),
        }
    }
}

impl From<bb8::RunError<bb8_tiberius::Error>> for DbError {
    fn from(err: bb8::RunError<bb8_tiberius::Error>) -> Self {
        match err {
            bb8::RunError::User(cause) => DbError::connection(cause.to_string(), CHECK_CONNECTION_STRING),
            bb8::RunError::TimedOut => pool_acquire_timeout(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
