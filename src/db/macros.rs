//! Driver dispatch macro.
//!
//! Generates the match over `DbConnection` variants so per-driver code stays
//! linear to read. Expands at compile time with zero runtime overhead.

/// Macro for generating driver dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     Mssql(p) => do_mssql(p),
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::pool::DbConnection::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
