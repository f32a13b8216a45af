//! SQL Data Inspector - Main entry point.
//!
//! Runs one repository operation against the configured database and prints
//! the result as JSON.

use serde::Serialize;
use sql_data_inspector::config::{
    Command, Config, column_sort, page_request, parse_object, value_sort,
};
use sql_data_inspector::guard::{OperationKind, SessionFence};
use sql_data_inspector::models::{ColumnSort, DatabaseColumn, DatabaseObject, QueryResults};
use sql_data_inspector::{DbError, DbRepository};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the JSON result.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DbError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize result: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Print `results` if its session token is still the current one for `kind`.
fn print_current<T: Serialize>(
    fence: &SessionFence,
    kind: OperationKind,
    results: QueryResults<T>,
) -> Result<(), DbError> {
    match fence.accept(kind, results) {
        Some(data) => print_json(&data),
        None => Ok(()),
    }
}

async fn load_columns(
    repository: &DbRepository,
    fence: &SessionFence,
    object: &DatabaseObject,
) -> Vec<DatabaseColumn> {
    let session = fence.dispatch(OperationKind::Columns);
    let results = repository
        .get_db_columns(session, Some(object), ColumnSort::Default)
        .await;
    fence
        .accept(OperationKind::Columns, results)
        .unwrap_or_default()
}

async fn run(repository: &DbRepository, command: &Command) -> Result<(), DbError> {
    let fence = SessionFence::new();

    match command {
        Command::Info => print_json(&repository.get_database_info().await),
        Command::Objects {
            tables_only,
            views_only,
        } => {
            let session = fence.dispatch(OperationKind::Objects);
            let results = repository
                .get_db_objects(session, !views_only, !tables_only)
                .await;
            print_current(&fence, OperationKind::Objects, results)
        }
        Command::Columns { object, sort } => {
            let object = parse_object(object).map_err(DbError::invalid_input)?;
            let session = fence.dispatch(OperationKind::Columns);
            let results = repository
                .get_db_columns(session, Some(&object), column_sort(sort))
                .await;
            print_current(&fence, OperationKind::Columns, results)
        }
        Command::Values {
            object,
            column,
            filter,
            sort_by_value,
            sort_by_count,
        } => {
            let object = parse_object(object).map_err(DbError::invalid_input)?;
            let columns = load_columns(repository, &fence, &object).await;
            let column = columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(column))
                .ok_or_else(|| {
                    DbError::invalid_input(format!(
                        "Column '{}' not found in {}",
                        column,
                        object.qualified_name()
                    ))
                })?;
            let session = fence.dispatch(OperationKind::ColumnValues);
            let results = repository
                .get_db_column_values(
                    session,
                    Some(&object),
                    Some(column),
                    filter,
                    value_sort(*sort_by_value, *sort_by_count),
                )
                .await;
            print_current(&fence, OperationKind::ColumnValues, results)
        }
        Command::Rows {
            object,
            filter,
            order_by,
            page,
            page_size,
        } => {
            let object = parse_object(object).map_err(DbError::invalid_input)?;
            let request =
                page_request(filter, order_by, *page, *page_size).map_err(DbError::invalid_input)?;
            let columns = load_columns(repository, &fence, &object).await;
            let columns = (!columns.is_empty()).then_some(columns.as_slice());
            let session = fence.dispatch(OperationKind::TableRows);
            let results = repository
                .get_db_table_rows(session, Some(&object), columns, &request)
                .await;
            print_current(&fence, OperationKind::TableRows, results)
        }
        Command::Count { object, filter } => {
            let object = parse_object(object).map_err(DbError::invalid_input)?;
            let session = fence.dispatch(OperationKind::RowCount);
            let results = repository
                .get_db_table_row_count(session, Some(&object), filter)
                .await;
            print_current(&fence, OperationKind::RowCount, results)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!("Starting SQL Data Inspector v{}", env!("CARGO_PKG_VERSION"));

    let repository = DbRepository::connect(
        config.provider.as_deref(),
        &config.connection,
        config.repository_options(),
    )
    .await?;

    let result = run(&repository, &config.command).await;
    repository.close().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        return Err(e.into());
    }
    Ok(())
}
