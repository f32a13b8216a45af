//! Repository facade.
//!
//! `DbRepository` is what callers talk to. It picks the dialect once at
//! construction, screens filter text, builds SQL, runs it through the
//! execution gateway and maps records into models.
//!
//! Only construction can fail. Every load operation returns its empty/zero
//! shape when the target is missing, the filter is rejected, or the query
//! fails, and always echoes the caller's session token.

use crate::config::RepositoryOptions;
use crate::db::{DbConnection, QueryExecutor, QueryRunner, RecordExt, display_value};
use crate::dialect::{
    ColumnOrderPolicy, Dialect, SqlBuilder, effective_order, object_from_record,
};
use crate::error::{DbError, DbResult};
use crate::gateway::ExecutionGateway;
use crate::guard::{FilterCheckResult, screen_filter};
use crate::models::{
    ColumnSort, ConnectionConfig, DatabaseColumn, DatabaseColumnValue, DatabaseInfo,
    DatabaseObject, OrderTerm, PageRequest, Provider, QueryResults, RowCount, SessionId, TableRows,
    ValueSort,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Query and introspection facade over one database connection.
#[derive(Debug)]
pub struct DbRepository<R = QueryExecutor> {
    dialect: Dialect,
    gateway: ExecutionGateway<R>,
    options: RepositoryOptions,
    info: OnceCell<DatabaseInfo>,
}

impl DbRepository<QueryExecutor> {
    /// Open a pooled connection and build a repository over it.
    ///
    /// `provider` is the declared identifier (`MSSQL`, `MySQL`, `PGSQL`). When
    /// absent it is inferred from the connection string.
    pub async fn connect(
        provider: Option<&str>,
        connection_string: &str,
        options: RepositoryOptions,
    ) -> DbResult<Self> {
        options.validate().map_err(DbError::invalid_input)?;
        let config = ConnectionConfig::new(
            provider,
            connection_string,
            options.max_connections,
            options.acquire_timeout_secs,
        )?;
        let connection = DbConnection::connect(&config).await?;
        let executor = QueryExecutor::new(
            connection,
            options.query_timeout(),
            options.max_rows as usize,
        );
        Ok(Self::new(executor, options))
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.gateway.runner().close().await;
    }
}

impl<R: QueryRunner> DbRepository<R> {
    /// Build a repository for the runner's provider.
    pub fn new(runner: R, options: RepositoryOptions) -> Self {
        let provider = runner.provider();
        info!(dialect = %provider, "Creating repository");
        Self {
            dialect: Dialect::for_provider(provider),
            gateway: ExecutionGateway::for_runner(runner, &options),
            options,
            info: OnceCell::new(),
        }
    }

    /// Build a repository from a declared provider identifier.
    ///
    /// Fails with `UnsupportedProvider` for an unknown identifier, and with
    /// `InvalidInput` when the identifier names a different dialect than the
    /// runner speaks.
    pub fn from_provider_name(
        provider: &str,
        runner: R,
        options: RepositoryOptions,
    ) -> DbResult<Self> {
        let declared: Provider = provider.parse()?;
        if declared != runner.provider() {
            return Err(DbError::invalid_input(format!(
                "Declared provider {} does not match the {} connection",
                declared,
                runner.provider()
            )));
        }
        Ok(Self::new(runner, options))
    }

    pub fn provider(&self) -> Provider {
        self.builder().provider()
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    pub fn gateway(&self) -> &ExecutionGateway<R> {
        &self.gateway
    }

    fn builder(&self) -> &dyn SqlBuilder {
        self.dialect.builder()
    }

    fn column_policy(&self) -> ColumnOrderPolicy {
        ColumnOrderPolicy {
            primary_key_first: self.options.columns_show_primary_key_first,
            alphabetical: self.options.columns_order_alphabetically,
        }
    }

    /// Whether `filter` may be embedded in SQL. Logs rejections.
    fn filter_accepted(&self, operation: &str, session_id: &SessionId, filter: &str) -> bool {
        match screen_filter(filter) {
            FilterCheckResult::Accepted => true,
            FilterCheckResult::Rejected { position } => {
                warn!(
                    operation,
                    session_id = %session_id,
                    position,
                    "Rejected filter containing an unquoted statement separator"
                );
                false
            }
        }
    }

    /// Provider, identifier quotes and server version.
    ///
    /// The version is fetched once; later calls reuse it. A failed lookup
    /// reports an empty version and is retried on the next call.
    pub async fn get_database_info(&self) -> DatabaseInfo {
        if let Some(info) = self.info.get() {
            return info.clone();
        }

        let builder = self.builder();
        let rows = self.gateway.run(builder.version_sql()).await;
        let version = rows
            .first()
            .and_then(|r| r.text("version"))
            .map(|banner| builder.parse_version(&banner))
            .unwrap_or_default();

        let (start, end) = builder.name_enclosers();
        let info = DatabaseInfo {
            provider: builder.provider(),
            name_encloser_start: start.to_string(),
            name_encloser_end: end.to_string(),
            version,
        };
        if !info.version.is_empty() {
            let _ = self.info.set(info.clone());
        }
        info
    }

    /// Tables and/or views, ordered views-last, then by schema and name.
    pub async fn get_db_objects(
        &self,
        session_id: SessionId,
        include_tables: bool,
        include_views: bool,
    ) -> QueryResults<Vec<DatabaseObject>> {
        let Some(sql) = self.builder().objects_sql(include_tables, include_views) else {
            return QueryResults::empty(session_id);
        };
        debug!(session_id = %session_id, include_tables, include_views, "Loading objects");

        let rows = self.gateway.run(&sql).await;
        let objects = rows.records.iter().filter_map(object_from_record).collect();
        QueryResults::new(session_id, objects)
    }

    /// Columns of one object in the requested order.
    pub async fn get_db_columns(
        &self,
        session_id: SessionId,
        object: Option<&DatabaseObject>,
        sort: ColumnSort,
    ) -> QueryResults<Vec<DatabaseColumn>> {
        let Some(object) = object else {
            return QueryResults::empty(session_id);
        };
        debug!(
            session_id = %session_id,
            object = %object.qualified_name(),
            sort = ?sort,
            "Loading columns"
        );

        let columns = self.load_columns(object, sort).await;
        QueryResults::new(session_id, columns)
    }

    async fn load_columns(
        &self,
        object: &DatabaseObject,
        sort: ColumnSort,
    ) -> Vec<DatabaseColumn> {
        let sql = self.builder().columns_sql(object, sort, self.column_policy());
        let rows = self.gateway.run(&sql).await;
        rows.records
            .iter()
            .filter_map(|r| self.builder().column_from_record(r))
            .collect()
    }

    /// Explicit ordering, else the table's primary key in key order.
    ///
    /// When `columns` carries no key the catalog is consulted, so a caller
    /// that passes no column list still gets stable pages. Empty only for a
    /// table without a primary key.
    async fn page_order(
        &self,
        object: &DatabaseObject,
        columns: Option<&[DatabaseColumn]>,
        request: &PageRequest,
    ) -> Vec<OrderTerm> {
        let order = effective_order(request.order_terms(), columns);
        if !order.is_empty() {
            return order;
        }
        let catalog = self.load_columns(object, ColumnSort::Default).await;
        effective_order(Vec::new(), Some(catalog.as_slice()))
    }

    /// Distinct values of a column with their counts.
    ///
    /// Unbounded types collapse into `[NULL]` and `[NOT NULL]` buckets. A NULL
    /// group of a simple type is reported as `[NULL]` too.
    pub async fn get_db_column_values(
        &self,
        session_id: SessionId,
        object: Option<&DatabaseObject>,
        column: Option<&DatabaseColumn>,
        filter: &str,
        sort: ValueSort,
    ) -> QueryResults<Vec<DatabaseColumnValue>> {
        let (Some(object), Some(column)) = (object, column) else {
            return QueryResults::empty(session_id);
        };
        if !self.filter_accepted("column_values", &session_id, filter) {
            return QueryResults::empty(session_id);
        }
        debug!(
            session_id = %session_id,
            object = %object.qualified_name(),
            column = %column.name,
            "Loading column values"
        );

        let sql = self
            .builder()
            .values_sql(object, column, filter, sort.resolve());
        let rows = self.gateway.run(&sql).await;
        let values = rows
            .records
            .iter()
            .map(|r| {
                let value = r
                    .field("value")
                    .filter(|v| !v.is_null())
                    .map(display_value)
                    .unwrap_or_else(|| DatabaseColumnValue::NULL_BUCKET.to_string());
                DatabaseColumnValue::new(value, r.int("count").unwrap_or(0).max(0) as u64)
            })
            .collect();
        QueryResults::new(session_id, values)
    }

    /// One page of rows plus the total count under the same filter.
    ///
    /// Without explicit ordering the page is ordered by the primary key; a
    /// table without one gets a plain first-N cap.
    pub async fn get_db_table_rows(
        &self,
        session_id: SessionId,
        object: Option<&DatabaseObject>,
        columns: Option<&[DatabaseColumn]>,
        request: &PageRequest,
    ) -> QueryResults<TableRows> {
        let Some(object) = object else {
            return QueryResults::empty(session_id);
        };
        if !self.filter_accepted("table_rows", &session_id, &request.filter) {
            return QueryResults::empty(session_id);
        }

        let window = request.window(self.options.default_page_size);
        let order = self.page_order(object, columns, request).await;
        debug!(
            session_id = %session_id,
            object = %object.qualified_name(),
            offset = window.offset,
            limit = window.limit,
            ordered = !order.is_empty(),
            "Loading table rows"
        );

        let builder = self.builder();
        let rows_sql = builder.rows_sql(object, columns, &request.filter, &order, window);
        let rows = self.gateway.run(&rows_sql).await;
        let count = self.run_count(object, &request.filter).await;

        let header = if rows.columns.is_empty() {
            columns
                .unwrap_or_default()
                .iter()
                .map(|c| c.name.clone())
                .collect()
        } else {
            rows.columns
        };
        QueryResults::new(
            session_id,
            TableRows {
                columns: header,
                rows: rows.records,
                count,
            },
        )
    }

    /// Number of rows matching `filter`.
    pub async fn get_db_table_row_count(
        &self,
        session_id: SessionId,
        object: Option<&DatabaseObject>,
        filter: &str,
    ) -> QueryResults<RowCount> {
        let Some(object) = object else {
            return QueryResults::empty(session_id);
        };
        if !self.filter_accepted("row_count", &session_id, filter) {
            return QueryResults::empty(session_id);
        }
        debug!(
            session_id = %session_id,
            object = %object.qualified_name(),
            "Counting rows"
        );

        let count = self.run_count(object, filter).await;
        QueryResults::new(session_id, RowCount { count })
    }

    async fn run_count(&self, object: &DatabaseObject, filter: &str) -> u64 {
        let sql = self.builder().count_sql(object, filter);
        self.gateway
            .run(&sql)
            .await
            .first()
            .and_then(|r| r.int("count"))
            .unwrap_or(0)
            .max(0) as u64
    }
}
