//! Dialect-specific SQL text.
//!
//! Each supported engine gets one `SqlBuilder` implementation. Builders are
//! pure: they turn request parameters into SQL text and catalog records into
//! models, and never touch the network. Shared shapes (histograms, row pages,
//! counts) live in the trait's default methods; dialects override only the
//! pieces whose syntax differs.
//!
//! Filter fragments are embedded verbatim. Callers must screen them with
//! `guard::check_filter` first.

pub mod mssql;
pub mod mysql;
pub mod normalize;
pub mod postgres;

use crate::db::{Record, RecordExt};
use crate::models::{
    ColumnSort, DatabaseColumn, DatabaseColumnValue, DatabaseObject, DatabaseObjectType,
    HistogramOrder, OrderTerm, PageWindow, Provider,
};

pub use mssql::MssqlBuilder;
pub use mysql::MySqlBuilder;
pub use normalize::{NativeType, is_unbounded, normalize};
pub use postgres::PostgresBuilder;

/// Engine policy for the default column-listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOrderPolicy {
    pub primary_key_first: bool,
    pub alphabetical: bool,
}

impl Default for ColumnOrderPolicy {
    fn default() -> Self {
        Self {
            primary_key_first: true,
            alphabetical: false,
        }
    }
}

impl ColumnOrderPolicy {
    /// `ORDER BY` expression over the column listing's output names
    /// (`name`, `is_primary_key`, `column_id`).
    pub fn order_expression(&self, sort: ColumnSort) -> String {
        match sort {
            ColumnSort::Ascending => "name".to_string(),
            ColumnSort::Descending => "name DESC".to_string(),
            ColumnSort::Default => {
                let tail = if self.alphabetical { "name" } else { "column_id" };
                if self.primary_key_first {
                    format!("is_primary_key DESC, {}", tail)
                } else {
                    tail.to_string()
                }
            }
        }
    }
}

/// SQL text generation for one dialect.
pub trait SqlBuilder: Send + Sync {
    fn provider(&self) -> Provider;

    /// Opening and closing identifier quote.
    fn name_enclosers(&self) -> (&'static str, &'static str);

    /// Quote an identifier, doubling any closing quote inside it.
    fn quote_ident(&self, name: &str) -> String {
        let (start, end) = self.name_enclosers();
        format!("{}{}{}", start, name.replace(end, &end.repeat(2)), end)
    }

    /// `schema.name`, quoted.
    fn table_ref(&self, object: &DatabaseObject) -> String {
        if object.schema.is_empty() {
            self.quote_ident(&object.name)
        } else {
            format!(
                "{}.{}",
                self.quote_ident(&object.schema),
                self.quote_ident(&object.name)
            )
        }
    }

    /// Query returning one row with a `version` column.
    fn version_sql(&self) -> &'static str;

    /// Extract the display version from the server's version banner.
    fn parse_version(&self, banner: &str) -> String;

    /// Object listing, or `None` when neither tables nor views are wanted.
    fn objects_sql(&self, include_tables: bool, include_views: bool) -> Option<String>;

    /// Column listing for one object, in the requested order.
    fn columns_sql(
        &self,
        object: &DatabaseObject,
        sort: ColumnSort,
        policy: ColumnOrderPolicy,
    ) -> String;

    /// Build a column from one row of `columns_sql`.
    fn column_from_record(&self, record: &Record) -> Option<DatabaseColumn>;

    /// Whether a column is histogrammed as NULL / NOT NULL only.
    fn is_unbounded(&self, column: &DatabaseColumn) -> bool {
        is_unbounded(self.provider(), &column.base_type())
    }

    /// Select-list entry for one column. Spatial types are converted to text.
    fn project_column(&self, column: &DatabaseColumn) -> String {
        self.quote_ident(&column.name)
    }

    /// Assemble a row page.
    ///
    /// With an empty `order_by` this is a plain first-`limit`-rows cap and
    /// the offset is ignored.
    fn paginate(&self, projection: &str, source: &str, order_by: &str, window: PageWindow)
    -> String;

    /// Value histogram for one column.
    fn values_sql(
        &self,
        object: &DatabaseObject,
        column: &DatabaseColumn,
        filter: &str,
        order: HistogramOrder,
    ) -> String {
        let table = self.table_ref(object);
        let col = self.quote_ident(&column.name);

        if self.is_unbounded(column) {
            let and_filter = if filter.trim().is_empty() {
                String::new()
            } else {
                format!(" AND ({})", filter)
            };
            return format!(
                "SELECT '{null}' AS value, COUNT(*) AS count\nFROM {table}\nWHERE {col} IS NULL{and_filter}\n\
                 UNION ALL\n\
                 SELECT '{not_null}' AS value, COUNT(*) AS count\nFROM {table}\nWHERE {col} IS NOT NULL{and_filter}",
                null = DatabaseColumnValue::NULL_BUCKET,
                not_null = DatabaseColumnValue::NOT_NULL_BUCKET,
            );
        }

        let order_by = match order {
            HistogramOrder::Value { ascending } => direction(col.clone(), ascending),
            HistogramOrder::Count { ascending } => direction("COUNT(*)".to_string(), ascending),
        };
        format!(
            "SELECT {col} AS value, COUNT(*) AS count\nFROM {table}{where_clause}\nGROUP BY {col}\nORDER BY {order_by}",
            where_clause = where_clause(filter),
        )
    }

    /// One page of rows.
    fn rows_sql(
        &self,
        object: &DatabaseObject,
        columns: Option<&[DatabaseColumn]>,
        filter: &str,
        order: &[OrderTerm],
        window: PageWindow,
    ) -> String {
        let projection = match columns {
            Some(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| self.project_column(c))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };
        let source = format!("{}{}", self.table_ref(object), where_clause(filter));
        let order_by = order
            .iter()
            .map(|term| direction(self.quote_ident(&term.column), term.ascending))
            .collect::<Vec<_>>()
            .join(", ");
        self.paginate(&projection, &source, &order_by, window)
    }

    /// Row count under the same filter as `rows_sql`.
    fn count_sql(&self, object: &DatabaseObject, filter: &str) -> String {
        format!(
            "SELECT COUNT(*) AS count\nFROM {}{}",
            self.table_ref(object),
            where_clause(filter)
        )
    }
}

/// `\nWHERE <filter>`, or nothing for a blank filter.
pub fn where_clause(filter: &str) -> String {
    if filter.trim().is_empty() {
        String::new()
    } else {
        format!("\nWHERE {}", filter)
    }
}

fn direction(expr: String, ascending: bool) -> String {
    if ascending { expr } else { format!("{} DESC", expr) }
}

/// Quote a value as a SQL string literal, doubling embedded single quotes.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Explicit ordering when given, else the primary key in key order.
///
/// With neither, the result is empty and the page degrades to a plain cap.
pub fn effective_order(explicit: Vec<OrderTerm>, columns: Option<&[DatabaseColumn]>) -> Vec<OrderTerm> {
    if !explicit.is_empty() {
        return explicit;
    }
    let mut keys: Vec<&DatabaseColumn> = columns
        .unwrap_or_default()
        .iter()
        .filter(|c| c.is_primary_key)
        .collect();
    keys.sort_by_key(|c| c.key_ordinal);
    keys.into_iter().map(|c| OrderTerm::asc(c.name.clone())).collect()
}

/// Build an object from one row of an objects query
/// (`name`, `schema_name`, `is_view`).
pub fn object_from_record(record: &Record) -> Option<DatabaseObject> {
    let name = record.text("name")?;
    let schema = record.text("schema_name").unwrap_or_default();
    let object_type = if record.flag("is_view") {
        DatabaseObjectType::View
    } else {
        DatabaseObjectType::Table
    };
    Some(DatabaseObject::new(schema, name, object_type))
}

/// Dialect chosen once per repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Mssql(MssqlBuilder),
    MySql(MySqlBuilder),
    Postgres(PostgresBuilder),
}

impl Dialect {
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Mssql => Dialect::Mssql(MssqlBuilder),
            Provider::MySql => Dialect::MySql(MySqlBuilder),
            Provider::Postgres => Dialect::Postgres(PostgresBuilder),
        }
    }

    pub fn builder(&self) -> &dyn SqlBuilder {
        match self {
            Dialect::Mssql(b) => b,
            Dialect::MySql(b) => b,
            Dialect::Postgres(b) => b,
        }
    }
}
