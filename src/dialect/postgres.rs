//! PostgreSQL catalog queries and paging.

use super::{ColumnOrderPolicy, SqlBuilder, string_literal};
use crate::db::{Record, RecordExt};
use crate::dialect::normalize::{NativeType, normalize};
use crate::models::{ColumnSort, DatabaseColumn, DatabaseObject, PageWindow, Provider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresBuilder;

fn object_source(is_view: bool) -> String {
    format!(
        "SELECT\n    CAST(table_name AS TEXT) AS name,\n    \
         CAST(table_schema AS TEXT) AS schema_name,\n    \
         {flag} AS is_view\n\
         FROM information_schema.tables\n\
         WHERE table_catalog = current_database()\n    \
         AND table_schema NOT IN ('information_schema', 'pg_catalog', 'pg_toast')\n    \
         AND table_type = '{kind}'",
        flag = u8::from(is_view),
        kind = if is_view { "VIEW" } else { "BASE TABLE" },
    )
}

/// `major.minor` following `PostgreSQL ` in a `version()` banner.
fn major_minor(banner: &str) -> Option<&str> {
    const MARKER: &str = "PostgreSQL ";
    banner.match_indices(MARKER).find_map(|(pos, _)| {
        let rest = &banner[pos + MARKER.len()..];
        let major = rest.bytes().take_while(u8::is_ascii_digit).count();
        if major == 0 || rest.as_bytes().get(major) != Some(&b'.') {
            return None;
        }
        let minor = rest[major + 1..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        (minor > 0).then(|| &rest[..major + 1 + minor])
    })
}

impl SqlBuilder for PostgresBuilder {
    fn provider(&self) -> Provider {
        Provider::Postgres
    }

    fn name_enclosers(&self) -> (&'static str, &'static str) {
        ("\"", "\"")
    }

    fn version_sql(&self) -> &'static str {
        "SELECT version() AS version"
    }

    fn parse_version(&self, banner: &str) -> String {
        major_minor(banner).unwrap_or_default().to_string()
    }

    fn objects_sql(&self, include_tables: bool, include_views: bool) -> Option<String> {
        let mut sources = Vec::new();
        if include_tables {
            sources.push(object_source(false));
        }
        if include_views {
            sources.push(object_source(true));
        }
        if sources.is_empty() {
            return None;
        }
        Some(format!(
            "{}\nORDER BY is_view, schema_name, name",
            sources.join("\nUNION ALL\n")
        ))
    }

    fn columns_sql(
        &self,
        object: &DatabaseObject,
        sort: ColumnSort,
        policy: ColumnOrderPolicy,
    ) -> String {
        format!(
            r#"SELECT
    CAST(c.column_name AS TEXT) AS name,
    CAST(c.udt_name AS TEXT) AS type_name,
    CAST(c.is_nullable AS TEXT) AS is_nullable,
    CAST(c.character_maximum_length AS INTEGER) AS max_length,
    CAST(c.numeric_precision AS INTEGER) AS numeric_precision,
    CAST(c.numeric_scale AS INTEGER) AS numeric_scale,
    CASE WHEN pk.ordinal_position IS NULL THEN 0 ELSE 1 END AS is_primary_key,
    CAST(COALESCE(pk.ordinal_position, 0) AS INTEGER) AS key_ordinal,
    CASE WHEN EXISTS (
        SELECT 1
        FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_schema = tc.constraint_schema
                AND kcu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'FOREIGN KEY'
            AND kcu.table_schema = c.table_schema
            AND kcu.table_name = c.table_name
            AND kcu.column_name = c.column_name
    ) THEN 1 ELSE 0 END AS has_foreign_key,
    CAST(c.ordinal_position AS INTEGER) AS column_id
FROM information_schema.columns c
    LEFT JOIN (
        SELECT kcu.table_schema, kcu.table_name, kcu.column_name, kcu.ordinal_position
        FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_schema = tc.constraint_schema
                AND kcu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
    ) pk
        ON pk.table_schema = c.table_schema
        AND pk.table_name = c.table_name
        AND pk.column_name = c.column_name
WHERE c.table_schema = {schema}
    AND c.table_name = {name}
ORDER BY {order}"#,
            schema = string_literal(&object.schema),
            name = string_literal(&object.name),
            order = policy.order_expression(sort),
        )
    }

    fn column_from_record(&self, record: &Record) -> Option<DatabaseColumn> {
        let name = record.text("name")?;
        let mut native = NativeType::new(record.text("type_name").unwrap_or_default())
            .nullable(record.flag("is_nullable"));
        native.max_length = record.int("max_length");
        native.precision = record.int("numeric_precision");
        native.scale = record.int("numeric_scale");

        Some(DatabaseColumn {
            name,
            type_name: normalize(Provider::Postgres, &native),
            is_primary_key: record.flag("is_primary_key"),
            key_ordinal: record.int("key_ordinal").unwrap_or(0).max(0) as u32,
            has_foreign_key: record.flag("has_foreign_key"),
        })
    }

    fn project_column(&self, column: &DatabaseColumn) -> String {
        let quoted = self.quote_ident(&column.name);
        match column.base_type().as_str() {
            "geometry" | "geography" => format!("ST_AsText({}) AS {}", quoted, quoted),
            _ => quoted,
        }
    }

    fn paginate(
        &self,
        projection: &str,
        source: &str,
        order_by: &str,
        window: PageWindow,
    ) -> String {
        if order_by.is_empty() {
            format!("SELECT {}\nFROM {}\nLIMIT {}", projection, source, window.limit)
        } else {
            format!(
                "SELECT {}\nFROM {}\nORDER BY {}\nLIMIT {} OFFSET {}",
                projection, source, order_by, window.limit, window.offset
            )
        }
    }
}
