//! MySQL / MariaDB catalog queries and paging.

use super::{ColumnOrderPolicy, SqlBuilder};
use crate::db::{Record, RecordExt};
use crate::dialect::normalize::{NativeType, normalize};
use crate::models::{ColumnSort, DatabaseColumn, DatabaseObject, PageWindow, Provider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySqlBuilder;

/// MySQL string literal. Backslash is an escape character unless
/// `NO_BACKSLASH_ESCAPES` is set, so it is doubled too.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn object_source(is_view: bool) -> String {
    format!(
        "SELECT\n    CONVERT(TABLE_NAME USING utf8mb4) AS name,\n    \
         CONVERT(TABLE_SCHEMA USING utf8mb4) AS schema_name,\n    \
         {flag} AS is_view\n\
         FROM information_schema.TABLES\n\
         WHERE TABLE_SCHEMA = DATABASE()\n    AND TABLE_TYPE = '{kind}'",
        flag = u8::from(is_view),
        kind = if is_view { "VIEW" } else { "BASE TABLE" },
    )
}

impl SqlBuilder for MySqlBuilder {
    fn provider(&self) -> Provider {
        Provider::MySql
    }

    fn name_enclosers(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn version_sql(&self) -> &'static str {
        "SELECT VERSION() AS version"
    }

    fn parse_version(&self, banner: &str) -> String {
        banner.trim().to_string()
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
    CONVERT(c.COLUMN_NAME USING utf8mb4) AS name,
    CONVERT(c.COLUMN_TYPE USING utf8mb4) AS column_type,
    CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS is_nullable,
    CASE WHEN pk.ORDINAL_POSITION IS NULL THEN 0 ELSE 1 END AS is_primary_key,
    COALESCE(pk.ORDINAL_POSITION, 0) AS key_ordinal,
    CASE WHEN EXISTS (
        SELECT 1
        FROM information_schema.KEY_COLUMN_USAGE fk
        WHERE fk.TABLE_SCHEMA = c.TABLE_SCHEMA
            AND fk.TABLE_NAME = c.TABLE_NAME
            AND fk.COLUMN_NAME = c.COLUMN_NAME
            AND fk.REFERENCED_TABLE_NAME IS NOT NULL
    ) THEN 1 ELSE 0 END AS has_foreign_key,
    c.ORDINAL_POSITION AS column_id
FROM information_schema.COLUMNS c
    LEFT JOIN information_schema.KEY_COLUMN_USAGE pk
        ON pk.TABLE_SCHEMA = c.TABLE_SCHEMA
        AND pk.TABLE_NAME = c.TABLE_NAME
        AND pk.COLUMN_NAME = c.COLUMN_NAME
        AND pk.CONSTRAINT_NAME = 'PRIMARY'
WHERE c.TABLE_SCHEMA = {schema}
    AND c.TABLE_NAME = {name}
ORDER BY {order}"#,
            schema = literal(&object.schema),
            name = literal(&object.name),
            order = policy.order_expression(sort),
        )
    }

    fn column_from_record(&self, record: &Record) -> Option<DatabaseColumn> {
        let name = record.text("name")?;
        let column_type = record.text("column_type").unwrap_or_default();
        let native = NativeType::from_mysql_column_type(&column_type, record.flag("is_nullable"));

        Some(DatabaseColumn {
            name,
            type_name: normalize(Provider::MySql, &native),
            is_primary_key: record.flag("is_primary_key"),
            key_ordinal: record.int("key_ordinal").unwrap_or(0).max(0) as u32,
            has_foreign_key: record.flag("has_foreign_key"),
        })
    }

    fn project_column(&self, column: &DatabaseColumn) -> String {
        let quoted = self.quote_ident(&column.name);
        match column.base_type().as_str() {
            "geometry" | "point" | "linestring" | "polygon" | "multipoint"
            | "multilinestring" | "multipolygon" | "geometrycollection" => {
                format!("ST_AsText({}) AS {}", quoted, quoted)
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistogramOrder, OrderTerm};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(literal("it's"), "'it''s'");
        assert_eq!(literal(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_version_is_reported_as_is() {
        assert_eq!(MySqlBuilder.parse_version("8.0.36-0ubuntu0.22.04.1 "), "8.0.36-0ubuntu0.22.04.1");
    }

    #[test]
    fn test_objects_sql() {
        let b = MySqlBuilder;
        assert!(b.objects_sql(false, false).is_none());

        let views = b.objects_sql(false, true).unwrap();
        assert!(views.contains("TABLE_TYPE = 'VIEW'"));
        assert!(!views.contains("BASE TABLE"));
        assert!(views.contains("1 AS is_view"));

        let both = b.objects_sql(true, true).unwrap();
        assert!(both.contains("TABLE_TYPE = 'BASE TABLE'"));
        assert!(both.contains("UNION ALL"));
        assert!(both.ends_with("ORDER BY is_view, schema_name, name"));
    }

    #[test]
    fn test_columns_sql() {
        let sql = MySqlBuilder.columns_sql(
            &DatabaseObject::table("shop", "orders"),
            ColumnSort::Descending,
            ColumnOrderPolicy::default(),
        );
        assert!(sql.contains("c.TABLE_SCHEMA = 'shop'"));
        assert!(sql.contains("c.TABLE_NAME = 'orders'"));
        assert!(sql.contains("CONSTRAINT_NAME = 'PRIMARY'"));
        assert!(sql.ends_with("ORDER BY name DESC"));
    }

    #[test]
    fn test_column_from_record() {
        let col = MySqlBuilder
            .column_from_record(&record(json!({
                "name": "price",
                "column_type": "decimal(10,2) unsigned",
                "is_nullable": 1,
                "is_primary_key": 0,
                "key_ordinal": 0,
                "has_foreign_key": 0
            })))
            .unwrap();
        assert_eq!(col.type_name, "decimal unsigned ? (10,2)");

        let id = MySqlBuilder
            .column_from_record(&record(json!({
                "name": "id",
                "column_type": "int",
                "is_nullable": 0,
                "is_primary_key": 1,
                "key_ordinal": 1,
                "has_foreign_key": 0
            })))
            .unwrap();
        assert_eq!(id.type_name, "int");
        assert!(id.is_primary_key);
    }

    #[test]
    fn test_rows_sql_modes() {
        let b = MySqlBuilder;
        let object = DatabaseObject::table("shop", "orders");
        let window = PageWindow {
            offset: 40,
            limit: 20,
        };
        assert_eq!(
            b.rows_sql(&object, None, "", &[], window),
            "SELECT *\nFROM `shop`.`orders`\nLIMIT 20"
        );
        assert_eq!(
            b.rows_sql(&object, None, "", &[OrderTerm::desc("id")], window),
            "SELECT *\nFROM `shop`.`orders`\nORDER BY `id` DESC\nLIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn test_spatial_projection_and_histogram() {
        let b = MySqlBuilder;
        let shape = DatabaseColumn::new("shape", "polygon ?");
        assert_eq!(b.project_column(&shape), "ST_AsText(`shape`) AS `shape`");

        let sql = b.values_sql(
            &DatabaseObject::table("geo", "areas"),
            &shape,
            "",
            HistogramOrder::Value { ascending: true },
        );
        assert!(sql.contains("'[NOT NULL]'"));

        let blob = DatabaseColumn::new("data", "mediumblob");
        assert!(b.is_unbounded(&blob));
        assert!(!b.is_unbounded(&DatabaseColumn::new("n", "int unsigned")));
    }
}
