//! SQL Server catalog queries and paging.

use super::{ColumnOrderPolicy, SqlBuilder, string_literal};
use crate::db::{Record, RecordExt};
use crate::dialect::normalize::{NativeType, normalize};
use crate::models::{ColumnSort, DatabaseColumn, DatabaseObject, PageWindow, Provider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MssqlBuilder;

const TABLES_SOURCE: &str =
    "SELECT object_id, schema_id, name, is_ms_shipped, 0 AS is_view FROM sys.tables";
const VIEWS_SOURCE: &str =
    "SELECT object_id, schema_id, name, is_ms_shipped, 1 AS is_view FROM sys.views";

impl SqlBuilder for MssqlBuilder {
    fn provider(&self) -> Provider {
        Provider::Mssql
    }

    fn name_enclosers(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn version_sql(&self) -> &'static str {
        "SELECT @@VERSION AS version"
    }

    fn parse_version(&self, banner: &str) -> String {
        first_version_token(banner).unwrap_or_default().to_string()
    }

    fn objects_sql(&self, include_tables: bool, include_views: bool) -> Option<String> {
        let sources: Vec<&str> = [(include_tables, TABLES_SOURCE), (include_views, VIEWS_SOURCE)]
            .into_iter()
            .filter_map(|(wanted, source)| wanted.then_some(source))
            .collect();
        if sources.is_empty() {
            return None;
        }

        // Shipped objects and designer support tables (sysdiagrams) are hidden.
        Some(format!(
            r#"SELECT
    name,
    SCHEMA_NAME(schema_id) AS schema_name,
    is_view
FROM (
    SELECT
        tbl.*,
        CAST(
            CASE
                WHEN tbl.is_ms_shipped = 1 THEN 1
                WHEN EXISTS (
                    SELECT 1
                    FROM sys.extended_properties ep
                    WHERE ep.major_id = tbl.object_id
                        AND ep.minor_id = 0
                        AND ep.class = 1
                        AND ep.name = N'microsoft_database_tools_support'
                ) THEN 1
                ELSE 0
            END
        AS bit) AS is_system_object
    FROM ({}) AS tbl
) v
WHERE v.is_system_object = 0
ORDER BY is_view, schema_name, name"#,
            sources.join("\n    UNION ALL\n    ")
        ))
    }

    fn columns_sql(
        &self,
        object: &DatabaseObject,
        sort: ColumnSort,
        policy: ColumnOrderPolicy,
    ) -> String {
        format!(
            r#"SELECT DISTINCT
    c.name AS name,
    ut.name AS type_name,
    st.name AS system_type_name,
    c.is_nullable AS is_nullable,
    c.max_length AS max_length,
    c.[precision] AS [precision],
    c.scale AS scale,
    ISNULL(i.is_primary_key, 0) AS is_primary_key,
    ISNULL(i.key_ordinal, 0) AS key_ordinal,
    CASE WHEN fk.parent_column_id IS NOT NULL THEN 1 ELSE 0 END AS has_foreign_key,
    c.column_id AS column_id
FROM sys.columns c
    INNER JOIN sys.objects o ON c.object_id = o.object_id
    INNER JOIN sys.types ut ON c.user_type_id = ut.user_type_id
    LEFT OUTER JOIN sys.types st ON ut.system_type_id = st.user_type_id
    LEFT OUTER JOIN (
        SELECT ic.column_id, ix.object_id, ix.is_primary_key, ic.key_ordinal
        FROM sys.indexes ix
            INNER JOIN sys.index_columns ic
                ON ic.index_id = ix.index_id
                AND ic.object_id = ix.object_id
        WHERE ix.is_primary_key = 1
    ) i ON c.column_id = i.column_id AND c.object_id = i.object_id
    LEFT OUTER JOIN sys.foreign_key_columns fk
        ON c.object_id = fk.parent_object_id
        AND c.column_id = fk.parent_column_id
WHERE o.name = N{name}
    AND SCHEMA_NAME(o.schema_id) = N{schema}
ORDER BY {order}"#,
            name = string_literal(&object.name),
            schema = string_literal(&object.schema),
            order = policy.order_expression(sort),
        )
    }

    fn column_from_record(&self, record: &Record) -> Option<DatabaseColumn> {
        let name = record.text("name")?;
        let mut native = NativeType::new(record.text("type_name").unwrap_or_default())
            .nullable(record.flag("is_nullable"));
        native.system_name = record.text("system_type_name");
        native.max_length = record.int("max_length");
        native.precision = record.int("precision");
        native.scale = record.int("scale");

        Some(DatabaseColumn {
            name,
            type_name: normalize(Provider::Mssql, &native),
            is_primary_key: record.flag("is_primary_key"),
            key_ordinal: record.int("key_ordinal").unwrap_or(0).max(0) as u32,
            has_foreign_key: record.flag("has_foreign_key"),
        })
    }

    fn project_column(&self, column: &DatabaseColumn) -> String {
        let quoted = self.quote_ident(&column.name);
        match column.base_type().as_str() {
            "geography" | "geometry" => {
                format!("CONVERT(varchar(max), {}.ToString()) AS {}", quoted, quoted)
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
            format!("SELECT TOP({}) {}\nFROM {}", window.limit, projection, source)
        } else {
            format!(
                "SELECT {}\nFROM {}\nORDER BY {}\nOFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                projection, source, order_by, window.offset, window.limit
            )
        }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// First standalone dotted number with at most four parts, e.g. `2019` or `15.0.4322.2`.
fn first_version_token(banner: &str) -> Option<&str> {
    let bytes = banner.as_bytes();
    let at_boundary = |pos: usize| pos == bytes.len() || !is_word_byte(bytes[pos]);
    let digits_end = |mut pos: usize| {
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        pos
    };

    for start in 0..bytes.len() {
        if !bytes[start].is_ascii_digit() || (start > 0 && is_word_byte(bytes[start - 1])) {
            continue;
        }
        let mut ends = vec![digits_end(start)];
        while ends.len() < 4 {
            let last = ends[ends.len() - 1];
            if last + 1 < bytes.len() && bytes[last] == b'.' && bytes[last + 1].is_ascii_digit() {
                ends.push(digits_end(last + 1));
            } else {
                break;
            }
        }
        if let Some(end) = ends.into_iter().rev().find(|&end| at_boundary(end)) {
            return Some(&banner[start..end]);
        }
    }
    None
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
    fn test_parse_version() {
        let b = MssqlBuilder;
        assert_eq!(
            b.parse_version("Microsoft SQL Server 2019 (RTM-CU22) (KB5027702) - 15.0.4322.2 (X64)"),
            "2019"
        );
        assert_eq!(b.parse_version("Version 16.0.1000.6 on Linux"), "16.0.1000.6");
        assert_eq!(b.parse_version("v1.2.3.4.5"), "2.3.4.5");
        assert_eq!(b.parse_version("build 1.2.3.4.5"), "1.2.3.4");
        assert_eq!(b.parse_version("release 12.5a"), "12");
        assert_eq!(b.parse_version("no digits"), "");
    }

    #[test]
    fn test_objects_sql_sources() {
        let b = MssqlBuilder;
        assert!(b.objects_sql(false, false).is_none());

        let both = b.objects_sql(true, true).unwrap();
        assert!(both.contains("FROM sys.tables"));
        assert!(both.contains("FROM sys.views"));
        assert!(both.contains("UNION ALL"));
        assert!(both.ends_with("ORDER BY is_view, schema_name, name"));

        let tables = b.objects_sql(true, false).unwrap();
        assert!(tables.contains("FROM sys.tables"));
        assert!(!tables.contains("sys.views"));
    }

    #[test]
    fn test_columns_sql_escapes_names() {
        let b = MssqlBuilder;
        let sql = b.columns_sql(
            &DatabaseObject::table("dbo", "O'Hara"),
            ColumnSort::Default,
            ColumnOrderPolicy::default(),
        );
        assert!(sql.contains("o.name = N'O''Hara'"));
        assert!(sql.contains("SCHEMA_NAME(o.schema_id) = N'dbo'"));
        assert!(sql.ends_with("ORDER BY is_primary_key DESC, column_id"));
    }

    #[test]
    fn test_column_from_record() {
        let b = MssqlBuilder;
        let col = b
            .column_from_record(&record(json!({
                "name": "Name",
                "type_name": "nvarchar",
                "system_type_name": "nvarchar",
                "is_nullable": true,
                "max_length": 100,
                "precision": 0,
                "scale": 0,
                "is_primary_key": false,
                "key_ordinal": 0,
                "has_foreign_key": 0,
                "column_id": 2
            })))
            .unwrap();
        assert_eq!(col.type_name, "nvarchar ? (50)");
        assert!(!col.is_primary_key);

        let alias = b
            .column_from_record(&record(json!({
                "name": "Phone",
                "type_name": "Phone",
                "system_type_name": "varchar",
                "is_nullable": false,
                "max_length": 20,
                "is_primary_key": true,
                "key_ordinal": 1,
                "has_foreign_key": 1
            })))
            .unwrap();
        assert_eq!(alias.type_name, "Phone:varchar (20)");
        assert!(alias.is_primary_key);
        assert_eq!(alias.key_ordinal, 1);
        assert!(alias.has_foreign_key);
    }

    #[test]
    fn test_rows_sql_modes() {
        let b = MssqlBuilder;
        let object = DatabaseObject::table("dbo", "Users");
        let window = PageWindow {
            offset: 40,
            limit: 20,
        };

        let capped = b.rows_sql(&object, None, "", &[], window);
        assert_eq!(capped, "SELECT TOP(20) *\nFROM [dbo].[Users]");

        let ordered = b.rows_sql(
            &object,
            None,
            "Age > 30",
            &[OrderTerm::asc("Id"), OrderTerm::desc("Name")],
            window,
        );
        assert_eq!(
            ordered,
            "SELECT *\nFROM [dbo].[Users]\nWHERE Age > 30\nORDER BY [Id], [Name] DESC\nOFFSET 40 ROWS FETCH NEXT 20 ROWS ONLY"
        );
    }

    #[test]
    fn test_spatial_projection() {
        let b = MssqlBuilder;
        let columns = vec![
            DatabaseColumn::new("Id", "int"),
            DatabaseColumn::new("Location", "geography ?"),
        ];
        let sql = b.rows_sql(
            &DatabaseObject::table("dbo", "Places"),
            Some(&columns),
            "",
            &[],
            PageWindow {
                offset: 0,
                limit: 5,
            },
        );
        assert!(sql.starts_with(
            "SELECT TOP(5) [Id], CONVERT(varchar(max), [Location].ToString()) AS [Location]"
        ));
    }

    #[test]
    fn test_unbounded_histogram() {
        let b = MssqlBuilder;
        let sql = b.values_sql(
            &DatabaseObject::table("dbo", "Docs"),
            &DatabaseColumn::new("Body", "nvarchar ? (max)"),
            "",
            HistogramOrder::Value { ascending: true },
        );
        assert!(sql.contains("GROUP BY [Body]"));

        let sql = b.values_sql(
            &DatabaseObject::table("dbo", "Docs"),
            &DatabaseColumn::new("Payload", "varbinary ? (max)"),
            "",
            HistogramOrder::Value { ascending: true },
        );
        assert!(sql.contains("WHERE [Payload] IS NULL\nUNION ALL"));
    }
}
