//! Canonical type display strings.
//!
//! Catalog queries report raw type facts; this module formats them into one
//! display form shared by every dialect:
//!
//! ```text
//! <base-name>[:<system-alias>][ ?][ (size|precision,scale)]
//! ```
//!
//! The alias part only appears for SQL Server user-defined alias types. The
//! size suffix only appears for variable-length, fixed-precision and
//! fractional-second types.

use crate::models::Provider;

/// Raw type facts for one column as reported by a catalog query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeType {
    /// Declared type name (SQL Server user type, PostgreSQL udt name, MySQL data type
    /// plus modifiers such as `unsigned`)
    pub name: String,
    /// Underlying system type, SQL Server only
    pub system_name: Option<String>,
    pub nullable: bool,
    /// Length in bytes (SQL Server) or characters; -1 means unbounded
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
}

impl NativeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn system(mut self, system_name: impl Into<String>) -> Self {
        self.system_name = Some(system_name.into());
        self
    }

    pub fn length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn precision(mut self, precision: i64, scale: i64) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn scale(mut self, scale: i64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Parse a MySQL `COLUMN_TYPE` such as `decimal(10,2) unsigned` or `varchar(50)`.
    ///
    /// Enum and set member lists are dropped.
    pub fn from_mysql_column_type(column_type: &str, nullable: bool) -> Self {
        let column_type = column_type.trim().to_lowercase();
        let (base, args, modifiers) = match (column_type.find('('), column_type.rfind(')')) {
            (Some(open), Some(close)) if open < close => (
                column_type[..open].trim().to_string(),
                column_type[open + 1..close].to_string(),
                column_type[close + 1..].trim().to_string(),
            ),
            _ => {
                let mut parts = column_type.splitn(2, char::is_whitespace);
                let base = parts.next().unwrap_or_default().to_string();
                let modifiers = parts.next().unwrap_or_default().trim().to_string();
                (base, String::new(), modifiers)
            }
        };
        let numbers: Vec<i64> = args
            .split(',')
            .filter_map(|a| a.trim().parse().ok())
            .collect();

        let name = if modifiers.is_empty() {
            base.clone()
        } else {
            format!("{} {}", base, modifiers)
        };
        let mut native = NativeType::new(name).nullable(nullable);
        match family(Provider::MySql, &base) {
            SizeFamily::Length => native.max_length = numbers.first().copied(),
            SizeFamily::Precision => {
                native.precision = numbers.first().copied();
                native.scale = numbers.get(1).copied().or(Some(0));
            }
            SizeFamily::FractionalSeconds => native.scale = numbers.first().copied(),
            SizeFamily::WideLength | SizeFamily::None => {}
        }
        native
    }
}

/// Which size suffix a type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeFamily {
    /// Character or byte length
    Length,
    /// SQL Server UTF-16 types, whose catalog length is in bytes
    WideLength,
    Precision,
    FractionalSeconds,
    None,
}

fn family(provider: Provider, base: &str) -> SizeFamily {
    let base = base.to_lowercase();
    match provider {
        Provider::Mssql => match base.as_str() {
            "varchar" | "char" | "varbinary" | "binary" | "text" => SizeFamily::Length,
            "nvarchar" | "nchar" | "ntext" => SizeFamily::WideLength,
            "datetime2" | "time" | "datetimeoffset" => SizeFamily::FractionalSeconds,
            "decimal" | "numeric" => SizeFamily::Precision,
            _ => SizeFamily::None,
        },
        Provider::MySql => match base.as_str() {
            "varchar" | "char" | "varbinary" | "binary" => SizeFamily::Length,
            "decimal" | "numeric" => SizeFamily::Precision,
            "datetime" | "time" | "timestamp" => SizeFamily::FractionalSeconds,
            _ => SizeFamily::None,
        },
        Provider::Postgres => match base.as_str() {
            "varchar" | "bpchar" | "char" | "bit" | "varbit" => SizeFamily::Length,
            "numeric" | "decimal" => SizeFamily::Precision,
            _ => SizeFamily::None,
        },
    }
}

fn size_suffix(provider: Provider, native: &NativeType) -> Option<String> {
    let family_name = native.system_name.as_deref().unwrap_or(&native.name);
    let base = family_name.split_whitespace().next().unwrap_or_default();
    match family(provider, base) {
        SizeFamily::Length => native.max_length.map(|len| match len {
            -1 => "max".to_string(),
            n => n.to_string(),
        }),
        SizeFamily::WideLength => native.max_length.map(|len| match len {
            -1 => "max".to_string(),
            n => (n / 2).to_string(),
        }),
        SizeFamily::Precision => native
            .precision
            .map(|p| format!("{},{}", p, native.scale.unwrap_or(0))),
        SizeFamily::FractionalSeconds => native.scale.map(|s| s.to_string()),
        SizeFamily::None => None,
    }
}

/// Format raw type facts into the canonical display string.
pub fn normalize(provider: Provider, native: &NativeType) -> String {
    let mut out = native.name.clone();
    if provider == Provider::Mssql {
        if let Some(system) = native.system_name.as_deref() {
            if !system.is_empty() && !system.eq_ignore_ascii_case(&native.name) {
                out.push(':');
                out.push_str(system);
            }
        }
    }
    if native.nullable {
        out.push_str(" ?");
    }
    if let Some(size) = size_suffix(provider, native) {
        out.push_str(" (");
        out.push_str(&size);
        out.push(')');
    }
    out
}

const MSSQL_UNBOUNDED: &[&str] = &[
    "binary", "text", "image", "geography", "geometry", "variant", "xml", "json",
];
const MYSQL_UNBOUNDED: &[&str] = &[
    "binary", "text", "blob", "geometry", "point", "linestring", "polygon", "json",
];
const POSTGRES_UNBOUNDED: &[&str] = &[
    "binary", "text", "image", "bytea", "variant", "xml", "json", "any", "array", "geometry",
    "geography",
];

/// Whether a canonical type is too large or opaque to group by value.
///
/// Matching is by substring on the type name, so `varbinary`, `ntext`,
/// `mediumblob` and `jsonb` all qualify. PostgreSQL array types (`_int4`) do too.
pub fn is_unbounded(provider: Provider, type_name: &str) -> bool {
    let declared = type_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let families = match provider {
        Provider::Mssql => MSSQL_UNBOUNDED,
        Provider::MySql => MYSQL_UNBOUNDED,
        Provider::Postgres => {
            if declared.starts_with('_') {
                return true;
            }
            POSTGRES_UNBOUNDED
        }
    };
    families.iter().any(|f| declared.contains(f))
}
