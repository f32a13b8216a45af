//! Catalog data models.
//!
//! All entities are plain values with no back-references. Field names serialize
//! in PascalCase so the payloads match what browsing front-ends already consume.

use crate::models::Provider;
use serde::{Deserialize, Serialize};

/// Kind of queryable relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseObjectType {
    Table,
    View,
}

/// One queryable relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseObject {
    pub name: String,
    pub schema: String,
    pub object_type: DatabaseObjectType,
    /// Populated lazily once a row-count query resolves for this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
}

impl DatabaseObject {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        object_type: DatabaseObjectType,
    ) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            object_type,
            count: None,
        }
    }

    pub fn table(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(schema, name, DatabaseObjectType::Table)
    }

    pub fn view(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(schema, name, DatabaseObjectType::View)
    }

    pub fn is_view(&self) -> bool {
        self.object_type == DatabaseObjectType::View
    }

    /// Record the resolved row count on this object.
    pub fn set_count(&mut self, count: u64) {
        self.count = Some(count.to_string());
    }

    /// `schema.name`, unquoted. Used for logging.
    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}

/// One column of a relation, with its type in canonical display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseColumn {
    pub name: String,
    /// Canonical display string, e.g. `nvarchar ? (50)` or `Phone:varchar (20)`.
    #[serde(rename = "Type")]
    pub type_name: String,
    pub is_primary_key: bool,
    /// 1-based position within the primary key, 0 when not a key member.
    pub key_ordinal: u32,
    pub has_foreign_key: bool,
}

impl DatabaseColumn {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_primary_key: false,
            key_ordinal: 0,
            has_foreign_key: false,
        }
    }

    /// Mark this column as the `ordinal`-th member of the primary key.
    pub fn primary_key(mut self, ordinal: u32) -> Self {
        self.is_primary_key = true;
        self.key_ordinal = ordinal;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.has_foreign_key = true;
        self
    }

    /// The type name without alias, nullability marker or size suffix.
    ///
    /// `Phone:varchar ? (20)` yields `varchar`, `geography ?` yields `geography`.
    pub fn base_type(&self) -> String {
        let first = self.type_name.split_whitespace().next().unwrap_or_default();
        let base = match first.split_once(':') {
            Some((_, system)) => system,
            None => first,
        };
        base.to_lowercase()
    }
}

/// One distinct value of a column and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseColumnValue {
    pub value: String,
    pub count: u64,
}

impl DatabaseColumnValue {
    pub const NULL_BUCKET: &'static str = "[NULL]";
    pub const NOT_NULL_BUCKET: &'static str = "[NOT NULL]";

    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Per-connection facts, computed once and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseInfo {
    pub provider: Provider,
    pub name_encloser_start: String,
    pub name_encloser_end: String,
    /// Parsed engine version, empty when the server did not report one we recognize.
    pub version: String,
}
