//! Scripted query runner shared by the integration tests.
//!
//! Each rule pairs a SQL fragment with a canned response. The first rule
//! whose fragment occurs in the issued SQL answers it; unmatched SQL yields an
//! empty row set. Every statement is recorded in issue order.

#![allow(dead_code)]

use serde_json::{Value, json};
use sql_data_inspector::db::{QueryRunner, Record, RowSet};
use sql_data_inspector::error::{DbError, DbResult};
use sql_data_inspector::models::Provider;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(RowSet),
    Fail(String),
}

#[derive(Debug)]
pub struct ScriptedRunner {
    provider: Provider,
    rules: Vec<(String, Reply)>,
    delay: Duration,
    issued: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            rules: Vec::new(),
            delay: Duration::ZERO,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, fragment: &str, rows: RowSet) -> Self {
        self.rules.push((fragment.to_string(), Reply::Rows(rows)));
        self
    }

    pub fn fail_on(mut self, fragment: &str, message: &str) -> Self {
        self.rules
            .push((fragment.to_string(), Reply::Fail(message.to_string())));
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    pub fn issued_matching(&self, fragment: &str) -> usize {
        self.issued().iter().filter(|sql| sql.contains(fragment)).count()
    }
}

impl QueryRunner for ScriptedRunner {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, sql: &str) -> DbResult<RowSet> {
        self.issued.lock().unwrap().push(sql.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.rules.iter().find(|(fragment, _)| sql.contains(fragment.as_str())) {
            Some((_, Reply::Rows(rows))) => Ok(rows.clone()),
            Some((_, Reply::Fail(message))) => {
                Err(DbError::database(message.clone(), None, "Check the query"))
            }
            None => Ok(RowSet::default()),
        }
    }
}

/// Build a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Build a row set from JSON object literals, taking columns from the first.
pub fn rows(values: Vec<Value>) -> RowSet {
    let records: Vec<Record> = values.into_iter().map(record).collect();
    let columns = records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default();
    RowSet::new(columns, records)
}

pub fn count_rows(count: i64) -> RowSet {
    rows(vec![json!({ "count": count })])
}
