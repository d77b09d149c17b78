//! In-memory store used by handler tests.
//!
//! Reads understand the single-key `SELECT` shape produced by
//! `statements::select_by`; writes are recorded, not applied.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;
use serde_json::Value;

use super::{PipelineStore, Statement};
use crate::error::{PipelineError, PipelineResult};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, (Vec<&'static str>, Vec<Vec<Value>>)>>,
    executed: Mutex<Vec<Statement>>,
    failure: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows laid out in `fields` order.
    pub fn with_table(
        self,
        table: &str,
        fields: &'static [&'static str],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(table.to_string(), (fields.to_vec(), rows));
        self
    }

    /// Make every subsequent call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Writes issued so far.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    fn check_failure(&self) -> PipelineResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(PipelineError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PipelineStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, statement: &Statement) -> PipelineResult<Vec<Vec<Value>>> {
        self.check_failure()?;

        static SELECT: OnceLock<Regex> = OnceLock::new();
        let select = SELECT.get_or_init(|| {
            Regex::new(r"^SELECT \* FROM `(\w+)` WHERE `(\w+)` = \{(\w+):").unwrap()
        });
        let caps = select
            .captures(&statement.sql)
            .ok_or_else(|| {
                PipelineError::Store(format!("unsupported statement: {}", statement.sql))
            })?;

        let tables = self.tables.lock().unwrap();
        let (fields, rows) = tables
            .get(&caps[1])
            .ok_or_else(|| PipelineError::Store(format!("Table {} does not exist", &caps[1])))?;
        let column = fields
            .iter()
            .position(|f| *f == &caps[2])
            .ok_or_else(|| PipelineError::Store(format!("Unknown column {}", &caps[2])))?;
        let wanted = statement
            .params
            .iter()
            .find(|p| p.name == caps[3])
            .map(|p| p.value.clone())
            .unwrap_or(Value::Null);

        Ok(rows
            .iter()
            .filter(|row| row.get(column) == Some(&wanted))
            .cloned()
            .collect())
    }

    async fn execute(&self, statement: &Statement) -> PipelineResult<()> {
        self.check_failure()?;
        self.executed.lock().unwrap().push(statement.clone());
        Ok(())
    }
}
