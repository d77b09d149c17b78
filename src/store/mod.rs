//! Data store abstraction.
//!
//! Handlers only see [`PipelineStore`]. The production backend talks to the
//! ClickHouse HTTP interface; tests swap in an in-memory double.

pub mod clickhouse;
#[cfg(test)]
pub mod memory;

use serde_json::Value;

use crate::error::PipelineResult;

/// A named statement parameter, bound server-side as `{name:Type}`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: Value,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// ClickHouse type used for the placeholder, chosen from the JSON value.
    pub fn clickhouse_type(&self) -> &'static str {
        match &self.value {
            Value::Null => "Nullable(String)",
            Value::Bool(_) => "Bool",
            Value::Number(n) if n.is_i64() => "Int64",
            Value::Number(n) if n.is_u64() => "UInt64",
            Value::Number(_) => "Float64",
            // Nested JSON is stored as its text form
            Value::String(_) | Value::Array(_) | Value::Object(_) => "String",
        }
    }

    /// `{name:Type}` placeholder for this parameter.
    pub fn placeholder(&self) -> String {
        format!("{{{}:{}}}", self.name, self.clickhouse_type())
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

/// Read and write access to the analytics store.
#[async_trait::async_trait]
pub trait PipelineStore: Send + Sync {
    fn name(&self) -> &str;

    /// Run a read; each row comes back as its ordered column values.
    async fn query(&self, statement: &Statement) -> PipelineResult<Vec<Vec<Value>>>;

    /// Run a write. Success carries no payload.
    async fn execute(&self, statement: &Statement) -> PipelineResult<()>;
}
