//! SQL assembly for reads and overview writes.
//!
//! Column names only ever come from a [`TableSchema`] field list and are
//! backtick-quoted (several start with a digit). Values are always bound as
//! parameters.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::schema::TableSchema;
use crate::store::{QueryParam, Statement};

fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// `SELECT *` filtered on a single key column.
pub fn select_by(table: &TableSchema, key: &str, value: &str) -> Statement {
    let param = QueryParam::new(key, value);
    Statement {
        sql: format!(
            "SELECT * FROM {} WHERE {} = {}",
            quote(&table.name),
            quote(key),
            param.placeholder()
        ),
        params: vec![param],
    }
}

/// Recognized fields of `body`, in schema order. Unknown keys are dropped.
fn recognized<'a>(
    table: &TableSchema,
    body: &'a Map<String, Value>,
) -> Vec<(&'static str, &'a Value)> {
    let ignored: Vec<&str> = body
        .keys()
        .map(String::as_str)
        .filter(|key| !table.allows(key))
        .collect();
    if !ignored.is_empty() {
        debug!("Ignoring unrecognized fields for {}: {:?}", table.name, ignored);
    }

    table
        .fields
        .iter()
        .filter_map(|field| body.get(*field).map(|value| (*field, value)))
        .collect()
}

pub fn insert(table: &TableSchema, body: &Map<String, Value>) -> PipelineResult<Statement> {
    let fields = recognized(table, body);
    if fields.is_empty() {
        return Err(PipelineError::Validation("No valid fields to insert".to_string()));
    }

    let params: Vec<QueryParam> = fields
        .iter()
        .enumerate()
        .map(|(idx, (_, value))| QueryParam::new(format!("p{}", idx), (*value).clone()))
        .collect();
    let columns: Vec<String> = fields.iter().map(|(field, _)| quote(field)).collect();
    let placeholders: Vec<String> = params.iter().map(QueryParam::placeholder).collect();

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) SELECT {}",
            quote(&table.name),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

pub fn update(
    table: &TableSchema,
    node: &str,
    body: &Map<String, Value>,
) -> PipelineResult<Statement> {
    let fields = recognized(table, body);
    if fields.is_empty() {
        return Err(PipelineError::Validation("No valid fields to update".to_string()));
    }

    let mut params = Vec::with_capacity(fields.len() + 1);
    let mut assignments = Vec::with_capacity(fields.len());
    for (idx, (field, value)) in fields.iter().enumerate() {
        let param = QueryParam::new(format!("p{}", idx), (*value).clone());
        assignments.push(format!("{} = {}", quote(field), param.placeholder()));
        params.push(param);
    }
    let key = QueryParam::new("node", node);
    let sql = format!(
        "ALTER TABLE {} UPDATE {} WHERE {} = {}",
        quote(&table.name),
        assignments.join(", "),
        quote("node"),
        key.placeholder()
    );
    params.push(key);

    Ok(Statement { sql, params })
}

pub fn delete(table: &TableSchema, node: &str) -> Statement {
    let key = QueryParam::new("node", node);
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = {}",
            quote(&table.name),
            quote("node"),
            key.placeholder()
        ),
        params: vec![key],
    }
}
