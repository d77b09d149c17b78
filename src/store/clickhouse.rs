//! ClickHouse client over the HTTP interface.
//!
//! Statements are sent as the request body and parameters travel as
//! `param_<name>` query-string entries, so values are never spliced into SQL.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{PipelineStore, QueryParam, Statement};
use crate::config::StoreConfig;
use crate::error::{PipelineError, PipelineResult};

/// Raised when an `ALTER ... UPDATE` touches a key column.
const CANNOT_UPDATE_COLUMN: u32 = 420;

/// Keep 64-bit integers as JSON numbers instead of quoted strings.
const READ_SETTINGS: &[(&str, &str)] = &[("output_format_json_quote_64bit_integers", "0")];

/// Wait for mutations so the caller sees the write applied.
const WRITE_SETTINGS: &[(&str, &str)] = &[("mutations_sync", "1")];

/// ClickHouse HTTP client.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    endpoint: String,
    database: String,
    username: String,
    password: String,
}

impl ClickHouseStore {
    /// Build the client from validated configuration.
    pub fn new(config: &StoreConfig) -> PipelineResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let endpoint = format!("https://{}:{}/", config.host, config.port);
        info!("ClickHouse endpoint: {} (database {})", endpoint, config.database);

        Ok(Self {
            client,
            endpoint,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Helper: POST a statement with its parameters and extra settings.
    async fn post(
        &self,
        sql: String,
        params: &[QueryParam],
        settings: &[(&str, &str)],
    ) -> PipelineResult<Response> {
        let query = query_pairs(&self.database, params, settings);

        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .query(&query)
            .body(sql)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), text.trim()));
        }

        Ok(resp)
    }
}

#[async_trait::async_trait]
impl PipelineStore for ClickHouseStore {
    fn name(&self) -> &str {
        "clickhouse"
    }

    async fn query(&self, statement: &Statement) -> PipelineResult<Vec<Vec<Value>>> {
        debug!("ClickHouse query: {}", statement.sql);
        let sql = format!("{}\nFORMAT JSONCompact", statement.sql);
        let resp = self.post(sql, &statement.params, READ_SETTINGS).await?;

        let body: CompactResult = resp.json().await?;
        debug!("ClickHouse returned {} rows", body.data.len());
        Ok(body.data)
    }

    async fn execute(&self, statement: &Statement) -> PipelineResult<()> {
        debug!("ClickHouse command: {}", statement.sql);
        self.post(statement.sql.clone(), &statement.params, WRITE_SETTINGS).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CompactResult {
    data: Vec<Vec<Value>>,
}

/// Query-string entries for one request: target database, settings, then
/// one `param_<name>` per bound value.
fn query_pairs(
    database: &str,
    params: &[QueryParam],
    settings: &[(&str, &str)],
) -> Vec<(String, String)> {
    let mut query = vec![("database".to_string(), database.to_string())];
    query.extend(settings.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    query.extend(
        params
            .iter()
            .map(|p| (format!("param_{}", p.name), param_text(&p.value))),
    );
    query
}

/// Render a parameter value in ClickHouse's escaped text format.
fn param_text(value: &Value) -> String {
    match value {
        Value::Null => "\\N".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Map a failed response onto the error taxonomy using the server error code.
fn classify_failure(status: u16, text: &str) -> PipelineError {
    static CODE: OnceLock<Regex> = OnceLock::new();
    let code = CODE
        .get_or_init(|| Regex::new(r"Code:\s*(\d+)").expect("valid regex"))
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok());

    match code {
        Some(CANNOT_UPDATE_COLUMN) => PipelineError::Conflict(text.to_string()),
        _ => PipelineError::Store(format!("ClickHouse error ({}): {}", status, text)),
    }
}
