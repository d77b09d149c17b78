//! HTTP surface: routing, parameter validation and error mapping.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::cards::{project_cards, MetricCards};
use crate::charts::{assemble_charts, AxisOrder, ChartViewModel};
use crate::decoder::{decode_rows, DecodeMode, DecodedRow};
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{Catalog, TableSchema};
use crate::statements;
use crate::store::PipelineStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn PipelineStore>,
    catalog: Arc<Catalog>,
    decode_mode: DecodeMode,
    axis_order: AxisOrder,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        catalog: Catalog,
        decode_mode: DecodeMode,
        axis_order: AxisOrder,
    ) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            decode_mode,
            axis_order,
        }
    }

    /// Run a keyed `SELECT *` and decode the result against the table's fields.
    async fn load(
        &self,
        table: &TableSchema,
        key: &str,
        value: &str,
    ) -> PipelineResult<Vec<DecodedRow>> {
        let statement = statements::select_by(table, key, value);
        let rows = self.store.query(&statement).await?;
        decode_rows(table.fields, rows, self.decode_mode)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/table_data", get(table_data))
        .route("/chart_data", get(chart_data))
        .route("/second_chart_data", get(second_chart_data))
        .route("/add_data", post(add_data))
        .route("/update_data", put(update_data))
        .route("/delete_data", delete(delete_data))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Error mapping
// ============================================================================

/// A failed request, already resolved to its status and JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// Reads collapse every non-validation failure into 404.
    fn read(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(message) => Self::message(StatusCode::BAD_REQUEST, message),
            other => {
                error!("Read failed: {}", other);
                Self {
                    status: StatusCode::NOT_FOUND,
                    body: json!({"status": "Data not found"}),
                }
            }
        }
    }

    /// Writes report the store's message back to the caller.
    fn write(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Validation(_)
            | PipelineError::Store(_)
            | PipelineError::Conflict(_)
            | PipelineError::Decode(_) => StatusCode::BAD_REQUEST,
        };
        match &err {
            PipelineError::Validation(_) => {}
            PipelineError::Conflict(_) => warn!("Write rejected by table definition: {}", err),
            _ => error!("Write failed: {}", err),
        }
        Self::message(status, err.to_string())
    }

    fn message(status: StatusCode, message: String) -> Self {
        Self {
            status,
            body: json!({"status": "Error", "message": message}),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn success(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"status": "Success", "message": message})))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ParentQuery {
    parent_node: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeQuery {
    node: Option<String>,
}

fn required(value: Option<String>, message: &str) -> PipelineResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::Validation(message.to_string()))
}

fn object_body(payload: Result<Json<Value>, JsonRejection>) -> PipelineResult<Map<String, Value>> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(PipelineError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
        Err(rejection) => Err(PipelineError::Validation(rejection.body_text())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Overview rows whose parent is `parent_node`.
async fn table_data(
    State(state): State<AppState>,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<DecodedRow>>, ApiError> {
    let parent = required(query.parent_node, "Parent Node parameter is missing")
        .map_err(ApiError::read)?;
    debug!("table_data parent_node={}", parent);

    let rows = state
        .load(&state.catalog.overview, "parent", &parent)
        .await
        .map_err(ApiError::read)?;
    Ok(Json(rows))
}

/// Metric cards for every overview row matching `node`.
async fn chart_data(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
) -> Result<Json<Vec<MetricCards>>, ApiError> {
    let node = required(query.node, "Node parameter is missing").map_err(ApiError::read)?;
    debug!("chart_data node={}", node);

    let rows = state
        .load(&state.catalog.overview, "node", &node)
        .await
        .map_err(ApiError::read)?;
    let cards = rows
        .iter()
        .map(|row| project_cards(row, state.catalog.layout))
        .collect::<PipelineResult<Vec<_>>>()
        .map_err(ApiError::read)?;
    Ok(Json(cards))
}

/// The eight trend, gap and quadrant charts for `node`.
async fn second_chart_data(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
) -> Result<Json<Vec<ChartViewModel>>, ApiError> {
    let node = required(query.node, "Node parameter is missing").map_err(ApiError::read)?;
    debug!("second_chart_data node={}", node);

    let kpi_rows = state
        .load(&state.catalog.health_kpi, "node", &node)
        .await
        .map_err(ApiError::read)?;
    let quarterly_rows = state
        .load(&state.catalog.quarterly, "node", &node)
        .await
        .map_err(ApiError::read)?;

    let charts = assemble_charts(kpi_rows, &quarterly_rows, state.axis_order)
        .map_err(ApiError::read)?;
    Ok(Json(charts))
}

/// Insert an overview record from the recognized fields of the body.
async fn add_data(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = object_body(payload).map_err(ApiError::write)?;
    let statement = statements::insert(&state.catalog.overview, &body).map_err(ApiError::write)?;

    state.store.execute(&statement).await.map_err(ApiError::write)?;
    info!("Inserted overview record ({} fields)", statement.params.len());
    Ok(success(StatusCode::CREATED, "Record added successfully".to_string()))
}

/// Update recognized fields of the overview record keyed by `node`.
async fn update_data(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let node = required(query.node, "Node parameter is missing").map_err(ApiError::write)?;
    let body = object_body(payload).map_err(ApiError::write)?;
    let statement = statements::update(&state.catalog.overview, &node, &body)
        .map_err(ApiError::write)?;

    state.store.execute(&statement).await.map_err(ApiError::write)?;
    info!("Updated overview record {}", node);
    Ok(success(
        StatusCode::OK,
        format!("Record with node {} updated successfully", node),
    ))
}

/// Delete the overview record keyed by `node`. Deleting a missing node succeeds.
async fn delete_data(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let node = required(query.node, "Node parameter is missing").map_err(ApiError::write)?;
    let statement = statements::delete(&state.catalog.overview, &node);

    state.store.execute(&statement).await.map_err(ApiError::write)?;
    info!("Deleted overview record {}", node);
    Ok(success(
        StatusCode::OK,
        format!("Record with node {} deleted successfully", node),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OverviewLayout, HEALTH_KPI_FIELDS, QUARTERLY_FIELDS};
    use crate::store::memory::MemoryStore;

    fn overview_values(node: &str, parent: &str) -> Vec<Value> {
        OverviewLayout::V1
            .fields()
            .iter()
            .map(|f| match *f {
                "node" => json!(node),
                "parent" => json!(parent),
                f if f.ends_with("_insights") => json!(format!("{} insight for {}", f, node)),
                f if f.ends_with("_status") => json!("green"),
                _ => json!(42.0),
            })
            .collect()
    }

    fn kpi_values(node: &str, month: &str) -> Vec<Value> {
        HEALTH_KPI_FIELDS
            .iter()
            .map(|f| match *f {
                "node" => json!(node),
                "calendar_month" => json!(month),
                _ => json!(1.0),
            })
            .collect()
    }

    fn quarterly_values(node: &str, title: &str) -> Vec<Value> {
        QUARTERLY_FIELDS
            .iter()
            .map(|f| match *f {
                "node" => json!(node),
                "title" => json!(title),
                _ => json!(2.0),
            })
            .collect()
    }

    fn seeded_store() -> MemoryStore {
        MemoryStore::new()
            .with_table(
                "overview_copy",
                OverviewLayout::V1.fields(),
                vec![
                    overview_values("ROOT", ""),
                    overview_values("WEST", "ROOT"),
                    overview_values("EAST", "ROOT"),
                    overview_values("WEST-1", "WEST"),
                ],
            )
            .with_table(
                "health_kpi",
                HEALTH_KPI_FIELDS,
                vec![
                    kpi_values("WEST", "\"2024.03.01\""),
                    kpi_values("WEST", "\"2024.01.01\""),
                    kpi_values("EAST", "\"2024.01.01\""),
                ],
            )
            .with_table(
                "quarterly_figures",
                QUARTERLY_FIELDS,
                vec![
                    quarterly_values("WEST", "Q1"),
                    quarterly_values("WEST", "Q2"),
                    quarterly_values("WEST", "Q3"),
                ],
            )
    }

    fn state_with(store: Arc<MemoryStore>) -> AppState {
        AppState::new(
            store,
            Catalog::new(OverviewLayout::V1, "overview_copy", "health_kpi", "quarterly_figures"),
            DecodeMode::Strict,
            AxisOrder::Stored,
        )
    }

    fn node_query(node: &str) -> Query<NodeQuery> {
        Query(NodeQuery {
            node: Some(node.to_string()),
        })
    }

    #[tokio::test]
    async fn test_table_data_returns_children_only() {
        let state = state_with(Arc::new(seeded_store()));
        let Json(rows) = table_data(
            State(state),
            Query(ParentQuery {
                parent_node: Some("ROOT".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.get("parent").unwrap(), &json!("ROOT"));
        }
    }

    #[tokio::test]
    async fn test_table_data_missing_param() {
        let state = state_with(Arc::new(seeded_store()));
        let err = table_data(State(state), Query(ParentQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["message"], json!("Parent Node parameter is missing"));
    }

    #[tokio::test]
    async fn test_read_store_failure_is_not_found() {
        let store = Arc::new(seeded_store());
        store.fail_with("Code: 210. DB::NetException: Connection refused");
        let err = chart_data(State(state_with(store)), node_query("WEST"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body, json!({"status": "Data not found"}));
    }

    #[tokio::test]
    async fn test_chart_data_cards() {
        let state = state_with(Arc::new(seeded_store()));
        let Json(cards) = chart_data(State(state), node_query("WEST")).await.unwrap();
        assert_eq!(cards.len(), 1);

        let card = &cards[0];
        assert_eq!(card.len(), 5);
        assert_eq!(card["Coverage"].values, json!(42.0));
        assert_eq!(
            card["Maturity"].description.subtitle,
            "Rolling 4 Qtr Pipeline in Mature Stages"
        );
        assert_eq!(
            card["Spread"].description.content,
            json!("spread_insights insight for WEST")
        );
    }

    #[tokio::test]
    async fn test_chart_data_missing_param() {
        let state = state_with(Arc::new(seeded_store()));
        let err = chart_data(State(state), Query(NodeQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["message"], json!("Node parameter is missing"));
    }

    #[tokio::test]
    async fn test_second_chart_data() {
        let state = state_with(Arc::new(seeded_store()));
        let Json(charts) = second_chart_data(State(state), node_query("WEST"))
            .await
            .unwrap();
        assert_eq!(charts.len(), 8);
        assert_eq!(charts[0].comments, "1st chart");
        assert_eq!(charts[7].comments, "8th chart");
    }

    #[tokio::test]
    async fn test_second_chart_data_without_kpis() {
        let state = state_with(Arc::new(seeded_store()));
        let err = second_chart_data(State(state), node_query("NORTH"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_chart_data_without_quarterly_rows() {
        // EAST has KPI rows but no quarterly figures
        let state = state_with(Arc::new(seeded_store()));
        let err = second_chart_data(State(state), node_query("EAST"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_strict_decode_failure_is_not_found() {
        let store = MemoryStore::new().with_table(
            "overview_copy",
            OverviewLayout::V1.fields(),
            vec![vec![json!("WEST"), json!(1.0)]],
        );
        let state = state_with(Arc::new(store));
        let err = chart_data(State(state), node_query("WEST")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_data_drops_unknown_keys() {
        let store = Arc::new(MemoryStore::new());
        let (status, Json(body)) = add_data(
            State(state_with(store.clone())),
            Ok(Json(json!({"node": "A", "bogus": 1}))),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], json!("Success"));
        let executed = store.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO `overview_copy` (`node`) SELECT {p0:String}"
        );
        assert_eq!(executed[0].params.len(), 1);
    }

    #[tokio::test]
    async fn test_add_data_store_error_is_exposed() {
        let store = Arc::new(MemoryStore::new());
        store.fail_with("Code: 62. DB::Exception: Syntax error");
        let err = add_data(State(state_with(store)), Ok(Json(json!({"node": "A"}))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["message"], json!("Code: 62. DB::Exception: Syntax error"));
    }

    #[tokio::test]
    async fn test_add_data_rejects_non_object() {
        let store = Arc::new(MemoryStore::new());
        let err = add_data(State(state_with(store.clone())), Ok(Json(json!([1, 2]))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_update_data() {
        let store = Arc::new(MemoryStore::new());
        let (status, Json(body)) = update_data(
            State(state_with(store.clone())),
            node_query("WEST"),
            Ok(Json(json!({"coverage_score": 77}))),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Record with node WEST updated successfully"));
        assert_eq!(store.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_update_data_without_valid_fields() {
        let store = Arc::new(MemoryStore::new());
        let err = update_data(
            State(state_with(store.clone())),
            node_query("WEST"),
            Ok(Json(json!({"bogus": 1}))),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["message"], json!("No valid fields to update"));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_update_data_missing_node() {
        let store = Arc::new(MemoryStore::new());
        let err = update_data(
            State(state_with(store.clone())),
            Query(NodeQuery::default()),
            Ok(Json(json!({"coverage_score": 1}))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["message"], json!("Node parameter is missing"));
    }

    #[test]
    fn test_write_error_mapping() {
        let message = "Code: 420. DB::Exception: Cannot UPDATE key column `node`";
        let conflict = ApiError::write(PipelineError::Conflict(message.to_string()));
        assert_eq!(conflict.status, StatusCode::BAD_REQUEST);
        assert_eq!(conflict.body, json!({"status": "Error", "message": message}));

        let store = ApiError::write(PipelineError::Store("timeout".to_string()));
        assert_eq!(store.status, StatusCode::BAD_REQUEST);

        let missing = ApiError::write(PipelineError::NotFound("gone".to_string()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store.clone());

        for _ in 0..2 {
            let (status, Json(body)) = delete_data(State(state.clone()), node_query("X"))
                .await
                .unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], json!("Record with node X deleted successfully"));
        }
        assert_eq!(store.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_node() {
        let store = Arc::new(MemoryStore::new());
        let err = delete_data(State(state_with(store)), Query(NodeQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
