//! API request handlers
//!
//! Every response uses the `ApiResponse` envelope. Pipeline errors come back
//! as 4xx with the error message; the session is unchanged in that case.

use std::sync::{Arc, MutexGuard};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::server::AppState;
use crate::core::{CarryOver, ColumnFilter, FilterOption, FormulaRequest, Series, Session, SortSpec};
use crate::error::TabflowError;
use crate::excel::{ExcelImporter, SheetSelector};
use crate::types::{ColumnInfo, Table};

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error: a status code plus the message for the envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn no_upload() -> Self {
        Self::new(StatusCode::NOT_FOUND, "No file uploaded")
    }
}

impl From<TabflowError> for ApiError {
    fn from(err: TabflowError) -> Self {
        let status = match &err {
            TabflowError::NoTable => StatusCode::CONFLICT,
            TabflowError::Io(_) | TabflowError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TabflowError::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn lock(state: &AppState) -> MutexGuard<'_, Session> {
    // Session updates are all-or-nothing, so a poisoned lock still holds
    // consistent tables
    state.session.lock().unwrap_or_else(|e| e.into_inner())
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: &'static str,
    pub method: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("/health", "GET", "Health check endpoint"),
    ("/version", "GET", "Get server version"),
    ("/api/v1/upload", "POST", "Upload a workbook (raw bytes)"),
    ("/api/v1/upload", "DELETE", "Remove the workbook and reset the session"),
    ("/api/v1/sheets", "GET", "List sheets of the uploaded workbook"),
    ("/api/v1/load", "POST", "Load a sheet into the session"),
    ("/api/v1/filters", "GET", "Filter choices per column"),
    ("/api/v1/filter", "POST", "Apply column filters and sort"),
    ("/api/v1/formula", "POST", "Add a derived column"),
    ("/api/v1/table", "GET", "Current table (raw, filtered or calculated)"),
    ("/api/v1/columns/numeric", "GET", "Columns usable as a plot y-axis"),
    ("/api/v1/plot", "POST", "Line-chart series for two columns"),
];

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(RootResponse {
        name: "tabflow API Server".to_string(),
        version: state.version.clone(),
        description: "Load a sheet, filter it, derive columns, plot them".to_string(),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(path, method, description)| EndpointInfo {
                path,
                method,
                description,
            })
            .collect(),
    }))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uploaded: bool,
    pub loaded: bool,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let loaded = lock(&state).is_loaded();
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uploaded: state.store.exists(),
        loaded,
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<&'static str>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec!["upload", "filter", "formula", "plot"],
    }))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub bytes: usize,
    pub sheets: Vec<String>,
}

/// POST /api/v1/upload - Store a workbook, replacing any previous one
pub async fn upload(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<UploadResponse> {
    let sheets = ExcelImporter::new(&body)
        .sheet_names()
        .map_err(|e| ApiError::from(TabflowError::from(e)))?;
    state.store.save(&body)?;
    lock(&state).clear();
    info!(bytes = body.len(), sheets = sheets.len(), "workbook uploaded");
    Ok(Json(ApiResponse::ok(UploadResponse {
        bytes: body.len(),
        sheets,
    })))
}

#[derive(Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// DELETE /api/v1/upload - Remove the workbook and forget all tables
pub async fn remove_upload(State(state): State<Arc<AppState>>) -> ApiResult<RemoveResponse> {
    let removed = state.store.remove()?;
    lock(&state).clear();
    Ok(Json(ApiResponse::ok(RemoveResponse { removed })))
}

fn stored_bytes(state: &AppState) -> Result<Vec<u8>, ApiError> {
    state.store.load()?.ok_or_else(ApiError::no_upload)
}

/// GET /api/v1/sheets - Sheet names of the uploaded workbook
pub async fn sheets(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let bytes = stored_bytes(&state)?;
    let names = ExcelImporter::new(&bytes)
        .sheet_names()
        .map_err(TabflowError::from)?;
    Ok(Json(ApiResponse::ok(names)))
}

/// Summary of the session after a state change
#[derive(Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    /// Derived columns were reattached by position to changed rows
    pub misaligned: bool,
}

impl TableSummary {
    fn of(table: &Table, misaligned: bool) -> Self {
        Self {
            rows: table.row_count(),
            columns: table.columns.iter().map(ColumnInfo::from).collect(),
            misaligned,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadRequest {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub carry_over: Option<CarryOver>,
}

/// POST /api/v1/load - Load a sheet of the uploaded workbook
pub async fn load(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> ApiResult<TableSummary> {
    let bytes = stored_bytes(&state)?;
    let mut session = lock(&state);
    session.load(&bytes, &SheetSelector::from(req.sheet))?;
    if let Some(mode) = req.carry_over {
        session.set_carry_over(mode);
    }
    let table = session.calculated().ok_or(TabflowError::NoTable)?;
    Ok(Json(ApiResponse::ok(TableSummary::of(table, false))))
}

/// GET /api/v1/filters - Filter choices derived from the raw table
pub async fn filters(State(state): State<Arc<AppState>>) -> ApiResult<Vec<FilterOption>> {
    let session = lock(&state);
    if !session.is_loaded() {
        return Err(TabflowError::NoTable.into());
    }
    Ok(Json(ApiResponse::ok(session.filter_options())))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

/// POST /api/v1/filter - Re-filter the raw table
pub async fn filter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<TableSummary> {
    let mut session = lock(&state);
    session.apply_filter(&req.filters, req.sort.as_ref())?;
    let misaligned = session.derived_misaligned();
    let table = session.calculated().ok_or(TabflowError::NoTable)?;
    Ok(Json(ApiResponse::ok(TableSummary::of(table, misaligned))))
}

/// POST /api/v1/formula - Add or replace a derived column
pub async fn formula(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FormulaRequest>,
) -> ApiResult<TableSummary> {
    let mut session = lock(&state);
    session.add_formula(&req)?;
    let misaligned = session.derived_misaligned();
    let table = session.calculated().ok_or(TabflowError::NoTable)?;
    Ok(Json(ApiResponse::ok(TableSummary::of(table, misaligned))))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableView {
    Raw,
    Filtered,
    #[default]
    Calculated,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    #[serde(default)]
    pub view: TableView,
    pub limit: Option<usize>,
}

/// GET /api/v1/table - One of the session's tables
pub async fn table(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TableQuery>,
) -> ApiResult<Table> {
    let session = lock(&state);
    let table = match query.view {
        TableView::Raw => session.raw(),
        TableView::Filtered => session.filtered(),
        TableView::Calculated => session.calculated(),
    }
    .ok_or(TabflowError::NoTable)?;

    let table = match query.limit {
        Some(n) if n < table.row_count() => table.take_rows(&(0..n).collect::<Vec<_>>()),
        _ => table.clone(),
    };
    Ok(Json(ApiResponse::ok(table)))
}

/// GET /api/v1/columns/numeric - Candidate y-axis columns
pub async fn numeric_columns(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let session = lock(&state);
    if !session.is_loaded() {
        return Err(TabflowError::NoTable.into());
    }
    let names = session.numeric_columns().into_iter().map(String::from).collect();
    Ok(Json(ApiResponse::ok(names)))
}

#[derive(Debug, Deserialize)]
pub struct PlotRequest {
    pub x: String,
    pub y: String,
}

/// POST /api/v1/plot - (x, y) series from the calculated table
pub async fn plot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlotRequest>,
) -> ApiResult<Series> {
    let series = lock(&state).plot(&req.x, &req.y)?;
    Ok(Json(ApiResponse::ok(series)))
}
