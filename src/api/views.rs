//! Page view endpoints: filtered tables, stats and CSV export.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::Collection;
use crate::tabular::to_csv;
use crate::views::{AttendanceFilter, CollectionView, RecordFilter, RosterFilter, ViewStats};
use crate::AppState;

/// A filtered table ready for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub collection: Collection,
    pub columns: &'static [&'static str],
    pub facet_column: &'static str,
    pub facets: Vec<String>,
    pub stats: ViewStats,
    pub matched: usize,
    pub rows: Vec<Vec<String>>,
}

fn render<F: RecordFilter>(view: &CollectionView, filter: &F) -> ViewResponse {
    let collection = view.collection();
    let matched = view.filter(filter);

    ViewResponse {
        collection,
        columns: collection.columns(),
        facet_column: collection.facet_column(),
        facets: view.facets().iter().cloned().collect(),
        stats: view.stats(),
        matched: matched.len(),
        rows: view.rows(&matched),
    }
}

/// GET /api/roster - Roster table filtered by name, reg, rp and category.
pub async fn roster_view(
    State(state): State<AppState>,
    Query(filter): Query<RosterFilter>,
) -> ApiResult<ViewResponse> {
    let view = state.presenter.view(Collection::Roster).await;
    success(render(&view, &filter))
}

/// GET /api/attendance - Attendance table filtered by enroll id, name, dept and date.
pub async fn attendance_view(
    State(state): State<AppState>,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<ViewResponse> {
    let view = state.presenter.view(Collection::Attendance).await;
    success(render(&view, &filter))
}

/// GET /api/roster/export - Download the (filtered) roster as CSV.
pub async fn roster_export(
    State(state): State<AppState>,
    Query(filter): Query<RosterFilter>,
) -> Result<Response, AppError> {
    let view = state.presenter.view(Collection::Roster).await;
    let records = view.filter(&filter);

    if records.is_empty() {
        return Err(AppError::NotFound("No data to export".to_string()));
    }

    let csv = to_csv(records.iter().copied())?;
    let filename = export_filename(&Utc::now().format("%Y-%m-%d").to_string());

    tracing::info!("Exporting {} roster records as {}", records.len(), filename);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv;charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}

fn export_filename(date: &str) -> String {
    format!("employees_{}.csv", date)
}
