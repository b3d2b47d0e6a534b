//! Collection API endpoints: read path, manual upload and per-collection refresh.

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde::Serialize;

use super::{collection_param, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Collection, Record, ReplaceOutcome, SyncOutcome};
use crate::sync::import_csv;
use crate::AppState;

/// Full contents of a collection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub collection: Collection,
    pub columns: &'static [&'static str],
    pub total: usize,
    pub last_updated: String,
    pub records: Vec<Record>,
}

/// Last sync time of a collection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdatedResponse {
    pub collection: Collection,
    pub last_updated: String,
}

/// GET /api/collections/{name}/records - List all records.
pub async fn list_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<RecordsResponse> {
    let collection = collection_param(&name)?;

    let records = state.queries.list_records(collection).await;
    let last_updated = state.queries.last_sync_time(collection).await;

    success(RecordsResponse {
        collection,
        columns: collection.columns(),
        total: records.len(),
        last_updated,
        records,
    })
}

/// GET /api/collections/{name}/last-updated - Get the last sync time.
pub async fn last_updated(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<LastUpdatedResponse> {
    let collection = collection_param(&name)?;

    success(LastUpdatedResponse {
        collection,
        last_updated: state.queries.last_sync_time(collection).await,
    })
}

/// POST /api/collections/{name}/upload - Replace a collection from an uploaded CSV body.
pub async fn upload_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<ReplaceOutcome> {
    let collection = collection_param(&name)?;

    tracing::info!("Upload for {}: {} bytes", collection, body.len());

    let outcome = import_csv(&state.store, collection, &body).await?;
    state.presenter.refresh(collection).await;

    success(outcome)
}

/// POST /api/collections/{name}/sync - Refresh one collection from its source.
pub async fn sync_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<SyncOutcome> {
    let collection = collection_param(&name)?;

    if !state.network.is_online() {
        return Err(AppError::Offline);
    }

    let outcome = state.sync.sync_configured(collection).await;
    if let Some(failure) = &outcome.failure {
        return Err(failure.clone());
    }

    state.presenter.refresh(collection).await;
    success(outcome)
}
