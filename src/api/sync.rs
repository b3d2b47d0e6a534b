//! Sync and connectivity API endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{Collection, SyncReport};
use crate::AppState;

/// Reported connectivity.
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkState {
    pub online: bool,
}

/// POST /api/sync - Sync both collections.
pub async fn sync_all(State(state): State<AppState>) -> ApiResult<SyncReport> {
    let report = state.sync.sync_all().await;

    if report.offline {
        return Err(AppError::Offline);
    }

    for collection in updated_collections(&report) {
        state.presenter.refresh(collection).await;
    }

    if !report.success {
        tracing::warn!("Manual sync updated no collection");
    }

    success(report)
}

/// GET /api/network - Current connectivity.
pub async fn get_network(State(state): State<AppState>) -> ApiResult<NetworkState> {
    success(NetworkState {
        online: state.network.is_online(),
    })
}

/// PUT /api/network - Set reported connectivity.
pub async fn set_network(
    State(state): State<AppState>,
    Json(request): Json<NetworkState>,
) -> ApiResult<NetworkState> {
    state.network.set_online(request.online);
    success(request)
}

/// Collections a report replaced successfully; their views need a refresh.
pub fn updated_collections(report: &SyncReport) -> Vec<Collection> {
    report
        .outcomes
        .iter()
        .filter(|o| o.success)
        .map(|o| o.collection)
        .collect()
}
