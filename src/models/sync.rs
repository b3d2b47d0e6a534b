//! Results of replace and sync operations.

use serde::Serialize;

use super::Collection;
use crate::errors::AppError;

/// A record that `replace` could not insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position in the submitted batch.
    pub index: usize,
    pub reason: String,
}

/// Partial-success result of a committed `replace`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub collection: Collection,
    pub inserted: usize,
    pub rejected: Vec<RejectedRecord>,
    pub last_updated: String,
}

/// Result of syncing one collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub collection: Collection,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ReplaceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<AppError>,
}

impl SyncOutcome {
    pub fn succeeded(replaced: ReplaceOutcome) -> Self {
        Self {
            collection: replaced.collection,
            success: true,
            replaced: Some(replaced),
            error: None,
            failure: None,
        }
    }

    pub fn failed(collection: Collection, failure: AppError) -> Self {
        Self {
            collection,
            success: false,
            replaced: None,
            error: Some(failure.to_string()),
            failure: Some(failure),
        }
    }
}

/// Result of syncing every collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// True when at least one collection was replaced.
    pub success: bool,
    pub offline: bool,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn offline() -> Self {
        Self {
            success: false,
            offline: true,
            outcomes: Vec::new(),
        }
    }

    pub fn from_outcomes(outcomes: Vec<SyncOutcome>) -> Self {
        Self {
            success: outcomes.iter().any(|o| o.success),
            offline: false,
            outcomes,
        }
    }
}
