//! Read path consumed by the presentation layer.

use std::sync::Arc;

use super::RecordStore;
use crate::models::{Collection, Record};

/// Read-only accessors over the record store.
#[derive(Clone)]
pub struct QuerySurface {
    store: Arc<RecordStore>,
}

impl QuerySurface {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Records from the latest committed replace, in insertion order.
    pub async fn list_records(&self, collection: Collection) -> Vec<Record> {
        self.store.get_all(collection).await
    }

    /// Last sync time, or `"Never"`.
    pub async fn last_sync_time(&self, collection: Collection) -> String {
        self.store.get_last_updated(collection).await
    }

    /// Changes whenever a replace on `collection` commits.
    pub fn generation(&self, collection: Collection) -> u64 {
        self.store.generation(collection)
    }
}
