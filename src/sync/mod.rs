//! Sync engine: refresh collections from remote CSV resources.
//!
//! A sync fetches the resource with a cache-defeating query parameter, parses
//! it and replaces the collection. Failures never escape as errors; they are
//! logged and reported in a [`SyncOutcome`].

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::db::RecordStore;
use crate::errors::AppError;
use crate::models::{Collection, ReplaceOutcome, SyncOutcome, SyncReport};
use crate::tabular::parse_csv;

/// Query parameter appended to every fetch.
pub const CACHE_BUST_PARAM: &str = "t";

/// Connectivity as reported by the host.
#[derive(Debug)]
pub struct NetworkStatus {
    online: AtomicBool,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        tracing::info!(
            "Network reported {}",
            if online { "online" } else { "offline" }
        );
    }
}

/// Remote CSV locators for each collection.
#[derive(Debug, Clone)]
pub struct SourceLocators {
    pub roster: String,
    pub attendance: String,
}

impl SourceLocators {
    pub fn locator(&self, collection: Collection) -> &str {
        match collection {
            Collection::Roster => &self.roster,
            Collection::Attendance => &self.attendance,
        }
    }
}

/// Fetches CSV resources and replaces collections with their contents.
pub struct SyncEngine {
    store: Arc<RecordStore>,
    network: Arc<NetworkStatus>,
    sources: SourceLocators,
    client: reqwest::Client,
    last_bust: AtomicI64,
}

impl SyncEngine {
    pub fn new(
        store: Arc<RecordStore>,
        network: Arc<NetworkStatus>,
        sources: SourceLocators,
    ) -> Self {
        Self {
            store,
            network,
            sources,
            client: reqwest::Client::new(),
            last_bust: AtomicI64::new(0),
        }
    }

    /// Sync one collection from `locator`.
    ///
    /// Does not consult connectivity; the caller is expected to.
    pub async fn sync_collection(&self, locator: &str, collection: Collection) -> SyncOutcome {
        tracing::info!("Syncing {} from {}", collection, locator);

        match self.fetch_and_replace(locator, collection).await {
            Ok(replaced) => {
                tracing::info!(
                    "Synced {} - {} records",
                    collection,
                    replaced.inserted
                );
                SyncOutcome::succeeded(replaced)
            }
            Err(AppError::EmptyResult(msg)) => {
                tracing::warn!("No data found for {}: {}", collection, msg);
                SyncOutcome::failed(collection, AppError::EmptyResult(msg))
            }
            Err(e) => {
                tracing::error!("Sync of {} failed: {}", collection, e);
                SyncOutcome::failed(collection, e)
            }
        }
    }

    /// Sync one collection from its configured locator.
    pub async fn sync_configured(&self, collection: Collection) -> SyncOutcome {
        let locator = self.sources.locator(collection).to_string();
        self.sync_collection(&locator, collection).await
    }

    /// Sync roster then attendance.
    ///
    /// Succeeds if either collection was replaced. When offline nothing is
    /// fetched and the cached data is left alone.
    pub async fn sync_all(&self) -> SyncReport {
        if !self.network.is_online() {
            tracing::warn!("Offline - using cached data");
            return SyncReport::offline();
        }

        let mut outcomes = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            outcomes.push(self.sync_configured(collection).await);
        }

        let report = SyncReport::from_outcomes(outcomes);
        if report.success {
            tracing::info!("Auto-sync completed");
        } else {
            tracing::warn!("No updates available");
        }
        report
    }

    async fn fetch_and_replace(
        &self,
        locator: &str,
        collection: Collection,
    ) -> Result<ReplaceOutcome, AppError> {
        let url = self.cache_busted(locator)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }
        let body = response.text().await?;

        import_csv(&self.store, collection, body.as_bytes()).await
    }

    /// Append a strictly increasing millisecond stamp to `locator`.
    fn cache_busted(&self, locator: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(locator)
            .map_err(|e| AppError::Transport(format!("Invalid locator {}: {}", locator, e)))?;

        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_bust
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let stamp = now.max(previous + 1);

        url.query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &stamp.to_string());
        Ok(url)
    }
}

/// Parse CSV bytes and replace `collection` with the result.
///
/// Shared by network sync and manual upload so both apply the same rules. An
/// empty parse result is refused so a blank resource cannot wipe good data.
pub async fn import_csv(
    store: &RecordStore,
    collection: Collection,
    input: &[u8],
) -> Result<ReplaceOutcome, AppError> {
    let table = parse_csv(input)?;

    if table.records.is_empty() {
        return Err(AppError::EmptyResult(format!(
            "No data found in CSV for {}",
            collection
        )));
    }

    tracing::debug!("CSV parsed rows for {}: {}", collection, table.records.len());
    store.replace(collection, &table.records).await
}
