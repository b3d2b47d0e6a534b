//! Presentation controller for the roster and attendance pages.
//!
//! Each [`CollectionView`] is an immutable snapshot built from the query
//! surface. [`Presenter`] rebuilds a snapshot whenever the store reports a
//! newer replace for that collection.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::db::QuerySurface;
use crate::models::{Collection, Record};

/// Predicate over records used by the page search forms.
pub trait RecordFilter {
    fn matches(&self, record: &Record) -> bool;
}

/// Roster search form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reg: Option<String>,
    #[serde(default)]
    pub rp: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RecordFilter for RosterFilter {
    fn matches(&self, record: &Record) -> bool {
        contains_ci(record, "Name", self.name.as_deref())
            && contains_ci(record, "Reg. NO", self.reg.as_deref())
            && contains_ci(record, "RP NO", self.rp.as_deref())
            && equals(record, "CATEGORY", self.category.as_deref())
    }
}

/// Attendance search form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    #[serde(default)]
    pub enroll: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dept: Option<String>,
    /// Calendar day as `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
}

impl RecordFilter for AttendanceFilter {
    fn matches(&self, record: &Record) -> bool {
        contains_ci(record, "Enroll ID", self.enroll.as_deref())
            && contains_ci(record, "Name", self.name.as_deref())
            && equals(record, "Dept", self.dept.as_deref())
            && same_day(record, "Date", self.date.as_deref())
    }
}

fn contains_ci(record: &Record, column: &str, needle: Option<&str>) -> bool {
    let needle = needle.unwrap_or("").trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record
        .present_text(column)
        .map(|value| value.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

fn equals(record: &Record, column: &str, expected: Option<&str>) -> bool {
    match expected {
        None | Some("") => true,
        Some(expected) => record.present_text(column).as_deref() == Some(expected),
    }
}

fn same_day(record: &Record, column: &str, wanted: Option<&str>) -> bool {
    let wanted = wanted.unwrap_or("").trim();
    if wanted.is_empty() {
        return true;
    }
    let Some(raw) = record.present_text(column) else {
        return true;
    };
    match (parse_row_date(wanted), parse_row_date(&raw)) {
        (Some(wanted), Some(row)) => wanted == row,
        _ => false,
    }
}

/// Read a date cell: `M/D/YYYY` or `M-D-YYYY`, else ISO `YYYY-MM-DD`.
pub fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(['/', '-']).collect();

    if parts.len() == 3 && parts[0].len() <= 2 {
        let month: u32 = parts[0].trim().parse().ok()?;
        let day: u32 = parts[1].trim().parse().ok()?;
        let year: i32 = parts[2].trim().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Summary counters shown above the table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub total: usize,
    pub distinct_facets: usize,
    pub last_updated: String,
}

/// Snapshot of one collection as the page displays it.
#[derive(Debug, Clone)]
pub struct CollectionView {
    collection: Collection,
    generation: u64,
    records: Vec<Record>,
    facets: BTreeSet<String>,
    last_updated: String,
}

impl CollectionView {
    /// Build a snapshot from the current store contents.
    pub async fn load(queries: &QuerySurface, collection: Collection) -> Self {
        // Read the generation first so a replace racing this load forces a reload.
        let generation = queries.generation(collection);
        let records = queries.list_records(collection).await;
        let last_updated = queries.last_sync_time(collection).await;
        Self::from_records(collection, generation, records, last_updated)
    }

    pub fn from_records(
        collection: Collection,
        generation: u64,
        records: Vec<Record>,
        last_updated: String,
    ) -> Self {
        let facets = records
            .iter()
            .filter_map(|r| r.present_text(collection.facet_column()))
            .collect();

        Self {
            collection,
            generation,
            records,
            facets,
            last_updated,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Sorted distinct values of the facet column.
    pub fn facets(&self) -> &BTreeSet<String> {
        &self.facets
    }

    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            total: self.records.len(),
            distinct_facets: self.facets.len(),
            last_updated: self.last_updated().to_string(),
        }
    }

    pub fn filter<F: RecordFilter>(&self, filter: &F) -> Vec<&Record> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Project records onto the collection's display columns.
    pub fn rows(&self, records: &[&Record]) -> Vec<Vec<String>> {
        let columns = self.collection.columns();
        records
            .iter()
            .map(|r| columns.iter().map(|c| r.display(c)).collect())
            .collect()
    }
}

/// Owns the current view of each collection.
pub struct Presenter {
    queries: QuerySurface,
    views: RwLock<HashMap<Collection, Arc<CollectionView>>>,
}

impl Presenter {
    pub fn new(queries: QuerySurface) -> Self {
        Self {
            queries,
            views: RwLock::new(HashMap::new()),
        }
    }

    /// Current view, reloaded if a replace committed since it was built.
    pub async fn view(&self, collection: Collection) -> Arc<CollectionView> {
        let generation = self.queries.generation(collection);

        if let Some(view) = self.views.read().await.get(&collection) {
            if view.generation == generation {
                return view.clone();
            }
        }

        self.refresh(collection).await
    }

    /// Rebuild the view from the query surface.
    pub async fn refresh(&self, collection: Collection) -> Arc<CollectionView> {
        let view = Arc::new(CollectionView::load(&self.queries, collection).await);
        tracing::debug!(
            "Loaded {} view: {} records, {} facets",
            collection,
            view.records().len(),
            view.facets().len()
        );
        self.views.write().await.insert(collection, view.clone());
        view
    }
}
