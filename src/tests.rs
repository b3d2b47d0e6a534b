//! Integration tests for the records service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::RecordStore;
use crate::{create_router, AppState};

const ROSTER_CSV: &str = "No,Reg. NO,CATEGORY,RP NO,Name\n\
1,1001,Staff,RP-1,K. Perera\n\
2,1002,Casual,,N. Silva\n\
3,1003,Staff,RP-3,A. Fernando\n";

const ATTENDANCE_CSV: &str = "Dept,User ID,Name,Enroll ID,Date,1,2,3,4\n\
IT,1,K. Perera,501,1/2/2024,08:01,12:00,13:00,17:05\n\
HR,2,N. Silva,502,1/3/2024,08:15,,,17:00\n";

/// Counts requests to the fake CSV host.
#[derive(Clone, Default)]
struct SourceHits(Arc<AtomicUsize>);

impl SourceHits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn roster_source(State(hits): State<SourceHits>) -> &'static str {
    hits.0.fetch_add(1, Ordering::SeqCst);
    ROSTER_CSV
}

async fn attendance_source(State(hits): State<SourceHits>) -> &'static str {
    hits.0.fetch_add(1, Ordering::SeqCst);
    ATTENDANCE_CSV
}

/// Spawn the fake CSV host and return its base URL.
async fn spawn_source(hits: SourceHits) -> String {
    let app = Router::new()
        .route("/data/employees.csv", get(roster_source))
        .route("/data/attendance.csv", get(attendance_source))
        .with_state(hits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind source");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/data/", addr)
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    hits: SourceHits,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_connectivity(true).await
    }

    async fn with_connectivity(online: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let hits = SourceHits::default();
        let source_base = spawn_source(hits.clone()).await;

        let config = test_config(&temp_dir, &source_base, online);
        let store = Arc::new(
            RecordStore::open(&config.db_path)
                .await
                .expect("Failed to open store"),
        );
        let app = create_router(AppState::new(store, &config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            hits,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    async fn post_json(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.post(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    async fn upload(&self, collection: &str, body: impl Into<reqwest::Body>) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(&format!("/api/collections/{}/upload", collection)))
            .header("content-type", "text/csv")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }
}

fn test_config(temp_dir: &TempDir, source_base: &str, online: bool) -> Config {
    Config {
        db_path: temp_dir.path().join("test.sqlite"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        roster_url: format!("{}employees.csv", source_base),
        attendance_url: format!("{}attendance.csv", source_base),
        offline: !online,
        sync_on_start: false,
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_router_oneshot_last_updated() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, "http://127.0.0.1:9/", true);
    let store = Arc::new(RecordStore::open(&config.db_path).await.unwrap());
    let app = create_router(AppState::new(store, &config));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/collections/attendance/last-updated")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["collection"], "attendance");
    assert_eq!(body["data"]["lastUpdated"], "Never");
}

#[tokio::test]
async fn test_empty_collections_before_sync() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/collections/roster/records").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["lastUpdated"], "Never");
    assert_eq!(body["data"]["records"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_collection() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/collections/payroll/records").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_sync_roster_scenario() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.post_json("/api/collections/roster/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["replaced"]["inserted"], 3);
    assert_eq!(fixture.hits.count(), 1);

    let (_, body) = fixture.get_json("/api/collections/roster/records").await;
    let records = body["data"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["Reg. NO"], 1001);
    assert_eq!(records[0]["CATEGORY"], "Staff");
    assert_eq!(records[0]["Name"], "K. Perera");
    assert_eq!(records[1]["RP NO"], Value::Null);
    assert_ne!(body["data"]["lastUpdated"], "Never");

    // Attendance was not touched
    let (_, body) = fixture.get_json("/api/collections/attendance/last-updated").await;
    assert_eq!(body["data"]["lastUpdated"], "Never");
}

#[tokio::test]
async fn test_sync_all_updates_both_collections() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.post_json("/api/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["outcomes"].as_array().unwrap().len(), 2);
    assert_eq!(fixture.hits.count(), 2);

    let (_, body) = fixture.get_json("/api/attendance").await;
    assert_eq!(body["data"]["stats"]["total"], 2);
    assert_eq!(body["data"]["facets"], serde_json::json!(["HR", "IT"]));
}

#[tokio::test]
async fn test_sync_all_offline_short_circuits() {
    let fixture = TestFixture::with_connectivity(false).await;

    let (status, body) = fixture.post_json("/api/sync").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "OFFLINE");
    assert_eq!(fixture.hits.count(), 0);

    let (status, _) = fixture.post_json("/api/collections/roster/sync").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fixture.hits.count(), 0);

    let (_, body) = fixture.get_json("/api/collections/roster/records").await;
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["lastUpdated"], "Never");
}

#[tokio::test]
async fn test_network_toggle() {
    let fixture = TestFixture::with_connectivity(false).await;

    let (_, body) = fixture.get_json("/api/network").await;
    assert_eq!(body["data"]["online"], false);

    let resp = fixture
        .client
        .put(fixture.url("/api/network"))
        .json(&serde_json::json!({ "online": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (status, _) = fixture.post_json("/api/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fixture.hits.count(), 2);
}

#[tokio::test]
async fn test_upload_header_only_is_refused() {
    let fixture = TestFixture::new().await;

    let (status, _) = fixture.upload("roster", ROSTER_CSV).await;
    assert_eq!(status, StatusCode::OK);
    let (_, before) = fixture.get_json("/api/collections/roster/records").await;

    let (status, body) = fixture.upload("roster", "No,Reg. NO,CATEGORY,RP NO,Name\n").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "EMPTY_RESULT");

    let (_, after) = fixture.get_json("/api/collections/roster/records").await;
    assert_eq!(before["data"], after["data"]);
}

#[tokio::test]
async fn test_upload_invalid_utf8_is_replaced() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .upload("attendance", b"Dept,Name\nIT,\xff\xfe\n".to_vec())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["inserted"], 1);

    let (_, body) = fixture.get_json("/api/collections/attendance/records").await;
    assert_eq!(body["data"]["records"][0]["Name"], "\u{fffd}\u{fffd}");
}

#[tokio::test]
async fn test_upload_reports_rejected_rows() {
    let fixture = TestFixture::new().await;

    let csv = "Reg. NO,Name\n1,Perera\n1,Again\n,No key\n2,Silva\n";
    let (status, body) = fixture.upload("roster", csv).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["inserted"], 2);
    let rejected = body["data"]["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0]["index"], 1);
    assert_eq!(rejected[1]["index"], 2);
}

#[tokio::test]
async fn test_roster_view_filters() {
    let fixture = TestFixture::new().await;
    fixture.upload("roster", ROSTER_CSV).await;

    let (status, body) = fixture.get_json("/api/roster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 3);
    assert_eq!(body["data"]["facetColumn"], "CATEGORY");
    assert_eq!(body["data"]["facets"], serde_json::json!(["Casual", "Staff"]));
    assert_eq!(body["data"]["stats"]["distinctFacets"], 2);
    assert_eq!(
        body["data"]["columns"],
        serde_json::json!(["No", "Reg. NO", "CATEGORY", "RP NO", "Name"])
    );

    let (_, body) = fixture
        .get_json("/api/roster?category=Staff&name=fern")
        .await;
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(
        body["data"]["rows"][0],
        serde_json::json!(["3", "1003", "Staff", "RP-3", "A. Fernando"])
    );
}

#[tokio::test]
async fn test_view_refreshes_after_upload() {
    let fixture = TestFixture::new().await;

    let (_, body) = fixture.get_json("/api/roster").await;
    assert_eq!(body["data"]["stats"]["total"], 0);
    assert_eq!(body["data"]["stats"]["lastUpdated"], "Never");

    fixture.upload("roster", ROSTER_CSV).await;

    let (_, body) = fixture.get_json("/api/roster").await;
    assert_eq!(body["data"]["stats"]["total"], 3);
    assert_ne!(body["data"]["stats"]["lastUpdated"], "Never");
}

#[tokio::test]
async fn test_attendance_view_date_filter() {
    let fixture = TestFixture::new().await;
    fixture.upload("attendance", ATTENDANCE_CSV).await;

    let (_, body) = fixture.get_json("/api/attendance?date=2024-01-03").await;
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["rows"][0][2], "N. Silva");

    let (_, body) = fixture.get_json("/api/attendance?dept=IT&enroll=50").await;
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["rows"][0][5], "08:01");
}

#[tokio::test]
async fn test_export_and_reimport() {
    let fixture = TestFixture::new().await;
    fixture.upload("roster", ROSTER_CSV).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/roster/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let disposition = resp
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("employees_"));
    assert!(disposition.ends_with(".csv\""));
    let csv = resp.text().await.unwrap();
    assert!(csv.starts_with("No,Reg. NO,CATEGORY,RP NO,Name\r\n"));

    let (_, before) = fixture.get_json("/api/collections/roster/records").await;
    let (status, _) = fixture.upload("roster", csv).await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = fixture.get_json("/api/collections/roster/records").await;

    assert_eq!(before["data"]["records"], after["data"]["records"]);
}

#[tokio::test]
async fn test_export_filtered_and_empty() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/roster/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    fixture.upload("roster", ROSTER_CSV).await;

    let csv = fixture
        .client
        .get(fixture.url("/api/roster/export?category=Casual"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("N. Silva"));
}
