//! End-to-end transfers through the CLI handlers against a mock ClickHouse
//! HTTP interface.
//!
//! The mock serves one database, `analytics`, with a pre-filled `events`
//! table and records every statement and inserted line it receives. Tables
//! it is asked to create can be described afterwards. It also serves a
//! delimited file over plain HTTP for remote imports.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use clickhouse_flatfile_sync::commands::transfer::{
    execute, export_query_request, export_request, import_request,
};
use clickhouse_flatfile_sync::{ClickHouseArgs, FileArgs, TransferArgs};
use csv_types::Delimiter;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_core::{ColumnSelection, ErrorKind};
use tempfile::TempDir;
use tokio::net::TcpListener;

const EVENTS_SCHEMA: &str = concat!(
    "{\"name\":\"id\",\"type\":\"UInt64\",\"default_type\":\"\"}\n",
    "{\"name\":\"label\",\"type\":\"Nullable(String)\",\"default_type\":\"\"}\n",
    "{\"name\":\"at\",\"type\":\"DateTime\",\"default_type\":\"\"}\n",
);

const REMOTE_CSV: &str = "id|name\n10|remote\n11|file\n";

#[derive(Default)]
struct MockClickHouse {
    statements: Mutex<Vec<String>>,
    inserted: Mutex<Vec<String>>,
    /// DESCRIBE output of created tables, by table name
    created: Mutex<HashMap<String, String>>,
}

impl MockClickHouse {
    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn inserted(&self) -> Vec<JsonValue> {
        self.inserted
            .lock()
            .unwrap()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Remember the columns of `CREATE TABLE IF NOT EXISTS analytics.<t> (..)`.
fn record_create(mock: &MockClickHouse, sql: &str) {
    let rest = sql.trim_start_matches("CREATE TABLE IF NOT EXISTS analytics.");
    let (table, rest) = rest.split_once(" (").unwrap();
    let (definitions, _) = rest.rsplit_once(") ENGINE").unwrap();
    let describe: String = definitions
        .split(", ")
        .map(|definition| {
            let (name, column_type) = definition.split_once(' ').unwrap();
            format!("{}\n", json!({"name": name, "type": column_type, "default_type": ""}))
        })
        .collect();
    mock.created
        .lock()
        .unwrap()
        .entry(table.to_string())
        .or_insert(describe);
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

async fn handle(
    State(mock): State<Arc<MockClickHouse>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let user = headers.get("X-ClickHouse-User").and_then(|v| v.to_str().ok());
    let key = headers.get("X-ClickHouse-Key").and_then(|v| v.to_str().ok());
    if user != Some("default") || key != Some("secret") {
        return error(
            StatusCode::FORBIDDEN,
            "Code: 516. DB::Exception: Authentication failed. (AUTHENTICATION_FAILED)",
        );
    }

    if let Some(insert) = params.get("query") {
        mock.statements.lock().unwrap().push(insert.clone());
        if insert.contains("broken") {
            return error(
                StatusCode::BAD_REQUEST,
                "Code: 27. DB::Exception: Cannot parse input. (CANNOT_PARSE_INPUT_ASSERTION_FAILED)",
            );
        }
        mock.inserted
            .lock()
            .unwrap()
            .extend(body.lines().map(str::to_string));
        return StatusCode::OK.into_response();
    }

    let sql = body.trim().to_string();
    mock.statements.lock().unwrap().push(sql.clone());

    match sql.as_str() {
        "SELECT 1" => "1\n".into_response(),
        "DESCRIBE TABLE analytics.events FORMAT JSONEachRow" => EVENTS_SCHEMA.into_response(),
        "DESCRIBE TABLE analytics.broken FORMAT JSONEachRow" => {
            "{\"name\":\"id\",\"type\":\"Int64\",\"default_type\":\"\"}\n".into_response()
        }
        "SELECT id, label, at FROM analytics.events" => concat!(
            "[\"id\",\"label\",\"at\"]\n",
            "[\"UInt64\",\"Nullable(String)\",\"DateTime\"]\n",
            "[\"1\",\"a\",\"2024-01-02 03:04:05\"]\n",
            "[\"2\",null,\"2024-01-03 00:00:00\"]\n",
            "[\"3\",\"x,y\",\"2024-01-04 12:00:00\"]\n",
        )
        .into_response(),
        "SELECT label, id FROM analytics.events" => concat!(
            "[\"label\",\"id\"]\n",
            "[\"Nullable(String)\",\"UInt64\"]\n",
            "[\"a\",\"1\"]\n",
        )
        .into_response(),
        "SELECT id, count() AS n FROM analytics.events GROUP BY id" => concat!(
            "[\"id\",\"n\"]\n",
            "[\"UInt64\",\"UInt64\"]\n",
            "[\"1\",\"2\"]\n",
            "[\"2\",\"5\"]\n",
        )
        .into_response(),
        s if s.starts_with("CREATE TABLE IF NOT EXISTS analytics.events ") => {
            StatusCode::OK.into_response()
        }
        s if s.starts_with("CREATE TABLE IF NOT EXISTS") => {
            record_create(&mock, s);
            StatusCode::OK.into_response()
        }
        s if s.starts_with("DESCRIBE TABLE analytics.") => {
            let table = s
                .trim_start_matches("DESCRIBE TABLE analytics.")
                .trim_end_matches(" FORMAT JSONEachRow");
            match mock.created.lock().unwrap().get(table) {
                Some(describe) => describe.clone().into_response(),
                None => error(
                    StatusCode::NOT_FOUND,
                    "Code: 60. DB::Exception: Table does not exist. (UNKNOWN_TABLE)",
                ),
            }
        }
        _ => error(
            StatusCode::BAD_REQUEST,
            "Code: 62. DB::Exception: Syntax error. (SYNTAX_ERROR)",
        ),
    }
}

async fn start_mock() -> (String, Arc<MockClickHouse>) {
    let mock = Arc::new(MockClickHouse::default());
    let app = Router::new()
        .route("/", post(handle))
        .route("/files/remote.psv", get(|| async { REMOTE_CSV }))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (endpoint, mock)
}

fn clickhouse(endpoint: &str) -> ClickHouseArgs {
    ClickHouseArgs {
        clickhouse_endpoint: endpoint.to_string(),
        clickhouse_database: "analytics".to_string(),
        clickhouse_user: "default".to_string(),
        clickhouse_password: "secret".to_string(),
    }
}

fn transfer_args(batch_size: usize) -> TransferArgs {
    TransferArgs {
        batch_size,
        best_effort: false,
        timeout: "30s".to_string(),
        emit_metrics: None,
    }
}

fn file_args(file: String, delimiter: Delimiter) -> FileArgs {
    FileArgs { file, delimiter }
}

#[tokio::test]
async fn test_import_with_create_table() {
    let (endpoint, mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    std::fs::write(
        &path,
        concat!(
            "id,name,score,active,seen\n",
            "1,ann,1.5,true,2024-01-02 03:04:05\n",
            "2,bob,2.25,false,\n",
            "3,cy,3.5,true,2024-05-06 07:08:09\n",
        ),
    )
    .unwrap();

    let request = import_request(
        &file_args(path.display().to_string(), Delimiter::Comma),
        "people",
        ColumnSelection::All,
        true,
        &transfer_args(2),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_transferred, 3);
    assert_eq!(result.batches_attempted, 2);
    assert_eq!(result.batches_succeeded, 2);

    let statements = mock.statements();
    let create = statements
        .iter()
        .find(|s| s.starts_with("CREATE TABLE"))
        .unwrap();
    assert!(create.contains("analytics.people"));
    assert!(create.contains("id Nullable(Int64)"));
    assert!(create.contains("score Nullable(Float64)"));
    assert!(create.contains("active Nullable(Bool)"));
    assert!(create.contains("seen Nullable(DateTime)"));

    let inserts: Vec<_> = statements
        .iter()
        .filter(|s| s.starts_with("INSERT INTO analytics.people"))
        .collect();
    assert_eq!(inserts.len(), 2);

    assert_eq!(
        mock.inserted(),
        vec![
            json!({"id": 1, "name": "ann", "score": 1.5, "active": true, "seen": "2024-01-02 03:04:05"}),
            json!({"id": 2, "name": "bob", "score": 2.25, "active": false, "seen": null}),
            json!({"id": 3, "name": "cy", "score": 3.5, "active": true, "seen": "2024-05-06 07:08:09"}),
        ]
    );
}

#[tokio::test]
async fn test_import_with_create_into_existing_table() {
    let (endpoint, mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labels.csv");
    std::fs::write(&path, "id,label\n5,42\n6,\n").unwrap();

    let request = import_request(
        &file_args(path.display().to_string(), Delimiter::Comma),
        "events",
        ColumnSelection::All,
        true,
        &transfer_args(10),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    let statements = mock.statements();
    assert!(statements
        .iter()
        .any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS analytics.events ")));
    // label is a String column, whatever the file looks like
    assert_eq!(
        mock.inserted(),
        vec![
            json!({"id": 5, "label": "42"}),
            json!({"id": 6, "label": null}),
        ]
    );
}

#[tokio::test]
async fn test_import_remote_file() {
    let (endpoint, mock) = start_mock().await;

    let request = import_request(
        &file_args(format!("{endpoint}/files/remote.psv"), Delimiter::Pipe),
        "remote",
        ColumnSelection::Named(vec!["name".into(), "id".into()]),
        true,
        &transfer_args(100),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_transferred, 2);
    assert!(mock
        .statements()
        .iter()
        .any(|s| s == "INSERT INTO analytics.remote (name, id) FORMAT JSONEachRow"));
    assert_eq!(
        mock.inserted(),
        vec![
            json!({"name": "remote", "id": 10}),
            json!({"name": "file", "id": 11}),
        ]
    );
}

#[tokio::test]
async fn test_import_failed_batch_stops_transfer() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ids.csv");
    std::fs::write(&path, "id\n1\n2\n3\n").unwrap();

    let request = import_request(
        &file_args(path.display().to_string(), Delimiter::Comma),
        "broken",
        ColumnSelection::All,
        false,
        &transfer_args(1),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.rows_transferred, 0);
    assert_eq!(result.batches_attempted, 1);
    let error = result.first_error.unwrap();
    assert_eq!(error.kind, ErrorKind::BatchWrite);
    assert_eq!(error.batch_index, Some(0));
}

#[tokio::test]
async fn test_import_into_missing_table_without_create() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ids.csv");
    std::fs::write(&path, "id\n1\n").unwrap();

    let request = import_request(
        &file_args(path.display().to_string(), Delimiter::Comma),
        "nowhere",
        ColumnSelection::All,
        false,
        &transfer_args(10),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert_eq!(result.batches_attempted, 0);
    assert_eq!(result.first_error.unwrap().kind, ErrorKind::Schema);
}

#[tokio::test]
async fn test_export_table() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out").join("events.csv");

    let request = export_request(
        "events",
        ColumnSelection::All,
        &output,
        Delimiter::Comma,
        &transfer_args(2),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_transferred, 3);
    assert_eq!(result.batches_succeeded, 2);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        concat!(
            "id,label,at\n",
            "1,a,2024-01-02 03:04:05\n",
            "2,,2024-01-03 00:00:00\n",
            "3,\"x,y\",2024-01-04 12:00:00\n",
        )
    );
}

#[tokio::test]
async fn test_export_selected_columns_with_metrics() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("labels.tsv");
    let metrics = dir.path().join("metrics.jsonl");

    let request = export_request(
        "events",
        ColumnSelection::Named(vec!["label".into(), "id".into()]),
        &output,
        Delimiter::Tab,
        &transfer_args(10),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), Some(metrics.clone()))
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "label\tid\na\t1\n"
    );

    let snapshots = std::fs::read_to_string(&metrics).unwrap();
    assert!(snapshots.lines().any(|line| {
        let entry: JsonValue = serde_json::from_str(line).unwrap();
        entry["rows_transferred"] == json!(1) && entry["batches_written"] == json!(1)
    }));
}

#[tokio::test]
async fn test_export_query() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("counts.csv");

    let request = export_query_request(
        "SELECT id, count() AS n FROM analytics.events GROUP BY id",
        &output,
        Delimiter::Comma,
        &transfer_args(1),
    )
    .unwrap();
    let result = execute(request, &clickhouse(&endpoint), None)
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.batches_succeeded, 2);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "id,n\n1,2\n2,5\n"
    );
}

#[tokio::test]
async fn test_export_query_rejects_writes_before_connecting() {
    let dir = TempDir::new().unwrap();
    let request = export_query_request(
        "DROP TABLE analytics.events",
        &dir.path().join("x.csv"),
        Delimiter::Comma,
        &transfer_args(10),
    )
    .unwrap();

    // Nothing listens on this endpoint; planning fails first
    let err = execute(request, &clickhouse("http://127.0.0.1:1"), None)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Invalid transfer request"));
    assert!(!dir.path().join("x.csv").exists());
}

#[tokio::test]
async fn test_bad_credentials_reported_as_connection_error() {
    let (endpoint, _mock) = start_mock().await;
    let dir = TempDir::new().unwrap();

    let mut args = clickhouse(&endpoint);
    args.clickhouse_password = "wrong".to_string();

    let request = export_request(
        "events",
        ColumnSelection::All,
        &dir.path().join("events.csv"),
        Delimiter::Comma,
        &transfer_args(10),
    )
    .unwrap();
    let result = execute(request, &args, None).await.unwrap();
    assert_eq!(result.first_error.unwrap().kind, ErrorKind::Connection);
}
