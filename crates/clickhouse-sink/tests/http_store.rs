//! Integration tests for `ClickHouseStore` against a mock HTTP interface.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use clickhouse_sink::{ClickHouseOpts, ClickHouseStore, StoreAdapter, StoreQuery};
use clickhouse_types::map_to_destination_columns;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_core::{ColumnDescriptor, ErrorKind, InferredType, Row, SchemaError, TransferError, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct MockClickHouse {
    statements: Mutex<Vec<String>>,
    inserted: Mutex<Vec<String>>,
    params: Mutex<Vec<HashMap<String, String>>>,
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
        return (
            StatusCode::FORBIDDEN,
            "Code: 516. DB::Exception: default: Authentication failed. (AUTHENTICATION_FAILED)",
        )
            .into_response();
    }
    mock.params.lock().unwrap().push(params.clone());

    if let Some(insert) = params.get("query") {
        mock.statements.lock().unwrap().push(insert.clone());
        if insert.contains("broken") {
            return (
                StatusCode::BAD_REQUEST,
                "Code: 27. DB::Exception: Cannot parse input. (CANNOT_PARSE_INPUT_ASSERTION_FAILED)",
            )
                .into_response();
        }
        mock.inserted.lock().unwrap().extend(body.lines().map(str::to_string));
        return StatusCode::OK.into_response();
    }

    let sql = body.trim().to_string();
    mock.statements.lock().unwrap().push(sql.clone());

    if sql == "SELECT 1" {
        "1\n".into_response()
    } else if sql.starts_with("SHOW TABLES FROM analytics") {
        "{\"name\":\"events\"}\n{\"name\":\"users\"}\n".into_response()
    } else if sql.starts_with("EXISTS TABLE") {
        if sql.contains("events") { "1\n" } else { "0\n" }.into_response()
    } else if sql == "DESCRIBE TABLE analytics.events FORMAT JSONEachRow" {
        concat!(
            "{\"name\":\"id\",\"type\":\"UInt64\",\"default_type\":\"\"}\n",
            "{\"name\":\"label\",\"type\":\"LowCardinality(Nullable(String))\",\"default_type\":\"\"}\n",
            "{\"name\":\"at\",\"type\":\"DateTime\",\"default_type\":\"\"}\n",
        )
        .into_response()
    } else if sql.starts_with("DESCRIBE TABLE") {
        (
            StatusCode::NOT_FOUND,
            "Code: 60. DB::Exception: Table analytics.missing does not exist. (UNKNOWN_TABLE)",
        )
            .into_response()
    } else if sql.starts_with("SELECT id, label FROM analytics.events") {
        concat!(
            "[\"id\",\"label\"]\n",
            "[\"UInt64\",\"Nullable(String)\"]\n",
            "[\"1\",\"a\"]\n",
            "[\"2\",null]\n",
            "[\"3\",\"c\"]\n",
        )
        .into_response()
    } else if sql == "SELECT amount FROM ledger" {
        if params.get("output_format_json_quote_decimals").map(String::as_str) != Some("1") {
            return "[\"amount\"]\n[\"Decimal(38, 10)\"]\n[12345678901234567890.123456789]\n"
                .into_response();
        }
        concat!(
            "[\"amount\"]\n",
            "[\"Decimal(38, 10)\"]\n",
            "[\"12345678901234567890.1234567890\"]\n",
            "[null]\n",
        )
        .into_response()
    } else if sql.starts_with("CREATE TABLE IF NOT EXISTS") {
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            "Code: 62. DB::Exception: Syntax error. (SYNTAX_ERROR)",
        )
            .into_response()
    }
}

async fn start_mock() -> (String, Arc<MockClickHouse>, tokio::task::JoinHandle<()>) {
    let mock = Arc::new(MockClickHouse::default());
    let app = Router::new()
        .route("/", post(handle))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (endpoint, mock, handle)
}

fn store(endpoint: &str, password: &str) -> ClickHouseStore {
    ClickHouseStore::new(ClickHouseOpts::new(endpoint, "analytics", "default", password)).unwrap()
}

#[tokio::test]
async fn test_metadata_operations() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();
    let (endpoint, mock, server) = start_mock().await;
    let store = store(&endpoint, "secret");

    store.ping().await.unwrap();
    assert_eq!(store.list_tables().await.unwrap(), vec!["events", "users"]);
    assert!(store.table_exists("events").await.unwrap());
    assert!(!store.table_exists("other").await.unwrap());

    let schema = store.fetch_schema("events").await.unwrap();
    assert_eq!(
        schema,
        vec![
            ColumnDescriptor::new("id", InferredType::Integer),
            ColumnDescriptor::nullable("label", InferredType::Text),
            ColumnDescriptor::new("at", InferredType::DateTime),
        ]
    );

    let err = store.fetch_schema("missing").await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Schema(SchemaError::TableNotFound(ref t)) if t == "missing"
    ));

    let params = mock.params.lock().unwrap();
    assert!(params.iter().all(|p| p.get("database").map(String::as_str) == Some("analytics")));
    drop(params);
    server.abort();
}

#[tokio::test]
async fn test_bad_credentials_are_connection_errors() {
    let (endpoint, _mock, server) = start_mock().await;
    let err = store(&endpoint, "wrong").ping().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    server.abort();
}

#[tokio::test]
async fn test_unreachable_store() {
    // Bind and drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = store(&endpoint, "secret").ping().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_read_batch_after_last_row() {
    let (endpoint, _mock, server) = start_mock().await;
    let store = store(&endpoint, "secret");

    let query = StoreQuery::Table {
        table: "events".into(),
        columns: vec!["id".into(), "label".into()],
    };
    let mut rows = store.query_rows(&query, None).await.unwrap();
    assert_eq!(rows.read_batch(2).await.unwrap().len(), 2);
    assert_eq!(rows.read_batch(2).await.unwrap().len(), 1);
    assert!(rows.read_batch(2).await.unwrap().is_empty());
    assert!(rows.read_batch(2).await.unwrap().is_empty());
    server.abort();
}

#[tokio::test]
async fn test_query_rows_streams_compact_rows() {
    let (endpoint, mock, server) = start_mock().await;
    let store = store(&endpoint, "secret");

    let query = StoreQuery::Table {
        table: "events".into(),
        columns: vec!["id".into(), "label".into()],
    };
    let mut rows = store.query_rows(&query, Some(10)).await.unwrap();
    let columns = rows.columns().to_vec();
    assert_eq!(columns.len(), 2);

    let batch = rows.read_batch(100).await.unwrap();
    assert_eq!(batch.len(), 3);
    let second = batch[1].clone().into_row(&columns).unwrap();
    assert_eq!(second.get("id"), Some(&Value::Integer(2)));
    assert_eq!(second.get("label"), Some(&Value::Null));

    let statements = mock.statements.lock().unwrap().clone();
    assert_eq!(
        statements.last().map(String::as_str),
        Some("SELECT id, label FROM analytics.events LIMIT 10")
    );
    let params = mock.params.lock().unwrap().clone();
    assert_eq!(
        params.last().and_then(|p| p.get("default_format")).map(String::as_str),
        Some("JSONCompactEachRowWithNamesAndTypes")
    );
    server.abort();
}

#[tokio::test]
async fn test_decimal_digits_are_kept() {
    let (endpoint, _mock, server) = start_mock().await;
    let store = store(&endpoint, "secret");

    let mut rows = store
        .query_rows(&StoreQuery::Raw("SELECT amount FROM ledger".into()), None)
        .await
        .unwrap();
    let columns = rows.columns().to_vec();
    assert_eq!(columns[0].inferred_type, InferredType::Text);

    let batch = rows.read_batch(10).await.unwrap();
    assert_eq!(batch.len(), 2);
    let first = batch[0].clone().into_row(&columns).unwrap();
    assert_eq!(
        first.get("amount"),
        Some(&Value::Text("12345678901234567890.1234567890".into()))
    );
    let second = batch[1].clone().into_row(&columns).unwrap();
    assert_eq!(second.get("amount"), Some(&Value::Null));
    server.abort();
}

#[tokio::test]
async fn test_raw_query_failure_is_source_read() {
    let (endpoint, _mock, server) = start_mock().await;
    let err = store(&endpoint, "secret")
        .query_rows(&StoreQuery::Raw("SELEC nonsense".into()), None)
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::SourceRead);
    assert!(err.to_string().contains("SYNTAX_ERROR"));
    server.abort();
}

#[tokio::test]
async fn test_insert_and_create() {
    let (endpoint, mock, server) = start_mock().await;
    let store = store(&endpoint, "secret");

    let columns = vec![
        ColumnDescriptor::new("id", InferredType::Integer),
        ColumnDescriptor::new("ok", InferredType::Boolean),
    ];
    store
        .create_table("new table", &map_to_destination_columns(&columns).unwrap())
        .await
        .unwrap();

    let rows = vec![
        Row::from_pairs(0, vec![("id", Value::Integer(1)), ("ok", Value::Boolean(true))]),
        Row::from_pairs(1, vec![("id", Value::Integer(2)), ("ok", Value::Boolean(false))]),
    ];
    store.insert_batch("new table", &columns, &rows).await.unwrap();

    let inserted = mock.inserted.lock().unwrap().clone();
    assert_eq!(inserted, vec![r#"{"id":1,"ok":true}"#, r#"{"id":2,"ok":false}"#]);

    let statements = mock.statements.lock().unwrap().clone();
    assert!(statements[0].starts_with(
        "CREATE TABLE IF NOT EXISTS analytics.`new table` (id Int64, ok Bool)"
    ));
    assert_eq!(
        statements[1],
        "INSERT INTO analytics.`new table` (id, ok) FORMAT JSONEachRow"
    );
    let params = mock.params.lock().unwrap().clone();
    assert_eq!(
        params[1].get("date_time_input_format").map(String::as_str),
        Some("best_effort")
    );

    let err = store.insert_batch("broken", &columns, &rows).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BatchWrite);
    assert!(err.to_string().contains("Code: 27"));
    server.abort();
}
