//! Integration tests for reading delimited files over HTTP.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use csv_types::Delimiter;
use flatfile_sync_file::{read_delimited_sample, DelimitedReader, FileError, FileSource};
use tokio::net::TcpListener;

const TEST_CSV_DATA: &str = "id,name,age,active
1,Alice,30,true
2,Bob,25,false
3,Charlie,35,true
4,Diana,28,false
5,Eve,32,true";

/// HTTP handler that serves CSV data at a dynamic path
async fn serve_csv_with_path(Path(filename): Path<String>) -> Response {
    if filename == "users.csv" {
        (
            StatusCode::OK,
            [("Content-Type", "text/csv")],
            TEST_CSV_DATA,
        )
            .into_response()
    } else {
        (StatusCode::NOT_FOUND, "File not found").into_response()
    }
}

/// Start a test HTTP server serving CSV files
async fn start_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route("/data/:filename", get(serve_csv_with_path));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, server_handle)
}

#[tokio::test]
async fn test_read_csv_over_http() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();

    let (base_url, server_handle) = start_test_server().await;
    let source = FileSource::parse(&format!("{base_url}/data/users.csv")).unwrap();

    let mut reader = DelimitedReader::open(&source, Delimiter::Comma).await.unwrap();
    assert_eq!(reader.headers(), &["id", "name", "age", "active"]);

    let first = reader.read_batch(2).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[1].as_ref().unwrap().fields, vec!["2", "Bob", "25", "false"]);

    let rest = reader.read_batch(10).unwrap();
    assert_eq!(rest.len(), 3);
    assert_eq!(rest[2].as_ref().unwrap().index, 4);

    let (headers, sample) = read_delimited_sample(&source, Delimiter::Comma, 1)
        .await
        .unwrap();
    assert_eq!(headers.len(), 4);
    assert_eq!(sample.len(), 1);

    server_handle.abort();
}

#[tokio::test]
async fn test_http_not_found() {
    let (base_url, server_handle) = start_test_server().await;
    let source = FileSource::parse(&format!("{base_url}/data/missing.csv")).unwrap();

    let result = DelimitedReader::open(&source, Delimiter::Comma).await;
    assert!(matches!(result, Err(FileError::Http { .. })));

    server_handle.abort();
}
