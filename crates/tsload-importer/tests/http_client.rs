use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tsload_core::Point;
use tsload_importer::{
    csv_reader, ensure_database, HttpStoreClient, HttpStoreConfig, ImportConfig, ImportError,
    Ingestor, StoreClient,
};

#[derive(Default)]
struct Recorded {
    statements: Vec<String>,
    writes: Vec<(HashMap<String, String>, String)>,
}

#[derive(Clone, Default)]
struct ServerState {
    recorded: Arc<Mutex<Recorded>>,
    reject_writes: bool,
}

async fn handle_query(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let statement = params.get("q").cloned().unwrap_or_default();
    state.recorded.lock().unwrap().statements.push(statement.clone());

    let body = if statement == "SHOW DATABASES" {
        json!({"results": [{"statement_id": 0, "series": [{
            "name": "databases",
            "columns": ["name"],
            "values": [["_internal"], ["test"]]
        }]}]})
    } else if statement.starts_with("SELECT count") {
        json!({"results": [{"statement_id": 0, "series": [{
            "name": "data",
            "columns": ["time", "count"],
            "values": [["1970-01-01T00:00:00Z", 3]]
        }]}]})
    } else if statement.starts_with("CREATE DATABASE") {
        json!({"results": [{"statement_id": 0}]})
    } else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported statement"})),
        );
    };
    (StatusCode::OK, Json(body))
}

async fn handle_write(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> StatusCode {
    if state.reject_writes {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    state.recorded.lock().unwrap().writes.push((params, body));
    StatusCode::NO_CONTENT
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/query", get(handle_query).post(handle_query))
        .route("/write", post(handle_write))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn client(server_url: String) -> HttpStoreClient {
    HttpStoreClient::new(&HttpStoreConfig {
        server_url,
        database: "test".into(),
        username: None,
        password: None,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn lists_and_creates_databases() {
    let state = ServerState::default();
    let client = client(spawn_server(state.clone()).await);

    let databases = client.list_databases().await.unwrap();
    assert_eq!(databases, vec!["_internal".to_string(), "test".to_string()]);

    assert!(!ensure_database(&client, "test", true).await.unwrap());
    assert!(ensure_database(&client, "metrics", true).await.unwrap());

    let statements = state.recorded.lock().unwrap().statements.clone();
    assert_eq!(statements.last().unwrap(), "CREATE DATABASE \"metrics\"");
}

#[tokio::test]
async fn writes_line_protocol_with_nanosecond_precision() {
    let state = ServerState::default();
    let client = client(spawn_server(state.clone()).await);

    let points = vec![
        Point::builder("data")
            .timestamp(1_704_067_200_000_000_000)
            .tag("host", "serverA")
            .field("cpu", 93.5_f64)
            .build()
            .unwrap(),
        Point::builder("data")
            .tag("host", "serverB")
            .field("cpu", 1_i64)
            .build()
            .unwrap(),
    ];

    let result = client.write(&points).await.unwrap();
    assert_eq!(result.points_written, 2);

    let recorded = state.recorded.lock().unwrap();
    let (params, body) = &recorded.writes[0];
    assert_eq!(params.get("db").map(String::as_str), Some("test"));
    assert_eq!(params.get("precision").map(String::as_str), Some("ns"));
    assert_eq!(
        body,
        "data,host=serverA cpu=93.5 1704067200000000000\ndata,host=serverB cpu=1i"
    );
    assert_eq!(result.bytes_sent, body.len());
}

#[tokio::test]
async fn counts_field_values() {
    let state = ServerState::default();
    let client = client(spawn_server(state.clone()).await);

    assert_eq!(client.count("data", "cpu").await.unwrap(), 3);
    let statements = state.recorded.lock().unwrap().statements.clone();
    assert_eq!(statements[0], "SELECT count(\"cpu\") FROM \"data\"");
}

#[tokio::test]
async fn rejected_write_is_a_server_error() {
    let state = ServerState {
        reject_writes: true,
        ..Default::default()
    };
    let client = client(spawn_server(state).await);

    let point = Point::builder("data").field("v", 1_i64).build().unwrap();
    let err = client.write(&[point]).await.unwrap_err();
    assert!(matches!(err, ImportError::Server { status: 503, .. }));
}

#[tokio::test]
async fn unreachable_server_is_a_connectivity_error() {
    // Grab a free port, then close it again
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{}", addr));
    let err = client.list_databases().await.unwrap_err();
    assert!(matches!(err, ImportError::Connectivity(_)));
}

#[tokio::test]
async fn awkward_tag_values_keep_one_line_per_point() {
    let state = ServerState::default();
    let client = client(spawn_server(state.clone()).await);
    let config = ImportConfig {
        tag_columns: "path".into(),
        ..Default::default()
    };

    let csv = "timestamp,path,used\n\
               2024-01-01 00:00:00,C:\\,1\n\
               2024-01-01 00:00:01,\"two\nlines\",2\n";
    let ingestor = Ingestor::new(&config, client).unwrap();
    let summary = ingestor
        .run(csv_reader(csv.as_bytes()).into_records())
        .await
        .unwrap();
    assert_eq!(summary.points_written, 2);

    let recorded = state.recorded.lock().unwrap();
    let lines: Vec<_> = recorded.writes[0].1.lines().collect();
    assert_eq!(
        lines,
        vec![
            "data,path=C:\\\\ used=1i 1704067200000000000",
            "data,path=two\\nlines used=2i 1704067201000000000",
        ]
    );
}
