// Bill Ledger - Web Server
// REST API over the bill store with Axum

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use bill_ledger::ingest::importer::{EMPTY_IMPORT_MESSAGE, UNSUPPORTED_FILE_MESSAGE};
use bill_ledger::{
    bills_in_month, bills_on_day, delete_bill, expand, get_all_bills, get_bill, insert_bills,
    load_settings, logging, mark_paid, open_database, record_import, update_bill, AppConfig, Bill,
    BillPatch, BillStub, DashboardStats, ImportConfig, ImportError, ImportOutcome, ImportSummary,
    Importer, SqliteBillSink, TEMPLATE_CSV, TEMPLATE_FILE_NAME,
};

/// Header carrying the uploaded file's name (percent-encoded)
const FILE_NAME_HEADER: &str = "x-file-name";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    import: Arc<ImportConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// Error envelope with `data: null`
fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    tracing::error!(error = %err, "{}", context);
    failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", context, err))
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Response> {
        self.db
            .lock()
            .map_err(|_| failure(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned"))
    }
}

#[derive(Deserialize)]
struct BillsQuery {
    /// `YYYY-MM`
    month: Option<String>,
    /// `YYYY-MM-DD`, wins over `month`
    day: Option<chrono::NaiveDate>,
}

/// POST /api/bills body: a stub plus an optional monthly repeat count
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBillRequest {
    #[serde(flatten)]
    stub: BillStub,
    #[serde(default)]
    repeat: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    message: String,
    summary: ImportSummary,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/bills?month=YYYY-MM | ?day=YYYY-MM-DD - List bills
async fn list_bills(State(state): State<AppState>, Query(query): Query<BillsQuery>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let bills = match get_all_bills(&conn) {
        Ok(bills) => bills,
        Err(e) => return internal_error("Error getting bills", e),
    };

    let response: Vec<Bill> = match (query.day, query.month.as_deref()) {
        (Some(day), _) => bills_on_day(&bills, day).into_iter().cloned().collect(),
        (None, Some(month)) => {
            let first = format!("{}-01", month.trim());
            match chrono::NaiveDate::parse_from_str(&first, "%Y-%m-%d") {
                Ok(date) => {
                    use chrono::Datelike;
                    bills_in_month(&bills, date.year(), date.month())
                        .into_iter()
                        .cloned()
                        .collect()
                }
                Err(_) => {
                    return failure(StatusCode::BAD_REQUEST, format!("invalid month '{}'", month))
                }
            }
        }
        (None, None) => bills,
    };

    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// POST /api/bills - Manual entry, optionally repeated monthly
async fn create_bills(
    State(state): State<AppState>,
    Json(request): Json<CreateBillRequest>,
) -> Response {
    let bills = match expand(&request.stub, request.repeat.unwrap_or(1)) {
        Ok(bills) => bills,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match insert_bills(&conn, &bills, "api") {
        Ok(_) => (StatusCode::CREATED, Json(ApiResponse::ok(bills))).into_response(),
        Err(e) => internal_error("Error saving bills", e),
    }
}

/// POST /api/import - Raw file text in the body, name in `X-File-Name`
async fn import_bills(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|name| name.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        });
    let source = file_name.clone().unwrap_or_else(|| "upload".to_string());
    let text = String::from_utf8_lossy(&body).into_owned();

    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let mut sink = SqliteBillSink::new(&conn, "api");
    let mut outcome: Option<ImportOutcome> = None;
    let mut reporter = |o: &ImportOutcome| outcome = Some(o.clone());

    let importer = Importer::new(state.import.as_ref().clone());
    let result = importer.import(file_name.as_deref(), &text, &mut sink, &mut reporter);
    let message = outcome.map(|o| o.message()).unwrap_or_default();

    match result {
        Ok(summary) => {
            if let Err(e) = record_import(&conn, &source, &text, summary.imported) {
                return internal_error("Error recording import", e);
            }
            let response = ImportResponse { message, summary };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(ImportError::UnsupportedFileType { .. }) => {
            failure(StatusCode::UNSUPPORTED_MEDIA_TYPE, UNSUPPORTED_FILE_MESSAGE)
        }
        Err(ImportError::EmptyImport { .. }) => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, EMPTY_IMPORT_MESSAGE)
        }
        Err(ImportError::Sink(e)) => internal_error("Error saving imported bills", e),
    }
}

/// PUT /api/bills/:id - Edit fields (including the receipt) of a bill
async fn edit_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BillPatch>,
) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let mut bill = match get_bill(&conn, &id) {
        Ok(Some(bill)) => bill,
        Ok(None) => return failure(StatusCode::NOT_FOUND, format!("bill {} not found", id)),
        Err(e) => return internal_error("Error loading bill", e),
    };

    if let Err(e) = patch.apply(&mut bill) {
        return failure(StatusCode::BAD_REQUEST, e.to_string());
    }

    match update_bill(&conn, &bill) {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::ok(bill))).into_response(),
        Err(e) => internal_error("Error updating bill", e),
    }
}

/// POST /api/bills/:id/pay - Mark a bill as paid
async fn pay_bill(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match mark_paid(&conn, &id) {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok(id))).into_response(),
        Ok(false) => failure(StatusCode::NOT_FOUND, format!("bill {} not found", id)),
        Err(e) => internal_error("Error updating bill", e),
    }
}

/// DELETE /api/bills/:id - Remove a bill
async fn remove_bill(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match delete_bill(&conn, &id) {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok(id))).into_response(),
        Ok(false) => failure(StatusCode::NOT_FOUND, format!("bill {} not found", id)),
        Err(e) => internal_error("Error deleting bill", e),
    }
}

/// GET /api/stats - Dashboard numbers
async fn get_stats(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let stats = get_all_bills(&conn).and_then(|bills| {
        let settings = load_settings(&conn)?;
        Ok(DashboardStats::compute(&bills, &settings))
    });

    match stats {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => internal_error("Error getting stats", e),
    }
}

/// GET /api/template - Download the CSV template
async fn get_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", TEMPLATE_FILE_NAME),
            ),
        ],
        TEMPLATE_CSV,
    )
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/bills", get(list_bills).post(create_bills))
        .route("/bills/:id", put(edit_bill).delete(remove_bill))
        .route("/bills/:id/pay", post(pay_bill))
        .route("/import", post(import_bills))
        .route("/stats", get(get_stats))
        .route("/template", get(get_template))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::from_env()?;

    println!("🌐 Bill Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.database_path)?;
    println!("✓ Database opened: {:?}", config.database_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        import: Arc::new(config.import.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/bills", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bill_ledger::setup_database;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        app(AppState {
            db: Arc::new(Mutex::new(conn)),
            import: Arc::new(ImportConfig::default()),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, json) = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_import_then_list_and_stats() {
        let app = test_app();
        let csv = "Descricao;Valor;Vencimento\nEnergia;150,50;10/12/2024\nInternet;99,90;\n";
        let request = Request::post("/api/import")
            .header(FILE_NAME_HEADER, "contas%20dez.csv")
            .body(Body::from(csv))
            .unwrap();

        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["summary"]["imported"], 1);
        assert_eq!(json["data"]["message"], "1 bills imported successfully!");

        let (_, json) = send(&app, Request::get("/api/bills").body(Body::empty()).unwrap()).await;
        assert_eq!(json["data"][0]["title"], "Energia");
        assert_eq!(json["data"][0]["dueDate"], "2024-12-10");

        let (_, json) = send(&app, Request::get("/api/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(json["data"]["totalPending"], 1);
    }

    #[tokio::test]
    async fn test_import_rejects_spreadsheet() {
        let app = test_app();
        let request = Request::post("/api/import")
            .header(FILE_NAME_HEADER, "contas.XLSX")
            .body(Body::from("PK\u{3}\u{4}"))
            .unwrap();

        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], UNSUPPORTED_FILE_MESSAGE);
    }

    #[tokio::test]
    async fn test_create_repeat_then_pay_and_delete() {
        let app = test_app();
        let body = r#"{"title":"Aluguel","value":1200.0,"dueDate":"2024-01-31","repeat":3}"#;
        let request = Request::post("/api/bills")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"][1]["title"], "Aluguel (2/3)");
        assert_eq!(json["data"][1]["dueDate"], "2024-02-29");

        let id = json["data"][0]["id"].as_str().unwrap().to_string();
        let pay = Request::post(format!("/api/bills/{}/pay", id)).body(Body::empty()).unwrap();
        let (status, _) = send(&app, pay).await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(&app, Request::get("/api/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(json["data"]["totalPaid"], 1200.0);

        let remove = Request::delete(format!("/api/bills/{}", id)).body(Body::empty()).unwrap();
        let (status, _) = send(&app, remove).await;
        assert_eq!(status, StatusCode::OK);

        let missing = Request::delete(format!("/api/bills/{}", id)).body(Body::empty()).unwrap();
        let (status, json) = send(&app, missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_repeat() {
        let app = test_app();
        let body = r#"{"title":"Aluguel","value":10.0,"dueDate":"2024-01-31","repeat":0}"#;
        let request = Request::post("/api/bills")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_template_download() {
        let app = test_app();
        let response = app
            .oneshot(Request::get("/api/template").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], TEMPLATE_CSV.as_bytes());
    }

    #[tokio::test]
    async fn test_edit_attaches_receipt_and_lists_by_day() {
        let app = test_app();
        let body = r#"{"title":"Energia","value":150.5,"dueDate":"2024-12-10"}"#;
        let create = Request::post("/api/bills")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let (_, json) = send(&app, create).await;
        let id = json["data"][0]["id"].as_str().unwrap().to_string();

        let patch = r#"{"receipt":"https://files.example.org/recibos/energia.pdf"}"#;
        let edit = Request::put(format!("/api/bills/{}", id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(patch))
            .unwrap();
        let (status, json) = send(&app, edit).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["receipt"], "https://files.example.org/recibos/energia.pdf");
        assert_eq!(json["data"]["title"], "Energia");

        let (_, json) = send(
            &app,
            Request::get("/api/bills?day=2024-12-10").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["receipt"], "https://files.example.org/recibos/energia.pdf");

        let (_, json) = send(
            &app,
            Request::get("/api/bills?day=2024-12-11").body(Body::empty()).unwrap(),
        )
        .await;
        assert!(json["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_rejects_empty_title_and_unknown_id() {
        let app = test_app();
        let patch = r#"{"title":"Agua"}"#;
        let missing = Request::put("/api/bills/unknown")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(patch))
            .unwrap();
        let (status, _) = send(&app, missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = r#"{"title":"Agua","value":80.0,"dueDate":"2024-01-05"}"#;
        let create = Request::post("/api/bills")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let (_, json) = send(&app, create).await;
        let id = json["data"][0]["id"].as_str().unwrap().to_string();

        let edit = Request::put(format!("/api/bills/{}", id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"  "}"#))
            .unwrap();
        let (status, json) = send(&app, edit).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "bill title is empty");
    }
}
