// src/api/mod.rs
// HTTP surface: ingest, query and monitoring routes.

use actix_cors::Cors;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, App, Error, HttpMessage, HttpRequest, HttpResponse, HttpServer};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::errors::{IngestError, QueryError};
use crate::ingest::{IngestCoordinator, Upload};
use crate::middleware::{RequestId, RequestIdValue};
use crate::monitoring::HealthTracker;
use crate::query::QueryCoordinator;

const FILE_FIELD: &str = "file";

/// Shared handler state, built once in `main` and cloned into each worker.
pub struct AppState {
    pub ingest: Arc<IngestCoordinator>,
    pub query: Arc<QueryCoordinator>,
    pub health: Arc<HealthTracker>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Adds a `debug` field to error payloads (APP_ENV=development).
    pub expose_debug: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Error)]
enum ReceiveError {
    #[error("file exceeds the {0} byte upload limit")]
    TooLarge(usize),

    #[error("upload stream failed: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload worker failed: {0}")]
    Blocking(#[from] BlockingError),
}

fn request_id_of(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestIdValue>()
        .map(|v| v.0.clone())
        .unwrap_or_default()
}

fn error_body(error: &str, details: Option<String>, debug: Option<String>) -> Value {
    let mut body = Map::new();
    body.insert("error".into(), json!(error));
    if let Some(details) = details {
        body.insert("details".into(), json!(details));
    }
    if let Some(debug) = debug {
        body.insert("debug".into(), json!(debug));
    }
    Value::Object(body)
}

/// Client errors carry only `error`; server errors add the cause in `details`.
fn error_response<E: std::fmt::Debug + std::fmt::Display>(
    status: StatusCode,
    public: &str,
    err: &E,
    expose_debug: bool,
) -> HttpResponse {
    let details = status.is_server_error().then(|| err.to_string());
    let debug = expose_debug.then(|| format!("{:?}", err));
    HttpResponse::build(status).json(error_body(public, details, debug))
}

async fn root_handler() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(json!({ "message": "Visual RAG API is running!" })))
}

async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(state.health.get_status()))
}

/// GET /monitoring/metrics in Prometheus text format
async fn get_metrics() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(crate::monitoring::export_prometheus()))
}

async fn ingest_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let request_id = request_id_of(&req);

    let upload = match receive_upload(payload, &state.upload_dir, state.max_upload_bytes).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return Ok(HttpResponse::BadRequest().json(error_body("No file uploaded", None, None)));
        }
        Err(e @ ReceiveError::TooLarge(_)) => {
            warn!(request_id = %request_id, error = %e, "Upload rejected");
            return Ok(HttpResponse::BadRequest().json(error_body(&e.to_string(), None, None)));
        }
        // Wrong content type or a malformed body: nothing usable was uploaded.
        Err(e @ ReceiveError::Multipart(_)) => {
            warn!(request_id = %request_id, error = %e, "Upload rejected");
            return Ok(HttpResponse::BadRequest().json(error_body("No file uploaded", None, None)));
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to receive upload");
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing failed",
                &e,
                state.expose_debug,
            ));
        }
    };

    info!(request_id = %request_id, file = %upload.original_name, "Upload received");
    match state.ingest.ingest(upload).await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "message": "File processed & stored successfully.",
            "storedChunks": report.stored_count,
            "chartsExtracted": report.charts_extracted,
            "timestamp": report.timestamp,
            "fileProcessed": report.source_name,
            "previousCleared": report.previous_cleared,
        }))),
        Err(e) => Ok(ingest_error_response(&e, &request_id, state.expose_debug)),
    }
}

fn ingest_error_response(err: &IngestError, request_id: &str, expose_debug: bool) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!(request_id = %request_id, error = %err, "Ingest failed");
    }
    error_response(status, err.public_message(), err, expose_debug)
}

async fn query_handler(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<HttpResponse, Error> {
    let request_id = request_id_of(&req);

    match state.query.query(&body.query).await {
        Ok(answer) => Ok(HttpResponse::Ok().json(answer)),
        Err(e) => Ok(query_error_response(&e, &request_id, state.expose_debug)),
    }
}

fn query_error_response(err: &QueryError, request_id: &str, expose_debug: bool) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!(request_id = %request_id, error = %err, "Query failed");
    }
    error_response(status, err.public_message(), err, expose_debug)
}

/// Streams the multipart `file` field into a temp file under `upload_dir`.
/// The temp file keeps the original extension so extension-sensitive readers
/// see the right format. Returns `None` when no file field was sent.
async fn receive_upload(
    mut payload: Multipart,
    upload_dir: &Path,
    max_bytes: usize,
) -> Result<Option<Upload>, ReceiveError> {
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match (field.name() == Some(FILE_FIELD), filename) {
            (true, Some(filename)) if upload.is_none() && !filename.trim().is_empty() => {
                let file = write_field(&mut field, upload_dir, &filename, max_bytes).await?;
                upload = Some(Upload::new(filename, file));
            }
            _ => drain(&mut field).await?,
        }
    }
    Ok(upload)
}

async fn write_field(
    field: &mut Field,
    upload_dir: &Path,
    filename: &str,
    max_bytes: usize,
) -> Result<NamedTempFile, ReceiveError> {
    let dir = upload_dir.to_path_buf();
    let suffix = temp_suffix(filename);
    let mut file = web::block(move || {
        std::fs::create_dir_all(&dir)?;
        tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&dir)
    })
    .await??;

    let mut written = 0usize;
    while let Some(chunk) = field.next().await {
        let data = chunk?;
        written += data.len();
        if written > max_bytes {
            return Err(ReceiveError::TooLarge(max_bytes));
        }
        file = web::block(move || file.write_all(&data).map(|_| file)).await??;
    }
    Ok(file)
}

async fn drain(field: &mut Field) -> Result<(), ReceiveError> {
    while let Some(chunk) = field.next().await {
        chunk?;
    }
    Ok(())
}

/// `.ext` of the original name when it is a plain alphanumeric extension.
fn temp_suffix(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(error_body("Invalid JSON body", Some(err.to_string()), None));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::scope("/monitoring")
                .route("/health", web::get().to(health_check))
                .route("/metrics", web::get().to(get_metrics)),
        )
        .route("/", web::get().to(root_handler))
        .route("/ingest", web::post().to(ingest_handler))
        .route("/query", web::post().to(query_handler));
}

pub fn start_api_server(
    bind_addr: &str,
    state: web::Data<AppState>,
) -> std::io::Result<actix_web::dev::Server> {
    let health = Arc::clone(&state.health);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::AUTHORIZATION,
            ])
            .expose_headers(vec![crate::middleware::REQUEST_ID_HEADER])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(RequestId)
            .wrap(cors)
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    health.mark_ready();
    info!(addr = %bind_addr, "API server listening");
    Ok(server)
}
