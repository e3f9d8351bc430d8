//! HTTP routes.
//!
//! Every handler parses its input, delegates to [`DocumentService`] and maps
//! failures to the shared error envelope.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ExtractionRequest, ExtractionResponse, LayoutResponse, TrainDocumentRequest,
    TrainDocumentSummary, TrainingRequest, TrainingResponse, UploadedFile,
};
use crate::service::DocumentService;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    response::Json,
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const WELCOME: &str = "Welcome to document extractor service....";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    let api = Router::new()
        .route("/extract-layout", post(extract_layout))
        .route("/extract-data", post(extract_data))
        .route("/build-model", post(build_model))
        .route("/train-document", post(train_document));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn welcome() -> &'static str {
    WELCOME
}

async fn health() -> &'static str {
    "ok"
}

/// Layout of an uploaded document (`file` part).
async fn extract_layout(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServiceResult<Json<LayoutResponse>> {
    const ROUTE: &str = "extract-layout";

    let mut form = read_form(ROUTE, multipart).await?;
    let file = form
        .take_file(&["file"])
        .ok_or_else(|| failed(ROUTE, ServiceError::InvalidRequest("missing 'file' part".to_string())))?;

    log_upload(ROUTE, &file);
    state
        .service
        .extract_layout(file)
        .await
        .map(Json)
        .map_err(|e| failed(ROUTE, e))
}

/// Data extraction from an upload (`fileName`) or a URI (`fileUri`), with an
/// optional model hint (`modelId`).
async fn extract_data(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServiceResult<Json<ExtractionResponse>> {
    const ROUTE: &str = "extract-data";

    let mut form = read_form(ROUTE, multipart).await?;
    let request = ExtractionRequest {
        model_id: form.take_text("modelid"),
        file: form.take_file(&["filename", "file"]),
        file_uri: form.take_text("fileuri"),
    };

    match &request.file {
        Some(file) => log_upload(ROUTE, file),
        None => info!(
            "{}: received uri {:?} (model hint {:?})",
            ROUTE, request.file_uri, request.model_id
        ),
    }

    state
        .service
        .extract_data(request)
        .await
        .map(Json)
        .map_err(|e| failed(ROUTE, e))
}

/// Custom model build from a JSON [`TrainingRequest`].
async fn build_model(
    State(state): State<AppState>,
    body: Result<Json<TrainingRequest>, JsonRejection>,
) -> ServiceResult<Json<TrainingResponse>> {
    const ROUTE: &str = "build-model";

    let Json(request) = body.map_err(|e| failed(ROUTE, ServiceError::InvalidRequest(e.body_text())))?;
    info!("{}: building custom model from {}", ROUTE, request.file_uri);

    state
        .service
        .build_custom_model(request)
        .await
        .map(Json)
        .map_err(|e| failed(ROUTE, e))
}

/// Prebuilt-model inference on an upload (`modelId`, `documentFile`).
async fn train_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServiceResult<Json<TrainDocumentSummary>> {
    const ROUTE: &str = "train-document";

    let mut form = read_form(ROUTE, multipart).await?;
    let model_id = form
        .take_text("modelid")
        .ok_or_else(|| failed(ROUTE, ServiceError::InvalidRequest("missing 'modelId' part".to_string())))?;
    let document = form
        .take_file(&["documentfile"])
        .ok_or_else(|| failed(ROUTE, ServiceError::InvalidRequest("missing 'documentFile' part".to_string())))?;

    log_upload(ROUTE, &document);
    state
        .service
        .train_document(TrainDocumentRequest { model_id, document })
        .await
        .map(Json)
        .map_err(|e| failed(ROUTE, e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Multipart parts keyed by lower-cased field name.
#[derive(Default)]
struct FormParts {
    texts: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormParts {
    fn take_text(&mut self, name: &str) -> Option<String> {
        self.texts.remove(name)
    }

    fn take_file(&mut self, names: &[&str]) -> Option<UploadedFile> {
        names.iter().find_map(|name| self.files.remove(*name))
    }
}

async fn read_form(
    route: &str,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServiceResult<FormParts> {
    let mut multipart =
        multipart.map_err(|e| failed(route, ServiceError::InvalidRequest(e.body_text())))?;
    let mut form = FormParts::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| failed(route, ServiceError::InvalidRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or_default().to_lowercase();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    failed(route, ServiceError::InvalidRequest(format!("Failed to read file: {}", e)))
                })?;
                // Browsers send an empty part for an unset file input.
                if data.is_empty() {
                    continue;
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content_type,
                        data,
                    },
                );
            }
            None => {
                let text = field.text().await.map_err(|e| {
                    failed(route, ServiceError::InvalidRequest(format!("Failed to read field: {}", e)))
                })?;
                form.texts.insert(name, text);
            }
        }
    }

    Ok(form)
}

fn log_upload(route: &str, file: &UploadedFile) {
    info!(
        "{}: received file {} ({} bytes, {})",
        route,
        file.file_name,
        file.data.len(),
        file.content_type.as_deref().unwrap_or("unknown type")
    );
}

fn failed(route: &str, err: ServiceError) -> ServiceError {
    error!(route, kind = err.kind(), "request failed: {}", err);
    err
}
