//! Document service: the four operations behind the HTTP API.
//!
//! Each operation resolves a model id and a source, submits work to the
//! analysis backend, waits for the operation to finish and projects the
//! result into a response model.

use crate::analysis::poller::Waiter;
use crate::analysis::result::{AnalyzeResult, ModelDetails};
use crate::analysis::{AnalyzeSource, BuildMode, BuildRequest, Completed, DocumentAnalysis};
use crate::diagnostics;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ExtractionRequest, ExtractionResponse, FieldSchemaEntry, LayoutResponse, PageSummary,
    TrainDocumentRequest, TrainDocumentSummary, TrainingRequest, TrainingResponse, UploadedFile,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const LAYOUT_MODEL: &str = "prebuilt-layout";
pub const DEFAULT_MODEL: &str = "prebuilt-document";
const PREBUILT_PREFIX: &str = "prebuilt";

/// Model id for `/extract-data`: empty hints fall back to the general
/// document model, everything else goes through [`normalize_model_id`].
pub fn resolve_model_id(hint: Option<&str>) -> String {
    match hint {
        Some(hint) if !hint.trim().is_empty() => normalize_model_id(hint),
        _ => DEFAULT_MODEL.to_string(),
    }
}

/// Ids that are not already prebuilt ids become `prebuilt-<lowercased id>`.
pub fn normalize_model_id(id: &str) -> String {
    if id.starts_with(PREBUILT_PREFIX) {
        id.to_string()
    } else {
        format!("{}-{}", PREBUILT_PREFIX, id.to_lowercase())
    }
}

pub struct DocumentService {
    client: Arc<dyn DocumentAnalysis>,
    waiter: Waiter,
    template_prebuild: bool,
}

impl DocumentService {
    pub fn new(client: Arc<dyn DocumentAnalysis>, waiter: Waiter, template_prebuild: bool) -> Self {
        Self {
            client,
            waiter,
            template_prebuild,
        }
    }

    /// Layout of an uploaded document: per-page counts, paragraphs and tables.
    pub async fn extract_layout(&self, file: UploadedFile) -> ServiceResult<LayoutResponse> {
        let result = self.analyze(LAYOUT_MODEL, upload_source(file)).await?;

        let page_responses = result
            .pages
            .iter()
            .flatten()
            .map(|page| PageSummary {
                page: page.clone(),
                line_count: page.lines.len(),
                word_count: page.words.len(),
            })
            .collect();

        diagnostics::log_layout(&result);

        Ok(LayoutResponse {
            page_responses,
            paragraphs: result.paragraphs.unwrap_or_default(),
            tables: result.tables.unwrap_or_default(),
        })
    }

    /// Full analysis of an uploaded file, or of `file_uri` when no file was sent.
    pub async fn extract_data(&self, request: ExtractionRequest) -> ServiceResult<ExtractionResponse> {
        let model_id = resolve_model_id(request.model_id.as_deref());

        let source = match request.file {
            Some(file) => upload_source(file),
            None => {
                let uri = request.file_uri.unwrap_or_default();
                let url = url::Url::parse(&uri).map_err(|e| ServiceError::invalid_uri(&uri, e))?;
                AnalyzeSource::Url(url)
            }
        };

        let result = self.analyze(&model_id, source).await?;
        diagnostics::log_documents(&result);

        Ok(ExtractionResponse {
            content: result.content,
            pages: result.pages,
            tables: result.tables,
            paragraphs: result.paragraphs,
            documents: result.documents,
            key_value_pairs: result.key_value_pairs,
        })
    }

    /// Train a custom model from a blob container of labeled documents.
    ///
    /// With template pre-build enabled a template model is built and
    /// discarded before the neural build whose details are returned.
    pub async fn build_custom_model(&self, request: TrainingRequest) -> ServiceResult<TrainingResponse> {
        let container_url = url::Url::parse(&request.file_uri)
            .map_err(|e| ServiceError::invalid_uri(&request.file_uri, e))?;
        let prefix = request.folder_path.filter(|p| !p.is_empty());

        if self.template_prebuild {
            let template = self
                .build(BuildRequest {
                    model_id: Uuid::new_v4().to_string(),
                    build_mode: BuildMode::Template,
                    container_url: container_url.clone(),
                    prefix: prefix.clone(),
                    description: request.description.clone(),
                })
                .await?;
            info!(
                "Template model {} built; continuing with neural build",
                template.value.model_id
            );
        }

        let model_id = request
            .model_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let neural = self
            .build(BuildRequest {
                model_id,
                build_mode: BuildMode::Neural,
                container_url,
                prefix,
                description: request.description,
            })
            .await?;

        diagnostics::log_model(&neural.value);

        let Completed {
            value: model,
            created_on,
            last_updated_on,
        } = neural;

        Ok(TrainingResponse {
            field_schemata: collect_field_schemata(&model),
            model_id: model.model_id,
            created_on: model.created_date_time,
            description: model.description,
            training_started_on: created_on,
            training_completed_on: last_updated_on,
            status: "succeeded".to_string(),
        })
    }

    /// Analyze an upload with a prebuilt model and summarize it.
    ///
    /// Inference only; nothing is trained despite the route name.
    pub async fn train_document(&self, request: TrainDocumentRequest) -> ServiceResult<TrainDocumentSummary> {
        let model_id = normalize_model_id(&request.model_id);
        let result = self.analyze(&model_id, upload_source(request.document)).await?;

        diagnostics::log_documents(&result);

        Ok(TrainDocumentSummary {
            pages_count: result.pages.as_ref().map(Vec::len),
            tables_count: result.tables.as_ref().map(Vec::len),
            paragraph_count: result.paragraphs.as_ref().map(Vec::len),
            content: result.content,
        })
    }

    async fn analyze(&self, model_id: &str, source: AnalyzeSource) -> ServiceResult<AnalyzeResult> {
        info!("Analysis started: model={} source={}", model_id, source.describe());

        let operation = self.client.begin_analyze(model_id, &source).await?;
        let done = self
            .waiter
            .wait(&format!("analyze with {}", model_id), operation.retry_after, || {
                self.client.analyze_status(&operation)
            })
            .await?;

        info!(
            "Analysis finished: model={} pages={}",
            model_id,
            done.value.pages.as_ref().map_or(0, Vec::len)
        );
        Ok(done.value)
    }

    async fn build(&self, request: BuildRequest) -> ServiceResult<Completed<ModelDetails>> {
        info!(
            "Model build started: mode={} model={}",
            request.build_mode.as_str(),
            request.model_id
        );

        let operation = self.client.begin_build(&request).await?;
        let done = self
            .waiter
            .wait(
                &format!("{} build of {}", request.build_mode.as_str(), request.model_id),
                operation.retry_after,
                || self.client.build_status(&operation),
            )
            .await?;

        info!(
            "Model build finished: mode={} model={}",
            request.build_mode.as_str(),
            done.value.model_id
        );
        Ok(done)
    }
}

fn upload_source(file: UploadedFile) -> AnalyzeSource {
    AnalyzeSource::Bytes {
        filename: file.file_name,
        data: file.data,
    }
}

/// One entry per field across all document types; a field name defined by
/// several types keeps the last type's entry.
fn collect_field_schemata(model: &ModelDetails) -> BTreeMap<String, FieldSchemaEntry> {
    let mut schemata = BTreeMap::new();
    for (doc_type, details) in &model.doc_types {
        for (name, schema) in &details.field_schema {
            schemata.insert(
                name.clone(),
                FieldSchemaEntry {
                    field_schema: schema.clone(),
                    confidence_level: details.field_confidence.get(name).copied(),
                    document_type_key: doc_type.clone(),
                },
            );
        }
    }
    schemata
}
