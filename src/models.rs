//! Request and response models of the HTTP API.

use crate::analysis::result::{
    AnalyzedDocument, DocumentFieldSchema, DocumentKeyValuePair, DocumentPage, DocumentParagraph,
    DocumentTable,
};
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub model_id: Option<String>,
    pub file: Option<UploadedFile>,
    pub file_uri: Option<String>,
}

/// Body of `/build-model`. Keys match regardless of case, so `FileUri`,
/// `fileUri` and `fileuri` are the same field.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct TrainingRequest {
    pub file_uri: String,
    pub model_id: Option<String>,
    pub folder_path: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct LowercaseTrainingRequest {
    #[serde(rename = "fileuri", alias = "trainingfileuri")]
    file_uri: String,
    #[serde(default, rename = "modelid")]
    model_id: Option<String>,
    #[serde(default, rename = "folderpath")]
    folder_path: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<Map<String, Value>> for TrainingRequest {
    type Error = serde_json::Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let lowered: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();
        let raw: LowercaseTrainingRequest = serde_json::from_value(Value::Object(lowered))?;
        Ok(Self {
            file_uri: raw.file_uri,
            model_id: raw.model_id,
            folder_path: raw.folder_path,
            description: raw.description,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrainDocumentRequest {
    pub model_id: String,
    pub document: UploadedFile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResponse {
    pub page_responses: Vec<PageSummary>,
    pub paragraphs: Vec<DocumentParagraph>,
    pub tables: Vec<DocumentTable>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page: DocumentPage,
    pub line_count: usize,
    pub word_count: usize,
}

/// Collections the service did not return serialize as `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub content: String,
    pub pages: Option<Vec<DocumentPage>>,
    pub tables: Option<Vec<DocumentTable>>,
    pub paragraphs: Option<Vec<DocumentParagraph>>,
    pub documents: Option<Vec<AnalyzedDocument>>,
    pub key_value_pairs: Option<Vec<DocumentKeyValuePair>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResponse {
    pub model_id: String,
    pub created_on: DateTime<Utc>,
    pub description: Option<String>,
    pub training_started_on: Option<DateTime<Utc>>,
    pub training_completed_on: Option<DateTime<Utc>>,
    pub status: String,
    pub field_schemata: BTreeMap<String, FieldSchemaEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchemaEntry {
    pub field_schema: DocumentFieldSchema,
    pub confidence_level: Option<f32>,
    pub document_type_key: String,
}

/// Counts-only projection returned by `/train-document`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainDocumentSummary {
    pub content: String,
    pub pages_count: Option<usize>,
    pub tables_count: Option<usize>,
    pub paragraph_count: Option<usize>,
}
