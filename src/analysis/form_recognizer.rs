//! Form Recognizer (Document Intelligence) REST backend.

use super::result::{AnalyzeResult, ModelDetails};
use super::{
    AnalyzeSource, BuildRequest, Completed, DocumentAnalysis, Operation, OperationError,
    OperationState,
};
use crate::config::Settings;
use crate::error::{ServiceError, ServiceResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "Operation-Location";

pub struct FormRecognizerClient {
    client: Client,
    endpoint: Url,
    key: String,
    api_version: String,
}

impl FormRecognizerClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.operations.request_timeout())
            .build()?;
        Self::with_client(client, settings)
    }

    pub fn with_client(client: Client, settings: &Settings) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&settings.form_recognizer.endpoint)
            .with_context(|| format!("invalid endpoint '{}'", settings.form_recognizer.endpoint))?;
        anyhow::ensure!(
            !endpoint.cannot_be_a_base(),
            "endpoint '{}' cannot carry a path",
            endpoint
        );
        Ok(Self {
            client,
            endpoint,
            key: settings.form_recognizer.key.clone(),
            api_version: settings.operations.api_version.clone(),
        })
    }

    /// The model id becomes a single escaped path segment, so it can never
    /// reach another resource on the endpoint.
    fn analyze_url(&self, model_id: &str) -> ServiceResult<Url> {
        let mut url = self.endpoint_url(&[
            "formrecognizer",
            "documentModels",
            &format!("{}:analyze", model_id),
        ])?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version)
            .append_pair("stringIndexType", "unicodeCodePoint");
        Ok(url)
    }

    fn build_url(&self) -> ServiceResult<Url> {
        let mut url = self.endpoint_url(&["formrecognizer", "documentModels:build"])?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn endpoint_url(&self, segments: &[&str]) -> ServiceResult<Url> {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUri {
                uri: self.endpoint.to_string(),
                reason: "endpoint cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn status<T: DeserializeOwned>(&self, operation: &Operation) -> ServiceResult<OperationState<T>> {
        let resp = self
            .client
            .get(&operation.location)
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let retry_after = retry_after(resp.headers());

        let raw_text = resp.text().await?;
        debug!(
            "FormRecognizerClient: status response ({} bytes): {}",
            raw_text.len(),
            &raw_text[..floor_char_boundary(&raw_text, 300)]
        );
        let envelope: OperationEnvelope<T> = serde_json::from_str(&raw_text)
            .map_err(|e| ServiceError::Decode(format!("operation status: {}", e)))?;

        envelope.into_state(retry_after)
    }
}

// ── REST request/response types ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeUrlRequest<'a> {
    url_source: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildModelRequest<'a> {
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    build_mode: &'static str,
    azure_blob_source: BlobSource<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlobSource<'a> {
    container_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
}

/// Status resource shared by analyze and build operations. Analyze results
/// arrive under `analyzeResult`, build results under `result`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationEnvelope<T> {
    status: String,
    #[serde(default)]
    created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    last_updated_date_time: Option<DateTime<Utc>>,
    #[serde(alias = "analyzeResult")]
    result: Option<T>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    innererror: Option<Box<ErrorDetail>>,
}

impl ErrorDetail {
    /// Innermost error is the most specific one.
    fn into_operation_error(self) -> OperationError {
        match self.innererror {
            Some(inner) if !inner.message.is_empty() => {
                let outer_code = self.code;
                let inner = inner.into_operation_error();
                OperationError {
                    code: if inner.code.is_empty() { outer_code } else { inner.code },
                    message: inner.message,
                }
            }
            _ => OperationError {
                code: self.code,
                message: self.message,
            },
        }
    }
}

impl<T> OperationEnvelope<T> {
    fn into_state(self, retry_after: Option<Duration>) -> ServiceResult<OperationState<T>> {
        match self.status.as_str() {
            "notStarted" | "running" => Ok(OperationState::Running { retry_after }),
            "succeeded" => {
                let value = self.result.ok_or_else(|| {
                    ServiceError::Decode("operation succeeded without a result".to_string())
                })?;
                Ok(OperationState::Succeeded(Completed {
                    value,
                    created_on: self.created_date_time,
                    last_updated_on: self.last_updated_date_time,
                }))
            }
            "failed" | "canceled" => {
                let err = self
                    .error
                    .map(ErrorDetail::into_operation_error)
                    .unwrap_or_else(|| OperationError {
                        code: self.status.clone(),
                        message: format!("operation {}", self.status),
                    });
                Ok(OperationState::Failed(err))
            }
            other => Err(ServiceError::Decode(format!("unknown operation status '{}'", other))),
        }
    }
}

// ── Backend implementation ──────────────────────────────────────────────────

#[async_trait::async_trait]
impl DocumentAnalysis for FormRecognizerClient {
    async fn begin_analyze(&self, model_id: &str, source: &AnalyzeSource) -> ServiceResult<Operation> {
        info!(
            "FormRecognizerClient: analyzing {} with {}",
            source.describe(),
            model_id
        );

        let request = self
            .client
            .post(self.analyze_url(model_id)?)
            .header(KEY_HEADER, &self.key);
        let request = match source {
            AnalyzeSource::Bytes { data, .. } => request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data.clone()),
            AnalyzeSource::Url(url) => request.json(&AnalyzeUrlRequest {
                url_source: url.as_str(),
            }),
        };

        let resp = check_status(request.send().await?).await?;
        accepted_operation(&resp)
    }

    async fn begin_build(&self, request: &BuildRequest) -> ServiceResult<Operation> {
        info!(
            "FormRecognizerClient: building {} model {} from {}",
            request.build_mode.as_str(),
            request.model_id,
            request.container_url
        );

        let body = BuildModelRequest {
            model_id: &request.model_id,
            description: request.description.as_deref(),
            build_mode: request.build_mode.as_str(),
            azure_blob_source: BlobSource {
                container_url: request.container_url.as_str(),
                prefix: request.prefix.as_deref(),
            },
        };

        let resp = self
            .client
            .post(self.build_url()?)
            .header(KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        accepted_operation(&resp)
    }

    async fn analyze_status(&self, operation: &Operation) -> ServiceResult<OperationState<AnalyzeResult>> {
        self.status(operation).await
    }

    async fn build_status(&self, operation: &Operation) -> ServiceResult<OperationState<ModelDetails>> {
        self.status(operation).await
    }
}

/// Turn non-2xx answers into the matching error kind.
async fn check_status(resp: Response) -> ServiceResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| body.error.into_operation_error());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ServiceError::Authentication {
            status: status.as_u16(),
            message: detail.map(|d| d.message).unwrap_or(text),
        });
    }

    Err(match detail {
        Some(detail) => ServiceError::Vendor {
            code: detail.code,
            message: detail.message,
        },
        None => ServiceError::Vendor {
            code: status.as_u16().to_string(),
            message: text,
        },
    })
}

fn accepted_operation(resp: &Response) -> ServiceResult<Operation> {
    let location = resp
        .headers()
        .get(OPERATION_LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Decode("response has no Operation-Location header".to_string()))?;

    debug!("FormRecognizerClient: operation accepted at {}", location);
    Ok(Operation {
        location: location.to_string(),
        retry_after: retry_after(resp.headers()),
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
