//! Client side of the cloud document analysis service.
//!
//! [`DocumentAnalysis`] is the seam between the service layer and the vendor:
//! every call submits work and returns a pending [`Operation`], whose state is
//! then queried until it is terminal (see [`poller::Waiter`]).

pub mod form_recognizer;
pub mod poller;
pub mod result;

#[cfg(test)]
pub mod fake;

use crate::error::ServiceResult;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use result::{AnalyzeResult, ModelDetails};
use std::time::Duration;

/// What to analyze: uploaded bytes or a document the service can fetch itself.
#[derive(Debug, Clone)]
pub enum AnalyzeSource {
    Bytes { filename: String, data: Bytes },
    Url(url::Url),
}

impl AnalyzeSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes { filename, data } => format!("{} ({} bytes)", filename, data.len()),
            Self::Url(url) => url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Template,
    Neural,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Neural => "neural",
        }
    }
}

/// A custom model build over a blob container of labeled documents.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub model_id: String,
    pub build_mode: BuildMode,
    pub container_url: url::Url,
    pub prefix: Option<String>,
    pub description: Option<String>,
}

/// Handle to a submitted long-running operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Absolute URL of the operation's status resource.
    pub location: String,
    /// Suggested delay before the first status query.
    pub retry_after: Option<Duration>,
}

/// Vendor-reported failure of a long-running operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationError {
    pub code: String,
    pub message: String,
}

/// Terminal value of a successful operation plus its bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct Completed<T> {
    pub value: T,
    pub created_on: Option<DateTime<Utc>>,
    pub last_updated_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum OperationState<T> {
    Running { retry_after: Option<Duration> },
    Succeeded(Completed<T>),
    Failed(OperationError),
}

/// Async trait implemented by document analysis backends.
#[async_trait::async_trait]
pub trait DocumentAnalysis: Send + Sync {
    async fn begin_analyze(&self, model_id: &str, source: &AnalyzeSource) -> ServiceResult<Operation>;

    async fn begin_build(&self, request: &BuildRequest) -> ServiceResult<Operation>;

    async fn analyze_status(&self, operation: &Operation) -> ServiceResult<OperationState<AnalyzeResult>>;

    async fn build_status(&self, operation: &Operation) -> ServiceResult<OperationState<ModelDetails>>;
}
