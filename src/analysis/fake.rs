//! Scripted in-memory backend for service and router tests.

use super::result::{AnalyzeResult, ModelDetails};
use super::{
    AnalyzeSource, BuildMode, BuildRequest, Completed, DocumentAnalysis, Operation,
    OperationError, OperationState,
};
use crate::error::{ServiceError, ServiceResult};
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A call the fake received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Analyze { model_id: String, source: SourceKind },
    Build { model_id: String, mode: BuildMode, container: String, prefix: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Bytes { filename: String, len: usize },
    Url(String),
}

/// What the next analyze or build operation ends with.
pub enum Outcome<T> {
    Succeed(T),
    Fail(OperationError),
    /// Never leaves the running state.
    Hang,
}

#[derive(Default)]
pub struct FakeAnalysis {
    calls: Mutex<Vec<Call>>,
    analyze_outcomes: Mutex<VecDeque<Outcome<AnalyzeResult>>>,
    build_outcomes: Mutex<VecDeque<Outcome<ModelDetails>>>,
    analyze_done: Mutex<HashMap<String, Outcome<AnalyzeResult>>>,
    build_done: Mutex<HashMap<String, Outcome<ModelDetails>>>,
    submit_error: Mutex<Option<ServiceError>>,
}

impl FakeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_analyze(&self, outcome: Outcome<AnalyzeResult>) -> &Self {
        self.analyze_outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn push_build(&self, outcome: Outcome<ModelDetails>) -> &Self {
        self.build_outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Make the next submission fail before any operation exists.
    pub fn fail_submit(&self, err: ServiceError) -> &Self {
        *self.submit_error.lock().unwrap() = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn take_submit_error(&self) -> ServiceResult<()> {
        match self.submit_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn operation(&self, prefix: &str) -> Operation {
        let n = self.calls.lock().unwrap().len();
        Operation {
            location: format!("fake://{}/{}", prefix, n),
            retry_after: None,
        }
    }
}

fn completed<T>(value: T) -> OperationState<T> {
    OperationState::Succeeded(Completed {
        value,
        created_on: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
        last_updated_on: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap()),
    })
}

fn resolve<T: Clone>(outcome: Option<&Outcome<T>>, location: &str) -> ServiceResult<OperationState<T>> {
    match outcome {
        Some(Outcome::Succeed(value)) => Ok(completed(value.clone())),
        Some(Outcome::Fail(err)) => Ok(OperationState::Failed(err.clone())),
        Some(Outcome::Hang) => Ok(OperationState::Running { retry_after: None }),
        None => Err(ServiceError::Decode(format!("unknown operation {}", location))),
    }
}

#[async_trait::async_trait]
impl DocumentAnalysis for FakeAnalysis {
    async fn begin_analyze(&self, model_id: &str, source: &AnalyzeSource) -> ServiceResult<Operation> {
        self.take_submit_error()?;
        let op = self.operation("analyze");
        let outcome = self
            .analyze_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Succeed(AnalyzeResult::default()));
        self.analyze_done.lock().unwrap().insert(op.location.clone(), outcome);

        let source = match source {
            AnalyzeSource::Bytes { filename, data } => SourceKind::Bytes {
                filename: filename.clone(),
                len: data.len(),
            },
            AnalyzeSource::Url(url) => SourceKind::Url(url.to_string()),
        };
        self.calls.lock().unwrap().push(Call::Analyze {
            model_id: model_id.to_string(),
            source,
        });
        Ok(op)
    }

    async fn begin_build(&self, request: &BuildRequest) -> ServiceResult<Operation> {
        self.take_submit_error()?;
        let op = self.operation("build");
        let outcome = self
            .build_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Outcome::Fail(OperationError {
                code: "NoScript".to_string(),
                message: "no build outcome scripted".to_string(),
            }));
        self.build_done.lock().unwrap().insert(op.location.clone(), outcome);

        self.calls.lock().unwrap().push(Call::Build {
            model_id: request.model_id.clone(),
            mode: request.build_mode,
            container: request.container_url.to_string(),
            prefix: request.prefix.clone(),
        });
        Ok(op)
    }

    async fn analyze_status(&self, operation: &Operation) -> ServiceResult<OperationState<AnalyzeResult>> {
        let done = self.analyze_done.lock().unwrap();
        resolve(done.get(&operation.location), &operation.location)
    }

    async fn build_status(&self, operation: &Operation) -> ServiceResult<OperationState<ModelDetails>> {
        let done = self.build_done.lock().unwrap();
        resolve(done.get(&operation.location), &operation.location)
    }
}
