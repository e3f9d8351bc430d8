//! Failure kinds surfaced by the service layer and their HTTP mapping.
//!
//! Every route answers failures with the same `{ kind, message }` envelope.
//! Locally malformed input is a 400; anything that went wrong talking to the
//! document analysis service (or waiting for it) is a 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network, DNS or TLS failure reaching the analysis service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The analysis service rejected the access key.
    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    /// The analysis service accepted the call but could not process it.
    #[error("document analysis failed [{code}]: {message}")]
    Vendor { code: String, message: String },

    /// The analysis service answered with something we could not read.
    #[error("unexpected response from analysis service: {0}")]
    Decode(String),

    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{operation} did not complete within {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("{operation} cancelled by shutdown")]
    Cancelled { operation: String },
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Authentication { .. } => "authentication",
            Self::Vendor { .. } => "vendor",
            Self::Decode(_) => "decode",
            Self::InvalidUri { .. } => "invalid_uri",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_uri(uri: &str, err: url::ParseError) -> Self {
        Self::InvalidUri {
            uri: uri.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            kind: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_local_input_is_client_error() {
        assert_eq!(
            ServiceError::InvalidRequest("missing file".into()).status(),
            StatusCode::BAD_REQUEST
        );

        let collaborator_failures = [
            ServiceError::Transport("dns".into()),
            ServiceError::Authentication {
                status: 401,
                message: "bad key".into(),
            },
            ServiceError::Vendor {
                code: "InvalidRequest".into(),
                message: "unsupported model".into(),
            },
            ServiceError::Decode("eof".into()),
            ServiceError::InvalidUri {
                uri: String::new(),
                reason: "empty host".into(),
            },
            ServiceError::Timeout {
                operation: "analyze".into(),
                secs: 3,
            },
            ServiceError::Cancelled {
                operation: "build".into(),
            },
        ];
        for err in collaborator_failures {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", err);
        }
    }

    #[test]
    fn test_invalid_uri_names_the_uri() {
        let err = url::Url::parse("").unwrap_err();
        let err = ServiceError::invalid_uri("", err);
        assert_eq!(err.kind(), "invalid_uri");
        assert!(err.to_string().starts_with("invalid URI ''"));
    }
}
