use crate::provider::ProviderError;
use assembler::AssemblyError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use types::errors::{Classify, ErrorClass};

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Classified {
        class: ErrorClass,
        message: String,
        /// Extra structured fields, e.g. the shortfall of `INSUFFICIENT_FUNDS`
        details: Option<serde_json::Value>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn classified(err: &(impl Classify + std::fmt::Display)) -> Self {
        AppError::Classified {
            class: err.class(),
            message: err.to_string(),
            details: None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Classified { class, .. } => *class,
            AppError::BadRequest(_) => ErrorClass::InvalidRequest,
            AppError::NotFound(_) => ErrorClass::NotRegistered,
            AppError::InternalError(_) => ErrorClass::Internal,
        }
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::InvalidRequest | ErrorClass::InsufficientFunds => StatusCode::BAD_REQUEST,
        ErrorClass::NotRegistered | ErrorClass::SubstandardNotFound => StatusCode::NOT_FOUND,
        ErrorClass::ValidationFailure | ErrorClass::CapabilityNotSupported => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::DuplicateEvent | ErrorClass::RollbackDetected => StatusCode::CONFLICT,
        ErrorClass::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AssemblyError> for AppError {
    fn from(err: AssemblyError) -> Self {
        let details = err.shortfall().map(|shortfall| json!({ "shortfall": shortfall }));
        AppError::Classified {
            class: err.class(),
            message: err.to_string(),
            details,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::classified(&err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let class = self.class();
        let status = status_for(class);
        let (message, details) = match self {
            AppError::Classified { class: ErrorClass::Internal, message, .. } => {
                error!(error = %message, "Internal error");
                ("Internal server error".to_string(), None)
            }
            AppError::InternalError(e) => {
                error!(error = %e, "Internal error");
                ("Internal server error".to_string(), None)
            }
            AppError::Classified { message, details, .. } => (message, details),
            AppError::BadRequest(msg) | AppError::NotFound(msg) => (msg, None),
        };

        let mut body = json!({
            "error": class.code(),
            "message": message
        });
        if let (Some(object), Some(serde_json::Value::Object(extra))) = (body.as_object_mut(), details) {
            object.extend(extra);
        }

        (status, Json(body)).into_response()
    }
}
