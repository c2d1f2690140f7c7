// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::gateway::GatewayError;
use crate::response::timestamp;
use crate::store::StoreError;

/// Boundary error. Every variant carries a stable machine-readable code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input, always raised before any side effect.
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    /// Duplicate one-time purchase or active subscription.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    /// Declined by the payment gateway.
    #[error("{message}")]
    Payment {
        code: String,
        message: String,
        reason: String,
    },

    /// Another request holding the same transaction id has not finished yet.
    #[error("{message}")]
    Pending { code: &'static str, message: String },

    #[error("{message}")]
    Internal { code: &'static str, message: String },

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    pub fn purchase_in_progress() -> Self {
        Self::Pending {
            code: "PURCHASE_IN_PROGRESS",
            message: "A purchase with this transactionId is still being processed".to_string(),
        }
    }

    pub fn project_not_found() -> Self {
        Self::not_found("PROJECT_NOT_FOUND", "Project not found")
    }

    pub fn product_not_found() -> Self {
        Self::not_found("PRODUCT_NOT_FOUND", "Product not found")
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Validation { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Pending { code, .. }
            | Self::Internal { code, .. } => *code,
            Self::Payment { code, .. } => code.as_str(),
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// Whether repeating the same request can reasonably succeed.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, Self::Pending { .. } | Self::Internal { .. })
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } | Self::Payment { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Pending { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed [{}]: {}", self.code(), self);
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "errorCode": self.code(),
            "statusCode": status.as_u16(),
            "retryable": self.is_retry_safe(),
            "timestamp": timestamp(),
        });
        if let Self::Payment { reason, .. } = self {
            body["reason"] = json!(reason);
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::Timeout(_) => "STORE_TIMEOUT",
            StoreError::Contention { .. } => "STORE_CONTENTION",
            _ => "DATABASE_ERROR",
        };
        Self::internal(code, err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::internal("PAYMENT_GATEWAY_ERROR", err.to_string())
    }
}
