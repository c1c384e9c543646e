//! API error type and HTTP mapping
//!
//! Every failure leaving the server uses the same envelope:
//! `{"error": {"code": "...", "message": "..."}}`. Business-rule
//! rejections keep their own codes so clients can branch on them;
//! messages say why the command was rejected.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use tradecrm_billing::BillingError;
use tradecrm_shared::CrmError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "AUTH_REQUIRED",
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "FORBIDDEN",
            message: message.into(),
        }
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Auth(msg) => Self::auth(msg),
            CrmError::NotFound(msg) => Self {
                status: StatusCode::NOT_FOUND,
                code: "NOT_FOUND",
                message: msg,
            },
            CrmError::Validation(msg) => Self::validation(msg),
            CrmError::Billing(msg) => Self {
                status: StatusCode::CONFLICT,
                code: "BILLING",
                message: msg,
            },
            CrmError::Internal(msg) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "INTERNAL",
                message: msg,
            },
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let status = match &err {
            BillingError::UnknownPlan(_) | BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::Forbidden => StatusCode::FORBIDDEN,
            BillingError::AlreadySubscribed => StatusCode::CONFLICT,
            BillingError::NoActiveSubscription | BillingError::NothingToReactivate => {
                StatusCode::NOT_FOUND
            }
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "Request failed");
        } else {
            tracing::debug!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "Request rejected"
            );
        }

        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
