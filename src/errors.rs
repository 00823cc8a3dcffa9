use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON error body returned by every failing endpoint.
///
/// `code` is the machine-readable kind the storefront switches on;
/// `message` is safe to show to the customer verbatim.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Coupon expired or inactive: {0}")]
    CouponExpiredOrInactive(String),

    #[error("Coupon limit reached: {0}")]
    CouponLimitReached(String),

    #[error("Order minimum not met: {0}")]
    CouponBelowMinimum(String),

    #[error("Coupon not applicable: {0}")]
    CouponNotApplicable(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Machine error kind surfaced in the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DATABASE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ValidationError(_) => "VALIDATION",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::CouponNotFound(_) => "COUPON_NOT_FOUND",
            Self::CouponExpiredOrInactive(_) => "COUPON_EXPIRED_OR_INACTIVE",
            Self::CouponLimitReached(_) => "COUPON_LIMIT_REACHED",
            Self::CouponBelowMinimum(_) => "COUPON_BELOW_MINIMUM",
            Self::CouponNotApplicable(_) => "COUPON_NOT_APPLICABLE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::InternalError(_) | Self::Other(_) => "INTERNAL",
        }
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::CouponNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_)
            | Self::CouponExpiredOrInactive(_)
            | Self::CouponLimitReached(_)
            | Self::CouponBelowMinimum(_)
            | Self::CouponNotApplicable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message for the HTTP response. Infrastructure failures collapse to a
    /// generic message so internals never leak to the storefront.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.error_code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_carry_machine_codes() {
        let err = ServiceError::InsufficientStock("Serum X has only 2 left".into());
        assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.response_message().contains("Serum X"));
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = ServiceError::InternalError("pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");
        assert_eq!(err.error_code(), "INTERNAL");
    }
}
