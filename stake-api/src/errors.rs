use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stake_ledger::ErrorCategory;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] stake_ledger::Error),

    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn missing_fields(fields: &str) -> Self {
        ApiError::Validation(format!("Missing required fields: {}", fields))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Ledger(e) => e.category(),
            ApiError::Body(_) | ApiError::Query(_) | ApiError::Validation(_) => {
                ErrorCategory::InvalidRequest
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::ServerMisconfigured
            | ErrorCategory::StoreFailure
            | ErrorCategory::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; server-side failures stay in the logs
    fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::StoreFailure | ErrorCategory::InternalError => {
                "Internal server error".to_string()
            }
            ErrorCategory::ServerMisconfigured => "Server misconfigured".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.category();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type = category.as_str(), "Request failed");
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": {
                    "code": status.as_u16(),
                    "message": self.public_message(),
                    "type": category.as_str()
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (stake_ledger::Error::InvalidAmount("zero".into()), StatusCode::BAD_REQUEST),
            (stake_ledger::Error::InvalidRange("days".into()), StatusCode::BAD_REQUEST),
            (stake_ledger::Error::WalletNotFound("w".into()), StatusCode::NOT_FOUND),
            (stake_ledger::Error::Unauthorized("sig".into()), StatusCode::UNAUTHORIZED),
            (
                stake_ledger::Error::ServerMisconfigured("key".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (stake_ledger::Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status_code(), expected);
        }
    }

    #[test]
    fn test_store_failures_hide_details() {
        let error = ApiError::from(stake_ledger::Error::Storage("/var/lib/db: IO error".into()));
        assert_eq!(error.public_message(), "Internal server error");
    }
}
