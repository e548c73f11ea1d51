//! REST backend error types

use converge_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response field missing: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<HttpError> for CloudError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Status { status: 404, body } => CloudError::ResourceNotFound(body),
            HttpError::Status { status, body } => CloudError::Http {
                status,
                message: body,
            },
            HttpError::InvalidConfig(message) => CloudError::InvalidConfig(message),
            HttpError::JsonError(e) => CloudError::Json(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_404_becomes_not_found() {
        let err: CloudError = HttpError::Status {
            status: 404,
            body: "cluster 12 not found".into(),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_status_keeps_code() {
        let err: CloudError = HttpError::Status {
            status: 409,
            body: "conflict".into(),
        }
        .into();
        assert!(matches!(err, CloudError::Http { status: 409, .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_missing_field_is_api_error() {
        let err: CloudError = HttpError::MissingField("/id".into()).into();
        assert!(matches!(err, CloudError::ApiError(_)));
    }
}
