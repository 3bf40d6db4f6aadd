use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use identity_broker::BrokerError;

/// Error envelope returned by every broker route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: &'static str,
    error_type: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// A [`BrokerError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = if self.0.is_internal() {
            tracing::error!(error = %self.0, "Request failed");
            ErrorBody {
                status: "error",
                error_type: self.0.error_type(),
                message: "Something went wrong".to_string(),
                details: None,
            }
        } else {
            tracing::debug!(error_type = self.0.error_type(), "{}", self.0);
            ErrorBody {
                status: "error",
                error_type: self.0.error_type(),
                message: self.0.to_string(),
                details: self.0.details(),
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Helper trait for converting broker results into handler results
pub(crate) trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, ApiError>;
}

impl<T> IntoResponseError<T> for Result<T, BrokerError> {
    fn into_response_error(self) -> Result<T, ApiError> {
        self.map_err(ApiError)
    }
}
