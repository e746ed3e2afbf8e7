use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fusion_engine::{CanvasError, NamingError};
use fusion_protocol::ErrorBody;

/// A failed API call, rendered as `{error, details?}` with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorBody::new(error))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<NamingError> for ApiError {
    fn from(err: NamingError) -> Self {
        let body = match &err {
            NamingError::Config(msg) => ErrorBody::new(format!("API configuration error - {msg}"))
                .with_details(
                    "Please ensure REPLICATE_API_TOKEN is set in your environment variables",
                ),
            NamingError::Transport(msg) => {
                ErrorBody::new("Error streaming response").with_details(msg.clone())
            }
            NamingError::Upstream { .. } => {
                ErrorBody::new("Failed to get AI response").with_details(err.to_string())
            }
            NamingError::Empty => ErrorBody::new("No response from AI"),
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

impl From<CanvasError> for ApiError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::UnknownTile(_) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorBody::new("Unknown tile").with_details(err.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
