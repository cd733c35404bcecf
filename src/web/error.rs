use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::game_logic::QuizError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Question source failure: {0}")]
    BadGateway(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<SessionError> for WebError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Quiz(QuizError::NoActiveQuestion | QuizError::RoundOver) => {
                WebError::Conflict(err.to_string())
            }
            SessionError::Quiz(QuizError::MalformedResponse(_) | QuizError::Source(_)) => {
                WebError::BadGateway(err.to_string())
            }
            SessionError::InvalidChoice(msg) => WebError::BadRequest(msg),
            SessionError::Closed(id) => WebError::SessionNotFound(id),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session {} not found", id))
            }
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            WebError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            WebError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if status.is_server_error() {
            tracing::error!(http.status = status.as_u16(), error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = WebError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_session_errors_map_to_status_codes() {
        let cases = [
            (SessionError::Quiz(QuizError::RoundOver), StatusCode::CONFLICT),
            (SessionError::Quiz(QuizError::NoActiveQuestion), StatusCode::CONFLICT),
            (
                SessionError::Quiz(QuizError::MalformedResponse("x".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SessionError::Quiz(QuizError::Source(LlmError::EmptyCompletion)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SessionError::InvalidChoice("9".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (SessionError::Closed(Uuid::nil()), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            let response = WebError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
