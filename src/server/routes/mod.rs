//! HTTP route modules
//!
//! - session_routes: interview lifecycle (create, next, answer, complete, stats, cost, delete)
//! - diagnostic_routes: diagnostic retrieval

pub mod diagnostic_routes;
pub mod session_routes;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::ServerAppState;
use crate::error::EngineError;

/// JSON error body: `{ "error": code, "message": text }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Engine errors at the HTTP boundary
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(rejection: &JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

/// Required JSON body; rejections use the JSON error shape
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(&rejection))
}

/// Optional JSON body: no body means defaults, a malformed one is a 400
pub fn optional_json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(ApiError::bad_request(&rejection)),
    }
}

pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::SessionNotFound(_) | EngineError::QuestionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EngineError::InvalidTransition { .. }
        | EngineError::AlreadySet(_)
        | EngineError::InvalidState(_)
        | EngineError::AssessmentNotFinished(_) => StatusCode::CONFLICT,
        EngineError::ExtractionFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
        EngineError::ModelTimeout { .. }
        | EngineError::ModelSchemaViolation { .. }
        | EngineError::Model(_) => StatusCode::BAD_GATEWAY,
        EngineError::Storage(_) | EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let status = status_for(&error);
        if status.is_server_error() {
            log::error!("Request failed: {}", error);
        } else {
            log::debug!("Request rejected: {}", error);
        }
        Self {
            status,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// All `/api` routes
pub fn api_router() -> Router<ServerAppState> {
    Router::new()
        .route("/api/sessions", post(session_routes::create_session))
        .route(
            "/api/sessions/:id",
            axum::routing::delete(session_routes::delete_session),
        )
        .route(
            "/api/sessions/:id/next",
            get(session_routes::next_question).post(session_routes::next_question),
        )
        .route("/api/sessions/:id/answers", post(session_routes::submit_answer))
        .route("/api/sessions/:id/complete", post(session_routes::complete))
        .route("/api/sessions/:id/stats", get(session_routes::stats))
        .route("/api/sessions/:id/cost", get(session_routes::cost))
        .route(
            "/api/diagnostics/:id",
            get(diagnostic_routes::get_diagnostic),
        )
}
