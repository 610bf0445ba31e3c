//! Interview session routes
//!
//! Handles: create, next question, submit answer, complete, stats, cost, delete

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{json_body, optional_json_body, ApiError, ApiResult};
use crate::interview::{
    CompleteOptions, NextQuestionResponse, SessionCreated, SubmitAnswerResponse,
};
use crate::models::{Diagnostic, SessionContext, SessionStats};
use crate::orchestration::SessionCost;
use crate::server::ServerAppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub answer_text: String,
}

pub async fn create_session(
    State(state): State<ServerAppState>,
    body: Result<Json<SessionContext>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let context = optional_json_body(body)?;
    let created = state.engine.create_session(context).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn next_question(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> ApiResult<NextQuestionResponse> {
    Ok(Json(state.engine.next_question(&id).await?))
}

pub async fn submit_answer(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
    body: Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> ApiResult<SubmitAnswerResponse> {
    let request = json_body(body)?;
    let response = state
        .engine
        .submit_answer(&id, &request.question_id, &request.answer_text)
        .await?;
    Ok(Json(response))
}

pub async fn complete(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
    body: Result<Json<CompleteOptions>, JsonRejection>,
) -> ApiResult<Diagnostic> {
    let options = optional_json_body(body)?;
    Ok(Json(state.engine.complete(&id, options).await?))
}

pub async fn stats(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionStats> {
    Ok(Json(state.engine.stats(&id).await?))
}

pub async fn cost(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionCost> {
    Ok(Json(state.engine.cost(&id).await?))
}

pub async fn delete_session(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
