//! Diagnostic retrieval

use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiError, ApiResult};
use crate::models::Diagnostic;
use crate::server::ServerAppState;

pub async fn get_diagnostic(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> ApiResult<Diagnostic> {
    match state.engine.diagnostic(&id).await? {
        Some(diagnostic) => Ok(Json(diagnostic)),
        None => Err(ApiError::not_found(
            "diagnostic_not_found",
            format!("Diagnostic not found: {}", id),
        )),
    }
}
