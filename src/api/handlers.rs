//! HTTP request handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::types::{ErrorResponse, TurnRequest, TurnResponse};
use super::AppState;
use crate::error::TurnError;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // One dialogue turn; non-POST methods get a 405 from the router.
        .route("/api/turn", post(handle_turn))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn handle_turn(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let turn = request.into();
    let reply = state.orchestrator.handle_turn(&turn).await?;
    Ok(Json(reply.into()))
}

async fn get_version() -> &'static str {
    concat!("dialog-bridge ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

struct AppError(TurnError);

impl From<TurnError> for AppError {
    fn from(error: TurnError) -> Self {
        Self(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TurnError::Validation(_) => StatusCode::BAD_REQUEST,
            TurnError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TurnError::TokenExchange(_)
            | TurnError::Backend { .. }
            | TurnError::Transport(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Turn failed");
        }

        let body = Json(ErrorResponse::new(self.0.to_string()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(error: TurnError) -> StatusCode {
        AppError(error).into_response().status()
    }

    #[test]
    fn validation_failures_map_to_bad_request() {
        assert_eq!(
            status_for(TurnError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        assert_eq!(
            status_for(TurnError::TokenExchange("denied".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(TurnError::Backend {
                status: 503,
                message: "unavailable".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(TurnError::Transport("refused".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn credential_failures_map_to_internal_error() {
        assert_eq!(
            status_for(TurnError::Credential("bad bundle".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
