use crate::auth::{AuthState, CurrentUser};
use crate::web::api::ErrorResponse;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Reasons a request to a protected route is rejected.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No authorization header provided")]
    MissingHeader,
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(self.to_string())),
        )
            .into_response()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Middleware that requires a valid bearer token.
/// Returns UNAUTHORIZED when the token is missing, malformed or expired, and
/// otherwise sets the CurrentUser extension for downstream handlers.
pub async fn require_auth_middleware(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(request.headers()) {
        Ok(token) => state.verify_token(token).map_err(|err| {
            tracing::warn!("Rejected bearer token: {}", err);
            AuthError::InvalidToken
        }),
        Err(err) => Err(err),
    };

    match claims {
        Ok(claims) => {
            request.extensions_mut().insert(CurrentUser::from(claims));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
