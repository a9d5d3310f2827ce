use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    auth::{self, AuthState},
    task::TaskState,
    user::UserState,
    validation::ValidationErrors,
};

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower::ServiceBuilder;
use utoipa::{OpenApi, ToSchema};

/// JSON body for every API error.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable error message
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// JSON body for a payload that failed field validation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    /// Always "Validation failed"
    pub error: String,
    /// Field name to error message
    #[schema(value_type = Object)]
    pub details: ValidationErrors,
}

/// JSON body for a request missing required fields.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MissingFieldsResponse {
    /// Always "Missing required fields"
    pub error: String,
    /// Field name to a description of the expected value
    #[schema(value_type = Object)]
    pub required_fields: BTreeMap<&'static str, &'static str>,
}

/// Errors returned by the JSON API handlers.
///
/// Backend failures carry only a user-facing message; the underlying error is
/// logged where it occurs and never serialized.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(ValidationErrors),
    #[error("Missing required fields")]
    MissingFields(BTreeMap<&'static str, &'static str>),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrorResponse { error, details }),
            )
                .into_response(),
            ApiError::MissingFields(required_fields) => (
                StatusCode::BAD_REQUEST,
                Json(MissingFieldsResponse {
                    error,
                    required_fields,
                }),
            )
                .into_response(),
            ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error))).into_response()
            }
            ApiError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(error))).into_response()
            }
            ApiError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(error))).into_response()
            }
            ApiError::Conflict(_) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(error))).into_response()
            }
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(error)),
            )
                .into_response(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::health_check_handler,
        crate::user::api::v1::create_user_handler,
        crate::user::api::v1::login_handler,
        crate::user::api::v1::list_users_handler,
        crate::user::api::v1::get_user_handler,
        crate::user::api::v1::get_user_by_user_id_handler,
        crate::user::api::v1::update_user_handler,
        crate::user::api::v1::delete_user_handler,
        crate::task::api::v1::create_task_handler,
        crate::task::api::v1::get_tasks_by_user_query_handler,
        crate::task::api::v1::get_tasks_by_user_handler,
        crate::task::api::v1::update_task_handler,
        crate::task::api::v1::update_task_by_query_handler,
        crate::task::api::v1::delete_task_handler,
        crate::task::api::v1::delete_task_by_query_handler,
        crate::task::api::v1::update_task_status_handler,
    ),
    tags(
        (name = "Users", description = "User registration, login and management"),
        (name = "Tasks", description = "Task management"),
    )
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints.
///
/// User registration and login are public; every other route requires a
/// bearer token.
pub fn create_api_router(
    auth_state: Arc<AuthState>,
    user_state: Arc<UserState>,
    task_state: Arc<TaskState>,
) -> Router {
    let public_routes = crate::user::api::v1::create_public_api_router(user_state.clone());
    let protected_routes = crate::user::api::v1::create_api_router(user_state)
        .merge(crate::task::api::v1::create_api_router(task_state))
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::require_auth_middleware,
        )));
    Router::new().nest("/api", public_routes.merge(protected_routes))
}
