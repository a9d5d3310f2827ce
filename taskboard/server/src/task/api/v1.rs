use crate::task::{
    NewTask, Task, TaskPatch, TaskPriority, TaskRepositoryError, TaskState, TaskStatus,
};
use crate::web::api::{ApiError, ErrorResponse, MissingFieldsResponse};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

const INVALID_STATUS: &str = "Status must be either pending or completed";
const INVALID_PRIORITY: &str = "Priority must be either low, medium, or high";

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    /// Generated identifier of the task
    id: String,
    /// Email identifier of the owning user
    user_id: String,
    title: String,
    description: String,
    status: TaskStatus,
    priority: TaskPriority,
    created_at: DateTime<Utc>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id().to_string(),
            user_id: task.user_id().to_string(),
            title: task.title().to_string(),
            description: task.description().to_string(),
            status: task.status(),
            priority: task.priority(),
            created_at: task.created_at(),
        }
    }
}

/// Request body for creating a task. Every field is required.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// pending or completed
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    status: Option<serde_json::Value>,
    /// low, medium or high
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    priority: Option<serde_json::Value>,
}

/// Request body for a partial task update.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    priority: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TasksByUserQuery {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskIdQuery {
    #[serde(default)]
    id: Option<String>,
}

fn required_task_fields() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("userId", "User email"),
        ("title", "Task title"),
        ("description", "Task description"),
        ("status", "Task status (pending or completed)"),
        ("priority", "Task priority (low, medium, or high)"),
    ])
}

/// Accepts only a JSON string naming a status; numbers, booleans and the like are invalid.
fn parse_status(status: &serde_json::Value) -> Result<TaskStatus, ApiError> {
    status
        .as_str()
        .and_then(|status| status.parse().ok())
        .ok_or(ApiError::BadRequest(INVALID_STATUS))
}

fn parse_priority(priority: &serde_json::Value) -> Result<TaskPriority, ApiError> {
    priority
        .as_str()
        .and_then(|priority| priority.parse().ok())
        .ok_or(ApiError::BadRequest(INVALID_PRIORITY))
}

fn repository_error(err: TaskRepositoryError, message: &'static str) -> ApiError {
    match err {
        TaskRepositoryError::MissingUserId => ApiError::MissingFields(required_task_fields()),
        TaskRepositoryError::Database(err) => {
            tracing::error!("{}: {}", message, err);
            ApiError::Internal(message)
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// `null` and `""` count as absent.
fn present_value(value: Option<serde_json::Value>) -> Option<serde_json::Value> {
    value.filter(|value| !value.is_null() && value.as_str() != Some(""))
}

/// Handler for POST /api/tasks - Creates a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskJson),
        (status = 400, description = "Missing fields or invalid status/priority", body = MissingFieldsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskJson>), ApiError> {
    let (Some(user_id), Some(title), Some(description), Some(status), Some(priority)) = (
        present(request.user_id),
        present(request.title),
        present(request.description),
        present_value(request.status),
        present_value(request.priority),
    ) else {
        return Err(ApiError::MissingFields(required_task_fields()));
    };

    let status = parse_status(&status)?;
    let priority = parse_priority(&priority)?;

    let task = state
        .tasks
        .create(NewTask {
            user_id,
            title,
            description,
            status,
            priority: Some(priority),
        })
        .await
        .map_err(|err| repository_error(err, "Error creating task"))?;
    Ok((StatusCode::CREATED, Json(TaskJson::from(task))))
}

async fn tasks_for_user(
    state: &TaskState,
    user_id: &str,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    let tasks = state
        .tasks
        .find_by_user_id(user_id)
        .await
        .map_err(|err| repository_error(err, "Error getting tasks"))?;
    Ok(Json(tasks.into_iter().map(TaskJson::from).collect()))
}

/// Handler for GET /api/tasks/user?userId= - Lists a user's tasks, newest first.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks/user",
    params(("userId" = String, Query, description = "Email identifier of the owning user")),
    responses(
        (status = 200, description = "Tasks, newest first", body = Vec<TaskJson>),
        (status = 400, description = "userId is missing", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_by_user_query_handler(
    State(state): State<Arc<TaskState>>,
    Query(query): Query<TasksByUserQuery>,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    let user_id = present(query.user_id)
        .ok_or(ApiError::BadRequest("userId is required as a query parameter"))?;
    tasks_for_user(&state, &user_id).await
}

/// Handler for GET /api/tasks/user/{userId} - Lists a user's tasks, newest first.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks/user/{userId}",
    params(("userId" = String, Path, description = "Email identifier of the owning user")),
    responses(
        (status = 200, description = "Tasks, newest first", body = Vec<TaskJson>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_by_user_handler(
    State(state): State<Arc<TaskState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    tasks_for_user(&state, &user_id).await
}

async fn update_task(
    state: &TaskState,
    id: &str,
    request: UpdateTaskRequest,
) -> Result<Json<TaskJson>, ApiError> {
    let patch = TaskPatch {
        title: request.title,
        description: request.description,
        status: request.status.as_ref().map(parse_status).transpose()?,
        priority: request.priority.as_ref().map(parse_priority).transpose()?,
    };

    let task = state
        .tasks
        .update(id, patch)
        .await
        .map_err(|err| repository_error(err, "Error updating task"))?
        .ok_or(ApiError::NotFound("Task not found"))?;
    Ok(Json(TaskJson::from(task)))
}

async fn delete_task(state: &TaskState, id: &str) -> Result<StatusCode, ApiError> {
    let deleted = state
        .tasks
        .delete(id)
        .await
        .map_err(|err| repository_error(err, "Error deleting task"))?;
    if !deleted {
        return Err(ApiError::NotFound("Task not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn task_id_from_query(query: TaskIdQuery) -> Result<String, ApiError> {
    present(query.id).ok_or(ApiError::BadRequest("Task id is required"))
}

/// Handler for PUT /api/tasks/{id} - Applies a partial update.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Generated ID of the task")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Invalid status or priority", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskJson>, ApiError> {
    update_task(&state, &id, request).await
}

/// Handler for PUT /api/tasks?id= - Same as PUT /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/tasks",
    params(("id" = String, Query, description = "Generated ID of the task")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Missing id or invalid status/priority", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_by_query_handler(
    State(state): State<Arc<TaskState>>,
    Query(query): Query<TaskIdQuery>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskJson>, ApiError> {
    let id = task_id_from_query(query)?;
    update_task(&state, &id, request).await
}

/// Handler for DELETE /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Generated ID of the task")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_task(&state, &id).await
}

/// Handler for DELETE /api/tasks?id= - Same as DELETE /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/tasks",
    params(("id" = String, Query, description = "Generated ID of the task")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 400, description = "Task id is missing", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_by_query_handler(
    State(state): State<Arc<TaskState>>,
    Query(query): Query<TaskIdQuery>,
) -> Result<StatusCode, ApiError> {
    let id = task_id_from_query(query)?;
    delete_task(&state, &id).await
}

/// Handler for PATCH /api/tasks/{id}/status - Changes only the status.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    params(("id" = String, Path, description = "Generated ID of the task")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = TaskJson),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_status_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskStatusRequest>,
) -> Result<Json<TaskJson>, ApiError> {
    let status = parse_status(request.status.as_ref().unwrap_or(&serde_json::Value::Null))?;

    let task = state
        .tasks
        .update_status(&id, status)
        .await
        .map_err(|err| repository_error(err, "Error updating task status"))?
        .ok_or(ApiError::NotFound("Task not found"))?;
    Ok(Json(TaskJson::from(task)))
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(
            "/tasks",
            post(create_task_handler)
                .put(update_task_by_query_handler)
                .delete(delete_task_by_query_handler),
        )
        .route("/tasks/user", get(get_tasks_by_user_query_handler))
        .route("/tasks/user/{userId}", get(get_tasks_by_user_handler))
        .route(
            "/tasks/{id}",
            put(update_task_handler).delete(delete_task_handler),
        )
        .route("/tasks/{id}/status", patch(update_task_status_handler))
        .with_state(state)
}
