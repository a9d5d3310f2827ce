use axum::response::Json;
use axum::routing::get;
use migration::MigratorTrait;
use sea_orm::Database;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::auth::AuthState;
use crate::config::Config;
use crate::task::{SeaOrmTaskRepository, TaskState};
use crate::user::{SeaOrmUserRepository, UserState};

pub mod api;

/// Response body of the health check.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
}

/// Wires the SeaORM repositories into the full application router.
pub fn create_app(auth_state: Arc<AuthState>, db: sea_orm::DatabaseConnection) -> axum::Router {
    let db = Arc::new(db);
    let user_state = Arc::new(UserState {
        users: Arc::new(SeaOrmUserRepository::new(db.clone())),
        auth: auth_state.clone(),
    });
    let task_state = Arc::new(TaskState {
        tasks: Arc::new(SeaOrmTaskRepository::new(db)),
    });
    create_router(auth_state, user_state, task_state)
}

/// Builds the router around already constructed states, so any repository
/// implementation can be injected.
pub fn create_router(
    auth_state: Arc<AuthState>,
    user_state: Arc<UserState>,
    task_state: Arc<TaskState>,
) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health_check_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .merge(api::create_api_router(auth_state, user_state, task_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(config.db_url.as_str()).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let auth_state = Arc::new(AuthState::from_config(&config));
    let app = create_app(auth_state, db);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[tracing::instrument]
async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(api::ApiDoc::openapi())
}
