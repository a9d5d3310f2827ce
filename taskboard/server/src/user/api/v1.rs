use crate::user::{NewUser, User, UserPatch, UserRepositoryError, UserState};
use crate::validation::{DateBirthInput, UserInput, validate_user, validate_user_patch};
use crate::web::api::{ApiError, ErrorResponse, ValidationErrorResponse};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON representation of a User for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserJson {
    /// Generated identifier of the user record
    id: String,
    /// Email address identifying the user
    user_id: String,
    name: String,
    last_name: String,
    /// Birth date as YYYY-MM-DD
    date_birth: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<User> for UserJson {
    fn from(user: User) -> Self {
        Self {
            id: user.id().to_string(),
            user_id: user.user_id().to_string(),
            name: user.name().to_string(),
            last_name: user.last_name().to_string(),
            date_birth: user.date_birth(),
            created_at: user.created_at(),
        }
    }
}

/// Request body for registering a user. Absent fields are reported by validation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    /// Either DD/MM/YYYY or an ISO 8601 date
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    date_birth: Option<DateBirthInput>,
}

impl CreateUserRequest {
    fn as_input(&self) -> UserInput<'_> {
        UserInput {
            user_id: self.user_id.as_deref(),
            name: self.name.as_deref(),
            last_name: self.last_name.as_deref(),
            date_birth: self.date_birth.as_ref(),
        }
    }
}

/// Request body for a partial user update. Only present fields are changed.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    date_birth: Option<DateBirthInput>,
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(request: UpdateUserRequest) -> Self {
        UserPatch {
            user_id: request.user_id,
            name: request.name,
            last_name: request.last_name,
            date_birth: request.date_birth,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    user_id: Option<String>,
}

/// A user together with a freshly issued bearer token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUserResponse {
    user: UserJson,
    token: String,
    /// Token lifetime in seconds
    expires_in: i64,
}

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

/// Either the single user matching `?userId=` or every user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum UsersResponse {
    One(UserJson),
    Many(Vec<UserJson>),
}

/// Maps a repository failure to its HTTP error, logging backend failures.
fn repository_error(err: UserRepositoryError, message: &'static str) -> ApiError {
    match err {
        UserRepositoryError::Validation(errors) => ApiError::Validation(errors),
        UserRepositoryError::DuplicateUserId(user_id) => {
            tracing::info!("Rejected duplicate user identifier {}", user_id);
            ApiError::Conflict("User already exists")
        }
        UserRepositoryError::Database(err) => {
            tracing::error!("{}: {}", message, err);
            ApiError::Internal(message)
        }
    }
}

fn issue_token_response(
    state: &UserState,
    user: User,
    message: &'static str,
) -> Result<AuthenticatedUserResponse, ApiError> {
    let issued = state.auth.issue_token(&user).map_err(|err| {
        tracing::error!("Failed to issue token: {}", err);
        ApiError::Internal(message)
    })?;
    Ok(AuthenticatedUserResponse {
        user: UserJson::from(user),
        token: issued.token,
        expires_in: issued.expires_in,
    })
}

/// Handler for POST /api/users - Registers a user and returns a token for it.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = AuthenticatedUserResponse),
        (status = 400, description = "Validation failed", body = ValidationErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn create_user_handler(
    State(state): State<Arc<UserState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<AuthenticatedUserResponse>), ApiError> {
    let valid = validate_user(&request.as_input())
        .into_result()
        .map_err(ApiError::Validation)?;

    let new_user = NewUser {
        user_id: valid.user_id,
        name: valid.name,
        last_name: valid.last_name,
        date_birth: DateBirthInput::Date(valid.date_birth),
    };
    let user = state
        .users
        .create(new_user)
        .await
        .map_err(|err| repository_error(err, "Error creating user"))?;

    let response = issue_token_response(&state, user, "Error creating user")?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for POST /api/users/login - Issues a token for an existing user.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthenticatedUserResponse),
        (status = 400, description = "userId is missing", body = ErrorResponse),
        (status = 401, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn login_handler(
    State(state): State<Arc<UserState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthenticatedUserResponse>, ApiError> {
    let user_id = request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|user_id| !user_id.is_empty())
        .ok_or(ApiError::BadRequest("userId is required"))?;

    let user = state
        .users
        .find_by_user_id(user_id)
        .await
        .map_err(|err| repository_error(err, "Error during login"))?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    let response = issue_token_response(&state, user, "Error during login")?;
    Ok(Json(response))
}

/// Handler for GET /api/users - Lists users, or looks one up with `?userId=`.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("userId" = Option<String>, Query, description = "Optional email identifier to look up")
    ),
    responses(
        (status = 200, description = "The matching user, or every user", body = UsersResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn list_users_handler(
    State(state): State<Arc<UserState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    // An empty `?userId=` lists every user.
    let user_id = query.user_id.filter(|user_id| !user_id.trim().is_empty());
    match user_id {
        Some(user_id) => {
            let user = state
                .users
                .find_by_user_id(user_id.trim())
                .await
                .map_err(|err| repository_error(err, "Error getting user"))?
                .ok_or(ApiError::NotFound("User not found"))?;
            Ok(Json(UsersResponse::One(UserJson::from(user))))
        }
        None => {
            let users = state
                .users
                .find_all()
                .await
                .map_err(|err| repository_error(err, "Error getting users"))?;
            Ok(Json(UsersResponse::Many(
                users.into_iter().map(UserJson::from).collect(),
            )))
        }
    }
}

/// Handler for GET /api/users/{id} - Returns a user by record ID.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Generated ID of the user")),
    responses(
        (status = 200, description = "User found", body = UserJson),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn get_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
) -> Result<Json<UserJson>, ApiError> {
    let user = state
        .users
        .find_by_id(&id)
        .await
        .map_err(|err| repository_error(err, "Error getting user"))?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserJson::from(user)))
}

/// Handler for GET /api/users/userId/{userId} - Returns a user by email identifier.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/users/userId/{userId}",
    params(("userId" = String, Path, description = "Email identifier of the user")),
    responses(
        (status = 200, description = "User found", body = UserJson),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn get_user_by_user_id_handler(
    State(state): State<Arc<UserState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserJson>, ApiError> {
    let user = state
        .users
        .find_by_user_id(&user_id)
        .await
        .map_err(|err| repository_error(err, "Error getting user"))?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserJson::from(user)))
}

/// Handler for PUT /api/users/{id} - Applies a partial update.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Generated ID of the user")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserJson),
        (status = 400, description = "Validation failed", body = ValidationErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn update_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserJson>, ApiError> {
    let patch = UserPatch::from(request);
    validate_user_patch(&patch.as_input()).map_err(ApiError::Validation)?;

    let user = state
        .users
        .update(&id, patch)
        .await
        .map_err(|err| repository_error(err, "Error updating user"))?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserJson::from(user)))
}

/// Handler for DELETE /api/users/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Generated ID of the user")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn delete_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .users
        .delete(&id)
        .await
        .map_err(|err| repository_error(err, "Error deleting user"))?;
    if !deleted {
        return Err(ApiError::NotFound("User not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Creates the user routes that do not require a token.
pub fn create_public_api_router(state: Arc<UserState>) -> Router {
    Router::new()
        .route("/users", post(create_user_handler))
        .route("/users/login", post(login_handler))
        .with_state(state)
}

/// Creates the user routes that require a token.
pub fn create_api_router(state: Arc<UserState>) -> Router {
    Router::new()
        .route("/users", get(list_users_handler))
        .route(
            "/users/{id}",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route("/users/userId/{userId}", get(get_user_by_user_id_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthState;
    use crate::user::MockUserRepository;
    use crate::validation::ValidationErrors;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn sample_user() -> User {
        User::new(
            "7d0b".to_string(),
            "ada@example.com".to_string(),
            "Ada".to_string(),
            "Lovelace".to_string(),
            NaiveDate::from_ymd_opt(1990, 5, 15).unwrap(),
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn create_test_app(users: MockUserRepository) -> (Router, Arc<AuthState>) {
        let auth = Arc::new(AuthState::new("test_secret", chrono::Duration::minutes(15)));
        let state = Arc::new(UserState {
            users: Arc::new(users),
            auth: auth.clone(),
        });
        let app = create_public_api_router(state.clone()).merge(create_api_router(state));
        (app, auth)
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn can_create_user_and_issue_token() {
        let mut users = MockUserRepository::new();
        users
            .expect_create()
            .withf(|new_user| {
                new_user.user_id == "ada@example.com"
                    && new_user.name == "Ada"
                    && new_user.date_birth
                        == DateBirthInput::Date(NaiveDate::from_ymd_opt(1990, 5, 15).unwrap())
            })
            .times(1)
            .returning(|_| Ok(sample_user()));
        let (app, auth) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(serde_json::json!({
                "userId": " ada@example.com ",
                "name": "Ada",
                "lastName": "Lovelace",
                "dateBirth": "15/05/1990"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["expiresIn"], 900);
        assert_eq!(body["user"]["userId"], "ada@example.com");
        assert_eq!(body["user"]["dateBirth"], "1990-05-15");
        let claims = auth
            .verify_token(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.user_id, "ada@example.com");
        assert_eq!(claims.id, "7d0b");
    }

    #[tokio::test]
    async fn rejects_invalid_user_before_touching_repository() {
        let mut users = MockUserRepository::new();
        users.expect_create().never();
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(serde_json::json!({
                "userId": "not-an-email",
                "name": "Al",
                "lastName": "Lovelace",
                "dateBirth": "31/02/2020"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(body, @r#"
        {
          "details": {
            "dateBirth": "Invalid date",
            "name": "Name must be at least 3 characters",
            "userId": "Invalid email format"
          },
          "error": "Validation failed"
        }
        "#);
    }

    #[tokio::test]
    async fn reports_missing_fields_as_validation_errors() {
        let (app, _) = create_test_app(MockUserRepository::new());

        let (status, body) = send(app, Method::POST, "/users", Some(serde_json::json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["name"], "Name is required");
        assert_eq!(body["details"]["lastName"], "Last name is required");
        assert_eq!(body["details"]["dateBirth"], "Birth date is required");
        assert_eq!(body["details"]["userId"], "Invalid email format");
    }

    #[tokio::test]
    async fn resurfaces_repository_validation_errors() {
        let mut users = MockUserRepository::new();
        users.expect_create().returning(|_| {
            let mut errors = ValidationErrors::new();
            errors.insert(
                crate::validation::fields::NAME,
                crate::validation::FieldError::TooShort("Name"),
            );
            Err(UserRepositoryError::Validation(errors))
        });
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(serde_json::json!({
                "userId": "ada@example.com",
                "name": "Ada",
                "lastName": "Lovelace",
                "dateBirth": "1990-05-15"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Validation failed",
                "details": { "name": "Name must be at least 3 characters" }
            })
        );
    }

    #[tokio::test]
    async fn rejects_duplicate_user_with_conflict() {
        let mut users = MockUserRepository::new();
        users.expect_create().returning(|new_user| {
            Err(UserRepositoryError::DuplicateUserId(new_user.user_id))
        });
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(serde_json::json!({
                "userId": "ada@example.com",
                "name": "Ada",
                "lastName": "Lovelace",
                "dateBirth": "15/05/1990"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, serde_json::json!({ "error": "User already exists" }));
    }

    #[tokio::test]
    async fn hides_database_errors_on_create() {
        let mut users = MockUserRepository::new();
        users.expect_create().returning(|_| {
            Err(UserRepositoryError::Database(sea_orm::DbErr::Custom(
                "connection refused".to_string(),
            )))
        });
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(serde_json::json!({
                "userId": "ada@example.com",
                "name": "Ada",
                "lastName": "Lovelace",
                "dateBirth": "15/05/1990"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Error creating user" }));
    }

    #[tokio::test]
    async fn can_login_existing_user() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_user_id()
            .withf(|user_id| user_id == "ada@example.com")
            .returning(|_| Ok(Some(sample_user())));
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users/login",
            Some(serde_json::json!({ "userId": "ada@example.com" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], "7d0b");
        assert!(body["token"].as_str().is_some_and(|token| !token.is_empty()));
    }

    #[tokio::test]
    async fn rejects_login_without_user_id() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_user_id().never();
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users/login",
            Some(serde_json::json!({ "userId": "  " })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "userId is required" }));
    }

    #[tokio::test]
    async fn rejects_login_for_unknown_user() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_user_id().returning(|_| Ok(None));
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::POST,
            "/users/login",
            Some(serde_json::json!({ "userId": "missing@x.com" })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({ "error": "User not found" }));
    }

    #[tokio::test]
    async fn can_get_user_by_id() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .withf(|id| id == "7d0b")
            .returning(|_| Ok(Some(sample_user())));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app, Method::GET, "/users/7d0b", None).await;

        assert_eq!(status, StatusCode::OK);
        insta::assert_json_snapshot!(body, @r#"
        {
          "createdAt": "2025-01-01T00:00:00Z",
          "dateBirth": "1990-05-15",
          "id": "7d0b",
          "lastName": "Lovelace",
          "name": "Ada",
          "userId": "ada@example.com"
        }
        "#);
    }

    #[tokio::test]
    async fn reports_unknown_user_as_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));
        users.expect_find_by_user_id().returning(|_| Ok(None));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app.clone(), Method::GET, "/users/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "User not found" }));

        let (status, _) = send(app, Method::GET, "/users/userId/nope@x.com", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn can_get_user_by_user_id() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_user_id()
            .withf(|user_id| user_id == "ada@example.com")
            .returning(|_| Ok(Some(sample_user())));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app, Method::GET, "/users/userId/ada@example.com", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "7d0b");
    }

    #[tokio::test]
    async fn hides_database_errors_on_lookup() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| {
            Err(UserRepositoryError::Database(sea_orm::DbErr::Custom(
                "timeout".to_string(),
            )))
        });
        let (app, _) = create_test_app(users);

        let (status, body) = send(app, Method::GET, "/users/7d0b", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Error getting user" }));
    }

    #[tokio::test]
    async fn can_list_every_user() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_all()
            .returning(|| Ok(vec![sample_user()]));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app, Method::GET, "/users", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["userId"], "ada@example.com");
    }

    #[tokio::test]
    async fn can_look_up_single_user_with_query() {
        let mut users = MockUserRepository::new();
        users.expect_find_all().never();
        users
            .expect_find_by_user_id()
            .withf(|user_id| user_id == "ada@example.com")
            .returning(|_| Ok(Some(sample_user())));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app, Method::GET, "/users?userId=ada@example.com", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "7d0b");
    }

    #[tokio::test]
    async fn lists_every_user_for_blank_query() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_user_id().never();
        users
            .expect_find_all()
            .times(2)
            .returning(|| Ok(vec![sample_user()]));
        let (app, _) = create_test_app(users);

        for uri in ["/users?userId=", "/users?userId=%20%20"] {
            let (status, body) = send(app.clone(), Method::GET, uri, None).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_array().map(Vec::len), Some(1), "{uri}");
        }
    }

    #[tokio::test]
    async fn can_update_only_present_fields() {
        let mut users = MockUserRepository::new();
        users
            .expect_update()
            .withf(|id, patch| {
                id == "7d0b"
                    && patch.name.as_deref() == Some("Augusta")
                    && patch.user_id.is_none()
                    && patch.date_birth.is_none()
            })
            .returning(|_, _| Ok(Some(sample_user())));
        let (app, _) = create_test_app(users);

        let (status, _) = send(
            app,
            Method::PUT,
            "/users/7d0b",
            Some(serde_json::json!({ "name": "Augusta" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_invalid_present_fields_on_update() {
        let mut users = MockUserRepository::new();
        users.expect_update().never();
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::PUT,
            "/users/7d0b",
            Some(serde_json::json!({ "dateBirth": "01/01/2999" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Validation failed",
                "details": { "dateBirth": "Birth date cannot be in the future" }
            })
        );
    }

    #[tokio::test]
    async fn reports_update_of_unknown_user_as_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_update().returning(|_, _| Ok(None));
        let (app, _) = create_test_app(users);

        let (status, body) = send(
            app,
            Method::PUT,
            "/users/nope",
            Some(serde_json::json!({ "name": "Augusta" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "User not found" }));
    }

    #[tokio::test]
    async fn can_delete_user_once() {
        let mut users = MockUserRepository::new();
        let mut sequence = mockall::Sequence::new();
        users
            .expect_delete()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(true));
        users
            .expect_delete()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(false));
        let (app, _) = create_test_app(users);

        let (status, body) = send(app.clone(), Method::DELETE, "/users/7d0b", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, serde_json::Value::Null);

        let (status, body) = send(app, Method::DELETE, "/users/7d0b", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "User not found" }));
    }
}
