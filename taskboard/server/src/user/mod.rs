use crate::auth::AuthState;
use crate::entities::*;
use crate::validation::{
    DateBirthInput, UserInput, ValidationErrors, validate_user, validate_user_patch,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::*;
use std::sync::Arc;

pub mod api;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct User {
    id: String,
    user_id: String,
    name: String,
    last_name: String,
    date_birth: NaiveDate,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: String,
        user_id: String,
        name: String,
        last_name: String,
        date_birth: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            last_name,
            date_birth,
            created_at,
        }
    }

    /// Returns the generated ID of the user record.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the user's email identifier.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn date_birth(&self) -> NaiveDate {
        self.date_birth
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(
            model.id,
            model.user_id,
            model.name,
            model.last_name,
            model.date_birth,
            model.created_at,
        )
    }
}

/// Payload for creating a user. Repositories validate it again before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: String,
    pub name: String,
    pub last_name: String,
    pub date_birth: DateBirthInput,
}

impl NewUser {
    pub fn as_input(&self) -> UserInput<'_> {
        UserInput {
            user_id: Some(&self.user_id),
            name: Some(&self.name),
            last_name: Some(&self.last_name),
            date_birth: Some(&self.date_birth),
        }
    }
}

/// Field mask for a partial user update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub date_birth: Option<DateBirthInput>,
}

impl UserPatch {
    pub fn as_input(&self) -> UserInput<'_> {
        UserInput {
            user_id: self.user_id.as_deref(),
            name: self.name.as_deref(),
            last_name: self.last_name.as_deref(),
            date_birth: self.date_birth.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.name.is_none()
            && self.last_name.is_none()
            && self.date_birth.is_none()
    }
}

/// Error type for UserRepository operations.
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    /// The payload failed field validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// Another user already owns this email identifier.
    #[error("A user with identifier '{0}' already exists")]
    DuplicateUserId(String),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Persistence operations for users.
///
/// A missing record is reported as `Ok(None)` or `Ok(false)`, never as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Validates and stores a new user, assigning its ID.
    async fn create(&self, new_user: NewUser) -> Result<User, UserRepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, UserRepositoryError>;

    /// Looks a user up by email identifier.
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<User>, UserRepositoryError>;

    async fn find_all(&self) -> Result<Vec<User>, UserRepositoryError>;

    /// Applies the present fields of `patch`. Returns `None` if the user does not exist.
    async fn update(&self, id: &str, patch: UserPatch)
    -> Result<Option<User>, UserRepositoryError>;

    /// Returns `false` if the user does not exist.
    async fn delete(&self, id: &str) -> Result<bool, UserRepositoryError>;
}

#[derive(Clone)]
pub struct UserState {
    pub users: Arc<dyn UserRepository>,
    pub auth: Arc<AuthState>,
}

/// [`UserRepository`] backed by a SeaORM connection.
#[derive(Clone, Debug)]
pub struct SeaOrmUserRepository {
    db: Arc<sea_orm::DatabaseConnection>,
}

impl SeaOrmUserRepository {
    pub fn new(db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_model_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<user::Model>, UserRepositoryError> {
        let model = user::Entity::find()
            .filter(user::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;
        Ok(model)
    }
}

/// Maps a write that lost a race on the unique `user_id` index to a duplicate.
fn write_error(err: DbErr, user_id: &str) -> UserRepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            UserRepositoryError::DuplicateUserId(user_id.to_string())
        }
        _ => UserRepositoryError::Database(err),
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    #[tracing::instrument(skip(self))]
    async fn create(&self, new_user: NewUser) -> Result<User, UserRepositoryError> {
        let valid = validate_user(&new_user.as_input()).into_result()?;

        if self.find_model_by_user_id(&valid.user_id).await?.is_some() {
            return Err(UserRepositoryError::DuplicateUserId(valid.user_id));
        }

        let active_model = user::ActiveModel {
            id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
            user_id: ActiveValue::Set(valid.user_id.clone()),
            name: ActiveValue::Set(valid.name),
            last_name: ActiveValue::Set(valid.last_name),
            date_birth: ActiveValue::Set(valid.date_birth),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let created_model = active_model
            .insert(self.db.as_ref())
            .await
            .map_err(|err| write_error(err, &valid.user_id))?;
        tracing::info!("Created user {}", created_model.id);
        Ok(User::from(created_model))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, UserRepositoryError> {
        let model = user::Entity::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(model.map(User::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.find_model_by_user_id(user_id).await?.map(User::from))
    }

    #[tracing::instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<User>, UserRepositoryError> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        Ok(users)
    }

    #[tracing::instrument(skip(self))]
    async fn update(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<User>, UserRepositoryError> {
        // Only the fields present in the patch are checked.
        let valid = validate_user_patch(&patch.as_input())?;

        let Some(existing) = user::Entity::find_by_id(id).one(self.db.as_ref()).await? else {
            return Ok(None);
        };
        if valid.is_empty() {
            return Ok(Some(User::from(existing)));
        }

        if let Some(user_id) = &valid.user_id {
            if *user_id != existing.user_id
                && self.find_model_by_user_id(user_id).await?.is_some()
            {
                return Err(UserRepositoryError::DuplicateUserId(user_id.clone()));
            }
        }

        let target_user_id = valid
            .user_id
            .clone()
            .unwrap_or_else(|| existing.user_id.clone());
        let mut active_model: user::ActiveModel = existing.into();
        if let Some(user_id) = valid.user_id {
            active_model.user_id = ActiveValue::Set(user_id);
        }
        if let Some(name) = valid.name {
            active_model.name = ActiveValue::Set(name);
        }
        if let Some(last_name) = valid.last_name {
            active_model.last_name = ActiveValue::Set(last_name);
        }
        if let Some(date_birth) = valid.date_birth {
            active_model.date_birth = ActiveValue::Set(date_birth);
        }
        let updated_model = active_model
            .update(self.db.as_ref())
            .await
            .map_err(|err| write_error(err, &target_user_id))?;
        Ok(Some(User::from(updated_model)))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool, UserRepositoryError> {
        let exists = user::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        user::Entity::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(true)
    }
}
