use crate::entities::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::sync::Arc;

pub use crate::entities::sea_orm_active_enums::{TaskPriority, TaskStatus, UnknownVariant};

pub mod api;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: String,
    user_id: String,
    title: String,
    description: String,
    status: TaskStatus,
    priority: TaskPriority,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: String,
        user_id: String,
        title: String,
        description: String,
        status: TaskStatus,
        priority: TaskPriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            title,
            description,
            status,
            priority,
            created_at,
        }
    }

    /// Returns the ID of the task.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the email identifier of the owning user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task::new(
            model.id,
            model.user_id,
            model.title,
            model.description,
            model.status,
            model.priority,
            model.created_at,
        )
    }
}

/// Payload for creating a task. A missing priority is stored as medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
}

/// Field mask for a partial task update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }
}

/// Error type for TaskRepository operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskRepositoryError {
    /// The task has no owning user identifier.
    #[error("A task must belong to a user")]
    MissingUserId,
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Persistence operations for tasks.
///
/// A missing record is reported as `Ok(None)` or `Ok(false)`, never as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task, assigning its ID and creation time. A blank owner is rejected.
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskRepositoryError>;

    /// Lists a user's tasks, newest first.
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Task>, TaskRepositoryError>;

    /// Applies the present fields of `patch`. Returns `None` if the task does not exist.
    async fn update(&self, id: &str, patch: TaskPatch)
    -> Result<Option<Task>, TaskRepositoryError>;

    /// Returns `false` if the task does not exist.
    async fn delete(&self, id: &str) -> Result<bool, TaskRepositoryError>;

    /// Sets only the status. Returns `None` if the task does not exist.
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
    ) -> Result<Option<Task>, TaskRepositoryError>;
}

#[derive(Clone)]
pub struct TaskState {
    pub tasks: Arc<dyn TaskRepository>,
}

/// [`TaskRepository`] backed by a SeaORM connection.
#[derive(Clone, Debug)]
pub struct SeaOrmTaskRepository {
    db: Arc<sea_orm::DatabaseConnection>,
}

impl SeaOrmTaskRepository {
    pub fn new(db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepository for SeaOrmTaskRepository {
    #[tracing::instrument(skip(self))]
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskRepositoryError> {
        if new_task.user_id.trim().is_empty() {
            return Err(TaskRepositoryError::MissingUserId);
        }

        let active_model = task::ActiveModel {
            id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
            user_id: ActiveValue::Set(new_task.user_id),
            title: ActiveValue::Set(new_task.title),
            description: ActiveValue::Set(new_task.description),
            status: ActiveValue::Set(new_task.status),
            priority: ActiveValue::Set(new_task.priority.unwrap_or_default()),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let created_model = active_model.insert(self.db.as_ref()).await?;
        Ok(Task::from(created_model))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Task>, TaskRepositoryError> {
        let tasks = task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .order_by_desc(task::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    #[tracing::instrument(skip(self))]
    async fn update(
        &self,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Option<Task>, TaskRepositoryError> {
        let Some(existing) = task::Entity::find_by_id(id).one(self.db.as_ref()).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(Task::from(existing)));
        }

        let mut active_model: task::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = patch.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(status) = patch.status {
            active_model.status = ActiveValue::Set(status);
        }
        if let Some(priority) = patch.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        let updated_model = active_model.update(self.db.as_ref()).await?;
        Ok(Some(Task::from(updated_model)))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool, TaskRepositoryError> {
        let exists = task::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        task::Entity::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
    ) -> Result<Option<Task>, TaskRepositoryError> {
        let Some(existing) = task::Entity::find_by_id(id).one(self.db.as_ref()).await? else {
            return Ok(None);
        };

        let mut active_model: task::ActiveModel = existing.into();
        active_model.status = ActiveValue::Set(status);
        let updated_model = active_model.update(self.db.as_ref()).await?;
        Ok(Some(Task::from(updated_model)))
    }
}
