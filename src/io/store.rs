use async_trait::async_trait;

use crate::model::config::SortOrder;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};

/// Error type for row store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not reach the task store: {0}")]
    Transport(#[from] reqwest::Error),
    /// The store answered with an error payload; `message` is the store's own text
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("unexpected response from the task store: {0}")]
    Decode(String),
    #[error("task store is not configured: {0}")]
    Config(String),
}

/// Row-oriented task persistence, scoped per owner.
///
/// Every operation returns its outcome; nothing panics across this boundary.
/// `update` and `delete` report how many rows matched `id` *and* `owner`, so
/// a foreign id is `Ok(0)` rather than an error.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All rows owned by `owner`, ordered by `created_at`
    async fn select_by_owner(&self, owner: &str, order: SortOrder) -> Result<Vec<Task>, StoreError>;

    async fn insert(&self, task: NewTask) -> Result<(), StoreError>;

    async fn update(&self, id: &TaskId, owner: &str, patch: TaskPatch) -> Result<usize, StoreError>;

    async fn delete(&self, id: &TaskId, owner: &str) -> Result<usize, StoreError>;
}
