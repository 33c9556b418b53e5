use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::io::store::{StoreError, TaskStore};
use crate::model::config::SortOrder;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};

/// Which store operation a counter or injected failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Task>,
    last_stamp: Option<DateTime<Utc>>,
    calls: HashMap<StoreOp, usize>,
    failures: HashMap<StoreOp, Vec<String>>,
}

impl Inner {
    /// Strictly increasing timestamps so creation order is always observable
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn enter(&mut self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op) {
            Some(queue) if !queue.is_empty() => Err(StoreError::Api {
                status: 500,
                message: queue.remove(0),
            }),
            _ => Ok(()),
        }
    }
}

/// In-process task store with the same owner scoping as the hosted one.
///
/// Ids are UUIDs, timestamps are assigned on insert and bumped on update.
/// Calls are counted per operation and failures can be queued per
/// operation, which makes it the store of choice for exercising the
/// sync layer and the expansion flow.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `message`
    pub fn fail_next(&self, op: StoreOp, message: &str) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push(message.to_string());
    }

    /// How many times `op` has been invoked
    pub fn calls(&self, op: StoreOp) -> usize {
        self.inner.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every row regardless of owner, in insertion order
    pub fn rows(&self) -> Vec<Task> {
        self.inner.lock().rows.clone()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn select_by_owner(&self, owner: &str, order: SortOrder) -> Result<Vec<Task>, StoreError> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::Select)?;
        let mut rows: Vec<Task> = inner
            .rows
            .iter()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        if order == SortOrder::Desc {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn insert(&self, task: NewTask) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::Insert)?;
        let created_at = inner.stamp();
        inner.rows.push(Task {
            id: TaskId::new(uuid::Uuid::new_v4().to_string()),
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            status: task.status,
            created_at,
            updated_at: Some(created_at),
        });
        Ok(())
    }

    async fn update(&self, id: &TaskId, owner: &str, patch: TaskPatch) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::Update)?;
        let stamp = inner.stamp();
        let mut affected = 0;
        for task in inner
            .rows
            .iter_mut()
            .filter(|t| &t.id == id && t.user_id == owner)
        {
            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = description.clone();
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            task.updated_at = Some(stamp);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, id: &TaskId, owner: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::Delete)?;
        let before = inner.rows.len();
        inner.rows.retain(|t| !(&t.id == id && t.user_id == owner));
        Ok(before - inner.rows.len())
    }
}
