use std::collections::HashMap;

use crate::model::task::{Task, TaskId, TaskStatus};

/// Pending display statuses, keyed by task id.
///
/// A status change is shown before the store confirms it. The entry is
/// dropped once canonical state agrees or the change fails. Canonical rows
/// are never modified.
#[derive(Debug, Default)]
pub struct StatusOverlay {
    pending: HashMap<TaskId, TaskStatus>,
}

impl StatusOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: TaskId, status: TaskStatus) {
        self.pending.insert(id, status);
    }

    /// Revert to canonical display for `id`
    pub fn clear(&mut self, id: &TaskId) -> Option<TaskStatus> {
        self.pending.remove(id)
    }

    pub fn pending(&self, id: &TaskId) -> Option<TaskStatus> {
        self.pending.get(id).copied()
    }

    /// The status to display for `task`
    pub fn effective(&self, task: &Task) -> TaskStatus {
        self.pending(&task.id).unwrap_or(task.status)
    }

    /// Drop overrides that a fresh snapshot has caught up with, or whose
    /// task is gone
    pub fn reconcile(&mut self, tasks: &[Task]) {
        self.pending.retain(|id, status| {
            tasks
                .iter()
                .find(|t| &t.id == id)
                .is_some_and(|t| t.status != *status)
        });
    }
}
