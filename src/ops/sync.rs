use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::io::store::{StoreError, TaskStore};
use crate::model::config::SortOrder;
use crate::model::session::SessionWatch;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};

/// Error type for task synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Rejected locally; the store was not contacted
    #[error("{0}")]
    Validation(String),
    #[error("session is still loading")]
    SessionLoading,
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Holds `loading` up for the life of a fetch, including one that is dropped
/// mid-await
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        LoadingFlag(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Session-scoped view of the signed-in user's tasks.
///
/// Mutations go straight to the store and never touch the local list; the
/// list only changes on [`TaskSync::fetch_tasks`], which swaps in a complete
/// fresh snapshot (refetch-after-mutation).
pub struct TaskSync<S: TaskStore> {
    store: Arc<S>,
    session: SessionWatch,
    sort: SortOrder,
    tasks: Arc<[Task]>,
    loading: bool,
}

impl<S: TaskStore> TaskSync<S> {
    pub fn new(store: Arc<S>, session: SessionWatch, sort: SortOrder) -> Self {
        TaskSync {
            store,
            session,
            sort,
            tasks: Arc::from(Vec::new()),
            loading: false,
        }
    }

    /// The current snapshot
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// A shared handle on the current snapshot; later fetches do not alter it
    pub fn snapshot(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// True while a fetch is in flight or the identity is still loading
    pub fn is_loading(&self) -> bool {
        self.loading || self.session.borrow().is_loading()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn clear(&mut self) {
        self.tasks = Arc::from(Vec::new());
    }

    /// The owner to scope a store call by. Never held across an await.
    fn owner(&self) -> Result<String, SyncError> {
        let state = self.session.borrow();
        if state.is_loading() {
            return Err(SyncError::SessionLoading);
        }
        state
            .owner()
            .map(str::to_string)
            .ok_or(SyncError::NotAuthenticated)
    }

    /// Replace the list with the owner's rows in the configured order.
    ///
    /// On failure the list is emptied rather than left stale. Without an
    /// identity the list is emptied too; while the identity is loading
    /// nothing is touched.
    pub async fn fetch_tasks(&mut self) -> Result<&[Task], SyncError> {
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(SyncError::NotAuthenticated) => {
                self.clear();
                return Err(SyncError::NotAuthenticated);
            }
            Err(e) => return Err(e),
        };

        let result = {
            let _loading = LoadingFlag::raise(&mut self.loading);
            self.store.select_by_owner(&owner, self.sort).await
        };

        match result {
            Ok(rows) => {
                debug!(%owner, count = rows.len(), "fetched tasks");
                self.tasks = Arc::from(rows);
                Ok(&self.tasks[..])
            }
            Err(e) => {
                warn!(%owner, error = %e, "fetch failed; clearing task list");
                self.clear();
                Err(e.into())
            }
        }
    }

    /// Insert a new `todo` task. Callers refetch to see it.
    pub async fn add_task(&self, title: &str, description: &str) -> Result<(), SyncError> {
        if title.trim().is_empty() {
            return Err(SyncError::Validation("Title is required".into()));
        }
        let owner = self.owner()?;
        self.store
            .insert(NewTask::todo(&owner, title, description))
            .await?;
        info!(%owner, %title, "task added");
        Ok(())
    }

    /// Replace title and description. Returns the number of rows the store
    /// matched; a task owned by someone else matches zero.
    pub async fn update_task(&self, id: &TaskId, title: &str, description: &str) -> Result<usize, SyncError> {
        let owner = self.owner()?;
        let affected = self
            .store
            .update(id, &owner, TaskPatch::content(title, description))
            .await?;
        info!(%id, affected, "task updated");
        Ok(affected)
    }

    pub async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<usize, SyncError> {
        let owner = self.owner()?;
        let affected = self.store.update(id, &owner, TaskPatch::status(status)).await?;
        info!(%id, %status, affected, "task status updated");
        Ok(affected)
    }

    /// Hard delete
    pub async fn delete_task(&self, id: &TaskId) -> Result<usize, SyncError> {
        let owner = self.owner()?;
        let affected = self.store.delete(id, &owner).await?;
        info!(%id, affected, "task deleted");
        Ok(affected)
    }

    /// React to the current identity: fetch when signed in, clear when
    /// signed out, wait while loading. Returns `None` while loading.
    pub async fn resync_session(&mut self) -> Option<Result<&[Task], SyncError>> {
        let (loading, signed_in) = {
            let state = self.session.borrow_and_update();
            (state.is_loading(), state.owner().is_some())
        };
        if loading {
            return None;
        }
        if signed_in {
            Some(self.fetch_tasks().await)
        } else {
            self.clear();
            Some(Ok(&self.tasks[..]))
        }
    }

    /// Wait for the identity to change, then resync. Returns `None` once the
    /// session context has been dropped.
    pub async fn watch_session(&mut self) -> Option<Result<&[Task], SyncError>> {
        loop {
            self.session.changed().await.ok()?;
            let loading = self.session.borrow().is_loading();
            if !loading {
                return self.resync_session().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_store::{MemoryStore, StoreOp};
    use crate::model::session::{Session, SessionContext, SessionState};

    fn signed_in(user: &str) -> SessionContext {
        SessionContext::with_state(SessionState::SignedIn(Session {
            user_id: user.to_string(),
            email: None,
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
        }))
    }

    fn sync_for(ctx: &SessionContext) -> TaskSync<MemoryStore> {
        TaskSync::new(Arc::new(MemoryStore::new()), ctx.subscribe(), SortOrder::Asc)
    }

    #[tokio::test]
    async fn blank_title_never_reaches_the_store() {
        let ctx = signed_in("u-1");
        let sync = sync_for(&ctx);
        for title in ["", "   ", "\t\n"] {
            let err = sync.add_task(title, "desc").await.unwrap_err();
            assert!(matches!(err, SyncError::Validation(_)));
        }
        assert_eq!(sync.store().calls(StoreOp::Insert), 0);
    }

    #[tokio::test]
    async fn loading_session_blocks_store_calls() {
        let ctx = SessionContext::new();
        let mut sync = sync_for(&ctx);
        assert!(sync.is_loading());
        assert!(matches!(sync.fetch_tasks().await, Err(SyncError::SessionLoading)));
        assert!(matches!(sync.add_task("t", "").await, Err(SyncError::SessionLoading)));
        assert!(sync.resync_session().await.is_none());
        assert_eq!(sync.store().calls(StoreOp::Select), 0);
        assert_eq!(sync.store().calls(StoreOp::Insert), 0);
    }

    #[tokio::test]
    async fn mutation_does_not_touch_list_until_refetch() {
        let ctx = signed_in("u-1");
        let mut sync = sync_for(&ctx);
        sync.add_task("Feed the cat", "twice").await.unwrap();
        assert!(sync.tasks().is_empty());

        let tasks = sync.fetch_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn failed_fetch_empties_the_list() {
        let ctx = signed_in("u-1");
        let mut sync = sync_for(&ctx);
        sync.add_task("one", "").await.unwrap();
        sync.fetch_tasks().await.unwrap();
        assert_eq!(sync.tasks().len(), 1);

        sync.store().fail_next(StoreOp::Select, "relation \"tasks\" does not exist");
        let err = sync.fetch_tasks().await.unwrap_err();
        assert_eq!(err.to_string(), "relation \"tasks\" does not exist");
        assert!(sync.tasks().is_empty());
        assert!(!sync.is_loading());
    }

    #[test]
    fn loading_flag_resets_when_dropped() {
        let mut loading = false;
        let flag = LoadingFlag::raise(&mut loading);
        assert!(*flag.0);
        // a fetch future dropped mid-await drops its flag the same way
        drop(flag);
        assert!(!loading);
    }

    #[tokio::test]
    async fn snapshots_are_replaced_not_mutated() {
        let ctx = signed_in("u-1");
        let mut sync = sync_for(&ctx);
        sync.add_task("one", "").await.unwrap();
        sync.fetch_tasks().await.unwrap();
        let before = sync.snapshot();

        sync.add_task("two", "").await.unwrap();
        sync.fetch_tasks().await.unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(sync.tasks().len(), 2);
    }

    #[tokio::test]
    async fn sign_out_clears_the_list() {
        let ctx = signed_in("u-1");
        let mut sync = sync_for(&ctx);
        sync.add_task("one", "").await.unwrap();
        sync.resync_session().await.unwrap().unwrap();
        assert_eq!(sync.tasks().len(), 1);

        ctx.sign_out();
        let tasks = sync.resync_session().await.unwrap().unwrap();
        assert!(tasks.is_empty());
        assert!(matches!(sync.fetch_tasks().await, Err(SyncError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn watch_session_fetches_after_sign_in() {
        let ctx = SessionContext::new();
        let store = Arc::new(MemoryStore::new());
        store.insert(NewTask::todo("u-7", "waiting", "")).await.unwrap();
        let mut sync = TaskSync::new(Arc::clone(&store), ctx.subscribe(), SortOrder::Asc);

        ctx.begin_loading();
        ctx.sign_in(Session {
            user_id: "u-7".into(),
            email: None,
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
        });
        let tasks = sync.watch_session().await.unwrap().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "waiting");
    }

    #[tokio::test]
    async fn update_and_status_are_scoped_to_owner() {
        let ctx = signed_in("u-1");
        let mut sync = sync_for(&ctx);
        sync.store().insert(NewTask::todo("u-2", "foreign", "")).await.unwrap();
        let foreign = sync.store().rows()[0].id.clone();

        assert_eq!(sync.update_task(&foreign, "mine now", "").await.unwrap(), 0);
        assert_eq!(sync.update_status(&foreign, TaskStatus::Done).await.unwrap(), 0);

        sync.add_task("own", "").await.unwrap();
        sync.fetch_tasks().await.unwrap();
        let own = sync.tasks()[0].id.clone();
        assert_eq!(sync.update_status(&own, TaskStatus::InProgress).await.unwrap(), 1);
        assert_eq!(sync.update_task(&own, "own, renamed", "with notes").await.unwrap(), 1);

        sync.fetch_tasks().await.unwrap();
        let task = sync.find(&own).unwrap();
        assert_eq!(task.title, "own, renamed");
        assert_eq!(task.description, "with notes");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(sync.store().rows()[0].title, "foreign");
    }
}
