use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::debug;

use crate::io::http::{error_message, join_url};
use crate::io::store::{StoreError, TaskStore};
use crate::model::config::{SortOrder, StoreConfig};
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};

/// Task store backed by a PostgREST endpoint (`/rest/v1/<table>`).
///
/// Requests carry the project's `apikey` and the session's access token, so
/// row-level security on the server enforces ownership independently of the
/// `user_id` filters added here.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    table_url: Url,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &StoreConfig) -> Result<Self, StoreError> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Config("store.url is empty".into()));
        }
        let table_path = format!("rest/v1/{}", config.table);
        let table_url = Url::parse(&join_url(&config.url, &table_path))
            .map_err(|e| StoreError::Config(format!("invalid store.url '{}': {}", config.url, e)))?;
        Ok(RestStore {
            client,
            table_url,
            api_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// Authenticate requests as the signed-in user instead of the anon role
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn url_with(&self, pairs: &[(&str, String)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
    }

    /// Filter matching exactly one owned row
    fn row_filter(id: &TaskId, owner: &str) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", owner)),
        ]
    }
}

/// Turn a non-success response into `StoreError::Api`, keeping the store's message
async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
    });
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Number of rows in a `return=representation` body
async fn affected_rows(response: Response) -> Result<usize, StoreError> {
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(0);
    }
    let rows: Vec<Value> =
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(rows.len())
}

#[async_trait]
impl TaskStore for RestStore {
    async fn select_by_owner(&self, owner: &str, order: SortOrder) -> Result<Vec<Task>, StoreError> {
        let url = self.url_with(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner)),
            ("order", format!("created_at.{}", order.as_str())),
        ]);
        debug!(%owner, %order, "select tasks");
        let response = check(self.request(Method::GET, url).send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert(&self, task: NewTask) -> Result<(), StoreError> {
        debug!(owner = %task.user_id, title = %task.title, "insert task");
        let url = self.table_url.clone();
        check(
            self.request(Method::POST, url)
                .header(CONTENT_TYPE, "application/json")
                .header("Prefer", "return=minimal")
                .json(&[task])
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn update(&self, id: &TaskId, owner: &str, patch: TaskPatch) -> Result<usize, StoreError> {
        debug!(%id, %owner, ?patch, "update task");
        let url = self.url_with(&Self::row_filter(id, owner));
        let response = check(
            self.request(Method::PATCH, url)
                .header(CONTENT_TYPE, "application/json")
                .header("Prefer", "return=representation")
                .json(&patch)
                .send()
                .await?,
        )
        .await?;
        affected_rows(response).await
    }

    async fn delete(&self, id: &TaskId, owner: &str) -> Result<usize, StoreError> {
        debug!(%id, %owner, "delete task");
        let url = self.url_with(&Self::row_filter(id, owner));
        let response = check(
            self.request(Method::DELETE, url)
                .header("Prefer", "return=representation")
                .send()
                .await?,
        )
        .await?;
        affected_rows(response).await
    }
}
