use chrono::{Duration, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::io::http::{error_message, join_url};
use crate::model::config::StoreConfig;
use crate::model::session::Session;

/// Minimum password length accepted by `update_password`
pub const MIN_PASSWORD_LEN: usize = 6;

/// Error type for authentication calls
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not reach the auth service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response from the auth service: {0}")]
    Decode(String),
    #[error("{0}")]
    Invalid(String),
}

/// Result of a sign-up request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    /// The project auto-confirms accounts; the user is signed in
    SignedIn(Session),
    /// A confirmation e-mail was sent
    ConfirmationSent,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Client for the hosted auth service (`/auth/v1`)
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(config: &StoreConfig) -> Self {
        AuthClient {
            client: Client::new(),
            base_url: join_url(&config.url, "auth/v1"),
            api_key: config.anon_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        debug!(%email, "password sign-in");
        let response = self
            .client
            .post(self.url("token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = decode(check(response).await?).await?;
        info!(user = %token.user.id, "signed in");
        Ok(token.into_session())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        debug!("refreshing session");
        let response = self
            .client
            .post(self.url("token?grant_type=refresh_token"))
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = decode(check(response).await?).await?;
        Ok(token.into_session())
    }

    /// Create an account; `username` lands in the user metadata
    pub async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> Result<SignUp, AuthError> {
        let data = match username {
            Some(name) => json!({ "username": name, "full_name": name }),
            None => json!({}),
        };
        let response = self
            .client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password, "data": data }))
            .send()
            .await?;
        let body: serde_json::Value = decode(check(response).await?).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).map_err(|e| AuthError::Decode(e.to_string()))?;
            return Ok(SignUp::SignedIn(token.into_session()));
        }
        Ok(SignUp::ConfirmationSent)
    }

    /// Send a password-reset e-mail that links back to `redirect_to`
    pub async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let url = match redirect_to {
            Some(to) => {
                let mut url = reqwest::Url::parse(&self.url("recover"))
                    .map_err(|e| AuthError::Invalid(e.to_string()))?;
                url.query_pairs_mut().append_pair("redirect_to", to);
                url.to_string()
            }
            None => self.url("recover"),
        };
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Set a new password for the signed-in user
    pub async fn update_password(&self, session: &Session, password: &str, confirm: &str) -> Result<(), AuthError> {
        if password != confirm {
            return Err(AuthError::Invalid("Passwords do not match".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Invalid(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        let response = self
            .client
            .put(self.url("user"))
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
            .send()
            .await?;
        check(response).await?;
        info!(user = %session.user_id, "signed out");
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let mut message = error_message(&body).unwrap_or_else(|| format!("auth request failed ({})", status));
    if message.contains("Invalid login credentials") {
        message = "Invalid email or password".to_string();
    }
    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            user_id: "u-1".into(),
            email: None,
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    fn client() -> AuthClient {
        AuthClient::new(&StoreConfig {
            url: "http://127.0.0.1:9".into(),
            anon_key: "anon".into(),
            table: "tasks".into(),
        })
    }

    #[tokio::test]
    async fn password_update_validates_locally() {
        let err = client().update_password(&session(), "abcdef", "abcdeg").await.unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");

        let err = client().update_password(&session(), "abc", "abc").await.unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters long");
    }

    #[test]
    fn token_response_becomes_session() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"token_type":"bearer",
                "user":{"id":"u-9","email":"cat@example.com"}}"#,
        )
        .unwrap();
        let session = token.into_session();
        assert_eq!(session.user_id, "u-9");
        assert_eq!(session.email.as_deref(), Some("cat@example.com"));
        assert!(session.expires_at.is_some_and(|at| at > Utc::now()));
    }
}
