use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// An authenticated session as issued by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owner identifier every task row is scoped by
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Identity as seen by the core components
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Identity not yet known; no store operation may be issued
    #[default]
    Loading,
    SignedOut,
    SignedIn(Session),
}

impl SessionState {
    pub fn owner(&self) -> Option<&str> {
        match self {
            SessionState::SignedIn(s) => Some(s.user_id.as_str()),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::SignedIn(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// Read side of the session, handed to the sync layer and the expansion flow.
pub type SessionWatch = watch::Receiver<SessionState>;

/// Owner of the current identity.
///
/// Starts in `Loading`, is populated by `sign_in` and cleared by `sign_out`.
/// Readers hold a [`SessionWatch`] and never write.
#[derive(Debug)]
pub struct SessionContext {
    tx: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        SessionContext { tx }
    }

    /// A context that already holds `state`
    pub fn with_state(state: SessionState) -> Self {
        let (tx, _rx) = watch::channel(state);
        SessionContext { tx }
    }

    pub fn subscribe(&self) -> SessionWatch {
        self.tx.subscribe()
    }

    pub fn begin_loading(&self) {
        self.tx.send_replace(SessionState::Loading);
    }

    pub fn sign_in(&self, session: Session) {
        self.tx.send_replace(SessionState::SignedIn(session));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(SessionState::SignedOut);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(user: &str) -> Session {
        Session {
            user_id: user.to_string(),
            email: None,
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[test]
    fn starts_loading_then_tracks_sign_in_and_out() {
        let ctx = SessionContext::new();
        let rx = ctx.subscribe();
        assert!(rx.borrow().is_loading());

        ctx.sign_in(session("u-1"));
        assert_eq!(rx.borrow().owner(), Some("u-1"));

        ctx.sign_out();
        assert_eq!(rx.borrow().owner(), None);
        assert!(!rx.borrow().is_loading());
    }

    #[test]
    fn expiry_check() {
        let now = Utc::now();
        let mut s = session("u-1");
        assert!(!s.is_expired(now));
        s.expires_at = Some(now - Duration::seconds(1));
        assert!(s.is_expired(now));
    }
}
