use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::io::atomic::atomic_write;
use crate::model::session::Session;

/// session.json lives next to the config file
pub fn session_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|dir| dir.join("session.json"))
        .unwrap_or_else(|| PathBuf::from("session.json"))
}

/// Read the persisted session. Missing or unreadable files mean "signed out".
pub fn read_session(path: &Path) -> Option<Session> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed session file");
            None
        }
    }
}

pub fn write_session(path: &Path, session: &Session) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(session)?;
    atomic_write(path, content.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Remove the persisted session; already-absent is fine
pub fn clear_session(path: &Path) -> Result<(), std::io::Error> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
