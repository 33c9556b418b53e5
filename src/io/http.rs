use serde_json::Value;

/// Pull a human-readable message out of a hosted-backend error body.
///
/// REST rows answer `{"message": ..}`, the auth service uses
/// `error_description` or `msg`, and the relay uses `error`.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "msg", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// Join a base URL and a path without doubling or dropping the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_known_message_fields() {
        assert_eq!(
            error_message(r#"{"code":"42501","message":"permission denied"}"#).as_deref(),
            Some("permission denied")
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#).as_deref(), Some("User already registered"));
    }

    #[test]
    fn non_json_or_blank_is_none() {
        assert_eq!(error_message("<html>bad gateway</html>"), None);
        assert_eq!(error_message(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join_url("http://x/", "/rest/v1/tasks"), "http://x/rest/v1/tasks");
        assert_eq!(join_url("http://x", "api"), "http://x/api");
    }
}
