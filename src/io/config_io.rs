use std::fs;
use std::path::{Path, PathBuf};

use crate::io::atomic::atomic_write;
use crate::model::config::{AppConfig, SortOrder};

/// Keys accepted by `tim config set`
pub const CONFIG_KEYS: &[&str] = &[
    "store.url",
    "store.anon_key",
    "store.table",
    "generator.proxy_url",
    "list.sort",
    "server.bind",
    "server.model",
    "server.upstream_url",
];

const CONFIG_TEMPLATE: &str = r##"# tim configuration

[store]
# Base URL of the hosted project, e.g. "https://xyz.supabase.co"
url = ""
# Public anon key. Row-level security scopes every row to its owner.
anon_key = ""
table = "tasks"

[generator]
# Where `tim serve` is listening
proxy_url = "http://127.0.0.1:8787"

[list]
# Creation-time order for every listing: "asc" (oldest first) or "desc"
sort = "asc"

[server]
bind = "127.0.0.1:8787"
model = "gemini-2.5-pro"
upstream_url = "https://generativelanguage.googleapis.com"
# The provider key is read from GEMINI_API_KEY, never from this file.
"##;

/// Error type for configuration I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not edit config: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}' (expected one of: {keys})", keys = CONFIG_KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding config.toml and session.json, respecting XDG_CONFIG_HOME
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("tim")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Resolve the config file: explicit flag, then `$TIM_CONFIG`, then the default dir
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    match std::env::var("TIM_CONFIG") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_dir().join("config.toml"),
    }
}

/// Load the config file; a missing file means all defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment overrides using `lookup` (normally `std::env::var`)
pub fn apply_env<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("TIM_STORE_URL") {
        config.store.url = url;
    }
    if let Some(key) = lookup("TIM_STORE_KEY") {
        config.store.anon_key = key;
    }
    if let Some(url) = lookup("TIM_PROXY_URL") {
        config.generator.proxy_url = url;
    }
    if let Some(sort) = lookup("TIM_SORT").as_deref().and_then(SortOrder::parse) {
        config.list.sort = sort;
    }
}

/// Load the config file and layer the process environment on top
pub fn effective_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = load_config(path)?;
    apply_env(&mut config, |key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    Ok(config)
}

/// Write the commented template. Refuses to clobber unless `force`.
pub fn init_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    atomic_write(path, CONFIG_TEMPLATE.as_bytes())?;
    Ok(())
}

/// Read the raw document for round-trip-safe editing (empty if missing)
pub fn read_document(path: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    if !path.exists() {
        return Ok(toml_edit::DocumentMut::new());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(text.parse()?)
}

pub fn write_document(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    atomic_write(path, doc.to_string().as_bytes())?;
    Ok(())
}

/// Set `section.field = value` in the document, keeping comments and layout.
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, value: &str) -> Result<(), ConfigError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

    let value = if key == "list.sort" {
        SortOrder::parse(value)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("'{}' is not asc or desc", value),
            })?
            .as_str()
            .to_string()
    } else {
        value.to_string()
    };

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = toml_edit::value(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn template_parses_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tim/config.toml");
        init_config(&path, false).unwrap();
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());

        let err = init_config(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
        init_config(&path, true).unwrap();
    }

    #[test]
    fn parse_error_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[list]\nsort = 7\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("TIM_STORE_URL", "https://env.example"),
            ("TIM_SORT", "desc"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.store.url = "https://file.example".into();
        apply_env(&mut config, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.store.url, "https://env.example");
        assert_eq!(config.list.sort, SortOrder::Desc);
        assert_eq!(config.store.anon_key, "");
    }

    #[test]
    fn set_value_preserves_comments() {
        let mut doc: toml_edit::DocumentMut = CONFIG_TEMPLATE.parse().unwrap();
        set_value(&mut doc, "list.sort", "Descending").unwrap();
        set_value(&mut doc, "store.url", "https://abc.supabase.co").unwrap();
        let text = doc.to_string();
        assert!(text.contains("# Creation-time order"));
        assert!(text.contains("sort = \"desc\""));

        let config: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.store.url, "https://abc.supabase.co");
        assert_eq!(config.list.sort, SortOrder::Desc);
    }

    #[test]
    fn set_value_rejects_unknown_keys_and_bad_sorts() {
        let mut doc = toml_edit::DocumentMut::new();
        assert!(matches!(
            set_value(&mut doc, "store.password", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_value(&mut doc, "list.sort", "sideways"),
            Err(ConfigError::InvalidValue { .. })
        ));
        set_value(&mut doc, "server.bind", "0.0.0.0:9000").unwrap();
        assert!(doc.to_string().contains("[server]"));
    }
}
