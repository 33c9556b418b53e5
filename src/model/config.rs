use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Hosted row store (REST + auth endpoints share the base URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key; row-level security does the scoping
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: String::new(),
            anon_key: String::new(),
            table: default_table(),
        }
    }
}

fn default_table() -> String {
    "tasks".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL of the relay started with `tim serve`
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            proxy_url: default_proxy_url(),
        }
    }
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

/// Direction of the creation-time ordering used for every fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    #[default]
    Asc,
    /// Newest first
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<SortOrder> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Some(SortOrder::Asc),
            "desc" | "descending" | "newest" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default)]
    pub sort: SortOrder,
}

/// Settings for the text-generation relay (`tim serve`).
/// The provider API key is read from the environment only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            model: default_model(),
            upstream_url: default_upstream_url(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_upstream_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.store.table, "tasks");
        assert_eq!(config.list.sort, SortOrder::Asc);
        assert_eq!(config.server.model, "gemini-2.5-pro");
    }

    #[test]
    fn partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"[store]
url = "https://abc.supabase.co"

[list]
sort = "desc"
"#,
        )
        .unwrap();
        assert_eq!(config.store.url, "https://abc.supabase.co");
        assert_eq!(config.store.table, "tasks");
        assert_eq!(config.list.sort, SortOrder::Desc);
        assert_eq!(config.generator.proxy_url, "http://127.0.0.1:8787");
    }

    #[test]
    fn sort_order_parse() {
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("oldest"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }
}
