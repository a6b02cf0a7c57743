//! # Blog configuration
//!
//! A flat string key/value store in the spirit of Feathers' `app.set()` /
//! `app.get()`. Defaults come from [`BlogConfig::with_defaults`] and can be
//! overridden from the environment:
//!
//! ```rust
//! use blog_core::BlogConfig;
//!
//! let mut config = BlogConfig::with_defaults();
//! config.set("uploads.dir", "/srv/blog/uploads");
//! assert_eq!(config.get("uploads.dir"), Some("/srv/blog/uploads"));
//! ```
//!
//! `BLOG__UPLOADS__DIR=/srv/up` becomes `uploads.dir` once
//! `load_env("BLOG__")` runs.

use std::collections::HashMap;

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_PORT: &str = "http.port";
pub const BLOG_MOUNT: &str = "blog.mount";
pub const BLOG_DEFAULT_COVER: &str = "blog.default_cover";
pub const UPLOADS_DIR: &str = "uploads.dir";
pub const UPLOADS_URL_PREFIX: &str = "uploads.url_prefix";
pub const UPLOADS_FIELD: &str = "uploads.field";
pub const UPLOADS_MAX_FILE_BYTES: &str = "uploads.max_file_bytes";
pub const UPLOADS_MAX_FIELD_BYTES: &str = "uploads.max_field_bytes";
pub const UPLOADS_ALLOWED_TYPES: &str = "uploads.allowed_types";
pub const STATIC_IMAGES_DIR: &str = "static.images_dir";
pub const AUTH_USER_HEADER: &str = "auth.user_header";
pub const AUTH_NAME_HEADER: &str = "auth.name_header";
pub const AUTH_EMAIL_HEADER: &str = "auth.email_header";

const DEFAULTS: &[(&str, &str)] = &[
    (HTTP_HOST, "127.0.0.1"),
    (HTTP_PORT, "8000"),
    (BLOG_MOUNT, "/blog"),
    (BLOG_DEFAULT_COVER, "/images/default.png"),
    (UPLOADS_DIR, "./public/uploads"),
    (UPLOADS_URL_PREFIX, "/uploads"),
    (UPLOADS_FIELD, "coverImage"),
    (UPLOADS_MAX_FILE_BYTES, "5242880"),
    (UPLOADS_MAX_FIELD_BYTES, "65536"),
    (UPLOADS_ALLOWED_TYPES, ""),
    (STATIC_IMAGES_DIR, "./public/images"),
    (AUTH_USER_HEADER, "x-user-id"),
    (AUTH_NAME_HEADER, "x-user-name"),
    (AUTH_EMAIL_HEADER, "x-user-email"),
];

#[derive(Debug, Default, Clone)]
pub struct BlogConfig {
    values: HashMap<String, String>,
}

impl BlogConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// A store pre-filled with every key the blog reads.
    pub fn with_defaults() -> Self {
        let mut config = Self::new();
        for (k, v) in DEFAULTS {
            config.set(*k, *v);
        }
        config
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Apply `PREFIX` environment variables on top of the current values.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                tracing::debug!(key = %normalized, "config override from environment");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> BlogConfigSnapshot {
        BlogConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only view handed to request handlers.
#[derive(Debug, Clone, Default)]
pub struct BlogConfigSnapshot {
    map: HashMap<String, String>,
}

impl BlogConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Comma separated list; blank entries are dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_upload_and_cover_keys() {
        let snap = BlogConfig::with_defaults().snapshot();
        assert_eq!(snap.get(BLOG_DEFAULT_COVER), Some("/images/default.png"));
        assert_eq!(snap.get(UPLOADS_FIELD), Some("coverImage"));
        assert_eq!(snap.get_u64(UPLOADS_MAX_FILE_BYTES), Some(5 * 1024 * 1024));
        assert_eq!(snap.get_u64(UPLOADS_MAX_FIELD_BYTES), Some(64 * 1024));
        assert!(snap.get_list(UPLOADS_ALLOWED_TYPES).is_empty());
    }

    #[test]
    fn env_overrides_are_normalized() {
        let mut config = BlogConfig::with_defaults();
        config.load_vars(
            "BLOG__",
            vec![
                ("BLOG__UPLOADS__DIR".to_string(), "/srv/up".to_string()),
                ("OTHER__UPLOADS__DIR".to_string(), "/ignored".to_string()),
            ],
        );
        assert_eq!(config.get(UPLOADS_DIR), Some("/srv/up"));
    }

    #[test]
    fn list_values_are_trimmed() {
        let mut config = BlogConfig::new();
        config.set(UPLOADS_ALLOWED_TYPES, "image/png, image/jpeg ,,");
        assert_eq!(
            config.snapshot().get_list(UPLOADS_ALLOWED_TYPES),
            vec!["image/png".to_string(), "image/jpeg".to_string()]
        );
    }
}
