//! Staging configuration that upper layers can serialize/deserialize.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Optional store URI: `file:///var/cache/stage` or `memory://`.
    /// `None` means anonymous files in `temp_dir`.
    pub store_uri: Option<String>,

    /// Directory whose filesystem should hold the anonymous files.
    /// `None` (or empty) means the platform default temp location.
    pub temp_dir: Option<String>,

    /// Run the invariant checks after every mutating call. Panics on violation.
    pub check_invariants: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            store_uri: None,
            temp_dir: None,
            check_invariants: cfg!(debug_assertions),
        }
    }
}

impl StagingConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `STAGEBUF_STORE_URI`: store URI (`file://...`, `memory://`)
    /// - `STAGEBUF_TEMP_DIR`: directory hint for anonymous files
    /// - `STAGEBUF_CHECK_INVARIANTS`: `true`/`false`/`1`/`0`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("STAGEBUF_STORE_URI") {
            if !s.trim().is_empty() {
                cfg.store_uri = Some(s);
            }
        }

        if let Ok(s) = std::env::var("STAGEBUF_TEMP_DIR") {
            if !s.trim().is_empty() {
                cfg.temp_dir = Some(s);
            }
        }

        if let Ok(s) = std::env::var("STAGEBUF_CHECK_INVARIANTS") {
            if let Some(v) = parse_bool(&s) {
                cfg.check_invariants = v;
            }
        }

        cfg
    }

    pub fn scheme(&self) -> Option<&str> {
        self.store_uri
            .as_deref()
            .and_then(|uri| uri.split_once("://").map(|(s, _)| s))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Directory hint for the store. A `file://` URI or a bare path in
    /// `store_uri` wins over `temp_dir`.
    pub fn dir_hint(&self) -> Option<PathBuf> {
        match (self.scheme(), self.store_uri.as_deref()) {
            (Some("file"), Some(uri)) => {
                if let Some(p) = file_uri_to_path(uri) {
                    return Some(PathBuf::from(p));
                }
            }
            (None, Some(path)) if !path.trim().is_empty() => {
                return Some(PathBuf::from(path.trim()));
            }
            _ => {}
        }
        self.temp_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn file_uri_to_path(uri: &str) -> Option<String> {
    let stripped = uri.strip_prefix("file://")?;
    if stripped.is_empty() {
        return None;
    }
    if stripped.starts_with('/') {
        Some(stripped.to_string())
    } else {
        Some(format!("/{}", stripped))
    }
}
