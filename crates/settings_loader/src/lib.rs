//! # Settings Loader
//!
//! Loads the client [`Settings`] (store URL, bearer token, debounce window,
//! request timeout) from a JSON file and layers environment overrides on top.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/my_settings.json")?;
//!
//! // File (or defaults) plus `.env` and environment overrides
//! let path = Some(PathBuf::from("settings.json"));
//! let settings = settings_loader::load_effective_settings(path.as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use models::Settings;

pub const ENV_API_URL: &str = "PROJECTION_API_URL";
pub const ENV_API_TOKEN: &str = "PROJECTION_API_TOKEN";
pub const ENV_DEBOUNCE_MS: &str = "PROJECTION_DEBOUNCE_MS";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    validate(&settings).with_context(|| format!("Validating {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from a default location (settings.json in the current directory)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("settings.json")
}

/// Loads settings from an optional path, returning None if no path is provided
pub fn load_optional_settings(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    match path {
        Some(settings_path) => Ok(Some(load_settings(settings_path)?)),
        None => Ok(None),
    }
}

/// Tries the provided path, then the default location. Returns None only if
/// no readable settings file is found anywhere.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    if let Some(settings_path) = path {
        match load_settings(settings_path) {
            Ok(settings) => return Ok(Some(settings)),
            Err(err) => tracing::warn!(error = %err, "falling back to default settings location"),
        }
    }

    if !default_settings_exist() {
        return Ok(None);
    }
    load_default_settings().map(Some)
}

/// Applies overrides read through `lookup`; empty values are ignored.
pub fn apply_overrides<F>(mut settings: Settings, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = get(ENV_API_URL) {
        settings.api_base_url = url;
    }
    if let Some(token) = get(ENV_API_TOKEN) {
        settings.api_token = Some(token);
    }
    if let Some(raw) = get(ENV_DEBOUNCE_MS) {
        settings.debounce_ms = raw
            .parse()
            .with_context(|| format!("{ENV_DEBOUNCE_MS} must be a whole number of milliseconds, got '{raw}'"))?;
    }
    validate(&settings)?;
    Ok(settings)
}

/// Applies `PROJECTION_*` overrides from the process environment.
pub fn apply_env_overrides(settings: Settings) -> Result<Settings> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

/// File settings (or defaults when none is found), `.env`, then environment.
pub fn load_effective_settings(path: Option<&PathBuf>) -> Result<Settings> {
    dotenvy::dotenv().ok();
    let settings = load_settings_with_fallback(path)?.unwrap_or_default();
    apply_env_overrides(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.api_base_url.trim().is_empty() {
        bail!("api_base_url must not be empty");
    }
    if settings.request_timeout_secs == 0 {
        bail!("request_timeout_secs must be greater than zero");
    }
    Ok(())
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}

/// Checks if the default settings file (settings.json) exists
pub fn default_settings_exist() -> bool {
    settings_file_exists("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("settings.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"api_base_url": "http://api.local:8080"}"#);
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.api_base_url, "http://api.local:8080");
        assert_eq!(settings.debounce_ms, 400);
        assert_eq!(settings.api_token, None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "{ not json");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Parsing settings JSON"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"request_timeout_secs": 0}"#);
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn test_optional_settings() {
        assert!(load_optional_settings(None).unwrap().is_none());
        let missing = PathBuf::from("/definitely/not/here.json");
        assert!(load_optional_settings(Some(&missing)).is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://projection.example.org"),
            (ENV_API_TOKEN, "  abc  "),
            (ENV_DEBOUNCE_MS, "250"),
        ]);
        let settings =
            apply_overrides(Settings::default(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.api_base_url, "https://projection.example.org");
        assert_eq!(settings.api_token.as_deref(), Some("abc"));
        assert_eq!(settings.debounce_ms, 250);
    }

    #[test]
    fn test_empty_or_invalid_overrides() {
        let settings = apply_overrides(Settings::default(), |k| {
            (k == ENV_API_TOKEN).then(|| String::new())
        })
        .unwrap();
        assert_eq!(settings.api_token, None);

        let err = apply_overrides(Settings::default(), |k| {
            (k == ENV_DEBOUNCE_MS).then(|| "soon".to_string())
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_settings_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "{}");
        assert!(settings_file_exists(&path));
        assert!(!settings_file_exists(dir.path()));
    }
}
