//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! Ajora reads its runtime settings (`AJORA_RUNTIME_URL`, `AJORA_RUNTIME_TRANSPORT`) from the
//! environment after [`load_and_apply`] has run, so any of the three sources can provide them.

mod dotenv;
#[cfg(feature = "tracing-init")]
mod logging;
mod xdg_toml;

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "tracing-init")]
pub use logging::init_tracing;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads `.env` and `$XDG_CONFIG_HOME/<app_name>/config.toml`, then sets each key that is
/// **not** already present in the process environment.
///
/// * `app_name`: e.g. `"ajora"`; selects `~/.config/<app_name>/config.toml`.
/// * `override_dir`: directory holding `.env`; defaults to the current directory.
///
/// Returns the keys that were applied (sorted), which callers may log.
pub fn load_and_apply(
    app_name: &str,
    override_dir: Option<&Path>,
) -> Result<Vec<String>, LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let keys: BTreeSet<&String> = xdg_map.keys().chain(dotenv_map.keys()).collect();
    let mut applied = Vec::new();
    for key in keys {
        if std::env::var_os(key).is_some() {
            continue;
        }
        if let Some(value) = dotenv_map.get(key).or_else(|| xdg_map.get(key)) {
            std::env::set_var(key, value);
            applied.push(key.clone());
        }
    }
    Ok(applied)
}

/// Reads `key` from the process environment; blank values count as unset.
pub fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Serializes tests that mutate process-wide env vars such as `XDG_CONFIG_HOME`.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn existing_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "AJORA_CFG_EXISTING=from_dotenv\n").unwrap();
        env::set_var("AJORA_CFG_EXISTING", "from_env");

        let applied = load_and_apply("ajora-cfg-nonexistent-app", Some(dir.path())).unwrap();
        assert_eq!(env::var("AJORA_CFG_EXISTING").as_deref(), Ok("from_env"));
        assert!(!applied.contains(&"AJORA_CFG_EXISTING".to_string()));
        env::remove_var("AJORA_CFG_EXISTING");
    }

    #[test]
    fn no_sources_is_ok_and_applies_nothing() {
        let empty = tempfile::tempdir().unwrap();
        let applied = load_and_apply("ajora-cfg-nonexistent-app", Some(empty.path())).unwrap();
        assert!(applied.is_empty());
    }

    #[test]
    fn dotenv_overrides_xdg() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("ajora-prio");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nAJORA_CFG_PRIORITY = \"from_xdg\"\n",
        )
        .unwrap();
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "AJORA_CFG_PRIORITY=from_dotenv\n",
        )
        .unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("AJORA_CFG_PRIORITY");

        let _ = load_and_apply("ajora-prio", Some(dotenv_dir.path()));
        let val = env::var("AJORA_CFG_PRIORITY").unwrap();
        env::remove_var("AJORA_CFG_PRIORITY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(val, "from_dotenv");
    }

    #[test]
    fn env_value_treats_blank_as_unset() {
        env::set_var("AJORA_CFG_BLANK", "   ");
        assert_eq!(env_value("AJORA_CFG_BLANK"), None);
        env::set_var("AJORA_CFG_BLANK", " value ");
        assert_eq!(env_value("AJORA_CFG_BLANK").as_deref(), Some("value"));
        env::remove_var("AJORA_CFG_BLANK");
        assert_eq!(env_value("AJORA_CFG_BLANK"), None);
    }
}
