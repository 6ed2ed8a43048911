use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::export::SharedLog;
use crate::item_id::normalize_prefix;

pub const CONFIG_FILE: &str = ".braid/config.toml";
pub const DEFAULT_DB_PATH: &str = ".braid/cache/state.sqlite";
pub const DEFAULT_LOG_PATH: &str = ".braid/items.jsonl";
pub const DEFAULT_ID_PREFIX: &str = "bd";
pub const DEFAULT_FLUSH_DEBOUNCE_MS: u64 = 500;
pub const LOCK_FILE_NAME: &str = "export.lock";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    db_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    id_prefix: Option<String>,
    flush_debounce_ms: Option<u64>,
    auto_import: Option<bool>,
    auto_flush: Option<bool>,
    actor: Option<String>,
}

/// Values supplied by flags or environment variables; they win over the
/// config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub actor: Option<String>,
    pub flush_debounce_ms: Option<u64>,
    pub auto_import: Option<bool>,
    pub auto_flush: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub repo_root: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    /// Writer lock for the shared log, kept beside the database so it never
    /// lands in the tracked tree.
    pub lock_path: PathBuf,
    pub id_prefix: String,
    pub flush_debounce: Duration,
    pub auto_import: bool,
    pub auto_flush: bool,
    pub actor: String,
}

impl Config {
    pub fn shared_log(&self) -> SharedLog {
        SharedLog {
            path: self.log_path.clone(),
            lock_path: self.lock_path.clone(),
        }
    }

    pub fn load(repo_root: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let path = repo_root.join(CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Self::from_parts(repo_root, raw.as_deref(), overrides)
    }

    pub(crate) fn from_parts(
        repo_root: &Path,
        file: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file: RawConfigFile = match file {
            Some(raw) => toml::from_str(raw)?,
            None => RawConfigFile::default(),
        };

        let id_prefix = file
            .id_prefix
            .unwrap_or_else(|| DEFAULT_ID_PREFIX.to_string());
        if id_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("id_prefix must not be empty".to_string()));
        }

        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                repo_root.join(path)
            }
        };

        let db_path = resolve(
            overrides
                .db_path
                .or(file.db_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        );
        let lock_path = db_path
            .parent()
            .unwrap_or(repo_root)
            .join(LOCK_FILE_NAME);

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            db_path,
            lock_path,
            log_path: resolve(
                overrides
                    .log_path
                    .or(file.log_path)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
            ),
            id_prefix: normalize_prefix(&id_prefix),
            flush_debounce: Duration::from_millis(
                overrides
                    .flush_debounce_ms
                    .or(file.flush_debounce_ms)
                    .unwrap_or(DEFAULT_FLUSH_DEBOUNCE_MS),
            ),
            auto_import: overrides.auto_import.or(file.auto_import).unwrap_or(true),
            auto_flush: overrides.auto_flush.or(file.auto_flush).unwrap_or(true),
            actor: overrides
                .actor
                .or(file.actor)
                .and_then(non_empty)
                .or_else(|| std::env::var("USER").ok().and_then(non_empty))
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, ConfigOverrides};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    #[test]
    fn defaults_resolve_under_repo_root() {
        let root = Path::new("/work/repo");
        let config =
            Config::from_parts(root, None, ConfigOverrides::default()).expect("defaults load");
        assert_eq!(config.db_path, root.join(".braid/cache/state.sqlite"));
        assert_eq!(config.log_path, root.join(".braid/items.jsonl"));
        assert_eq!(config.lock_path, root.join(".braid/cache/export.lock"));
        assert_eq!(config.id_prefix, "bd");
        assert_eq!(config.flush_debounce, Duration::from_millis(500));
        assert!(config.auto_import && config.auto_flush);
        assert!(!config.actor.is_empty());
    }

    #[test]
    fn overrides_beat_file_values() {
        let root = Path::new("/work/repo");
        let file = r#"
id_prefix = "Web"
flush_debounce_ms = 50
auto_import = false
actor = "file-actor"
log_path = "/shared/items.jsonl"
"#;
        let config = Config::from_parts(
            root,
            Some(file),
            ConfigOverrides {
                actor: Some("cli-actor".to_string()),
                flush_debounce_ms: Some(5),
                ..ConfigOverrides::default()
            },
        )
        .expect("config should load");
        assert_eq!(config.id_prefix, "web");
        assert_eq!(config.flush_debounce, Duration::from_millis(5));
        assert!(!config.auto_import);
        assert_eq!(config.actor, "cli-actor");
        assert_eq!(config.log_path, PathBuf::from("/shared/items.jsonl"));
    }

    #[test]
    fn invalid_files_are_errors() {
        let root = Path::new("/work/repo");
        let unknown = Config::from_parts(root, Some("colour = true"), ConfigOverrides::default())
            .expect_err("unknown keys should fail");
        assert!(matches!(unknown, ConfigError::Toml(_)));

        let empty = Config::from_parts(root, Some("id_prefix = \"  \""), ConfigOverrides::default())
            .expect_err("empty prefix should fail");
        assert!(empty.to_string().contains("id_prefix"));
    }
}
