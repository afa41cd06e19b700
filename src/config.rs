use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "crewdex";

pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";

pub const DEFAULT_COLLECTION: &str = "professionals";
pub const DEFAULT_BATCH_SIZE: usize = 400;
/// Firestore rejects commits with more writes than this.
pub const MAX_BATCH_SIZE: usize = 500;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the configuration was read from, if a file existed
    pub config_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub collection: String,
    pub batch_size: usize,
    pub search_limit: usize,
    /// Fallback credential path when the environment variable is unset
    pub credentials: Option<PathBuf>,
    pub emulator_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            project_id: None,
            collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            credentials: None,
            emulator_host: None,
        }
    }
}

impl Config {
    /// Credential file path: the environment variable wins over the config file.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        std::env::var_os(CREDENTIALS_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.credentials.clone())
    }

    pub fn emulator_host(&self) -> Option<String> {
        std::env::var(EMULATOR_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| self.emulator_host.clone())
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// File Deserialization
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    project_id: Option<String>,
    collection: Option<String>,
    batch_size: Option<usize>,
    search_limit: Option<usize>,
    credentials: Option<PathBuf>,
    emulator_host: Option<String>,
}

impl ConfigFile {
    fn into_config(self, config_path: Option<PathBuf>) -> Result<Config> {
        let defaults = Config::default();

        let batch_size = self.batch_size.unwrap_or(defaults.batch_size);
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            bail!("batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}");
        }

        let search_limit = self.search_limit.unwrap_or(defaults.search_limit);
        if search_limit == 0 {
            bail!("search_limit must be at least 1");
        }

        Ok(Config {
            config_path,
            project_id: non_blank(self.project_id),
            collection: non_blank(self.collection).unwrap_or(defaults.collection),
            batch_size,
            search_limit,
            credentials: self.credentials.map(|p| expand_tilde(&p)),
            emulator_host: non_blank(self.emulator_host),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration.
///
/// An explicit path must exist. Without one, the default location is tried
/// and a missing file simply means defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, Some(path.clone()))
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

fn parse(raw: &str, config_path: Option<PathBuf>) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;
    cfg_file.into_config(config_path)
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from([
        "project_id",
        "collection",
        "batch_size",
        "search_limit",
        "credentials",
        "emulator_host",
    ]);

    for key in table.keys() {
        if !known.contains(key.as_str()) {
            tracing::warn!("unknown configuration key `{}`", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_empty_file() {
        let config = parse("", None).unwrap();
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
        assert!(config.project_id.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
project_id = "crew-prod"
collection = "talent"
batch_size = 250
search_limit = 10
emulator_host = "  "
"#,
            None,
        )
        .unwrap();
        assert_eq!(config.project_id.as_deref(), Some("crew-prod"));
        assert_eq!(config.collection, "talent");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.search_limit, 10);
        assert!(config.emulator_host.is_none());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(parse("batch_size = 0", None).is_err());
        assert!(parse("batch_size = 501", None).is_err());
        assert!(parse("batch_size = 500", None).is_ok());
    }

    #[test]
    fn test_unknown_keys_are_not_fatal() {
        assert!(parse("vdir = \"/tmp\"\ncollection = \"x\"", None).is_ok());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("configuration file not found"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "collection = \"crew\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.collection, "crew");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_expand_tilde() {
        let plain = Path::new("/etc/sa.json");
        assert_eq!(expand_tilde(plain), PathBuf::from("/etc/sa.json"));
        if let Some(home) = home::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/sa.json")), home.join("sa.json"));
        }
    }
}
