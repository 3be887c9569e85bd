//! Centralized configuration for mediagate.
//!
//! Loaded from a TOML file, then overridden by environment variables. Every
//! section has defaults so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filter::{FilterDefinition, ThumbnailMode};
use crate::media::DownloadMode;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {variable}")]
    InvalidEnv { variable: String, value: String },
}

/// Central configuration for all mediagate components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaGateConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub filters: FiltersConfig,
    pub security: SecurityConfig,
    /// Contexts by name
    pub contexts: BTreeMap<String, ContextConfig>,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Base URL used in redirects when the request carries no `Host` header
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            public_url: None,
        }
    }
}

/// Where media live on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root every filesystem provider serves from
    pub media_root: PathBuf,
    /// JSON catalog of media records; empty repository when absent
    pub catalog: Option<PathBuf>,
    /// Directory for the temporary files handed to filters
    pub temp_dir: PathBuf,
    /// Provider names backed by the filesystem provider
    pub providers: Vec<String>,
    /// Public URL of `media_root`, required by the redirect download mode
    pub public_base_url: Option<String>,
    /// Filesystem prefix to internal URI, for the x-accel-redirect mode
    pub accel_mapping: BTreeMap<PathBuf, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            catalog: None,
            temp_dir: std::env::temp_dir(),
            providers: vec!["file".to_string(), "image".to_string()],
            public_base_url: None,
            accel_mapping: BTreeMap::new(),
        }
    }
}

/// Backend of the derived-image cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Renditions written to disk and served statically
    #[default]
    Filesystem,
    /// Renditions kept in an in-process LRU
    Memory,
}

/// Derived-image cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory of the filesystem backend
    pub root: PathBuf,
    /// URL prefix the filesystem backend is published under
    pub url_prefix: String,
    /// Capacity of the memory backend
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Filesystem,
            root: PathBuf::from("media/cache"),
            url_prefix: "/media/cache".to_string(),
            max_entries: 256,
        }
    }
}

/// Named filter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiltersConfig(pub BTreeMap<String, FilterDefinition>);

impl Default for FiltersConfig {
    fn default() -> Self {
        Self(BTreeMap::from([
            (
                "small".to_string(),
                FilterDefinition::thumbnail(100, 70, ThumbnailMode::Outbound),
            ),
            (
                "big".to_string(),
                FilterDefinition::thumbnail(500, 500, ThumbnailMode::Inset),
            ),
        ]))
    }
}

/// Static authentication and role hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bearer tokens by token value
    pub tokens: BTreeMap<String, UserConfig>,
    /// Roles implied by each role
    pub role_hierarchy: BTreeMap<String, Vec<String>>,
    /// Answer for checks that require no attribute at all
    pub allow_if_all_abstain: bool,
}

/// Principal a bearer token authenticates as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Download strategy of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Public,
    Forbidden,
    Roles { roles: Vec<String> },
    Session { times: u32 },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Roles {
            roles: vec!["ROLE_ADMIN".to_string()],
        }
    }
}

/// Formats and policy of one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Unqualified format names
    pub formats: Vec<String>,
    pub strategy: StrategyConfig,
    pub download_mode: DownloadMode,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            formats: vec!["small".to_string(), "big".to_string()],
            strategy: StrategyConfig::default(),
            download_mode: DownloadMode::Http,
        }
    }
}

/// Log file placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub logs_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl MediaGateConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    /// - `ConfigError::Parse` - If the document is not valid configuration
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.ensure_default_context();
        Ok(config)
    }

    /// Loads a TOML file.
    ///
    /// # Errors
    /// - `ConfigError::Read` - If the file cannot be read
    /// - `ConfigError::Parse` - If the file is not valid configuration
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Creates the default configuration with environment variable overrides.
    ///
    /// # Errors
    /// - `ConfigError::InvalidEnv` - If an override cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.ensure_default_context();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `MEDIAGATE_*` environment variables on top of this configuration.
    ///
    /// # Errors
    /// - `ConfigError::InvalidEnv` - If an override cannot be parsed
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("MEDIAGATE_HOST") {
            self.server.host = parse_env("MEDIAGATE_HOST", host)?;
        }

        if let Ok(port) = std::env::var("MEDIAGATE_PORT") {
            self.server.port = parse_env("MEDIAGATE_PORT", port)?;
        }

        if let Ok(root) = std::env::var("MEDIAGATE_MEDIA_ROOT") {
            self.storage.media_root = PathBuf::from(root);
        }

        if let Ok(catalog) = std::env::var("MEDIAGATE_CATALOG") {
            self.storage.catalog = Some(PathBuf::from(catalog));
        }

        if let Ok(root) = std::env::var("MEDIAGATE_CACHE_ROOT") {
            self.cache.root = PathBuf::from(root);
        }

        if let Ok(temp_dir) = std::env::var("MEDIAGATE_TEMP_DIR") {
            self.storage.temp_dir = PathBuf::from(temp_dir);
        }

        Ok(())
    }

    /// Creates a configuration rooted in a scratch directory.
    ///
    /// Every context is public and the cache lives in memory.
    pub fn for_testing(root: &Path) -> Self {
        let mut config = Self {
            storage: StorageConfig {
                media_root: root.join("media"),
                catalog: None,
                temp_dir: root.join("tmp"),
                ..StorageConfig::default()
            },
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                root: root.join("cache"),
                ..CacheConfig::default()
            },
            logging: LoggingConfig {
                logs_dir: root.join("logs"),
            },
            ..Self::default()
        };
        config.contexts.insert(
            "default".to_string(),
            ContextConfig {
                strategy: StrategyConfig::Public,
                ..ContextConfig::default()
            },
        );
        config
    }

    fn ensure_default_context(&mut self) {
        if self.contexts.is_empty() {
            self.contexts
                .insert("default".to_string(), ContextConfig::default());
        }
    }
}

fn parse_env<T: std::str::FromStr>(variable: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        variable: variable.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OutputFormat;

    #[test]
    fn test_default_config_values() {
        let config = MediaGateConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.backend, CacheBackend::Filesystem);
        assert_eq!(config.cache.url_prefix, "/media/cache");
        assert_eq!(config.storage.providers, vec!["file", "image"]);
        assert_eq!(
            config.contexts["default"].strategy,
            StrategyConfig::Roles {
                roles: vec!["ROLE_ADMIN".to_string()]
            }
        );
        assert_eq!(
            config.filters.0["small"],
            FilterDefinition::thumbnail(100, 70, ThumbnailMode::Outbound)
        );
        assert!(!config.security.allow_if_all_abstain);
    }

    #[test]
    fn test_parse_full_document() {
        let config = MediaGateConfig::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [cache]
            backend = "memory"
            max_entries = 16

            [filters.mono]
            grayscale = true
            format = "png"

            [filters.wide]
            thumbnail = { width = 320, height = 120, mode = "outbound" }
            quality = 70

            [security]
            allow_if_all_abstain = true
            role_hierarchy = { ROLE_ADMIN = ["ROLE_EDITOR"] }

            [security.tokens.secret]
            username = "alice"
            roles = ["ROLE_ADMIN"]

            [contexts.news]
            formats = ["abstract"]
            download_mode = "x-accel-redirect"
            strategy = { kind = "session", times = 2 }

            [contexts.gallery]
            strategy = { kind = "public" }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.max_entries, 16);
        assert_eq!(config.filters.0["mono"].format, OutputFormat::Png);
        assert_eq!(config.filters.0["mono"].thumbnail, None);
        assert_eq!(config.filters.0["wide"].quality, 70);
        assert_eq!(config.security.tokens["secret"].username, "alice");
        assert_eq!(config.security.role_hierarchy["ROLE_ADMIN"], vec!["ROLE_EDITOR"]);
        assert_eq!(config.contexts["news"].download_mode, DownloadMode::XAccelRedirect);
        assert_eq!(
            config.contexts["news"].strategy,
            StrategyConfig::Session { times: 2 }
        );
        assert_eq!(config.contexts["gallery"].formats, vec!["small", "big"]);
        assert!(!config.contexts.contains_key("default"));
    }

    #[test]
    fn test_parse_accel_mapping_and_logging() {
        let config = MediaGateConfig::from_toml_str(
            r#"
            [storage.accel_mapping]
            "/srv/media" = "/protected"

            [logging]
            logs_dir = "/var/log/mediagate"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.storage.accel_mapping.get(Path::new("/srv/media")).map(String::as_str),
            Some("/protected")
        );
        assert_eq!(config.logging.logs_dir, PathBuf::from("/var/log/mediagate"));
    }

    #[test]
    fn test_rejects_unknown_strategy_kind() {
        let result = MediaGateConfig::from_toml_str(
            r#"
            [contexts.default]
            strategy = { kind = "anyone" }
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_for_testing_preset() {
        let root = Path::new("/scratch");
        let config = MediaGateConfig::for_testing(root);

        assert_eq!(config.storage.media_root, root.join("media"));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.contexts["default"].strategy, StrategyConfig::Public);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("MEDIAGATE_PORT", "9090");
            std::env::set_var("MEDIAGATE_MEDIA_ROOT", "/srv/media");
            std::env::set_var("MEDIAGATE_CATALOG", "/srv/catalog.json");
            std::env::set_var("MEDIAGATE_TEMP_DIR", "/srv/tmp");
        }

        let config = MediaGateConfig::from_env().unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.storage.catalog, Some(PathBuf::from("/srv/catalog.json")));
        assert_eq!(config.storage.temp_dir, PathBuf::from("/srv/tmp"));

        // Cleanup
        unsafe {
            std::env::remove_var("MEDIAGATE_PORT");
            std::env::remove_var("MEDIAGATE_MEDIA_ROOT");
            std::env::remove_var("MEDIAGATE_CATALOG");
            std::env::remove_var("MEDIAGATE_TEMP_DIR");
        }
    }

    #[test]
    fn test_invalid_env_override() {
        let result = parse_env::<u16>("MEDIAGATE_PORT", "not-a-port".to_string());
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));

        let result = parse_env::<IpAddr>("MEDIAGATE_HOST", "localhost:3000".to_string());
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
