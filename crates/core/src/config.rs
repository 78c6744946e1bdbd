//! Configuration types shared across crates.

use crate::token::{Role, normalize_token_hash};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum upload size: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of blobs fetched by a reconciliation listing.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Upper bound for `reconcile.list_limit`.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    /// Serve stored blobs under /blobs so that record URLs resolve (default: true).
    /// Disable when the public base URL points at a CDN or another server.
    #[serde(default = "default_true")]
    pub serve_blobs: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: true,
            serve_blobs: true,
        }
    }
}

/// Blob storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Base URL under which stored objects are publicly reachable.
        #[serde(default = "default_public_base_url")]
        public_base_url: String,
    },
    /// Process-local storage, lost on restart. Useful for demos and tests.
    Memory {
        #[serde(default = "default_public_base_url")]
        public_base_url: String,
    },
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080/blobs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
            public_base_url: default_public_base_url(),
        }
    }
}

impl StorageConfig {
    pub fn public_base_url(&self) -> &str {
        match self {
            Self::Filesystem {
                public_base_url, ..
            }
            | Self::Memory { public_base_url } => public_base_url,
        }
    }

    /// Validate storage configuration.
    pub fn validate(&self) -> Result<(), String> {
        let base = self.public_base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(format!(
                "storage.public_base_url must be an absolute http(s) URL, got {base:?}"
            ));
        }
        Ok(())
    }
}

/// Index (key-value) store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexConfig {
    /// SQLite database file.
    Sqlite {
        path: PathBuf,
        /// Connection attempts before giving up (default: 3).
        #[serde(default = "default_connect_attempts")]
        connect_attempts: u32,
        /// Delay before the first retry, doubled after each failure (default: 100ms).
        #[serde(default = "default_connect_backoff_ms")]
        connect_backoff_ms: u64,
    },
    /// Process-local store, lost on restart.
    Memory,
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_connect_backoff_ms() -> u64 {
    100
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/index.db"),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
        }
    }
}

impl IndexConfig {
    /// Validate index configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Sqlite {
                connect_attempts, ..
            } if *connect_attempts == 0 => {
                Err("index.connect_attempts must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// How the `filename` of a new record is chosen.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilenamePolicy {
    /// Keep the filename declared by the client, falling back to the generated name.
    #[default]
    Original,
    /// Always use the generated object name.
    Generated,
}

/// Upload pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes (default: 10 MiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Blob store prefix for uploaded images (default: "images/").
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub filename_policy: FilenamePolicy,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_prefix() -> String {
    "images/".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            prefix: default_prefix(),
            filename_policy: FilenamePolicy::default(),
        }
    }
}

/// Reconciliation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Blobs fetched by the single listing a check or reupload pass makes.
    /// Objects beyond this bound are invisible to the pass.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    /// Timeout for fetching a missing image during reupload. Unset means no timeout.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
            fetch_timeout_secs: None,
        }
    }
}

impl ReconcileConfig {
    /// List limit clamped to `1..=MAX_LIST_LIMIT`.
    pub fn normalized_list_limit(&self) -> usize {
        self.list_limit.clamp(1, MAX_LIST_LIMIT)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// A bearer token accepted by the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    /// SHA256 hex of the raw token. Generate with `galleryctl hash-token`.
    pub token_hash: String,
    /// Identity recorded as the uploader.
    pub identity: String,
    #[serde(default)]
    pub role: Role,
}

/// Authentication configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl AuthConfig {
    /// Validate token entries.
    pub fn validate(&self) -> Result<(), String> {
        for (i, token) in self.tokens.iter().enumerate() {
            normalize_token_hash(&token.token_hash)
                .map_err(|e| format!("auth.tokens[{i}]: {e}"))?;
            if token.identity.trim().is_empty() {
                return Err(format!("auth.tokens[{i}]: identity must not be empty"));
            }
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Create a test configuration backed by in-memory stores.
    ///
    /// **For testing only.** Accepts `test-user-token` (user `user@example.com`)
    /// and `test-admin-token` (admin `admin@example.com`).
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Memory {
                public_base_url: "http://blobs.test/blobs".to_string(),
            },
            index: IndexConfig::Memory,
            upload: UploadConfig::default(),
            reconcile: ReconcileConfig::default(),
            auth: AuthConfig {
                tokens: vec![
                    TokenConfig {
                        token_hash: crate::token::hash_token("test-user-token"),
                        identity: "user@example.com".to_string(),
                        role: Role::User,
                    },
                    TokenConfig {
                        token_hash: crate::token::hash_token("test-admin-token"),
                        identity: "admin@example.com".to_string(),
                        role: Role::Admin,
                    },
                ],
            },
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.index.validate()?;
        self.auth.validate()?;
        if self.upload.max_file_size == 0 {
            return Err("upload.max_file_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Format, Toml};

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.upload.prefix, "images/");
        assert_eq!(config.upload.filename_policy, FilenamePolicy::Original);
        assert_eq!(config.reconcile.list_limit, 100);
        assert!(config.reconcile.fetch_timeout().is_none());
        assert!(config.server.metrics_enabled);
    }

    #[test]
    fn list_limit_is_clamped() {
        let mut config = ReconcileConfig::default();
        config.list_limit = 0;
        assert_eq!(config.normalized_list_limit(), 1);
        config.list_limit = 50_000;
        assert_eq!(config.normalized_list_limit(), MAX_LIST_LIMIT);
    }

    #[test]
    fn toml_sections_deserialize() {
        let toml = r#"
            [storage]
            type = "filesystem"
            path = "/var/lib/gallery/blobs"
            public_base_url = "https://img.example.com/blobs"

            [index]
            type = "sqlite"
            path = "/var/lib/gallery/index.db"

            [upload]
            filename_policy = "generated"

            [[auth.tokens]]
            token_hash = "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"
            identity = "a@example.com"
            role = "admin"
        "#;
        let config: AppConfig = Figment::new().merge(Toml::string(toml)).extract().unwrap();

        assert_eq!(
            config.storage.public_base_url(),
            "https://img.example.com/blobs"
        );
        match config.index {
            IndexConfig::Sqlite {
                connect_attempts,
                connect_backoff_ms,
                ..
            } => {
                assert_eq!(connect_attempts, 3);
                assert_eq!(connect_backoff_ms, 100);
            }
            IndexConfig::Memory => panic!("expected sqlite index"),
        }
        assert_eq!(config.upload.filename_policy, FilenamePolicy::Generated);
        assert_eq!(config.auth.tokens[0].role, Role::Admin);
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_token_hash() {
        let mut config = AppConfig::for_testing();
        config.auth.tokens[0].token_hash = "nope".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("auth.tokens[0]"));
    }

    #[test]
    fn validate_rejects_relative_public_url() {
        let config = StorageConfig::Memory {
            public_base_url: "/blobs".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn for_testing_is_valid() {
        AppConfig::for_testing().validate().unwrap();
    }
}
