// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and passed by
//! reference into the components that need it. Nothing reads the environment
//! after `main` has built the [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the redb database | `/data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key, enables HTTPS | unset |
//! | `ENCRYPTION_KEY` | 32-byte key used to encrypt stored keys | Required |
//! | `DEFAULT_KEY_TYPE` | Custody backend for new keys (`local`, `remote-custody`) | `local` |
//! | `DEFAULT_KEY_INDEX` | Index of newly generated keys | `0` |
//! | `DEFAULT_KEY_WEIGHT` | Weight of newly generated keys | `1000` |
//! | `ADMIN_ACCOUNT_ADDRESS` | Address of the service's own account | Required |
//! | `ADMIN_ACCOUNT_KEY_INDEX` | Admin key index | `0` |
//! | `ADMIN_ACCOUNT_KEY_TYPE` | Admin key backend | `local` |
//! | `ADMIN_ACCOUNT_KEY_VALUE` | Admin key material or custody reference | Required |
//! | `CHAIN_GATEWAY_URL` | Base URL of the chain gateway | Required |
//! | `REMOTE_CUSTODY_URL` | Base URL of the remote custody service | unset |
//! | `REMOTE_CUSTODY_SECRET` | Shared secret for custody request signing | unset |
//! | `WORKER_COUNT` | Workers started at boot | `1` |
//! | `WORKER_QUEUE_CAPACITY` | Bounded job queue size | `10` |
//! | `SEAL_POLL_INTERVAL_MS` | Delay between seal status polls | `1000` |
//! | `SEAL_TIMEOUT_SECS` | Give up waiting for a seal after this long | `120` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::keys::KeyType;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// File name of the embedded database inside the data directory.
pub const DATABASE_FILE: &str = "custody.redb";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

/// Statically configured admin account key.
///
/// The value is plaintext key material (or a custody reference) and is
/// wiped from memory when dropped.
#[derive(Clone)]
pub struct AdminKeyConfig {
    pub address: String,
    pub key_index: u32,
    pub key_type: KeyType,
    pub key_value: Zeroizing<String>,
}

impl std::fmt::Debug for AdminKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminKeyConfig")
            .field("address", &self.address)
            .field("key_index", &self.key_index)
            .field("key_type", &self.key_type)
            .field("key_value", &"<redacted>")
            .finish()
    }
}

/// Remote custody service endpoint.
#[derive(Clone)]
pub struct RemoteCustodyConfig {
    pub base_url: String,
    pub secret: Zeroizing<String>,
}

impl std::fmt::Debug for RemoteCustodyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCustodyConfig")
            .field("base_url", &self.base_url)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Everything the key manager needs.
#[derive(Clone)]
pub struct KeyConfig {
    pub encryption_key: Zeroizing<Vec<u8>>,
    pub default_key_type: KeyType,
    pub default_key_index: u32,
    pub default_key_weight: u32,
    pub admin: AdminKeyConfig,
    pub remote_custody: Option<RemoteCustodyConfig>,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("encryption_key", &"<redacted>")
            .field("default_key_type", &self.default_key_type)
            .field("default_key_index", &self.default_key_index)
            .field("default_key_weight", &self.default_key_weight)
            .field("admin", &self.admin)
            .field("remote_custody", &self.remote_custody)
            .finish()
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
}

/// Chain gateway and seal waiting settings.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub gateway_url: String,
    pub seal_poll_interval: Duration,
    pub seal_timeout: Duration,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub keys: KeyConfig,
    pub pool: PoolConfig,
    pub chain: ChainConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let log_format = match env.optional("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        let server = ServerConfig {
            host: env.optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse_or("PORT", 8080)?,
            data_dir: env
                .optional(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            log_format,
            tls_cert_path: env.optional("TLS_CERT_PATH").map(PathBuf::from),
            tls_key_path: env.optional("TLS_KEY_PATH").map(PathBuf::from),
        };

        let encryption_key = Zeroizing::new(env.required("ENCRYPTION_KEY")?.into_bytes());
        if encryption_key.len() != crate::keys::crypter::KEY_LEN {
            return Err(ConfigError::Invalid {
                name: "ENCRYPTION_KEY",
                reason: format!(
                    "must be exactly {} bytes long",
                    crate::keys::crypter::KEY_LEN
                ),
            });
        }

        let remote_custody = match env.optional("REMOTE_CUSTODY_URL") {
            Some(base_url) => {
                url::Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
                    name: "REMOTE_CUSTODY_URL",
                    reason: e.to_string(),
                })?;
                Some(RemoteCustodyConfig {
                    base_url,
                    secret: Zeroizing::new(env.required("REMOTE_CUSTODY_SECRET")?),
                })
            }
            None => None,
        };

        let keys = KeyConfig {
            encryption_key,
            default_key_type: env.parse_or("DEFAULT_KEY_TYPE", KeyType::Local)?,
            default_key_index: env.parse_or("DEFAULT_KEY_INDEX", 0)?,
            default_key_weight: env.parse_or("DEFAULT_KEY_WEIGHT", 1000)?,
            admin: AdminKeyConfig {
                address: env.required("ADMIN_ACCOUNT_ADDRESS")?,
                key_index: env.parse_or("ADMIN_ACCOUNT_KEY_INDEX", 0)?,
                key_type: env.parse_or("ADMIN_ACCOUNT_KEY_TYPE", KeyType::Local)?,
                key_value: Zeroizing::new(env.required("ADMIN_ACCOUNT_KEY_VALUE")?),
            },
            remote_custody,
        };

        let pool = PoolConfig {
            worker_count: env.parse_or("WORKER_COUNT", 1)?,
            queue_capacity: env.parse_or("WORKER_QUEUE_CAPACITY", 10)?,
        };
        if pool.worker_count == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_COUNT",
                reason: "at least one worker is required".to_string(),
            });
        }
        if pool.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_QUEUE_CAPACITY",
                reason: "queue capacity must be positive".to_string(),
            });
        }

        let gateway_url = env.required("CHAIN_GATEWAY_URL")?;
        url::Url::parse(&gateway_url).map_err(|e| ConfigError::Invalid {
            name: "CHAIN_GATEWAY_URL",
            reason: e.to_string(),
        })?;

        let chain = ChainConfig {
            gateway_url,
            seal_poll_interval: Duration::from_millis(env.parse_or("SEAL_POLL_INTERVAL_MS", 1000)?),
            seal_timeout: Duration::from_secs(env.parse_or("SEAL_TIMEOUT_SECS", 120)?),
        };

        Ok(Self {
            server,
            keys,
            pool,
            chain,
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef".to_string()),
            ("ADMIN_ACCOUNT_ADDRESS", "0xf8d6e0586b0a20c7".to_string()),
            ("ADMIN_ACCOUNT_KEY_VALUE", "admin-key".to_string()),
            ("CHAIN_GATEWAY_URL", "http://localhost:8888".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_are_applied() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_format, LogFormat::Pretty);
        assert_eq!(config.keys.default_key_type, KeyType::Local);
        assert_eq!(config.keys.default_key_index, 0);
        assert_eq!(config.keys.default_key_weight, 1000);
        assert_eq!(config.pool.worker_count, 1);
        assert_eq!(config.pool.queue_capacity, 10);
        assert!(config.keys.remote_custody.is_none());
        assert_eq!(
            config.server.database_path(),
            PathBuf::from("/data").join(DATABASE_FILE)
        );
    }

    #[test]
    fn missing_encryption_key_is_rejected() {
        let mut env = base_env();
        env.remove("ENCRYPTION_KEY");

        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("ENCRYPTION_KEY"))
        ));
    }

    #[test]
    fn short_encryption_key_is_rejected() {
        let mut env = base_env();
        env.insert("ENCRYPTION_KEY", "too-short".to_string());

        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "ENCRYPTION_KEY", .. })
        ));
    }

    #[test]
    fn unknown_key_type_is_rejected() {
        let mut env = base_env();
        env.insert("DEFAULT_KEY_TYPE", "hsm".to_string());

        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "DEFAULT_KEY_TYPE", .. })
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut env = base_env();
        env.insert("WORKER_COUNT", "0".to_string());

        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "WORKER_COUNT", .. })
        ));
    }

    #[test]
    fn remote_custody_requires_secret() {
        let mut env = base_env();
        env.insert("REMOTE_CUSTODY_URL", "https://custody.internal".to_string());

        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("REMOTE_CUSTODY_SECRET"))
        ));

        env.insert("REMOTE_CUSTODY_SECRET", "s3cret".to_string());
        let config = load(&env).unwrap();
        let remote = config.keys.remote_custody.unwrap();
        assert_eq!(remote.base_url, "https://custody.internal");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config.keys);

        assert!(!rendered.contains("admin-key"));
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("<redacted>"));
    }
}
