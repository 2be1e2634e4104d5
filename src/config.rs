// src/config.rs
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
pub const DEFAULT_DB_FILE: &str = "db.json";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Which durable backend to run on.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    File { path: PathBuf },
    Postgres { url: String, max_connections: u32 },
}

/// Admin account created at startup when its email is not yet registered.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub storage: StorageConfig,
    /// Built single-page client to serve for non-API paths.
    pub static_dir: Option<PathBuf>,
    /// Bearer token required on `/api/admin/*` when set.
    pub admin_token: Option<String>,
    pub initial_admin: Option<InitialAdmin>,
    pub bcrypt_cost: u32,
    pub body_limit: usize,
}

impl ServerConfig {
    /// Read configuration from the process environment, after loading `.env`
    /// if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match get("DATABASE_URL") {
            Some(url) => StorageConfig::Postgres {
                url,
                max_connections: match get("TRAINER_HUB_DB_MAX_CONNECTIONS") {
                    Some(raw) => raw
                        .parse()
                        .with_context(|| format!("Invalid TRAINER_HUB_DB_MAX_CONNECTIONS: {}", raw))?,
                    None => DEFAULT_MAX_CONNECTIONS,
                },
            },
            None => StorageConfig::File {
                path: PathBuf::from(
                    get("TRAINER_HUB_DB_FILE").unwrap_or_else(|| DEFAULT_DB_FILE.to_string()),
                ),
            },
        };

        let initial_admin = match (
            get("TRAINER_HUB_ADMIN_EMAIL"),
            get("TRAINER_HUB_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(InitialAdmin {
                email,
                password,
                name: get("TRAINER_HUB_ADMIN_NAME").unwrap_or_else(|| "Admin".to_string()),
            }),
            (None, None) => None,
            _ => bail!("TRAINER_HUB_ADMIN_EMAIL and TRAINER_HUB_ADMIN_PASSWORD must be set together"),
        };

        let bcrypt_cost = match get("TRAINER_HUB_BCRYPT_COST") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid TRAINER_HUB_BCRYPT_COST: {}", raw))?,
            None => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            listen: get("TRAINER_HUB_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            storage,
            static_dir: get("TRAINER_HUB_STATIC_DIR").map(PathBuf::from),
            admin_token: get("TRAINER_HUB_ADMIN_TOKEN"),
            initial_admin,
            bcrypt_cost,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Defaults with a file store at `path`.
    pub fn with_file_store(path: impl Into<PathBuf>) -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            storage: StorageConfig::File { path: path.into() },
            static_dir: None,
            admin_token: None,
            initial_admin: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_use_file_store() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                path: PathBuf::from("db.json")
            }
        );
        assert!(config.admin_token.is_none());
        assert!(config.initial_admin.is_none());
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let config = from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/trainers"),
            ("TRAINER_HUB_DB_MAX_CONNECTIONS", "5"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Postgres {
                url: "postgres://localhost/trainers".into(),
                max_connections: 5
            }
        );
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = from_pairs(&[("DATABASE_URL", ""), ("TRAINER_HUB_ADMIN_TOKEN", "  ")]).unwrap();
        assert!(matches!(config.storage, StorageConfig::File { .. }));
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_initial_admin() {
        let config = from_pairs(&[
            ("TRAINER_HUB_ADMIN_EMAIL", "admin@example.com"),
            ("TRAINER_HUB_ADMIN_PASSWORD", "changeme"),
        ])
        .unwrap();
        let admin = config.initial_admin.unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert_eq!(admin.name, "Admin");
    }

    #[test]
    fn test_half_configured_admin_is_an_error() {
        let result = from_pairs(&[("TRAINER_HUB_ADMIN_EMAIL", "admin@example.com")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(from_pairs(&[("TRAINER_HUB_BCRYPT_COST", "high")]).is_err());
        assert!(from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("TRAINER_HUB_DB_MAX_CONNECTIONS", "-1"),
        ])
        .is_err());
    }
}
