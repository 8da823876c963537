use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::token::TokenConfig;

/// Stockdesk - warehouse inventory API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the warehouse API
    #[arg(short = 'u', long, env = "STOCKDESK_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Path to the durable token store (defaults to the platform data dir)
    #[arg(short = 's', long, env = "STOCKDESK_TOKEN_STORE")]
    pub token_store: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session tokens
    Login {
        /// Email to log in with (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show the authenticated user's profile
    Whoami,

    /// Manage products
    Products {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// Manage brands
    Brands {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// Manage suppliers
    Suppliers {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// Manage stores
    Stores {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// List and record stock movements
    Movements {
        #[command(subcommand)]
        action: MovementAction,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        action: ResourceAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourceAction {
    /// List resources, optionally filtered
    List {
        /// Free-text search filter
        #[arg(long)]
        search: Option<String>,

        /// Page number
        #[arg(long)]
        page: Option<u32>,
    },

    /// Fetch one resource by id
    Get { id: i64 },

    /// Create a resource from a JSON body
    Create {
        /// JSON object with the resource fields
        #[arg(long)]
        data: String,
    },

    /// Partially update a resource from a JSON body
    Update {
        id: i64,
        #[arg(long)]
        data: String,
    },

    /// Delete a resource by id
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum MovementAction {
    /// List movements, optionally filtered by product
    List {
        #[arg(long)]
        product: Option<i64>,

        #[arg(long)]
        page: Option<u32>,
    },

    /// Fetch one movement by id
    Get { id: i64 },

    /// Record a movement from a JSON body
    Create {
        #[arg(long)]
        data: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub api_base_url: String,

    // Token storage
    pub token_store_path: PathBuf,
    pub access_token_key: String,
    pub refresh_token_key: String,
    pub access_ttl_days: i64,
    pub refresh_ttl_days: i64,

    // Token lifecycle
    pub token_refresh_threshold: i64,
    pub maintenance_interval: u64,

    // HTTP client
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Commands)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            api_base_url: args.api_url.trim_end_matches('/').to_string(),

            token_store_path: args
                .token_store
                .map(|s| expand_tilde(&s))
                .unwrap_or_else(default_store_path),

            access_token_key: std::env::var("STOCKDESK_ACCESS_KEY")
                .unwrap_or_else(|_| "stockdesk_access".to_string()),

            refresh_token_key: std::env::var("STOCKDESK_REFRESH_KEY")
                .unwrap_or_else(|_| "stockdesk_refresh".to_string()),

            access_ttl_days: std::env::var("ACCESS_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),

            refresh_ttl_days: std::env::var("REFRESH_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),

            token_refresh_threshold: std::env::var("TOKEN_REFRESH_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            maintenance_interval: std::env::var("TOKEN_MAINTENANCE_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            anyhow::bail!("STOCKDESK_API_URL must be an http(s) URL: {}", self.api_base_url);
        }

        if self.token_refresh_threshold <= 0 {
            anyhow::bail!("TOKEN_REFRESH_THRESHOLD must be positive");
        }

        if self.access_ttl_days <= 0 || self.refresh_ttl_days <= 0 {
            anyhow::bail!("Token TTLs must be positive");
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be positive");
        }

        Ok(())
    }

    /// Settings slice handed to the token manager.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            refresh_url: format!("{}/api/token/refresh/", self.api_base_url),
            access_key: self.access_token_key.clone(),
            refresh_key: self.refresh_token_key.clone(),
            refresh_threshold: self.token_refresh_threshold,
            access_ttl_days: self.access_ttl_days,
            refresh_ttl_days: self.refresh_ttl_days,
            request_timeout: self.http_request_timeout,
        }
    }
}

/// Default durable-store location under the platform data directory
fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("stockdesk").join("tokens.sqlite3"))
        .unwrap_or_else(|| PathBuf::from(".stockdesk-tokens.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            api_base_url: "http://localhost:8000".to_string(),
            token_store_path: PathBuf::from("/tmp/tokens.sqlite3"),
            access_token_key: "stockdesk_access".to_string(),
            refresh_token_key: "stockdesk_refresh".to_string(),
            access_ttl_days: 1,
            refresh_ttl_days: 7,
            token_refresh_threshold: 300,
            maintenance_interval: 300,
            http_request_timeout: 30,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/store/tokens.sqlite3");
        assert!(path.to_string_lossy().contains("store/tokens.sqlite3"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_relative_path() {
        let path = expand_tilde("relative/path");
        assert_eq!(path, PathBuf::from("relative/path"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = test_config();
        config.api_base_url = "ftp://warehouse".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = test_config();
        config.token_refresh_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_config_refresh_url() {
        let token_config = test_config().token_config();
        assert_eq!(
            token_config.refresh_url,
            "http://localhost:8000/api/token/refresh/"
        );
        assert_eq!(token_config.refresh_threshold, 300);
    }
}
