use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::handover::types::TenantScope;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Per-target directives appended to `log_level`
    #[serde(default = "default_log_directives")]
    pub log_directives: Vec<String>,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL (overridden by `DATABASE_URL`)
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub db_pool: DbPoolConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub handover: HandoverConfig,
    #[serde(default)]
    pub side_effects: SideEffectConfig,
    #[serde(default)]
    pub documents: DocumentConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

fn default_log_directives() -> Vec<String> {
    ["sqlx=warn", "hyper=warn", "reqwest=warn"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Idle connections above `min_connections` are closed after this
    pub idle_timeout_secs: u64,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        // one handover transaction per request plus the side-effect workers
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_ms: 3_000,
            idle_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    /// HS256 secret (overridden by `JWT_SECRET`)
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: "dev-secret-change-me".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HandoverConfig {
    /// Require the record to hold the predecessor status before a transition
    pub enforce_prerequisites: bool,
    #[serde(default)]
    pub tenant: TenantScope,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            enforce_prerequisites: true,
            tenant: TenantScope::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SideEffectConfig {
    /// Jobs running concurrently
    pub workers: usize,
    /// Pending jobs before new ones are dropped
    pub queue_size: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for SideEffectConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 1024,
            shutdown_grace_ms: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentConfig {
    pub output_dir: String,
    /// Base URL the QR code on each document points at
    pub public_base_url: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            output_dir: "./data/documents".to_string(),
            public_base_url: "http://localhost:8080/documents".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Chat gateway endpoint receiving `{channel, message}`
    pub endpoint: String,
    pub channel: String,
    #[serde(default)]
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:3001/send".to_string(),
            channel: "drivers".to_string(),
            token: None,
            timeout_ms: 5_000,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    /// Secrets from the environment win over the file
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.postgres_url = Some(url);
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }
}
