use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::CodeAlphabet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sweep: SweepConfig,
    pub codes: CodeConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub retention_seconds: u64,
    pub interval_seconds: u64,
    /// A download lease held longer than this is reclaimed by the sweep.
    #[serde(default = "default_lease_timeout_seconds")]
    pub lease_timeout_seconds: u64,
}

fn default_lease_timeout_seconds() -> u64 {
    24 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeConfig {
    pub length: usize,
    pub alphabet: CodeAlphabet,
    pub max_attempts: u32,
}

/// An empty origin list means any origin is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sweep: SweepConfig::default(),
            codes: CodeConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 24 * 60 * 60,
            interval_seconds: 60 * 60,
            lease_timeout_seconds: default_lease_timeout_seconds(),
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            length: 6,
            alphabet: CodeAlphabet::Numeric,
            max_attempts: 32,
        }
    }
}

impl SweepConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;

        app_config.apply_port_override(std::env::var("PORT").ok())?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Honors the bare `PORT` variable used by most hosting platforms.
    pub fn apply_port_override(&mut self, port: Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(());
            }
            self.server.port = raw
                .parse()
                .map_err(|_| ConfigError::Message(format!("Invalid PORT value: {}", raw)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Message(
                "Max upload size must be greater than 0".to_string(),
            ));
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Upload directory cannot be empty".to_string(),
            ));
        }

        if self.sweep.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }

        if !(4..=12).contains(&self.codes.length) {
            return Err(ConfigError::Message(format!(
                "Share code length must be between 4 and 12, got {}",
                self.codes.length
            )));
        }

        if self.codes.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Share code max attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.storage.upload_dir)?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
