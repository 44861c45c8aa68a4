pub mod settings;

pub use settings::{AppConfig, CodeConfig, CorsConfig, ServerConfig, StorageConfig, SweepConfig};
