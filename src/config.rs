//! Configuration management for bedquote

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::ConfigurationCatalog;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8092,
        }
    }
}

/// Where the editable price book is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub price_book: PathBuf,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_book: PathBuf::from("price_book.json"),
        }
    }
}

/// Texture extraction defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureConfig {
    /// Output size used when a request doesn't give one
    #[serde(default = "default_output_size")]
    pub output_width: u32,
    #[serde(default = "default_output_size")]
    pub output_height: u32,

    /// Largest accepted output width or height
    #[serde(default = "default_max_output")]
    pub max_output_dimension: u32,
}

fn default_output_size() -> u32 { 1024 }
fn default_max_output() -> u32 { 4096 }

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            output_width: default_output_size(),
            output_height: default_output_size(),
            max_output_dimension: default_max_output(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub texture: TextureConfig,

    #[serde(default)]
    pub catalog: ConfigurationCatalog,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;
        write_file(path, &content).context("Failed to save configuration")?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Resolve the price book path relative to the config file's directory
    pub fn price_book_path(&self, config_path: &Path) -> PathBuf {
        if self.pricing.price_book.is_absolute() {
            return self.pricing.price_book.clone();
        }
        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(&self.pricing.price_book),
            _ => self.pricing.price_book.clone(),
        }
    }
}

/// Write `content` to `path`, creating the parent directory when missing
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
