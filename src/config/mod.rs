use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;

use crate::errors::{AppError, AppResult};
use crate::models::RenderLimits;
use crate::services::text_fitter::FitCalibration;
use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Limits and tuning for the rendering engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Largest accepted canvas width in pixels
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Largest accepted canvas height in pixels
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Text beyond this many characters is truncated
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    /// Avatar edge length when the request carries no `size`
    #[serde(default = "default_avatar_size")]
    pub default_avatar_size: u32,
    /// Also load the host's fonts next to the bundled DejaVu Sans. Raster
    /// output then depends on what the host has installed
    #[serde(default = "default_system_fonts")]
    pub system_fonts: bool,
    /// Extra directory scanned for ttf/otf/ttc fonts
    #[serde(default)]
    pub font_dir: Option<PathBuf>,
    /// Text layout calibration constants
    #[serde(default)]
    pub calibration: FitCalibration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of rendered images kept in memory
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// `Cache-Control: max-age` sent with images, as a humantime duration
    #[serde(default = "default_cache_max_age")]
    pub max_age: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_compression_enabled")]
    pub enabled: bool,
    /// flate2 level, 0-9
    #[serde(default = "default_gzip_level")]
    pub gzip_level: u32,
    /// brotli quality, 0-11
    #[serde(default = "default_brotli_quality")]
    pub brotli_quality: u32,
    /// brotli window size (log2), 10-24
    #[serde(default = "default_brotli_window")]
    pub brotli_window: u32,
    /// Upper bound of idle encoders kept per coding
    #[serde(default = "default_max_idle_encoders")]
    pub max_idle_encoders: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_max_text_length() -> usize {
    DEFAULT_MAX_TEXT_LENGTH
}

fn default_avatar_size() -> u32 {
    DEFAULT_AVATAR_SIZE
}

fn default_system_fonts() -> bool {
    DEFAULT_SYSTEM_FONTS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_cache_max_age() -> String {
    DEFAULT_CACHE_MAX_AGE.to_string()
}

fn default_compression_enabled() -> bool {
    DEFAULT_COMPRESSION_ENABLED
}

fn default_gzip_level() -> u32 {
    DEFAULT_GZIP_LEVEL
}

fn default_brotli_quality() -> u32 {
    DEFAULT_BROTLI_QUALITY
}

fn default_brotli_window() -> u32 {
    DEFAULT_BROTLI_WINDOW
}

fn default_max_idle_encoders() -> usize {
    DEFAULT_MAX_IDLE_ENCODERS
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_text_length: default_max_text_length(),
            default_avatar_size: default_avatar_size(),
            system_fonts: default_system_fonts(),
            font_dir: None,
            calibration: FitCalibration::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            max_age: default_cache_max_age(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: default_compression_enabled(),
            gzip_level: default_gzip_level(),
            brotli_quality: default_brotli_quality(),
            brotli_window: default_brotli_window(),
            max_idle_encoders: default_max_idle_encoders(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            render: RenderConfig::default(),
            cache: CacheConfig::default(),
            compression: CompressionConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn limits(&self) -> RenderLimits {
        RenderLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            max_text_length: self.max_text_length,
        }
    }
}

impl CacheConfig {
    pub fn capacity(&self) -> AppResult<NonZeroUsize> {
        NonZeroUsize::new(self.capacity)
            .ok_or_else(|| AppError::configuration("cache.capacity must be greater than zero"))
    }

    pub fn max_age(&self) -> AppResult<Duration> {
        humantime::parse_duration(&self.max_age).map_err(|e| {
            AppError::configuration(format!("cache.max_age '{}' is invalid: {}", self.max_age, e))
        })
    }
}

impl Config {
    /// Load configuration from defaults, the optional TOML file and `GROUT_*`
    /// environment variables, in increasing order of precedence.
    ///
    /// Nested keys use a double underscore: `GROUT_CACHE__CAPACITY=500`.
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let config_file = config_file.as_ref();
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;

        config.validate()?;

        if config_file.exists() {
            info!("Configuration loaded from: {}", config_file.display());
        } else {
            info!(
                "No configuration file at {}, using defaults and environment",
                config_file.display()
            );
        }
        Ok(config)
    }

    /// Write the default configuration as TOML, for bootstrapping a deployment
    pub fn write_default<P: AsRef<Path>>(config_file: P) -> AppResult<()> {
        let contents = toml::to_string_pretty(&Self::default())
            .map_err(|e| AppError::internal(format!("failed to serialize config: {e}")))?;
        std::fs::write(config_file.as_ref(), contents).map_err(|e| {
            AppError::configuration(format!(
                "failed to write {}: {}",
                config_file.as_ref().display(),
                e
            ))
        })?;
        info!("Created default config file: {}", config_file.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.render.max_width == 0 || self.render.max_height == 0 {
            return Err(AppError::configuration(
                "render.max_width and render.max_height must be greater than zero",
            ));
        }
        if self.render.max_text_length == 0 {
            return Err(AppError::configuration(
                "render.max_text_length must be greater than zero",
            ));
        }
        if self.render.default_avatar_size == 0
            || self.render.default_avatar_size > self.render.max_width.min(self.render.max_height)
        {
            return Err(AppError::configuration(format!(
                "render.default_avatar_size {} must be within 1..={}",
                self.render.default_avatar_size,
                self.render.max_width.min(self.render.max_height)
            )));
        }
        self.render
            .calibration
            .validate()
            .map_err(AppError::configuration)?;
        self.cache.capacity()?;
        self.cache.max_age()?;
        if self.compression.gzip_level > 9 {
            return Err(AppError::configuration("compression.gzip_level must be 0-9"));
        }
        if self.compression.brotli_quality > 11 {
            return Err(AppError::configuration(
                "compression.brotli_quality must be 0-11",
            ));
        }
        if !(10..=24).contains(&self.compression.brotli_window) {
            return Err(AppError::configuration(
                "compression.brotli_window must be 10-24",
            ));
        }
        Ok(())
    }
}
