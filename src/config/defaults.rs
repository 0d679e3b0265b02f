/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CONFIG_FILE: &str = "grout.toml";
pub const ENV_PREFIX: &str = "GROUT_";

// Render limits
pub const DEFAULT_MAX_WIDTH: u32 = 4096;
pub const DEFAULT_MAX_HEIGHT: u32 = 4096;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 64;
pub const DEFAULT_AVATAR_SIZE: u32 = 128;
pub const DEFAULT_SYSTEM_FONTS: bool = false;

// Cache defaults
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_CACHE_MAX_AGE: &str = "7days";

// Compression defaults
pub const DEFAULT_COMPRESSION_ENABLED: bool = true;
pub const DEFAULT_GZIP_LEVEL: u32 = 1; // favour speed, payloads are small
pub const DEFAULT_BROTLI_QUALITY: u32 = 6;
pub const DEFAULT_BROTLI_WINDOW: u32 = 22;
pub const DEFAULT_MAX_IDLE_ENCODERS: usize = 64;
