//! Configuration management for Propcast
//!
//! A single TOML file describes the HTTP client, the container polling
//! budget and one optional section per network. Access tokens never live in
//! the config itself; each section points at a token file which is read on
//! demand into a [`SecretString`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::platforms::{binary_upload, feed_photo};
use crate::poller::PollPolicy;
use crate::types::{Credentials, Platform};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub poll: PollConfig,
    pub feed_photo: Option<FeedPhotoConfig>,
    pub container_media: Option<ContainerMediaConfig>,
    pub binary_upload: Option<BinaryUploadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Container status polling budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            jitter_ms: 0,
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_attempts, Duration::from_millis(self.interval_ms))
            .with_jitter(Duration::from_millis(self.jitter_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPhotoConfig {
    pub page_id: String,
    pub token_file: String,
    #[serde(default = "default_max_carousel_images")]
    pub max_carousel_images: usize,
    /// Delete unpublished photos left behind by an aborted publish
    #[serde(default)]
    pub cleanup_orphans: bool,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMediaConfig {
    pub account_id: String,
    pub token_file: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryUploadConfig {
    /// Owner URN, or a bare member id
    pub author_urn: String,
    pub token_file: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    pub base_url: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_max_carousel_images() -> usize {
    feed_photo::DEFAULT_MAX_CAROUSEL_IMAGES
}

fn default_api_version() -> String {
    binary_upload::DEFAULT_API_VERSION.to_string()
}

fn default_upload_concurrency() -> usize {
    1
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.max_attempts == 0 {
            return Err(invalid("poll.max_attempts", "must be at least 1"));
        }

        if let Some(section) = &self.feed_photo {
            if !(1..=feed_photo::DEFAULT_MAX_CAROUSEL_IMAGES).contains(&section.max_carousel_images)
            {
                return Err(invalid(
                    "feed_photo.max_carousel_images",
                    &format!(
                        "must be between 1 and {}",
                        feed_photo::DEFAULT_MAX_CAROUSEL_IMAGES
                    ),
                ));
            }
        }

        if let Some(section) = &self.binary_upload {
            if section.upload_concurrency == 0 {
                return Err(invalid(
                    "binary_upload.upload_concurrency",
                    "must be at least 1",
                ));
            }
        }

        Ok(())
    }

    /// Platforms that have a config section
    pub fn configured_platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.feed_photo.is_some() {
            platforms.push(Platform::FeedPhoto);
        }
        if self.container_media.is_some() {
            platforms.push(Platform::ContainerMedia);
        }
        if self.binary_upload.is_some() {
            platforms.push(Platform::BinaryUpload);
        }
        platforms
    }

    /// Read the token file for `platform` and pair it with its account id
    pub fn credentials_for(&self, platform: Platform) -> Result<Credentials> {
        let section = platform_section(platform);
        let (account_id, token_file) = match platform {
            Platform::FeedPhoto => self
                .feed_photo
                .as_ref()
                .map(|c| (&c.page_id, &c.token_file)),
            Platform::ContainerMedia => self
                .container_media
                .as_ref()
                .map(|c| (&c.account_id, &c.token_file)),
            Platform::BinaryUpload => self
                .binary_upload
                .as_ref()
                .map(|c| (&c.author_urn, &c.token_file)),
        }
        .ok_or_else(|| ConfigError::MissingField(format!("[{}] section", section)))?;

        let token = read_token_file(section, token_file)?;
        Ok(Credentials::new(token, account_id.clone()))
    }

    /// Build the shared HTTP client
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .user_agent(concat!("propcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()).into())
    }
}

fn platform_section(platform: Platform) -> &'static str {
    match platform {
        Platform::FeedPhoto => "feed_photo",
        Platform::ContainerMedia => "container_media",
        Platform::BinaryUpload => "binary_upload",
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::PropcastError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn read_token_file(section: &str, token_file: &str) -> Result<SecretString> {
    let path = PathBuf::from(shellexpand::tilde(token_file).to_string());
    let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
    let token = content.trim();
    if token.is_empty() {
        return Err(invalid(
            &format!("{}.token_file", section),
            &format!("{} is empty", path.display()),
        ));
    }
    Ok(SecretString::from(token.to_string()))
}

/// Resolve the configuration file path following XDG Base Directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PROPCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("propcast").join("config.toml"))
}
