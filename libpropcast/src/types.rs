//! Core types for Propcast

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Target social network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Feed/photo network: direct photo posts, multi-photo feed posts, photo stories
    FeedPhoto,
    /// Image-container network: create container, poll, publish
    ContainerMedia,
    /// Professional network: initialize upload, PUT binary, create post
    BinaryUpload,
}

impl Platform {
    pub const ALL: [Platform; 3] = [
        Platform::FeedPhoto,
        Platform::ContainerMedia,
        Platform::BinaryUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::FeedPhoto => "feed-photo",
            Platform::ContainerMedia => "container-media",
            Platform::BinaryUpload => "binary-upload",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feed-photo" | "feed_photo" | "facebook" => Ok(Platform::FeedPhoto),
            "container-media" | "container_media" | "instagram" => Ok(Platform::ContainerMedia),
            "binary-upload" | "binary_upload" | "linkedin" => Ok(Platform::BinaryUpload),
            _ => Err(format!(
                "Invalid platform: '{}'. Valid options: feed-photo, container-media, binary-upload",
                s
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content shape of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Single,
    Carousel,
    Story,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Single => "single",
            PostType::Carousel => "carousel",
            PostType::Story => "story",
        }
    }

    /// Whether a non-empty caption is mandatory for this post type
    pub fn requires_caption(&self) -> bool {
        !matches!(self, PostType::Story)
    }
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(PostType::Single),
            "carousel" => Ok(PostType::Carousel),
            "story" => Ok(PostType::Story),
            _ => Err(format!(
                "Invalid post type: '{}'. Valid options: single, carousel, story",
                s
            )),
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-platform credential bundle
///
/// Read-only for the lifetime of a publish. Nothing in this crate logs it;
/// `Debug` is redacted.
#[derive(Clone)]
pub struct Credentials {
    access_token: SecretString,
    account_id: String,
}

impl Credentials {
    /// `account_id` is the page id, the image-container account id, or the
    /// owner URN, depending on the network.
    pub fn new(access_token: SecretString, account_id: impl Into<String>) -> Self {
        Self {
            access_token,
            account_id: account_id.into(),
        }
    }

    pub(crate) fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub(crate) fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials([REDACTED])")
    }
}

/// A request to publish one finished creative
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub platform: Platform,
    pub post_type: PostType,
    pub caption: String,
    /// Publicly fetchable image URLs, in slide order
    pub images: Vec<String>,
    pub credentials: Credentials,
}

/// Confirmation of a created remote post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    /// Platform-assigned post identifier (opaque)
    pub remote_post_id: String,
    pub platform: Platform,
    pub post_type: PostType,
    /// Correlates logs and events of one publish call
    pub publish_id: String,
    pub image_count: usize,
    /// Unix timestamp (seconds)
    pub published_at: i64,
}

/// Processing state of a remote media container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Pending,
    Ready,
    Failed,
}

/// Platform-side staging object for media processed before publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContainer {
    pub id: String,
    pub state: ContainerState,
}

impl MediaContainer {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ContainerState::Pending,
        }
    }
}

/// Supported image MIME types for binary uploads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg; charset=binary")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Guess from the last path segment of a URL, ignoring query and fragment
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which post types an adapter implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub single: bool,
    pub carousel: bool,
    pub story: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        single: true,
        carousel: true,
        story: true,
    };

    pub fn supports(&self, post_type: PostType) -> bool {
        match post_type {
            PostType::Single => self.single,
            PostType::Carousel => self.carousel,
            PostType::Story => self.story,
        }
    }
}

/// Static publishing constraints of one network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    pub capabilities: Capabilities,
    /// Fewest images accepted for a carousel
    pub carousel_min: usize,
    /// Most images accepted for a carousel
    pub carousel_max: usize,
    /// Caption limit in characters
    pub caption_limit: usize,
}
