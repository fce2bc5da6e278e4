//! Platform adapters
//!
//! Each social network exposes its own multi-step publishing protocol. An
//! adapter hides one such protocol behind [`PlatformAdapter`], declaring which
//! post types it handles and the static limits that apply, so the orchestrator
//! can validate a request before any network call.
//!
//! New networks are added by implementing the trait; adapters share no base
//! type beyond the small HTTP helpers in this module.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libpropcast::platforms::{feed_photo::FeedPhotoAdapter, PlatformAdapter};
//! use libpropcast::types::PostType;
//!
//! let adapter = FeedPhotoAdapter::new(reqwest::Client::new());
//! let constraints = adapter.constraints();
//! assert!(constraints.capabilities.supports(PostType::Story));
//! println!("{} accepts up to {} carousel images", adapter.platform(), constraints.carousel_max);
//! ```

use async_trait::async_trait;
use tracing::warn;

use crate::error::{PlatformError, PlatformResult};
use crate::events::{Event, EventBus};
use crate::types::{Constraints, Credentials, Platform};

pub mod binary_upload;
pub mod container_media;
pub mod feed_photo;
mod graph;

// Mock adapter is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Per-call state handed to an adapter
///
/// Lives only for one publish: the credentials, the correlation id and the
/// event bus used to report intermediate steps.
pub struct PublishContext<'a> {
    publish_id: &'a str,
    credentials: &'a Credentials,
    events: &'a EventBus,
}

impl<'a> PublishContext<'a> {
    pub fn new(publish_id: &'a str, credentials: &'a Credentials, events: &'a EventBus) -> Self {
        Self {
            publish_id,
            credentials,
            events,
        }
    }

    pub fn publish_id(&self) -> &str {
        self.publish_id
    }

    pub fn credentials(&self) -> &Credentials {
        self.credentials
    }

    /// Report a finished protocol step
    pub fn progress(&self, step: impl Into<String>) {
        self.events.emit(Event::PublishProgress {
            publish_id: self.publish_id.to_string(),
            step: step.into(),
        });
    }

    /// Log media left uploaded but unpublished after an aborted publish
    ///
    /// Nothing is attached to a visible post, but the platform keeps the
    /// media until it expires or someone deletes it by hand.
    pub fn report_orphans(&self, platform: Platform, media_ids: &[String]) {
        if media_ids.is_empty() {
            return;
        }
        warn!(
            publish_id = self.publish_id,
            %platform,
            orphaned_media = ?media_ids,
            "Publish aborted; unpublished media left on the platform"
        );
        self.events.emit(Event::MediaOrphaned {
            publish_id: self.publish_id.to_string(),
            platform,
            media_ids: media_ids.to_vec(),
        });
    }
}

/// One network's publishing protocol
///
/// Methods return the platform-assigned id of the created post. They are
/// only invoked for post types listed in [`Constraints::capabilities`] and
/// with image counts already checked against the constraints.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The network this adapter talks to
    fn platform(&self) -> Platform;

    /// Supported post types and image/caption limits
    fn constraints(&self) -> Constraints;

    /// Publish one image with a caption
    async fn publish_single(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
        caption: &str,
    ) -> PlatformResult<String>;

    /// Publish an ordered set of images as one post
    ///
    /// The remote post must show the images in the order given.
    async fn publish_carousel(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String>;

    /// Publish one image as ephemeral content (no caption)
    async fn publish_story(
        &self,
        _ctx: &PublishContext<'_>,
        _image_url: &str,
    ) -> PlatformResult<String> {
        Err(PlatformError::Unsupported(format!(
            "story posts on {}",
            self.platform()
        )))
    }
}

/// Strip trailing slashes so paths can be appended with `format!`
pub(crate) fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
