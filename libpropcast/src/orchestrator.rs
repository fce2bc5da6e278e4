//! Publish orchestration
//!
//! [`PublishOrchestrator`] is the single entry point for publishing. It
//! validates a request against the target adapter's static constraints,
//! dispatches to the adapter method matching the post type and turns any
//! adapter failure into a [`PublishError`]. It never retries: a blind retry
//! of a post-creation call can publish the same creative twice.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{PublishError, Result};
use crate::events::{Event, EventBus, EventReceiver};
use crate::platforms::binary_upload::BinaryUploadAdapter;
use crate::platforms::container_media::ContainerMediaAdapter;
use crate::platforms::feed_photo::FeedPhotoAdapter;
use crate::platforms::{PlatformAdapter, PublishContext};
use crate::types::{Constraints, Platform, PostType, PublishRequest, PublishResult};

/// Outcome of one publish call
pub type PublishOutcome = std::result::Result<PublishResult, PublishError>;

/// Check a request against an adapter's constraints
///
/// Pure; performs no I/O. Every rule that can be decided without talking to
/// the network is enforced here.
pub fn validate_request(
    request: &PublishRequest,
    constraints: &Constraints,
) -> std::result::Result<(), PublishError> {
    let platform = request.platform;
    let post_type = request.post_type;
    let count = request.images.len();

    if count == 0 {
        return Err(PublishError::Validation(
            "at least one image is required".to_string(),
        ));
    }

    if !constraints.capabilities.supports(post_type) {
        return Err(PublishError::Validation(format!(
            "{} posts are not supported on {}",
            post_type, platform
        )));
    }

    match post_type {
        PostType::Single | PostType::Story if count != 1 => {
            return Err(PublishError::Validation(format!(
                "{} posts take exactly 1 image, got {}",
                post_type, count
            )));
        }
        PostType::Carousel
            if count < constraints.carousel_min || count > constraints.carousel_max =>
        {
            return Err(PublishError::Validation(format!(
                "carousels on {} take {} to {} images, got {}",
                platform, constraints.carousel_min, constraints.carousel_max, count
            )));
        }
        _ => {}
    }

    if let Some(bad) = request
        .images
        .iter()
        .find(|url| !(url.starts_with("https://") || url.starts_with("http://")))
    {
        return Err(PublishError::Validation(format!(
            "image URL must be http(s): '{}'",
            bad
        )));
    }

    if post_type.requires_caption() {
        if request.caption.trim().is_empty() {
            return Err(PublishError::Validation(format!(
                "{} posts require a caption",
                post_type
            )));
        }

        let length = request.caption.chars().count();
        if length > constraints.caption_limit {
            return Err(PublishError::Validation(format!(
                "caption is {} characters, {} allows {}",
                length, platform, constraints.caption_limit
            )));
        }
    }

    Ok(())
}

/// Routes publish requests to platform adapters
pub struct PublishOrchestrator {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    event_bus: EventBus,
}

impl PublishOrchestrator {
    /// Orchestrator with no adapters registered
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            event_bus: EventBus::default(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_adapter(mut self, adapter: impl PlatformAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    /// Register an adapter, replacing any previous one for the same platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        let platform = adapter.platform();
        if self.adapters.insert(platform, adapter).is_some() {
            debug!(%platform, "Replaced platform adapter");
        }
    }

    /// Build adapters for every platform section present in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.http_client()?;
        let policy = config.poll.policy();
        let mut orchestrator = Self::new();

        if let Some(section) = &config.feed_photo {
            orchestrator.register(Arc::new(FeedPhotoAdapter::from_config(
                client.clone(),
                section,
            )));
        }
        if let Some(section) = &config.container_media {
            orchestrator.register(Arc::new(ContainerMediaAdapter::from_config(
                client.clone(),
                section,
                policy,
            )));
        }
        if let Some(section) = &config.binary_upload {
            orchestrator.register(Arc::new(BinaryUploadAdapter::from_config(
                client.clone(),
                section,
            )));
        }

        if orchestrator.adapters.is_empty() {
            warn!("No platforms are configured");
        } else {
            info!("Configured {} platform adapter(s)", orchestrator.adapters.len());
        }
        Ok(orchestrator)
    }

    /// Registered platforms, in canonical order
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|platform| self.adapters.contains_key(platform))
            .collect()
    }

    pub fn constraints(&self, platform: Platform) -> Option<Constraints> {
        self.adapters.get(&platform).map(|adapter| adapter.constraints())
    }

    /// Receive events for every publish started after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn adapter(&self, platform: Platform) -> std::result::Result<&Arc<dyn PlatformAdapter>, PublishError> {
        self.adapters.get(&platform).ok_or_else(|| {
            PublishError::Validation(format!("no adapter registered for {}", platform))
        })
    }

    /// Validate a request without publishing it
    pub fn validate(&self, request: &PublishRequest) -> std::result::Result<(), PublishError> {
        let adapter = self.adapter(request.platform)?;
        validate_request(request, &adapter.constraints())
    }

    /// Publish one request to completion
    pub async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        self.publish_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Publish one request, aborting when `cancel` fires
    ///
    /// Cancellation drops the in-flight HTTP request or poll sleep. Media
    /// already uploaded at that point stays on the platform unpublished.
    pub async fn publish_with_cancel(
        &self,
        request: &PublishRequest,
        cancel: CancellationToken,
    ) -> PublishOutcome {
        let publish_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "publish",
            publish_id = %publish_id,
            platform = %request.platform,
            post_type = %request.post_type,
        );

        self.run(request, &publish_id, cancel).instrument(span).await
    }

    /// Publish several requests concurrently, one outcome per request
    ///
    /// Requests are independent; one failing does not stop the others.
    pub async fn publish_all(
        &self,
        requests: &[PublishRequest],
        cancel: CancellationToken,
    ) -> Vec<PublishOutcome> {
        join_all(
            requests
                .iter()
                .map(|request| self.publish_with_cancel(request, cancel.clone())),
        )
        .await
    }

    async fn run(
        &self,
        request: &PublishRequest,
        publish_id: &str,
        cancel: CancellationToken,
    ) -> PublishOutcome {
        let outcome = self.dispatch(request, publish_id, cancel).await;

        match &outcome {
            Ok(result) => {
                info!(remote_post_id = %result.remote_post_id, "Published");
                self.event_bus.emit(Event::PublishCompleted {
                    publish_id: publish_id.to_string(),
                    remote_post_id: result.remote_post_id.clone(),
                });
            }
            Err(e) => {
                warn!(kind = %e.kind(), retryable = e.is_retryable(), "Publish failed: {}", e);
                self.event_bus.emit(Event::PublishFailed {
                    publish_id: publish_id.to_string(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
        outcome
    }

    async fn dispatch(
        &self,
        request: &PublishRequest,
        publish_id: &str,
        cancel: CancellationToken,
    ) -> PublishOutcome {
        let platform = request.platform;
        let adapter = self.adapter(platform)?;
        validate_request(request, &adapter.constraints())?;

        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled { platform });
        }

        self.event_bus.emit(Event::PublishStarted {
            publish_id: publish_id.to_string(),
            platform,
            post_type: request.post_type,
            image_count: request.images.len(),
        });
        debug!(image_count = request.images.len(), "Request validated");

        let ctx = PublishContext::new(publish_id, &request.credentials, &self.event_bus);
        let call = async {
            match request.post_type {
                PostType::Single => {
                    adapter
                        .publish_single(&ctx, &request.images[0], &request.caption)
                        .await
                }
                PostType::Carousel => {
                    adapter
                        .publish_carousel(&ctx, &request.images, &request.caption)
                        .await
                }
                PostType::Story => adapter.publish_story(&ctx, &request.images[0]).await,
            }
        };

        let remote_post_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Publish cancelled");
                return Err(PublishError::Cancelled { platform });
            }
            result = call => result.map_err(|e| PublishError::classify(platform, e))?,
        };

        Ok(PublishResult {
            success: true,
            remote_post_id,
            platform,
            post_type: request.post_type,
            publish_id: publish_id.to_string(),
            image_count: request.images.len(),
            published_at: Utc::now().timestamp(),
        })
    }
}

impl Default for PublishOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}
