//! Mock adapter for testing
//!
//! Stands in for any network with configurable constraints, a scripted
//! failure and an artificial delay. Every invocation is recorded so tests can
//! assert whether (and how) the orchestrator reached the adapter.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{PlatformAdapter, PublishContext};
use crate::error::{PlatformError, PlatformResult};
use crate::types::{Capabilities, Constraints, Platform, PostType};

/// One recorded adapter invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub post_type: PostType,
    pub images: Vec<String>,
    /// `None` for stories
    pub caption: Option<String>,
}

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Network the mock registers as
    pub platform: Platform,

    pub constraints: Constraints,

    /// Returned from every publish call when set
    pub failure: Option<PlatformError>,

    /// Delay before completing (simulates a slow protocol)
    pub delay: Duration,

    /// Remote id returned on success
    pub post_id: String,

    /// Invocations so far, shared with clones of the config
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            platform: Platform::FeedPhoto,
            constraints: Constraints {
                capabilities: Capabilities::ALL,
                carousel_min: 1,
                carousel_max: 10,
                caption_limit: 2_200,
            },
            failure: None,
            delay: Duration::ZERO,
            post_id: "mock-post-1".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock adapter for testing
pub struct MockAdapter {
    config: MockConfig,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Adapter that always succeeds
    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig {
            platform,
            ..Default::default()
        })
    }

    /// Adapter whose every publish fails with `error`
    pub fn failing(platform: Platform, error: PlatformError) -> Self {
        Self::new(MockConfig {
            platform,
            failure: Some(error),
            ..Default::default()
        })
    }

    /// Adapter that takes `delay` to answer
    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            platform,
            delay,
            ..Default::default()
        })
    }

    pub fn with_constraints(platform: Platform, constraints: Constraints) -> Self {
        Self::new(MockConfig {
            platform,
            constraints,
            ..Default::default()
        })
    }

    /// Shared handle on the call log, usable after the adapter is moved
    pub fn call_log(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.config.calls)
    }

    pub fn call_count(&self) -> usize {
        self.config.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.config
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    async fn respond(&self, call: MockCall) -> PlatformResult<String> {
        if let Ok(mut calls) = self.config.calls.lock() {
            calls.push(call);
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.config.post_id.clone()),
        }
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn constraints(&self) -> Constraints {
        self.config.constraints
    }

    async fn publish_single(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
        caption: &str,
    ) -> PlatformResult<String> {
        ctx.progress("mock single");
        self.respond(MockCall {
            post_type: PostType::Single,
            images: vec![image_url.to_string()],
            caption: Some(caption.to_string()),
        })
        .await
    }

    async fn publish_carousel(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        ctx.progress("mock carousel");
        self.respond(MockCall {
            post_type: PostType::Carousel,
            images: image_urls.to_vec(),
            caption: Some(caption.to_string()),
        })
        .await
    }

    async fn publish_story(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
    ) -> PlatformResult<String> {
        if !self.config.constraints.capabilities.story {
            return Err(PlatformError::Unsupported(format!(
                "story posts on {}",
                self.config.platform
            )));
        }
        ctx.progress("mock story");
        self.respond(MockCall {
            post_type: PostType::Story,
            images: vec![image_url.to_string()],
            caption: None,
        })
        .await
    }
}
