//! Feed/photo network adapter
//!
//! Protocol (Graph API, form-encoded, token in the `access_token` field):
//!
//! - single: `POST /{page}/photos` with `url` and `caption`, published at once
//! - carousel: every image is uploaded with `published=false`, in order, then
//!   one `POST /{page}/feed` attaches all media ids with the caption
//! - story: upload unpublished, then `POST /{page}/photo_stories`
//!
//! Uploads are strictly sequential so the attached media keep slide order.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::graph::{self, IdResponse};
use super::{normalize_base_url, PlatformAdapter, PublishContext};
use crate::config::FeedPhotoConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::types::{Capabilities, Constraints, Platform};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";

/// Default carousel cap; the network itself enforces none
pub const DEFAULT_MAX_CAROUSEL_IMAGES: usize = 10;

const CAPTION_LIMIT: usize = 63_206;

#[derive(Debug, Deserialize)]
struct PhotoResponse {
    id: String,
    post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoryResponse {
    post_id: Option<String>,
    id: Option<String>,
}

/// Adapter for the feed/photo network
pub struct FeedPhotoAdapter {
    client: Client,
    base_url: String,
    max_carousel_images: usize,
    cleanup_orphans: bool,
}

impl FeedPhotoAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_carousel_images: DEFAULT_MAX_CAROUSEL_IMAGES,
            cleanup_orphans: false,
        }
    }

    pub fn from_config(client: Client, config: &FeedPhotoConfig) -> Self {
        let mut adapter = Self::new(client)
            .with_max_carousel_images(config.max_carousel_images)
            .with_orphan_cleanup(config.cleanup_orphans);
        if let Some(base_url) = &config.base_url {
            adapter = adapter.with_base_url(base_url.clone());
        }
        adapter
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_max_carousel_images(mut self, max: usize) -> Self {
        self.max_carousel_images = max;
        self
    }

    /// Delete unpublished photos when a carousel or story is aborted
    pub fn with_orphan_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_orphans = enabled;
        self
    }

    fn page_url(&self, ctx: &PublishContext<'_>, edge: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            ctx.credentials().account_id(),
            edge
        )
    }

    /// Upload one photo without publishing it, returning its media id
    async fn upload_unpublished(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
    ) -> PlatformResult<String> {
        let form = [
            ("access_token", ctx.credentials().access_token()),
            ("url", image_url),
            ("published", "false"),
        ];

        let response = self
            .client
            .post(self.page_url(ctx, "photos"))
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::network("upload unpublished photo", e))?;

        let photo: IdResponse = graph::decode(response, "upload unpublished photo").await?;
        debug!(media_id = %photo.id, "Uploaded unpublished photo");
        Ok(photo.id)
    }

    /// Report, and optionally delete, photos uploaded for an aborted publish
    async fn abandon(&self, ctx: &PublishContext<'_>, media_ids: &[String]) {
        ctx.report_orphans(Platform::FeedPhoto, media_ids);
        if !self.cleanup_orphans {
            return;
        }

        for media_id in media_ids {
            let result = self
                .client
                .delete(format!("{}/{}", self.base_url, media_id))
                .query(&[("access_token", ctx.credentials().access_token())])
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    info!(%media_id, "Deleted orphaned photo");
                }
                Ok(response) => {
                    warn!(%media_id, status = response.status().as_u16(), "Could not delete orphaned photo");
                }
                Err(e) => {
                    warn!(%media_id, error = %e.without_url(), "Could not delete orphaned photo");
                }
            }
        }
    }

    async fn create_feed_post(
        &self,
        ctx: &PublishContext<'_>,
        media_ids: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        let mut form: Vec<(String, String)> = vec![
            (
                "access_token".to_string(),
                ctx.credentials().access_token().to_string(),
            ),
            ("message".to_string(), caption.to_string()),
        ];
        for (index, media_id) in media_ids.iter().enumerate() {
            form.push((
                format!("attached_media[{}]", index),
                serde_json::json!({ "media_fbid": media_id }).to_string(),
            ));
        }

        let response = self
            .client
            .post(self.page_url(ctx, "feed"))
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::network("create feed post", e))?;

        let post: IdResponse = graph::decode(response, "create feed post").await?;
        Ok(post.id)
    }
}

#[async_trait]
impl PlatformAdapter for FeedPhotoAdapter {
    fn platform(&self) -> Platform {
        Platform::FeedPhoto
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            capabilities: Capabilities::ALL,
            carousel_min: 1,
            carousel_max: self.max_carousel_images,
            caption_limit: CAPTION_LIMIT,
        }
    }

    async fn publish_single(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
        caption: &str,
    ) -> PlatformResult<String> {
        let form = [
            ("access_token", ctx.credentials().access_token()),
            ("caption", caption),
            ("url", image_url),
        ];

        let response = self
            .client
            .post(self.page_url(ctx, "photos"))
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::network("create photo post", e))?;

        let photo: PhotoResponse = graph::decode(response, "create photo post").await?;
        Ok(photo.post_id.unwrap_or(photo.id))
    }

    async fn publish_carousel(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        if let [only] = image_urls {
            debug!("Single-image carousel, posting as a photo");
            return self.publish_single(ctx, only, caption).await;
        }

        let total = image_urls.len();
        let mut media_ids = Vec::with_capacity(total);
        for (index, image_url) in image_urls.iter().enumerate() {
            match self.upload_unpublished(ctx, image_url).await {
                Ok(media_id) => {
                    media_ids.push(media_id);
                    ctx.progress(format!("uploaded photo {}/{}", index + 1, total));
                }
                Err(e) => {
                    self.abandon(ctx, &media_ids).await;
                    return Err(e);
                }
            }
        }

        match self.create_feed_post(ctx, &media_ids, caption).await {
            Ok(post_id) => Ok(post_id),
            Err(e) => {
                self.abandon(ctx, &media_ids).await;
                Err(e)
            }
        }
    }

    async fn publish_story(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
    ) -> PlatformResult<String> {
        let photo_id = self.upload_unpublished(ctx, image_url).await?;
        ctx.progress("uploaded story photo");

        let form = [
            ("access_token", ctx.credentials().access_token()),
            ("photo_id", photo_id.as_str()),
        ];
        let result = async {
            let response = self
                .client
                .post(self.page_url(ctx, "photo_stories"))
                .form(&form)
                .send()
                .await
                .map_err(|e| PlatformError::network("create story", e))?;
            graph::decode::<StoryResponse>(response, "create story").await
        }
        .await;

        match result {
            Ok(story) => story
                .post_id
                .or(story.id)
                .ok_or_else(|| PlatformError::response("create story", "response carried no post id")),
            Err(e) => {
                self.abandon(ctx, std::slice::from_ref(&photo_id)).await;
                Err(e)
            }
        }
    }
}
