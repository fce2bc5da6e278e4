//! Professional-network adapter (binary upload protocol)
//!
//! Images are not referenced by URL. Each one goes through its own chain:
//!
//! 1. `POST /images?action=initializeUpload` reserves an image URN and a
//!    one-shot upload URL
//! 2. the image bytes are fetched from the public source URL
//! 3. the bytes are `PUT` to the upload URL with the source content type
//!
//! Once every chain has finished, `POST /posts` creates the post referencing
//! the URNs in request order. Chains may run concurrently
//! (`upload_concurrency`); their results are always collected in order.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{normalize_base_url, PlatformAdapter, PublishContext};
use crate::config::BinaryUploadConfig;
use crate::error::{PlatformError, PlatformResult, STEP_FETCH_IMAGE, STEP_UPLOAD_IMAGE};
use crate::types::{Capabilities, Constraints, ImageMimeType, Platform};

pub const DEFAULT_BASE_URL: &str = "https://api.linkedin.com/rest";
pub const DEFAULT_API_VERSION: &str = "202405";
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

const CAROUSEL_MAX: usize = 9;
const CAPTION_LIMIT: usize = 3_000;

#[derive(Debug, Deserialize)]
struct InitializeUploadResponse {
    value: UploadTicket,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTicket {
    upload_url: String,
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestErrorBody {
    message: Option<String>,
    service_error_code: Option<i64>,
}

/// Prefix a bare member id with the person URN namespace
pub fn normalize_owner_urn(owner: &str) -> String {
    if owner.starts_with("urn:li:") {
        owner.to_string()
    } else {
        format!("urn:li:person:{}", owner)
    }
}

/// Content type to declare on the binary upload
///
/// Prefers a recognised image type from the source response, then a guess
/// from the URL, then whatever the source sent.
fn upload_content_type(header: Option<&str>, image_url: &str) -> String {
    header
        .and_then(ImageMimeType::from_mime_str)
        .or_else(|| ImageMimeType::from_url(image_url))
        .map(|mime| mime.as_str().to_string())
        .or_else(|| header.map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Build the post body; one image uses `media`, several use `multiImage`
fn post_body(author: &str, caption: &str, image_urns: &[String]) -> Value {
    let content = match image_urns {
        [only] => json!({ "media": { "id": only } }),
        _ => {
            let images: Vec<Value> = image_urns
                .iter()
                .enumerate()
                .map(|(index, urn)| json!({ "id": urn, "altText": format!("Image {}", index + 1) }))
                .collect();
            json!({ "multiImage": { "images": images } })
        }
    };

    json!({
        "author": author,
        "commentary": caption,
        "visibility": "PUBLIC",
        "distribution": {
            "feedDistribution": "MAIN_FEED",
            "targetEntities": [],
            "thirdPartyDistributionChannels": []
        },
        "content": content,
        "lifecycleState": "PUBLISHED",
        "isReshareDisabledByAuthor": false
    })
}

/// Turn a non-success REST response into an API error
async fn rest_failure(response: reqwest::Response, step: &'static str) -> PlatformError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<RestErrorBody>(&body) {
        Ok(parsed) => (parsed.service_error_code, parsed.message),
        Err(_) => (None, None),
    };
    let message = message
        .or_else(|| (!body.is_empty()).then_some(body))
        .unwrap_or_else(|| format!("request failed (status {})", status));

    PlatformError::Api {
        step,
        status,
        code,
        message,
    }
}

/// Adapter for the professional network
pub struct BinaryUploadAdapter {
    client: Client,
    base_url: String,
    api_version: String,
    upload_concurrency: usize,
}

impl BinaryUploadAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            upload_concurrency: 1,
        }
    }

    pub fn from_config(client: Client, config: &BinaryUploadConfig) -> Self {
        let mut adapter = Self::new(client)
            .with_api_version(config.api_version.clone())
            .with_upload_concurrency(config.upload_concurrency);
        if let Some(base_url) = &config.base_url {
            adapter = adapter.with_base_url(base_url.clone());
        }
        adapter
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Value sent in the `LinkedIn-Version` header (YYYYMM)
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Number of upload chains in flight at once (minimum 1)
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency.max(1);
        self
    }

    fn rest_request(&self, ctx: &PublishContext<'_>, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(ctx.credentials().access_token())
            .header("LinkedIn-Version", &self.api_version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
    }

    async fn initialize_upload(
        &self,
        ctx: &PublishContext<'_>,
        owner: &str,
    ) -> PlatformResult<UploadTicket> {
        const STEP: &str = "initialize upload";

        let response = self
            .rest_request(ctx, Method::POST, "/images?action=initializeUpload")
            .json(&json!({ "initializeUploadRequest": { "owner": owner } }))
            .send()
            .await
            .map_err(|e| PlatformError::network(STEP, e))?;

        if !response.status().is_success() {
            return Err(rest_failure(response, STEP).await);
        }

        let init: InitializeUploadResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::response(STEP, e.without_url().to_string()))?;
        Ok(init.value)
    }

    /// initialize, fetch, PUT; returns the image URN
    async fn upload_image(
        &self,
        ctx: &PublishContext<'_>,
        owner: &str,
        image_url: &str,
    ) -> PlatformResult<String> {
        let ticket = self.initialize_upload(ctx, owner).await?;

        let source = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| PlatformError::network(STEP_FETCH_IMAGE, e))?;
        if !source.status().is_success() {
            return Err(PlatformError::Api {
                step: STEP_FETCH_IMAGE,
                status: source.status().as_u16(),
                code: None,
                message: format!("could not fetch {}", image_url),
            });
        }
        let header = source
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_type = upload_content_type(header.as_deref(), image_url);
        let bytes = source
            .bytes()
            .await
            .map_err(|e| PlatformError::network(STEP_FETCH_IMAGE, e))?;

        debug!(image = %ticket.image, size = bytes.len(), %content_type, "Uploading image binary");
        let upload = self
            .client
            .put(&ticket.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PlatformError::network(STEP_UPLOAD_IMAGE, e))?;
        if !upload.status().is_success() {
            return Err(rest_failure(upload, STEP_UPLOAD_IMAGE).await);
        }

        Ok(ticket.image)
    }

    /// Run every upload chain and return the URNs in request order
    ///
    /// After the first failure no new chain starts, but chains already in
    /// flight are allowed to finish so that their URNs can be reported.
    async fn upload_all(
        &self,
        ctx: &PublishContext<'_>,
        owner: &str,
        image_urls: &[String],
    ) -> PlatformResult<Vec<String>> {
        let total = image_urls.len();
        let aborted = AtomicBool::new(false);
        let chains: Vec<BoxFuture<'_, Option<PlatformResult<String>>>> = image_urls
            .iter()
            .map(|image_url| {
                let aborted = &aborted;
                async move {
                    if aborted.load(Ordering::SeqCst) {
                        return None;
                    }
                    Some(self.upload_image(ctx, owner, image_url).await)
                }
                .boxed()
            })
            .collect();
        let mut uploads = stream::iter(chains).buffered(self.upload_concurrency);

        let mut image_urns = Vec::with_capacity(total);
        let mut failure = None;
        while let Some(result) = uploads.next().await {
            match result {
                Some(Ok(urn)) => {
                    image_urns.push(urn);
                    if failure.is_none() {
                        ctx.progress(format!("uploaded image {}/{}", image_urns.len(), total));
                    }
                }
                Some(Err(e)) => {
                    if failure.is_none() {
                        aborted.store(true, Ordering::SeqCst);
                        failure = Some(e);
                    }
                }
                None => {}
            }
        }

        match failure {
            Some(e) => {
                ctx.report_orphans(Platform::BinaryUpload, &image_urns);
                Err(e)
            }
            None => Ok(image_urns),
        }
    }

    async fn create_post(
        &self,
        ctx: &PublishContext<'_>,
        author: &str,
        caption: &str,
        image_urns: &[String],
    ) -> PlatformResult<String> {
        const STEP: &str = "create post";

        let response = self
            .rest_request(ctx, Method::POST, "/posts")
            .json(&post_body(author, caption, image_urns))
            .send()
            .await
            .map_err(|e| PlatformError::network(STEP, e))?;

        if response.status() != StatusCode::CREATED {
            return Err(rest_failure(response, STEP).await);
        }

        let headers = response.headers();
        ["x-restli-id", "x-linkedin-id"]
            .iter()
            .find_map(|name| headers.get(*name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| location.rsplit('/').next())
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| PlatformError::response(STEP, "post created but no id header returned"))
    }

    async fn publish_images(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        let owner = normalize_owner_urn(ctx.credentials().account_id());
        let image_urns = self.upload_all(ctx, &owner, image_urls).await?;

        match self.create_post(ctx, &owner, caption, &image_urns).await {
            Ok(post_id) => Ok(post_id),
            Err(e) => {
                ctx.report_orphans(Platform::BinaryUpload, &image_urns);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for BinaryUploadAdapter {
    fn platform(&self) -> Platform {
        Platform::BinaryUpload
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            capabilities: Capabilities {
                single: true,
                carousel: true,
                story: false,
            },
            carousel_min: 1,
            carousel_max: CAROUSEL_MAX,
            caption_limit: CAPTION_LIMIT,
        }
    }

    async fn publish_single(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
        caption: &str,
    ) -> PlatformResult<String> {
        self.publish_images(ctx, &[image_url.to_string()], caption)
            .await
    }

    async fn publish_carousel(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        self.publish_images(ctx, image_urls, caption).await
    }
}
