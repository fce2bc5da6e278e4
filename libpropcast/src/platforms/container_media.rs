//! Image-container network adapter
//!
//! Every post goes through a media container: the container is created from
//! a public image URL, processed asynchronously by the platform, polled until
//! `FINISHED` and then published exactly once.
//!
//! Carousels are two-level. Each image gets a child container which must be
//! ready before the next image is submitted; only when all children are
//! ready is the parent container created with the ordered child ids. A child
//! that fails or times out aborts the publish before any parent exists.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::graph::{self, IdResponse};
use super::{normalize_base_url, PlatformAdapter, PublishContext};
use crate::config::ContainerMediaConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::poller::{MediaContainerPoller, PollOutcome, PollPolicy};
use crate::types::{Capabilities, ContainerState, Constraints, MediaContainer, Platform};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";

const CAROUSEL_MIN: usize = 2;
const CAROUSEL_MAX: usize = 10;
const CAPTION_LIMIT: usize = 2_200;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
    status: Option<String>,
}

/// Map a container `status_code` onto the poller's states
fn container_state(status_code: Option<&str>) -> ContainerState {
    match status_code {
        Some("FINISHED") => ContainerState::Ready,
        Some("ERROR") | Some("EXPIRED") => ContainerState::Failed,
        _ => ContainerState::Pending,
    }
}

/// Which kind of container to create
enum ContainerKind<'a> {
    Image { caption: &'a str },
    CarouselItem,
    Story,
    Carousel { caption: &'a str, children: &'a [String] },
}

impl ContainerKind<'_> {
    fn step(&self) -> &'static str {
        match self {
            ContainerKind::Image { .. } => "create container",
            ContainerKind::CarouselItem => "create child container",
            ContainerKind::Story => "create story container",
            ContainerKind::Carousel { .. } => "create parent container",
        }
    }
}

/// Adapter for the image-container network
pub struct ContainerMediaAdapter {
    client: Client,
    base_url: String,
    poller: MediaContainerPoller,
}

impl ContainerMediaAdapter {
    pub fn new(client: Client, policy: PollPolicy) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            poller: MediaContainerPoller::new(policy),
        }
    }

    pub fn from_config(client: Client, config: &ContainerMediaConfig, policy: PollPolicy) -> Self {
        let adapter = Self::new(client, policy);
        match &config.base_url {
            Some(base_url) => adapter.with_base_url(base_url.clone()),
            None => adapter,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    async fn create_container(
        &self,
        ctx: &PublishContext<'_>,
        image_url: Option<&str>,
        kind: ContainerKind<'_>,
    ) -> PlatformResult<MediaContainer> {
        let step = kind.step();
        let mut form: Vec<(&str, String)> = vec![(
            "access_token",
            ctx.credentials().access_token().to_string(),
        )];
        if let Some(image_url) = image_url {
            form.push(("image_url", image_url.to_string()));
        }
        match kind {
            ContainerKind::Image { caption } => form.push(("caption", caption.to_string())),
            ContainerKind::CarouselItem => form.push(("is_carousel_item", "true".to_string())),
            ContainerKind::Story => form.push(("media_type", "STORIES".to_string())),
            ContainerKind::Carousel { caption, children } => {
                form.push(("media_type", "CAROUSEL".to_string()));
                form.push(("caption", caption.to_string()));
                form.push(("children", children.join(",")));
            }
        }

        let response = self
            .client
            .post(format!(
                "{}/{}/media",
                self.base_url,
                ctx.credentials().account_id()
            ))
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::network(step, e))?;

        let created: IdResponse = graph::decode(response, step).await?;
        debug!(container_id = %created.id, step, "Container created");
        Ok(MediaContainer::pending(created.id))
    }

    /// One status check; returns the state and the raw status text
    async fn check_status(
        &self,
        ctx: &PublishContext<'_>,
        container_id: &str,
    ) -> PlatformResult<(ContainerState, String)> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, container_id))
            .query(&[
                ("fields", "status_code,status"),
                ("access_token", ctx.credentials().access_token()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::network("check container status", e))?;

        let status: StatusResponse = graph::decode(response, "check container status").await?;
        let state = container_state(status.status_code.as_deref());
        let detail = match (status.status_code, status.status) {
            (Some(code), Some(text)) => format!("{} ({})", code, text),
            (Some(code), None) => code,
            (None, Some(text)) => text,
            (None, None) => "unknown".to_string(),
        };
        Ok((state, detail))
    }

    /// Poll a container until the platform has finished processing it
    async fn wait_until_ready(
        &self,
        ctx: &PublishContext<'_>,
        container: &mut MediaContainer,
    ) -> PlatformResult<()> {
        let last_status = Mutex::new(None);
        let id = container.id.as_str();

        let outcome = self
            .poller
            .poll_until_ready(|_attempt| {
                let last_status = &last_status;
                async move {
                    let (state, detail) = self.check_status(ctx, id).await?;
                    if let Ok(mut slot) = last_status.lock() {
                        *slot = Some(detail);
                    }
                    Ok(state)
                }
            })
            .await?;

        match outcome {
            PollOutcome::Ready { attempts } => {
                debug!(container_id = id, attempts, "Container ready");
                container.state = ContainerState::Ready;
                Ok(())
            }
            PollOutcome::Failed { .. } => {
                container.state = ContainerState::Failed;
                let status = last_status
                    .into_inner()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "ERROR".to_string());
                Err(PlatformError::ContainerFailed {
                    container_id: container.id.clone(),
                    status,
                })
            }
            PollOutcome::Exhausted { attempts } => Err(PlatformError::NotReady {
                container_id: container.id.clone(),
                attempts,
            }),
        }
    }

    /// Consume a ready container into a post
    async fn publish_container(
        &self,
        ctx: &PublishContext<'_>,
        container: &MediaContainer,
    ) -> PlatformResult<String> {
        let form = [
            ("access_token", ctx.credentials().access_token()),
            ("creation_id", container.id.as_str()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/{}/media_publish",
                self.base_url,
                ctx.credentials().account_id()
            ))
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::network("publish container", e))?;

        let published: IdResponse = graph::decode(response, "publish container").await?;
        Ok(published.id)
    }

    /// Create, wait for and publish a single container
    async fn publish_one(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
        kind: ContainerKind<'_>,
    ) -> PlatformResult<String> {
        let mut container = self.create_container(ctx, Some(image_url), kind).await?;
        ctx.progress("created container");

        let result = self
            .wait_and_publish(ctx, &mut container, "container ready")
            .await;
        if result.is_err() {
            ctx.report_orphans(Platform::ContainerMedia, &[container.id]);
        }
        result
    }

    async fn wait_and_publish(
        &self,
        ctx: &PublishContext<'_>,
        container: &mut MediaContainer,
        ready_step: &str,
    ) -> PlatformResult<String> {
        self.wait_until_ready(ctx, container).await?;
        ctx.progress(ready_step);

        self.publish_container(ctx, container).await
    }
}

#[async_trait]
impl PlatformAdapter for ContainerMediaAdapter {
    fn platform(&self) -> Platform {
        Platform::ContainerMedia
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            capabilities: Capabilities::ALL,
            carousel_min: CAROUSEL_MIN,
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
        self.publish_one(ctx, image_url, ContainerKind::Image { caption })
            .await
    }

    async fn publish_carousel(
        &self,
        ctx: &PublishContext<'_>,
        image_urls: &[String],
        caption: &str,
    ) -> PlatformResult<String> {
        let total = image_urls.len();
        let mut children: Vec<String> = Vec::with_capacity(total);

        for (index, image_url) in image_urls.iter().enumerate() {
            let mut child = match self
                .create_container(ctx, Some(image_url), ContainerKind::CarouselItem)
                .await
            {
                Ok(child) => child,
                Err(e) => {
                    ctx.report_orphans(Platform::ContainerMedia, &children);
                    return Err(e);
                }
            };

            if let Err(e) = self.wait_until_ready(ctx, &mut child).await {
                children.push(child.id);
                ctx.report_orphans(Platform::ContainerMedia, &children);
                return Err(e);
            }

            children.push(child.id);
            ctx.progress(format!("child container {}/{} ready", index + 1, total));
        }

        let mut parent = match self
            .create_container(
                ctx,
                None,
                ContainerKind::Carousel {
                    caption,
                    children: &children,
                },
            )
            .await
        {
            Ok(parent) => parent,
            Err(e) => {
                ctx.report_orphans(Platform::ContainerMedia, &children);
                return Err(e);
            }
        };
        ctx.progress("created parent container");

        let result = self
            .wait_and_publish(ctx, &mut parent, "parent container ready")
            .await;
        if result.is_err() {
            children.push(parent.id);
            ctx.report_orphans(Platform::ContainerMedia, &children);
        }
        result
    }

    async fn publish_story(
        &self,
        ctx: &PublishContext<'_>,
        image_url: &str,
    ) -> PlatformResult<String> {
        self.publish_one(ctx, image_url, ContainerKind::Story).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::types::Credentials;
    use secrecy::SecretString;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials::new(SecretString::new("ig-token".into()), "17841400000")
    }

    fn adapter(server: &MockServer, attempts: u32) -> ContainerMediaAdapter {
        ContainerMediaAdapter::new(Client::new(), PollPolicy::immediate(attempts))
            .with_base_url(server.uri())
    }

    fn status(code: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status_code": code,
            "status": format!("{}: test", code),
            "id": "ignored"
        }))
    }

    async fn mount_status(server: &MockServer, container_id: &str, code: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", container_id)))
            .and(query_param("fields", "status_code,status"))
            .respond_with(status(code))
            .mount(server)
            .await;
    }

    /// Media ids from every orphan report emitted so far
    fn orphan_reports(receiver: &mut crate::events::EventReceiver) -> Vec<Vec<String>> {
        let mut reports = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let crate::events::Event::MediaOrphaned { media_ids, .. } = event {
                reports.push(media_ids);
            }
        }
        reports
    }

    #[test]
    fn test_container_state_mapping() {
        assert_eq!(container_state(Some("FINISHED")), ContainerState::Ready);
        assert_eq!(container_state(Some("ERROR")), ContainerState::Failed);
        assert_eq!(container_state(Some("EXPIRED")), ContainerState::Failed);
        assert_eq!(container_state(Some("IN_PROGRESS")), ContainerState::Pending);
        assert_eq!(container_state(None), ContainerState::Pending);
    }

    #[tokio::test]
    async fn test_single_polls_until_finished_then_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("caption=Just+listed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c1"))
            .respond_with(status("IN_PROGRESS"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_status(&server, "c1", "FINISHED").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .and(body_string_contains("creation_id=c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "post_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);

        let post_id = adapter(&server, 5)
            .publish_single(&ctx, "https://cdn.example.com/house.jpg", "Just listed")
            .await
            .unwrap();
        assert_eq!(post_id, "post_1");

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_single_times_out_without_publishing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c1"))
            .respond_with(status("IN_PROGRESS"))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let ctx = PublishContext::new("pid", &creds, &events);

        let err = adapter(&server, 4)
            .publish_single(&ctx, "https://cdn.example.com/house.jpg", "caption")
            .await
            .unwrap_err();

        match err {
            PlatformError::NotReady {
                container_id,
                attempts,
            } => {
                assert_eq!(container_id, "c1");
                assert_eq!(attempts, 4);
            }
            other => panic!("Expected NotReady, got {:?}", other),
        }
        assert_eq!(orphan_reports(&mut receiver), vec![vec!["c1".to_string()]]);
    }

    #[tokio::test]
    async fn test_status_check_failure_does_not_leak_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c1"))
            .respond_with(status("FINISHED").set_delay(std::time::Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let adapter = ContainerMediaAdapter::new(client, PollPolicy::immediate(2))
            .with_base_url(server.uri());

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);

        let err = adapter
            .publish_single(&ctx, "https://cdn.example.com/house.jpg", "caption")
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Network { step: "check container status", .. }));
        assert!(!err.to_string().contains("ig-token"));
        let classified = crate::error::PublishError::classify(Platform::ContainerMedia, err);
        assert!(!classified.to_string().contains("ig-token"));
        assert!(!classified.to_string().contains("access_token"));
    }

    #[tokio::test]
    async fn test_failed_container_stops_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c1"))
            .respond_with(status("ERROR"))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);

        let err = adapter(&server, 10)
            .publish_single(&ctx, "https://cdn.example.com/house.jpg", "caption")
            .await
            .unwrap_err();

        match err {
            PlatformError::ContainerFailed {
                container_id,
                status,
            } => {
                assert_eq!(container_id, "c1");
                assert!(status.starts_with("ERROR"));
            }
            other => panic!("Expected ContainerFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_carousel_children_then_parent_in_order() {
        let server = MockServer::start().await;
        for (file, id) in [("one.jpg", "k1"), ("two.jpg", "k2"), ("three.jpg", "k3")] {
            Mock::given(method("POST"))
                .and(path("/17841400000/media"))
                .and(body_string_contains("is_carousel_item=true"))
                .and(body_string_contains(file))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": id })),
                )
                .expect(1)
                .mount(&server)
                .await;
            mount_status(&server, id, "FINISHED").await;
        }
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("media_type=CAROUSEL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "parent"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_status(&server, "parent", "FINISHED").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .and(body_string_contains("creation_id=parent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "carousel_post"})))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);
        let images: Vec<String> = ["one.jpg", "two.jpg", "three.jpg"]
            .iter()
            .map(|f| format!("https://cdn.example.com/{}", f))
            .collect();

        let post_id = adapter(&server, 3)
            .publish_carousel(&ctx, &images, "Tour the house")
            .await
            .unwrap();
        assert_eq!(post_id, "carousel_post");

        let requests = server.received_requests().await.unwrap();
        let parent = requests
            .iter()
            .find(|r| String::from_utf8_lossy(&r.body).contains("media_type=CAROUSEL"))
            .unwrap();
        let body = String::from_utf8_lossy(&parent.body);
        assert!(body.contains("children=k1%2Ck2%2Ck3"));
        assert!(body.contains("caption=Tour+the+house"));

        let sequence: Vec<String> = requests
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect();
        assert_eq!(
            sequence,
            vec![
                "POST /17841400000/media",
                "GET /k1",
                "POST /17841400000/media",
                "GET /k2",
                "POST /17841400000/media",
                "GET /k3",
                "POST /17841400000/media",
                "GET /parent",
                "POST /17841400000/media_publish",
            ]
        );
    }

    #[tokio::test]
    async fn test_child_failure_never_creates_parent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("one.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "k1"})))
            .mount(&server)
            .await;
        mount_status(&server, "k1", "FINISHED").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("two.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "k2"})))
            .mount(&server)
            .await;
        mount_status(&server, "k2", "ERROR").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("media_type=CAROUSEL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "parent"})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let ctx = PublishContext::new("pid", &creds, &events);
        let images = vec![
            "https://cdn.example.com/one.jpg".to_string(),
            "https://cdn.example.com/two.jpg".to_string(),
            "https://cdn.example.com/three.jpg".to_string(),
        ];

        let err = adapter(&server, 3)
            .publish_carousel(&ctx, &images, "caption")
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::ContainerFailed { ref container_id, .. } if container_id == "k2"));
        assert_eq!(
            orphan_reports(&mut receiver),
            vec![vec!["k1".to_string(), "k2".to_string()]]
        );
        assert!(!server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .any(|r| String::from_utf8_lossy(&r.body).contains("three.jpg")));
    }

    #[tokio::test]
    async fn test_parent_timeout_reports_children_and_parent() {
        let server = MockServer::start().await;
        for (file, id) in [("one.jpg", "k1"), ("two.jpg", "k2")] {
            Mock::given(method("POST"))
                .and(path("/17841400000/media"))
                .and(body_string_contains(file))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": id })),
                )
                .mount(&server)
                .await;
            mount_status(&server, id, "FINISHED").await;
        }
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("media_type=CAROUSEL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "parent"})))
            .mount(&server)
            .await;
        mount_status(&server, "parent", "IN_PROGRESS").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(32);
        let mut receiver = events.subscribe();
        let ctx = PublishContext::new("pid", &creds, &events);
        let images = vec![
            "https://cdn.example.com/one.jpg".to_string(),
            "https://cdn.example.com/two.jpg".to_string(),
        ];

        let err = adapter(&server, 3)
            .publish_carousel(&ctx, &images, "caption")
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::NotReady { ref container_id, .. } if container_id == "parent"));
        assert_eq!(
            orphan_reports(&mut receiver),
            vec![vec!["k1".to_string(), "k2".to_string(), "parent".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_rejected_publish_reports_container() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1"})))
            .mount(&server)
            .await;
        mount_status(&server, "s1", "FINISHED").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "An unexpected error has occurred", "code": 2 }
            })))
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let ctx = PublishContext::new("pid", &creds, &events);

        let err = adapter(&server, 2)
            .publish_story(&ctx, "https://cdn.example.com/story.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Api { step: "publish container", status: 500, .. }));
        assert_eq!(orphan_reports(&mut receiver), vec![vec!["s1".to_string()]]);
    }

    #[tokio::test]
    async fn test_story_container_is_tagged_without_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .and(body_string_contains("media_type=STORIES"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_status(&server, "s1", "FINISHED").await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "story_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);

        let post_id = adapter(&server, 2)
            .publish_story(&ctx, "https://cdn.example.com/story.jpg")
            .await
            .unwrap();
        assert_eq!(post_id, "story_1");

        let requests = server.received_requests().await.unwrap();
        assert!(!String::from_utf8_lossy(&requests[0].body).contains("caption="));
    }

    #[tokio::test]
    async fn test_expired_token_surfaces_graph_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/17841400000/media"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "message": "Error validating access token",
                    "type": "OAuthException",
                    "code": 190
                }
            })))
            .mount(&server)
            .await;

        let creds = credentials();
        let events = EventBus::new(16);
        let ctx = PublishContext::new("pid", &creds, &events);

        let err = adapter(&server, 2)
            .publish_single(&ctx, "https://cdn.example.com/a.jpg", "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Api { code: Some(190), .. }));
    }
}
