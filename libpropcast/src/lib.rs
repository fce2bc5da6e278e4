//! Propcast - publish finished creatives to social networks
//!
//! One request (images plus caption) goes to one network through its own
//! multi-step protocol: direct photo and feed posts, asynchronously processed
//! media containers, or per-image binary uploads. The [`PublishOrchestrator`]
//! validates the request, drives the matching adapter and reports a uniform
//! [`PublishResult`] or [`PublishError`].
//!
//! ```no_run
//! use libpropcast::{Config, Platform, PostType, PublishOrchestrator, PublishRequest};
//!
//! # async fn example() -> libpropcast::Result<()> {
//! let config = Config::load()?;
//! let orchestrator = PublishOrchestrator::from_config(&config)?;
//!
//! let request = PublishRequest {
//!     platform: Platform::ContainerMedia,
//!     post_type: PostType::Carousel,
//!     caption: "Open House Saturday".to_string(),
//!     images: vec![
//!         "https://cdn.example.com/front.jpg".to_string(),
//!         "https://cdn.example.com/kitchen.jpg".to_string(),
//!     ],
//!     credentials: config.credentials_for(Platform::ContainerMedia)?,
//! };
//!
//! let result = orchestrator.publish(&request).await?;
//! println!("{}", result.remote_post_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod poller;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, PropcastError, PublishError, Result};
pub use events::{Event, EventBus};
pub use orchestrator::{PublishOrchestrator, PublishOutcome};
pub use poller::{MediaContainerPoller, PollOutcome, PollPolicy};
pub use types::{Credentials, Platform, PostType, PublishRequest, PublishResult};
