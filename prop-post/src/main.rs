//! prop-post - publish images and a caption to social networks

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use libpropcast::logging::{LogFormat, LoggingConfig, LEVEL_ENV};
use libpropcast::{
    Config, Platform, PostType, PropcastError, PublishOrchestrator, PublishOutcome,
    PublishRequest, Result,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "prop-post")]
#[command(version)]
#[command(about = "Publish images and a caption to social networks")]
#[command(long_about = "\
prop-post - Publish images and a caption to social networks

DESCRIPTION:
    prop-post publishes one creative (one or more public image URLs plus a
    caption) to each selected network, following that network's own
    publishing protocol. Requests are validated before any network call.

USAGE:
    # Single photo
    prop-post -p feed-photo -i https://cdn.example.com/front.jpg -c \"Open House Saturday\"

    # Carousel (type inferred from the number of images)
    prop-post -p container-media -i https://cdn.example.com/1.jpg -i https://cdn.example.com/2.jpg -c \"Tour\"

    # Caption from stdin, several networks at once
    echo \"Just listed\" | prop-post -p feed-photo,binary-upload -i https://cdn.example.com/a.jpg

    # Story (no caption)
    prop-post -p container-media -t story -i https://cdn.example.com/story.jpg

CONFIGURATION:
    Configuration file: ~/.config/propcast/config.toml (or PROPCAST_CONFIG)

EXIT CODES:
    0   - Published on every selected network
    1   - Platform or configuration error
    2   - Credentials rejected
    3   - Invalid input
    4   - Media never became ready
    130 - Cancelled
")]
struct Cli {
    /// Target network(s): feed-photo, container-media, binary-upload
    #[arg(short, long, required = true, value_delimiter = ',')]
    platform: Vec<String>,

    /// Post type: single, carousel or story (default: by image count)
    #[arg(short = 't', long = "type")]
    post_type: Option<String>,

    /// Public image URL; repeat for carousels, order is slide order
    #[arg(short, long = "image", required = true)]
    images: Vec<String>,

    /// Caption text (reads from stdin if not provided)
    #[arg(short, long)]
    caption: Option<String>,

    /// Path to the config file
    #[arg(long, env = "PROPCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the request without publishing
    #[arg(long)]
    dry_run: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if std::env::var(LEVEL_ENV).is_err() {
        logging.level = "warn".to_string();
    }
    if cli.verbose {
        logging.verbose = true;
        if logging.format == LogFormat::Text {
            logging.format = LogFormat::Pretty;
        }
    }
    logging.init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    match format.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(PropcastError::InvalidInput(format!(
            "Invalid format: '{}'. Valid options: text, json",
            format
        ))),
    }
}

fn parse_platforms(names: &[String]) -> Result<Vec<Platform>> {
    let mut platforms = Vec::new();
    for name in names {
        let platform: Platform = name.parse().map_err(PropcastError::InvalidInput)?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

fn resolve_post_type(post_type: Option<&str>, image_count: usize) -> Result<PostType> {
    match post_type {
        Some(name) => name.parse().map_err(PropcastError::InvalidInput),
        None if image_count > 1 => Ok(PostType::Carousel),
        None => Ok(PostType::Single),
    }
}

/// Caption from the flag, else from piped stdin
fn resolve_caption(caption: Option<String>) -> Result<String> {
    if let Some(caption) = caption {
        return Ok(caption);
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|e| PropcastError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    Ok(buffer.trim_end_matches(['\n', '\r']).to_string())
}

async fn run(cli: Cli) -> Result<i32> {
    let format = parse_format(&cli.format)?;
    let platforms = parse_platforms(&cli.platform)?;
    let post_type = resolve_post_type(cli.post_type.as_deref(), cli.images.len())?;
    let caption = resolve_caption(cli.caption)?;

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let orchestrator = PublishOrchestrator::from_config(&config)?;

    let requests = platforms
        .iter()
        .map(|&platform| -> Result<PublishRequest> {
            Ok(PublishRequest {
                platform,
                post_type,
                caption: caption.clone(),
                images: cli.images.clone(),
                credentials: config.credentials_for(platform)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if cli.dry_run {
        for request in &requests {
            orchestrator.validate(request)?;
        }
        match format {
            OutputFormat::Text => {
                println!("Valid {} request for {}", post_type, platform_list(&platforms))
            }
            OutputFormat::Json => println!(
                "{}",
                json!({ "valid": true, "post_type": post_type, "platforms": platforms })
            ),
        }
        return Ok(0);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let outcomes = orchestrator.publish_all(&requests, cancel).await;
    print_outcomes(format, &platforms, &outcomes);

    Ok(exit_code(&outcomes))
}

fn platform_list(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_outcomes(format: OutputFormat, platforms: &[Platform], outcomes: &[PublishOutcome]) {
    match format {
        OutputFormat::Text => {
            for (platform, outcome) in platforms.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => println!("{}: {}", platform, result.remote_post_id),
                    Err(e) => eprintln!("{}: {}", platform, e),
                }
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = platforms
                .iter()
                .zip(outcomes)
                .map(|(platform, outcome)| match outcome {
                    Ok(result) => json!(result),
                    Err(e) => json!({
                        "success": false,
                        "platform": platform,
                        "kind": e.kind(),
                        "retryable": e.is_retryable(),
                        "error": e.to_string(),
                    }),
                })
                .collect();
            println!("{}", json!(entries));
        }
    }
}

/// 0 when everything published, else the code of the first failure
fn exit_code(outcomes: &[PublishOutcome]) -> i32 {
    outcomes
        .iter()
        .find_map(|outcome| outcome.as_ref().err())
        .map(|e| e.exit_code())
        .unwrap_or(0)
}
