//! Logging setup shared by the library's front ends
//!
//! Output always goes to stderr so stdout stays reserved for results.
//! `RUST_LOG` wins over the configured level when set.
//!
//! ```no_run
//! use libpropcast::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug", false).init();
//!
//! // or from PROPCAST_LOG_FORMAT / PROPCAST_LOG_LEVEL
//! libpropcast::logging::init_default();
//! ```

use std::str::FromStr;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub const FORMAT_ENV: &str = "PROPCAST_LOG_FORMAT";
pub const LEVEL_ENV: &str = "PROPCAST_LOG_LEVEL";

/// HTTP internals are noisy at debug; keep them at warn unless asked
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines, no colors
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line with colors, for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Minimum level or a full filter directive ("info", "libpropcast=trace")
    pub level: String,
    /// Debug level plus span close events (publish timings)
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>, verbose: bool) -> Self {
        Self {
            format,
            level: level.into(),
            verbose,
        }
    }

    /// Read `PROPCAST_LOG_FORMAT` and `PROPCAST_LOG_LEVEL`
    ///
    /// Unparseable values fall back to text / info.
    pub fn from_env() -> Self {
        let format = std::env::var(FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = std::env::var(LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
        Self::new(format, level, false)
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn directives(&self) -> String {
        let base = if self.verbose { "debug" } else { self.level.as_str() };
        let mut directives = vec![base.to_string()];
        directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.directives()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn span_events(&self) -> FmtSpan {
        if self.verbose {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Install the global subscriber
    ///
    /// Returns `false` when a subscriber was already installed, which leaves
    /// the existing one in place.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .with_span_events(self.span_events());

        let result = match self.format {
            LogFormat::Json => builder
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder.with_target(false).with_ansi(false).try_init(),
        };
        result.is_ok()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(LogFormat::Text, "info", false)
    }
}

/// Initialize logging from the environment
pub fn init_default() -> bool {
    LoggingConfig::from_env().init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("Invalid log format: 'xml'"));
    }

    #[test]
    fn test_directives_quiet_http_stack() {
        let config = LoggingConfig::new(LogFormat::Text, "warn", false);
        let directives = config.directives();
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn test_verbose_overrides_level() {
        let config = LoggingConfig::new(LogFormat::Json, "error", true);
        assert!(config.directives().starts_with("debug,"));
        assert_eq!(config.span_events(), FmtSpan::CLOSE);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(FORMAT_ENV, "json");
        std::env::set_var(LEVEL_ENV, "trace");
        let config = LoggingConfig::from_env();
        std::env::remove_var(FORMAT_ENV);
        std::env::remove_var(LEVEL_ENV);

        assert_eq!(config, LoggingConfig::new(LogFormat::Json, "trace", false));
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_on_bad_format() {
        std::env::set_var(FORMAT_ENV, "yaml");
        std::env::remove_var(LEVEL_ENV);
        let config = LoggingConfig::from_env();
        std::env::remove_var(FORMAT_ENV);

        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_second_init_is_refused() {
        let config = LoggingConfig::new(LogFormat::Text, "info", false);
        // Another test may have installed a subscriber first
        config.init();
        assert!(!config.init());
    }
}
