//! Logging setup

use std::str::FromStr;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Parse a level name ("DEBUG", "info", ...), falling back to INFO
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// `RUST_LOG`-style directives when given and valid, otherwise the configured level
pub fn build_filter(level: &str, directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| {
            EnvFilter::default().add_directive(LevelFilter::from_level(parse_level(level)).into())
        })
}

/// Install a fmt subscriber as the global default
pub fn init_logging(level: &str) -> Result<(), SetGlobalDefaultError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(build_filter(level, directives.as_deref()))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_build_filter() {
        assert_eq!(build_filter("warn", None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(build_filter("loud", Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            build_filter("warn", Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }
}
