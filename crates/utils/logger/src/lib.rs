pub mod util;

pub use crate::util::{utc_offset_hms, utc_offset_hours};
use config_loader::{
    app_config::BaseAppConfig,
    logging::{LogFormat, LoggerConfig},
};
pub use time::UtcOffset;
use time::{format_description::BorrowedFormatItem, macros::format_description};
pub use tracing::{
    Instrument, Level, debug, debug_span, error, error_span, info, info_span, instrument, span,
    trace, trace_span, warn, warn_span,
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::{Directive, LevelFilter},
    fmt::time::OffsetTime,
    layer::SubscriberExt,
};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoggingError {
    #[error("Failed to build layer: {message}, context: {context}")]
    BuildLayerError {
        message: String,
        context: &'static str,
    },
    #[error("Invalid env filter directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },
    #[error("Invalid UTC offset: {0}")]
    InvalidUtcOffset(String),
}

pub struct LoggingGuard {
    #[cfg(feature = "stdout")]
    /// Keep stdout guard alive to ensure all logs are flushed
    pub stdout_guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn setup_logging(
    app_config: BaseAppConfig,
    logger_config: LoggerConfig,
    env_filter_override: Option<Vec<&str>>,
) -> Result<LoggingGuard, LoggingError> {
    let fmt: &[BorrowedFormatItem<'_>] = if cfg!(debug_assertions) {
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]")
    } else {
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]")
    };

    let timezone = match app_config.timezone {
        Some(offset) => utc_offset_hours(offset)?,
        None => UtcOffset::UTC,
    };
    let timer = OffsetTime::new(timezone, fmt);

    let max_level = logger_config
        .max_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);

    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    for dir in env_filter_override.unwrap_or_default() {
        let directive = dir
            .parse::<Directive>()
            .map_err(|e| LoggingError::InvalidDirective {
                directive: dir.to_string(),
                message: e.to_string(),
            })?;
        env_filter = env_filter.add_directive(directive);
    }

    let registry = Registry::default()
        .with(env_filter)
        .with(LevelFilter::from_level(max_level));

    #[cfg(feature = "stdout")]
    let (writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    #[cfg(not(feature = "stdout"))]
    let writer = std::io::stdout;

    let console_layer = match logger_config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::Layer::default()
            .with_writer(writer)
            .with_timer(timer)
            .with_ansi(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::Layer::default()
            .json()
            .with_writer(writer)
            .with_timer(timer)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
    };

    let registry = registry.with(console_layer);

    if tracing::dispatcher::has_been_set() {
        warn!(app = %app_config.name, "Global trace dispatcher already set, skipping re-init");
    } else {
        tracing::subscriber::set_global_default(registry).map_err(|e| {
            LoggingError::BuildLayerError {
                message: e.to_string(),
                context: "init",
            }
        })?;
    }

    Ok(LoggingGuard {
        #[cfg(feature = "stdout")]
        stdout_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_is_not_an_error() {
        let app = BaseAppConfig::new("logger-test").with_timezone(7);
        let config = LoggerConfig::new("DEBUG", LogFormat::Pretty);

        let first = setup_logging(app.clone(), config.clone(), Some(vec!["task_limiter=trace"]));
        assert!(first.is_ok());

        let second = setup_logging(app, LoggerConfig::new("INFO", LogFormat::Json), None);
        assert!(second.is_ok());
    }

    #[test]
    fn test_invalid_timezone_is_reported() {
        let app = BaseAppConfig::new("logger-test").with_timezone(42);
        let result = setup_logging(app, LoggerConfig::default(), None);

        assert!(matches!(result, Err(LoggingError::InvalidUtcOffset(_))));
    }

    #[test]
    fn test_invalid_directive_is_reported() {
        let app = BaseAppConfig::new("logger-test");
        let result = setup_logging(app, LoggerConfig::default(), Some(vec!["task_limiter=loud"]));

        match result {
            Err(LoggingError::InvalidDirective { directive, .. }) => {
                assert_eq!(directive, "task_limiter=loud");
            }
            other => panic!("expected InvalidDirective, got {:?}", other.err()),
        }
    }
}
