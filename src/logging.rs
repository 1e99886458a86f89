use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Registry,
    Layer,
};

use crate::config::LogSettings;
use crate::error::{BoqError, BoqResult};

/// Logging configuration for the editor
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
        }
    }
}

impl From<&LogSettings> for LoggingConfig {
    fn from(settings: &LogSettings) -> Self {
        Self {
            level: settings.level.clone(),
            log_dir: PathBuf::from(&settings.log_dir),
            enable_file_logging: settings.enable_file_logging,
            enable_json_format: settings.enable_json_format,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it at exit to flush.
#[must_use]
pub struct LogGuard {
    #[cfg(feature = "file_logging")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the logging system
pub fn init_logging(config: &LoggingConfig) -> BoqResult<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "boq_table_editor={},reqwest=warn,html5ever=warn,{}",
                config.level, config.level
            ))
        });

    let registry = Registry::default().with(env_filter);

    let console_layer = if config.enable_json_format {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .boxed()
    };

    #[cfg(feature = "file_logging")]
    {
        if config.enable_file_logging {
            std::fs::create_dir_all(&config.log_dir)
                .map_err(|e| BoqError::file_io(
                    config.log_dir.to_string_lossy().to_string(),
                    e
                ))?;

            let file_appender = tracing_appender::rolling::daily(&config.log_dir, "boq.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .boxed();

            registry
                .with(console_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| BoqError::configuration(format!("logging already initialised: {}", e)))?;

            info!("File logging enabled: {}", config.log_dir.display());
            return Ok(LogGuard { _file: Some(guard) });
        }
    }

    registry
        .with(console_layer)
        .try_init()
        .map_err(|e| BoqError::configuration(format!("logging already initialised: {}", e)))?;

    if config.enable_file_logging && cfg!(not(feature = "file_logging")) {
        tracing::warn!("File logging requested but the `file_logging` feature is disabled");
    }
    info!("Log level: {}", config.level);

    Ok(LogGuard {
        #[cfg(feature = "file_logging")]
        _file: None,
    })
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        let elapsed = self.start.elapsed();
        tracing::debug!("{} - {}: {}ms", self.operation, checkpoint, elapsed.as_millis());
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::debug!("Completed {}: {}ms", self.operation, elapsed.as_millis());
    }
}

/// Macro for logging with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "BOQ editor error occurred"
        );
    };
}
