//! Логирование для CLI и оркестрации.
//!
//! Кодек сам логирование не инициализирует: события уходят в тот
//! subscriber, который установил вызывающий код.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{LogFormat, LogRotation, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, registry::Registry, util::SubscriberInitExt, Layer};

pub type LoggingInitError = Box<dyn std::error::Error + Send + Sync>;

/// Собирает subscriber без установки его глобальным.
pub fn build_subscriber(
    config: &LoggingConfig
) -> Result<(impl tracing::Subscriber + Send + Sync + 'static, Option<WorkerGuard>), LoggingInitError>
{
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(sinks::console::layer_with_config(config));

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let (file_layer, guard) = sinks::file::layer_in(dir, config)?;
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    Ok((subscriber, file_guard))
}

/// Инициализация глобального логирования с конфигурацией.
///
/// Повторный вызов в том же процессе возвращает ошибку.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, LoggingInitError> {
    config.apply_env_overrides();

    let (subscriber, file_guard) = build_subscriber(&config)?;
    subscriber.try_init()?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        log_dir = ?config.log_dir,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_build_subscriber_with_file_sink() {
        std::env::remove_var("RUST_LOG");
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            level: "debug".to_string(),
            log_dir: Some(dir.path().join("logs")),
            rotation: LogRotation::Never,
            ..Default::default()
        };

        let (subscriber, guard) = build_subscriber(&cfg).unwrap();
        assert!(guard.is_some());
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("debug line to file");
        });
        LoggingHandle::new(guard).shutdown();

        let content = fs::read_to_string(dir.path().join("logs").join("bcpnative.log")).unwrap();
        assert!(content.contains("debug line to file"));
    }

    #[test]
    fn test_build_subscriber_rejects_invalid_config() {
        let cfg = LoggingConfig {
            level: "bcpnative=loud".to_string(),
            ..Default::default()
        };
        assert!(build_subscriber(&cfg).is_err());
    }
}
