use std::path::Path;

use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender},
};
use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Неблокирующий файловый layer в `dir`.
///
/// Записи уходят в фоновый поток; пока жив `WorkerGuard`, очередь
/// дописывается в файл.
pub fn layer_in<S>(
    dir: &Path,
    config: &LoggingConfig,
) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard), InitError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(config.file_name.as_str())
        .build(dir)?;
    let (writer, guard) = non_blocking(appender);

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        _ => fmt::layer()
            .with_ansi(false)
            .with_target(config.with_target)
            .with_writer(writer)
            .boxed(),
    };

    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;
    use crate::logging::config::LogRotation;

    #[test]
    fn test_file_layer_writes_after_guard_drop() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            rotation: LogRotation::Never,
            file_name: "test.log".to_string(),
            ..Default::default()
        };

        let (layer, guard) = layer_in::<Registry>(dir.path(), &cfg).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(batch = 1, "written to file");
        });
        drop(guard);

        let content = fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(content.contains("written to file"));
        assert!(!content.contains('\u{1b}'));
    }
}
