use std::{fs, path::PathBuf, str::FromStr};

use bcpnative_error::SettingsError;
use serde::{Deserialize, Serialize};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;

/// Формат консольного вывода.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Период ротации файла логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Конфигурация логирования.
///
/// Файловый вывод включается только при заданном `log_dir`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или полная директива `EnvFilter` (`info`, `bcpnative=debug,warn`)
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_line_numbers: bool,
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
    pub rotation: LogRotation,
}

impl LoggingConfig {
    /// Директива для `EnvFilter`, когда `RUST_LOG` не задан.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            "info".to_string()
        } else {
            level.to_string()
        }
    }

    /// `NO_COLOR` отключает ANSI, `BCPNATIVE_LOG_FORMAT` переопределяет формат.
    pub fn apply_env_overrides(&mut self) {
        if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            self.with_ansi = false;
        }
        if let Ok(raw) = std::env::var("BCPNATIVE_LOG_FORMAT") {
            match raw.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring BCPNATIVE_LOG_FORMAT: {e}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let directive = self.build_filter_directive();
        EnvFilter::try_new(&directive).map_err(|e| SettingsError::Invalid {
            field: "logging.level".to_string(),
            reason: format!("'{directive}': {e}"),
        })?;
        if self.log_dir.is_some() && self.file_name.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "logging.file_name".to_string(),
                reason: "must not be empty when log_dir is set".to_string(),
            });
        }
        Ok(())
    }

    /// Создаёт каталог логов, если он задан.
    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        match &self.log_dir {
            Some(dir) => fs::create_dir_all(dir),
            None => Ok(()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_line_numbers: false,
            log_dir: None,
            file_name: "bcpnative.log".to_string(),
            rotation: LogRotation::default(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(value: LogRotation) -> Self {
        match value {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}
