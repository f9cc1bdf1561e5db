use std::path::{Path, PathBuf};

use bcpnative_error::SettingsError;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{format::DEFAULT_COLLATION, logging::LoggingConfig};

pub const ENV_PREFIX: &str = "BCPNATIVE";

/// Настройки загрузки через `bcp`.
///
/// Источники по возрастанию приоритета: значения по умолчанию, TOML-файл,
/// переменные окружения `BCPNATIVE_*` (вложенные поля через `__`, например
/// `BCPNATIVE_LOGGING__LEVEL`).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BcpSettings {
    pub server: Option<String>,
    pub bcp_program: String,
    pub batch_size: u64,
    pub first_row: u64,
    pub error_log_file: PathBuf,
    pub trusted_connection: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub trust_server_certificate: bool,
    pub cleanup_temp_files: bool,
    pub collation: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BcpSettings {
    /// Загружает настройки и проверяет их.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("bcp_program", "bcp")
            .map_err(load_error)?
            .set_default("batch_size", 500_000)
            .map_err(load_error)?
            .set_default("first_row", 1)
            .map_err(load_error)?
            .set_default("error_log_file", "bcp_error.log")
            .map_err(load_error)?
            .set_default("trusted_connection", false)
            .map_err(load_error)?
            .set_default("trust_server_certificate", true)
            .map_err(load_error)?
            .set_default("cleanup_temp_files", false)
            .map_err(load_error)?
            .set_default("collation", DEFAULT_COLLATION)
            .map_err(load_error)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        // Переменные окружения с префиксом BCPNATIVE_
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(load_error)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than zero"));
        }
        if self.first_row == 0 {
            return Err(invalid("first_row", "rows are numbered from 1"));
        }
        if self.bcp_program.trim().is_empty() {
            return Err(invalid("bcp_program", "must not be empty"));
        }
        if self.collation.trim().is_empty() {
            return Err(invalid("collation", "must not be empty"));
        }

        match (&self.username, &self.password) {
            (Some(_), None) => return Err(invalid("password", "username is set without password")),
            (None, Some(_)) => return Err(invalid("username", "password is set without username")),
            (Some(_), Some(_)) if self.trusted_connection => {
                return Err(invalid(
                    "trusted_connection",
                    "cannot be combined with username/password",
                ))
            }
            _ => {}
        }

        self.logging.validate()
    }

    /// Заданы ли учётные данные для запуска `bcp`.
    pub fn has_credentials(&self) -> bool {
        self.trusted_connection || (self.username.is_some() && self.password.is_some())
    }
}

impl Default for BcpSettings {
    fn default() -> Self {
        Self {
            server: None,
            bcp_program: "bcp".to_string(),
            batch_size: 500_000,
            first_row: 1,
            error_log_file: PathBuf::from("bcp_error.log"),
            trusted_connection: false,
            username: None,
            password: None,
            trust_server_certificate: true,
            cleanup_temp_files: false,
            collation: DEFAULT_COLLATION.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::fmt::Debug for BcpSettings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BcpSettings")
            .field("server", &self.server)
            .field("bcp_program", &self.bcp_program)
            .field("batch_size", &self.batch_size)
            .field("first_row", &self.first_row)
            .field("error_log_file", &self.error_log_file)
            .field("trusted_connection", &self.trusted_connection)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("cleanup_temp_files", &self.cleanup_temp_files)
            .field("collation", &self.collation)
            .field("logging", &self.logging)
            .finish()
    }
}

fn load_error(e: ConfigError) -> SettingsError {
    SettingsError::Load {
        reason: e.to_string(),
    }
}

fn invalid(
    field: &str,
    reason: &str,
) -> SettingsError {
    SettingsError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
