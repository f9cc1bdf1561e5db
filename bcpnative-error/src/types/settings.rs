use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибка загрузки или проверки настроек.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// Источник конфигурации не удалось прочитать или разобрать
    #[error("Failed to load settings: {reason}")]
    Load { reason: String },

    /// Значение поля недопустимо
    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidConfig
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error() {
        let err = SettingsError::Invalid {
            field: "batch_size".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(err.to_string(), "Invalid setting 'batch_size': must be positive");
        assert_eq!(err.status_code(), StatusCode::InvalidConfig);
        assert_eq!(err.client_message(), err.to_string());
    }
}
