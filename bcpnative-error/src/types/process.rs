use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибка запуска внешней утилиты `bcp`.
#[derive(Debug, Clone, Error)]
pub enum BcpProcessError {
    /// Исполняемый файл не найден в PATH
    #[error("bcp program not found: {program}")]
    ProgramNotFound { program: String },

    /// Процесс завершился с ненулевым кодом
    #[error("bcp exited with status {}: {}", display_status(*status), first_line(stderr, stdout))]
    Failed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
        /// Командная строка с замаскированным паролем
        command: String,
        error_log: Option<String>,
    },

    /// Не задан ни trusted connection, ни пара логин/пароль
    #[error("Invalid bcp authentication settings: {reason}")]
    AuthConfig { reason: String },
}

fn display_status(status: Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |s| s.to_string())
}

fn first_line<'a>(
    stderr: &'a str,
    stdout: &'a str,
) -> &'a str {
    let source = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };
    source
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
}

impl ErrorExt for BcpProcessError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ProgramNotFound { .. } => StatusCode::ProgramNotFound,
            Self::Failed { .. } => StatusCode::ProcessFailed,
            Self::AuthConfig { .. } => StatusCode::AuthConfig,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn log_message(&self) -> String {
        match self {
            Self::Failed {
                status,
                stdout,
                stderr,
                command,
                error_log,
            } => format!(
                "bcp failed (status {}): command=`{command}` error_log={error_log:?}\nstdout:\n{stdout}\nstderr:\n{stderr}",
                display_status(*status)
            ),
            other => format!("{other:?}"),
        }
    }
}
