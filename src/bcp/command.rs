//! Сборка и запуск командной строки `bcp <table> in ...`.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

use bcpnative_error::BcpProcessError;
use tracing::{debug, error, info};

use crate::config::BcpSettings;

const REDACTED: &str = "***";

/// Способ аутентификации `bcp`.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// `-T`
    Trusted,
    /// `-U <user> -P <password>`
    SqlLogin { username: String, password: String },
}

/// Результат успешного запуска.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BcpOutput {
    pub stdout: String,
    pub stderr: String,
    /// Число из строки `N rows copied.`, если `bcp` её напечатал
    pub rows_copied: Option<u64>,
}

/// Командная строка загрузки native-payload с format-файлом.
#[derive(Debug, Clone)]
pub struct BcpCommand {
    program: String,
    table: String,
    data_file: PathBuf,
    format_file: PathBuf,
    server: Option<String>,
    first_row: u64,
    batch_size: u64,
    error_log: PathBuf,
    trust_server_certificate: bool,
    auth: Authentication,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Authentication {
    /// Trusted connection имеет приоритет; иначе нужны и логин, и пароль.
    pub fn from_settings(settings: &BcpSettings) -> Result<Self, BcpProcessError> {
        if settings.trusted_connection {
            return Ok(Self::Trusted);
        }
        match (&settings.username, &settings.password) {
            (Some(username), Some(password)) if !username.is_empty() => Ok(Self::SqlLogin {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(BcpProcessError::AuthConfig {
                reason: "provide trusted_connection = true or both username and password"
                    .to_string(),
            }),
        }
    }
}

impl BcpCommand {
    pub fn new(
        table: impl Into<String>,
        data_file: impl Into<PathBuf>,
        format_file: impl Into<PathBuf>,
        auth: Authentication,
    ) -> Self {
        Self {
            program: "bcp".to_string(),
            table: table.into(),
            data_file: data_file.into(),
            format_file: format_file.into(),
            server: None,
            first_row: 1,
            batch_size: 500_000,
            error_log: PathBuf::from("bcp_error.log"),
            trust_server_certificate: true,
            auth,
        }
    }

    /// Команда с параметрами из настроек.
    pub fn from_settings(
        settings: &BcpSettings,
        table: impl Into<String>,
        data_file: impl Into<PathBuf>,
        format_file: impl Into<PathBuf>,
    ) -> Result<Self, BcpProcessError> {
        let auth = Authentication::from_settings(settings)?;
        let mut command = Self::new(table, data_file, format_file, auth)
            .program(settings.bcp_program.clone())
            .first_row(settings.first_row)
            .batch_size(settings.batch_size)
            .error_log(settings.error_log_file.clone())
            .trust_server_certificate(settings.trust_server_certificate);
        command.server = settings.server.clone();
        Ok(command)
    }

    pub fn program(
        mut self,
        program: impl Into<String>,
    ) -> Self {
        self.program = program.into();
        self
    }

    /// `-S`; без него `bcp` подключается к локальному экземпляру по умолчанию.
    pub fn server(
        mut self,
        server: impl Into<String>,
    ) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn first_row(
        mut self,
        first_row: u64,
    ) -> Self {
        self.first_row = first_row;
        self
    }

    pub fn batch_size(
        mut self,
        batch_size: u64,
    ) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn error_log(
        mut self,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.error_log = path.into();
        self
    }

    pub fn trust_server_certificate(
        mut self,
        trust: bool,
    ) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    pub fn error_log_path(&self) -> &Path {
        &self.error_log
    }

    /// Аргументы в порядке:
    /// `<table> in <data> [-S server] -f <format> -F n -b n -e <log> [-u] (-T | -U u -P p)`.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.table.clone().into(),
            "in".into(),
            self.data_file.clone().into(),
        ];
        if let Some(server) = &self.server {
            args.push("-S".into());
            args.push(server.into());
        }
        let common: [OsString; 8] = [
            "-f".into(),
            self.format_file.clone().into(),
            "-F".into(),
            self.first_row.to_string().into(),
            "-b".into(),
            self.batch_size.to_string().into(),
            "-e".into(),
            self.error_log.clone().into(),
        ];
        args.extend(common);
        if self.trust_server_certificate {
            args.push("-u".into());
        }
        match &self.auth {
            Authentication::Trusted => args.push("-T".into()),
            Authentication::SqlLogin { username, password } => {
                args.push("-U".into());
                args.push(username.into());
                args.push("-P".into());
                args.push(password.into());
            }
        }
        args
    }

    /// Командная строка для логов: пароль заменён на `***`.
    pub fn redacted(&self) -> String {
        let mut parts = vec![quote(&self.program)];
        let mut hide_next = false;
        for arg in self.args() {
            let arg = arg.to_string_lossy().into_owned();
            if hide_next {
                parts.push(REDACTED.to_string());
                hide_next = false;
                continue;
            }
            hide_next = arg == "-P";
            parts.push(quote(&arg));
        }
        parts.join(" ")
    }

    /// Запускает `bcp` и ждёт завершения.
    pub fn run(&self) -> Result<BcpOutput, BcpProcessError> {
        let command_line = self.redacted();
        debug!(command = %command_line, "Running bcp");

        let output = Command::new(&self.program)
            .args(self.args())
            .output()
            .map_err(|e| self.spawn_error(e, &command_line))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(
                command = %command_line,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                stdout = %stdout.trim(),
                error_log = %self.error_log.display(),
                "bcp failed"
            );
            return Err(BcpProcessError::Failed {
                status: output.status.code(),
                stdout,
                stderr,
                command: command_line,
                error_log: Some(self.error_log.display().to_string()),
            });
        }

        let rows_copied = parse_rows_copied(&stdout);
        info!(table = %self.table, rows_copied = ?rows_copied, "bcp completed");
        debug!(output = %stdout.trim(), "bcp output");

        Ok(BcpOutput {
            stdout,
            stderr,
            rows_copied,
        })
    }

    fn spawn_error(
        &self,
        e: io::Error,
        command_line: &str,
    ) -> BcpProcessError {
        if e.kind() == io::ErrorKind::NotFound {
            error!(program = %self.program, "bcp program not found; is it in PATH?");
            BcpProcessError::ProgramNotFound {
                program: self.program.clone(),
            }
        } else {
            error!(program = %self.program, error = %e, "Failed to start bcp");
            BcpProcessError::Failed {
                status: None,
                stdout: String::new(),
                stderr: e.to_string(),
                command: command_line.to_string(),
                error_log: None,
            }
        }
    }
}

/// Ищет строку вида `1000 rows copied.` в выводе `bcp`.
pub fn parse_rows_copied(stdout: &str) -> Option<u64> {
    stdout.lines().find_map(|line| {
        let line = line.trim();
        let count = line.strip_suffix("rows copied.")?.trim();
        count.parse().ok()
    })
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Authentication
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Debug for Authentication {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Trusted => f.write_str("Trusted"),
            Self::SqlLogin { username, .. } => f
                .debug_struct("SqlLogin")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn login() -> Authentication {
        Authentication::SqlLogin {
            username: "loader".to_string(),
            password: "s3cret".to_string(),
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_args_with_login() {
        let cmd = BcpCommand::new("db.dbo.T", "/tmp/b.dat", "/tmp/b.xml", login())
            .server("db01,1433")
            .batch_size(1000);
        assert_eq!(
            strings(cmd.args()),
            [
                "db.dbo.T", "in", "/tmp/b.dat", "-S", "db01,1433", "-f", "/tmp/b.xml", "-F", "1",
                "-b", "1000", "-e", "bcp_error.log", "-u", "-U", "loader", "-P", "s3cret"
            ]
        );
    }

    #[test]
    fn test_args_trusted_without_server() {
        let cmd = BcpCommand::new("T", "a.dat", "a.xml", Authentication::Trusted)
            .trust_server_certificate(false)
            .first_row(2);
        assert_eq!(
            strings(cmd.args()),
            ["T", "in", "a.dat", "-f", "a.xml", "-F", "2", "-b", "500000", "-e", "bcp_error.log", "-T"]
        );
    }

    #[test]
    fn test_redacted_hides_password() {
        let cmd = BcpCommand::new("T", "my data.dat", "a.xml", login());
        let line = cmd.redacted();
        assert!(line.starts_with("bcp T in \"my data.dat\""));
        assert!(line.ends_with("-U loader -P ***"));
        assert!(!line.contains("s3cret"));
        assert!(!format!("{cmd:?}").contains("s3cret"));
    }

    #[test]
    fn test_authentication_from_settings() {
        let mut settings = BcpSettings::default();
        assert!(matches!(
            Authentication::from_settings(&settings),
            Err(BcpProcessError::AuthConfig { .. })
        ));

        settings.username = Some("sa".into());
        assert!(Authentication::from_settings(&settings).is_err());

        settings.password = Some("pw".into());
        assert_eq!(
            Authentication::from_settings(&settings).unwrap(),
            Authentication::SqlLogin {
                username: "sa".into(),
                password: "pw".into()
            }
        );

        settings.trusted_connection = true;
        assert_eq!(
            Authentication::from_settings(&settings).unwrap(),
            Authentication::Trusted
        );
    }

    #[test]
    fn test_from_settings_copies_parameters() {
        let settings = BcpSettings {
            server: Some("srv".into()),
            bcp_program: "/opt/mssql-tools/bin/bcp".into(),
            batch_size: 10,
            first_row: 3,
            error_log_file: "errors.log".into(),
            trusted_connection: true,
            trust_server_certificate: false,
            ..Default::default()
        };
        let cmd = BcpCommand::from_settings(&settings, "T", "x.dat", "x.xml").unwrap();
        assert_eq!(cmd.error_log_path(), Path::new("errors.log"));
        assert_eq!(
            cmd.redacted(),
            "/opt/mssql-tools/bin/bcp T in x.dat -S srv -f x.xml -F 3 -b 10 -e errors.log -T"
        );
    }

    #[test]
    fn test_parse_rows_copied() {
        let out = "\nStarting copy...\n1000 batch size\n\n1500 rows copied.\nNetwork packet size (bytes): 4096\n";
        assert_eq!(parse_rows_copied(out), Some(1500));
        assert_eq!(parse_rows_copied("nothing here"), None);
    }

    #[test]
    fn test_run_missing_program() {
        let cmd = BcpCommand::new("T", "a.dat", "a.xml", Authentication::Trusted)
            .program("bcpnative-definitely-missing-program");
        let err = cmd.run().unwrap_err();
        assert!(matches!(err, BcpProcessError::ProgramNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_success_captures_output() {
        let cmd = BcpCommand::new("T", "a.dat", "a.xml", login()).program("echo");
        let output = cmd.run().unwrap();
        assert!(output.stdout.starts_with("T in a.dat -f a.xml"));
        assert_eq!(output.rows_copied, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_failure_reports_status() {
        let cmd = BcpCommand::new("T", "a.dat", "a.xml", login()).program("false");
        match cmd.run().unwrap_err() {
            BcpProcessError::Failed {
                status,
                command,
                error_log,
                ..
            } => {
                assert_eq!(status, Some(1));
                assert!(command.contains("-P ***"));
                assert_eq!(error_log.as_deref(), Some("bcp_error.log"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
