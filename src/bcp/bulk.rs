//! Загрузка одного пакета строк: артефакты на диск, затем `bcp in`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use bcpnative_error::{ensure, BcpResult, LogLevel, ResultExt, StackError, StatusCode};
use tracing::{debug, error, info, info_span, trace, warn};

use super::command::{BcpCommand, BcpOutput};
use crate::{
    artifact::{artifact_paths, ArtifactSummary, ArtifactWriter},
    config::BcpSettings,
    native::RowAccess,
    schema::ResolvedSchema,
};

/// Итог загрузки пакета.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Строк не было, ничего не записано и `bcp` не запускался
    Skipped,
    Loaded {
        artifacts: ArtifactSummary,
        output: BcpOutput,
    },
}

/// Загрузка пакета в таблицу через native-файл и XML format-файл.
#[derive(Debug, Clone)]
pub struct NativeBulkInsert<'a> {
    settings: &'a BcpSettings,
    table: String,
    base: PathBuf,
    batch: Option<u64>,
}

impl BulkOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Сколько строк записано в payload.
    pub fn rows(&self) -> u64 {
        match self {
            Self::Skipped => 0,
            Self::Loaded { artifacts, .. } => artifacts.rows,
        }
    }
}

impl<'a> NativeBulkInsert<'a> {
    /// `base` задаёт пути `<base>.dat` и `<base>.xml`.
    pub fn new(
        settings: &'a BcpSettings,
        table: impl Into<String>,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            table: table.into(),
            base: base.into(),
            batch: None,
        }
    }

    /// Номер пакета для логов.
    pub fn batch(
        mut self,
        batch: u64,
    ) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn run<I>(
        &self,
        schema: &ResolvedSchema,
        rows: I,
    ) -> BcpResult<BulkOutcome>
    where
        I: IntoIterator,
        I::Item: RowAccess,
    {
        let span = info_span!("bulk_insert", table = %self.table, batch = self.batch);
        let _enter = span.enter();

        ensure!(
            !self.table.trim().is_empty(),
            StatusCode::InvalidArgs,
            "Target table name is empty"
        );

        let mut rows = rows.into_iter().peekable();
        if rows.peek().is_none() {
            warn!("No rows in batch, skipping");
            return Ok(BulkOutcome::Skipped);
        }

        let (payload_path, descriptor_path) = artifact_paths(&self.base);
        let command = BcpCommand::from_settings(
            self.settings,
            self.table.clone(),
            &payload_path,
            &descriptor_path,
        )
        .context("Preparing bcp command")?;

        let result = self.write_and_load(schema, rows, &command, &payload_path, &descriptor_path);
        if let Err(e) = &result {
            log_failure(e);
        }

        if self.settings.cleanup_temp_files {
            cleanup(&[&payload_path, &descriptor_path]);
        }
        result
    }

    fn write_and_load<I>(
        &self,
        schema: &ResolvedSchema,
        rows: I,
        command: &BcpCommand,
        payload_path: &Path,
        descriptor_path: &Path,
    ) -> BcpResult<BulkOutcome>
    where
        I: IntoIterator,
        I::Item: RowAccess,
    {
        info!(
            payload = %payload_path.display(),
            descriptor = %descriptor_path.display(),
            "Writing native artifacts"
        );
        let artifacts = ArtifactWriter::new(payload_path, descriptor_path)
            .collation(self.settings.collation.clone())
            .write(schema, rows)
            .with_context(|| format!("Writing artifacts for {}", self.table))?;

        info!(rows = artifacts.rows, "Executing bcp");
        let output = command
            .run()
            .with_context(|| format!("Loading {} with bcp", self.table))?;

        Ok(BulkOutcome::Loaded { artifacts, output })
    }
}

/// Загрузка одного пакета с параметрами из настроек.
pub fn bulk_insert_native<I>(
    settings: &BcpSettings,
    schema: &ResolvedSchema,
    rows: I,
    table: &str,
    base: &Path,
    batch: Option<u64>,
) -> BcpResult<BulkOutcome>
where
    I: IntoIterator,
    I::Item: RowAccess,
{
    let mut job = NativeBulkInsert::new(settings, table, base);
    if let Some(n) = batch {
        job = job.batch(n);
    }
    job.run(schema, rows)
}

/// Уровень записи берётся из кода статуса ошибки.
fn log_failure(err: &StackError) {
    let code = err.status_code().code();
    let kind = err.root().type_name();
    let critical = err.is_critical();
    match err.log_level() {
        LogLevel::Error => error!(code, kind = %kind, critical, error = %err, "Batch failed"),
        LogLevel::Warn => warn!(code, kind = %kind, critical, error = %err, "Batch failed"),
        LogLevel::Info => info!(code, kind = %kind, critical, error = %err, "Batch failed"),
        LogLevel::Debug => debug!(code, kind = %kind, critical, error = %err, "Batch failed"),
        LogLevel::Trace => trace!(code, kind = %kind, critical, error = %err, "Batch failed"),
    }
}

/// Удаляет временные файлы; ошибки только логируются.
fn cleanup(paths: &[&Path]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not clean up temporary file"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
