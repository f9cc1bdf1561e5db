//! Запись пары артефактов: native-payload (`.dat`) и format-файла (`.xml`).
//!
//! Оба файла сначала пишутся во временные файлы в каталогах назначения,
//! сбрасываются на диск и только затем переименовываются на место. Если
//! хоть одна строка не закодировалась, по целевым путям ничего не
//! появляется.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use bcpnative_error::NativeError;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    format::{self, DEFAULT_COLLATION},
    native::{NativeWriter, RowAccess},
    schema::ResolvedSchema,
};

/// Итог записи артефактов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub payload_path: PathBuf,
    pub descriptor_path: PathBuf,
    pub rows: u64,
    pub nulls: u64,
    pub payload_bytes: u64,
    pub descriptor_bytes: u64,
}

/// Писатель пары payload + format-файл.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    payload_path: PathBuf,
    descriptor_path: PathBuf,
    collation: String,
}

impl ArtifactWriter {
    pub fn new(
        payload_path: impl Into<PathBuf>,
        descriptor_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            payload_path: payload_path.into(),
            descriptor_path: descriptor_path.into(),
            collation: DEFAULT_COLLATION.to_string(),
        }
    }

    /// Пути `<base>.dat` и `<base>.xml`.
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let (payload, descriptor) = artifact_paths(base.as_ref());
        Self::new(payload, descriptor)
    }

    /// Коллация строковых полей в format-файле.
    pub fn collation(
        mut self,
        collation: impl Into<String>,
    ) -> Self {
        self.collation = collation.into();
        self
    }

    pub fn payload_path(&self) -> &Path {
        &self.payload_path
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Кодирует строки и публикует оба файла.
    ///
    /// Payload публикуется первым; если затем не удалось опубликовать
    /// format-файл, уже опубликованный payload удаляется.
    pub fn write<I>(
        &self,
        schema: &ResolvedSchema,
        rows: I,
    ) -> Result<ArtifactSummary, NativeError>
    where
        I: IntoIterator,
        I::Item: RowAccess,
    {
        self.try_write(schema, rows.into_iter().map(Ok::<_, NativeError>))
    }

    /// Как [`write`](Self::write), но строки приходят из источника, который
    /// сам может завершиться ошибкой (например, разбор входного потока).
    ///
    /// Первая ошибка источника прерывает запись; временные файлы удаляются,
    /// по целевым путям ничего не появляется.
    pub fn try_write<I, R, E>(
        &self,
        schema: &ResolvedSchema,
        rows: I,
    ) -> Result<ArtifactSummary, E>
    where
        I: IntoIterator<Item = Result<R, E>>,
        R: RowAccess,
        E: From<NativeError>,
    {
        let payload_tmp = temp_file_for(&self.payload_path)?;
        let descriptor_tmp = temp_file_for(&self.descriptor_path)?;
        debug!(
            payload_tmp = %payload_tmp.path().display(),
            descriptor_tmp = %descriptor_tmp.path().display(),
            "Temporary artifact files created"
        );

        let mut writer = NativeWriter::new(BufWriter::new(payload_tmp), schema);
        for row in rows {
            writer.write_row(&row?)?;
        }
        let (buffered, stats) = writer.finish()?;
        let payload_tmp = buffered
            .into_inner()
            .map_err(|e| self.io_error("flushing payload", &self.payload_path, e.into_error()))?;
        payload_tmp
            .as_file()
            .sync_all()
            .map_err(|e| self.io_error("syncing payload", &self.payload_path, e))?;

        let fields = format::generate(schema, &self.collation);
        let mut descriptor = format::write_xml(BufWriter::new(descriptor_tmp), &fields)?;
        descriptor
            .flush()
            .map_err(|e| self.io_error("flushing format file", &self.descriptor_path, e))?;
        let descriptor_tmp = descriptor.into_inner().map_err(|e| {
            self.io_error(
                "flushing format file",
                &self.descriptor_path,
                e.into_error(),
            )
        })?;
        descriptor_tmp
            .as_file()
            .sync_all()
            .map_err(|e| self.io_error("syncing format file", &self.descriptor_path, e))?;
        let descriptor_bytes = descriptor_tmp
            .as_file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| self.io_error("reading format file size", &self.descriptor_path, e))?;

        payload_tmp
            .persist(&self.payload_path)
            .map_err(|e| self.io_error("publishing payload", &self.payload_path, e.error))?;

        if let Err(e) = descriptor_tmp.persist(&self.descriptor_path) {
            if let Err(cleanup) = fs::remove_file(&self.payload_path) {
                warn!(
                    path = %self.payload_path.display(),
                    error = %cleanup,
                    "Failed to remove payload after format file publish error"
                );
            }
            return Err(self.io_error(
                "publishing format file",
                &self.descriptor_path,
                e.error,
            )
            .into());
        }

        info!(
            payload = %self.payload_path.display(),
            descriptor = %self.descriptor_path.display(),
            rows = stats.rows,
            bytes = stats.bytes,
            "Native artifacts written"
        );

        Ok(ArtifactSummary {
            payload_path: self.payload_path.clone(),
            descriptor_path: self.descriptor_path.clone(),
            rows: stats.rows,
            nulls: stats.nulls,
            payload_bytes: stats.bytes,
            descriptor_bytes,
        })
    }

    fn io_error(
        &self,
        operation: &str,
        path: &Path,
        err: std::io::Error,
    ) -> NativeError {
        NativeError::io(operation, Some(path), err)
    }
}

/// Пути артефактов для базового имени: `<base>.dat`, `<base>.xml`.
pub fn artifact_paths(base: &Path) -> (PathBuf, PathBuf) {
    let mut payload = base.as_os_str().to_owned();
    payload.push(".dat");
    let mut descriptor = base.as_os_str().to_owned();
    descriptor.push(".xml");
    (PathBuf::from(payload), PathBuf::from(descriptor))
}

/// Временный файл в каталоге целевого пути.
fn temp_file_for(target: &Path) -> Result<NamedTempFile, NativeError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".bcpnative-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| NativeError::io("creating temporary file", Some(dir), e))
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
