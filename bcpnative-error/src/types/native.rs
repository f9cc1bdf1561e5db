use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибка native-кодека: схема, значения строк, декодирование и запись
/// артефактов.
///
/// Все варианты фатальны для текущего задания. Варианты уровня строки несут
/// необязательный контекст (номер строки, имя колонки), который добавляется
/// сериализатором через [`NativeError::with_row`] и
/// [`NativeError::with_column`].
#[derive(Debug, Clone)]
pub enum NativeError {
    /// Имя типа не входит в поддерживаемый набор
    UnsupportedType {
        type_name: String,
        column: Option<String>,
    },

    /// Отсутствует обязательный параметр типа (например, длина VARCHAR)
    MissingParameter {
        column: String,
        sql_type: String,
        parameter: &'static str,
    },

    /// Параметр типа задан, но недопустим
    InvalidParameter {
        column: String,
        sql_type: String,
        parameter: &'static str,
        reason: String,
    },

    /// Колонка объявлена в схеме дважды
    DuplicateColumn { column: String },

    /// Недопустимое имя колонки
    InvalidColumnName { column: String, reason: String },

    /// Схема без колонок
    EmptySchema,

    /// Строка не содержит значения для колонки схемы
    MissingColumn { column: String, row: Option<u64> },

    /// Значение не может быть интерпретировано как тип колонки
    TypeMismatch {
        expected: String,
        got: String,
        column: Option<String>,
        row: Option<u64>,
    },

    /// Значение длиннее объявленного максимума
    LengthExceeded {
        max_length: u64,
        actual: u64,
        unit: &'static str,
        column: Option<String>,
        row: Option<u64>,
    },

    /// Значение нужного типа, но вне допустимого диапазона или
    /// непредставимо в целевой кодировке
    InvalidValue {
        sql_type: String,
        reason: String,
        column: Option<String>,
        row: Option<u64>,
    },

    /// Повреждённый или усечённый payload (эталонный декодер)
    Corrupted {
        reason: String,
        offset: Option<u64>,
        column: Option<String>,
        row: Option<u64>,
    },

    /// Ошибка ввода-вывода при записи или публикации артефакта
    Io {
        operation: String,
        path: Option<String>,
        kind: std::io::ErrorKind,
        reason: String,
    },
}

pub type NativeResult<T> = Result<T, NativeError>;

impl NativeError {
    /// Оборачивает `std::io::Error` с описанием операции и пути.
    pub fn io(
        operation: impl Into<String>,
        path: Option<&std::path::Path>,
        err: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.map(|p| p.display().to_string()),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// Добавляет номер строки к ошибке уровня строки.
    pub fn with_row(
        mut self,
        index: u64,
    ) -> Self {
        match &mut self {
            Self::MissingColumn { row, .. }
            | Self::TypeMismatch { row, .. }
            | Self::LengthExceeded { row, .. }
            | Self::InvalidValue { row, .. }
            | Self::Corrupted { row, .. } => {
                *row = Some(index);
            }
            _ => {}
        }
        self
    }

    /// Добавляет имя колонки, если оно ещё не задано.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        match &mut self {
            Self::MissingParameter { column, .. } | Self::InvalidParameter { column, .. } => {
                if column.is_empty() {
                    *column = name.into();
                }
            }
            Self::UnsupportedType { column, .. }
            | Self::TypeMismatch { column, .. }
            | Self::LengthExceeded { column, .. }
            | Self::InvalidValue { column, .. }
            | Self::Corrupted { column, .. } => {
                if column.is_none() {
                    *column = Some(name.into());
                }
            }
            _ => {}
        }
        self
    }

    /// Ошибка обнаружена при проверке схемы (до обработки строк).
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType { .. }
                | Self::MissingParameter { .. }
                | Self::InvalidParameter { .. }
                | Self::DuplicateColumn { .. }
                | Self::InvalidColumnName { .. }
                | Self::EmptySchema
        )
    }

    /// Номер строки, если он известен.
    pub fn row(&self) -> Option<u64> {
        match self {
            Self::MissingColumn { row, .. }
            | Self::TypeMismatch { row, .. }
            | Self::LengthExceeded { row, .. }
            | Self::InvalidValue { row, .. }
            | Self::Corrupted { row, .. } => *row,
            _ => None,
        }
    }

    /// Подсказка для пользователя.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedType { .. } => Some(
                "Supported types: TINYINT, SMALLINT, INT, BIGINT, BIT, FLOAT, REAL, DATE, \
                 DATETIME2, VARCHAR, NVARCHAR, GEOMETRY",
            ),
            Self::MissingParameter { .. } => Some("Declare max_length for VARCHAR/NVARCHAR columns"),
            Self::LengthExceeded { .. } => {
                Some("Widen the column's max_length or shorten the value; values are never truncated")
            }
            Self::TypeMismatch { expected, .. } if expected.contains("geometry") => {
                Some("Pass geometry as raw bytes or hex (e.g. STAsBinary() output), not WKT/GeoJSON")
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for NativeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::UnsupportedType { type_name, column } => {
                write!(f, "Unsupported SQL type for native bcp: {type_name}")?;
                write_context(f, None, column.as_deref(), None)
            }
            Self::MissingParameter {
                column,
                sql_type,
                parameter,
            } => write!(
                f,
                "{parameter} is required for {sql_type} column '{column}'"
            ),
            Self::InvalidParameter {
                column,
                sql_type,
                parameter,
                reason,
            } => write!(
                f,
                "Invalid {parameter} for {sql_type} column '{column}': {reason}"
            ),
            Self::DuplicateColumn { column } => {
                write!(f, "Column '{column}' is declared more than once")
            }
            Self::InvalidColumnName { column, reason } => {
                write!(f, "Invalid column name '{column}': {reason}")
            }
            Self::EmptySchema => write!(f, "Schema has no columns"),
            Self::MissingColumn { column, row } => {
                write!(f, "Row does not provide a value for column '{column}'")?;
                write_context(f, *row, None, None)
            }
            Self::TypeMismatch {
                expected,
                got,
                column,
                row,
            } => {
                write!(f, "Type mismatch: expected {expected}, got {got}")?;
                write_context(f, *row, column.as_deref(), None)
            }
            Self::LengthExceeded {
                max_length,
                actual,
                unit,
                column,
                row,
            } => {
                write!(
                    f,
                    "Value length {actual} {unit} exceeds declared maximum {max_length}"
                )?;
                write_context(f, *row, column.as_deref(), None)
            }
            Self::InvalidValue {
                sql_type,
                reason,
                column,
                row,
            } => {
                write!(f, "Invalid {sql_type} value: {reason}")?;
                write_context(f, *row, column.as_deref(), None)
            }
            Self::Corrupted {
                reason,
                offset,
                column,
                row,
            } => {
                write!(f, "Corrupted native payload: {reason}")?;
                write_context(f, *row, column.as_deref(), *offset)
            }
            Self::Io {
                operation,
                path,
                reason,
                ..
            } => {
                write!(f, "I/O error while {operation}")?;
                if let Some(p) = path {
                    write!(f, " ({p})")?;
                }
                write!(f, ": {reason}")
            }
        }
    }
}

/// Вспомогательная функция для форматирования контекста (row, column,
/// offset).
fn write_context(
    f: &mut std::fmt::Formatter<'_>,
    row: Option<u64>,
    column: Option<&str>,
    offset: Option<u64>,
) -> std::fmt::Result {
    let mut parts = Vec::new();
    if let Some(r) = row {
        parts.push(format!("row: {r}"));
    }
    if let Some(c) = column {
        parts.push(format!("column: {c}"));
    }
    if let Some(o) = offset {
        parts.push(format!("offset: 0x{o:X}"));
    }
    if !parts.is_empty() {
        write!(f, " [{}]", parts.join(", "))?;
    }
    Ok(())
}

impl std::error::Error for NativeError {}

impl ErrorExt for NativeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedType { .. } => StatusCode::UnsupportedType,
            Self::MissingParameter { .. } => StatusCode::MissingParameter,
            Self::InvalidParameter { .. } => StatusCode::InvalidParameter,
            Self::DuplicateColumn { .. } => StatusCode::DuplicateColumn,
            Self::InvalidColumnName { .. } => StatusCode::InvalidColumn,
            Self::EmptySchema => StatusCode::EmptySchema,
            Self::MissingColumn { .. } => StatusCode::MissingColumn,
            Self::TypeMismatch { .. } => StatusCode::TypeMismatch,
            Self::LengthExceeded { .. } => StatusCode::LengthExceeded,
            Self::InvalidValue { .. } => StatusCode::InvalidValue,
            Self::Corrupted { .. } => StatusCode::CorruptedData,
            Self::Io { kind, .. } => match kind {
                std::io::ErrorKind::NotFound => StatusCode::NotFound,
                std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
                std::io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
                _ => StatusCode::Io,
            },
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn log_message(&self) -> String {
        let mut msg = format!("{self:?}");
        if let Some(hint) = self.hint() {
            msg.push_str(&format!(" | Hint: {hint}"));
        }
        msg
    }
}

impl From<NativeError> for std::io::Error {
    fn from(e: NativeError) -> Self {
        let kind = match &e {
            NativeError::Io { kind, .. } => *kind,
            NativeError::Corrupted { .. } => std::io::ErrorKind::InvalidData,
            _ => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch() -> NativeError {
        NativeError::TypeMismatch {
            expected: "geometry bytes or hex string".to_string(),
            got: "text 'POINT (1 2)'".to_string(),
            column: None,
            row: None,
        }
    }

    /// Тест проверяет, что контекст строки и колонки попадает в сообщение.
    #[test]
    fn test_row_and_column_context() {
        let err = mismatch().with_row(7).with_column("shape");
        let msg = err.to_string();
        assert!(msg.contains("row: 7"), "{msg}");
        assert!(msg.contains("column: shape"), "{msg}");
        assert_eq!(err.row(), Some(7));
    }

    /// Колонка, заданная ранее, не перезаписывается.
    #[test]
    fn test_with_column_keeps_first() {
        let err = mismatch().with_column("inner").with_column("outer");
        assert!(err.to_string().contains("column: inner"));
        assert!(!err.to_string().contains("outer"));
    }

    #[test]
    fn test_schema_errors_have_no_row() {
        let err = NativeError::EmptySchema.with_row(3);
        assert!(err.is_schema_error());
        assert_eq!(err.row(), None);
        assert_eq!(err.to_string(), "Schema has no columns");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(mismatch().status_code(), StatusCode::TypeMismatch);
        let len = NativeError::LengthExceeded {
            max_length: 5,
            actual: 6,
            unit: "characters",
            column: Some("name".into()),
            row: Some(0),
        };
        assert_eq!(len.status_code(), StatusCode::LengthExceeded);
        assert!(len.to_string().contains("6 characters exceeds declared maximum 5"));

        let io = NativeError::io(
            "writing payload",
            None,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.status_code(), StatusCode::PermissionDenied);
    }

    #[test]
    fn test_geometry_hint() {
        assert!(mismatch().hint().unwrap().contains("WKT"));
        assert!(mismatch().log_message().contains("Hint:"));
    }

    #[test]
    fn test_into_io_error() {
        let corrupted = NativeError::Corrupted {
            reason: "truncated row".into(),
            offset: Some(16),
            column: None,
            row: None,
        };
        let io: std::io::Error = corrupted.into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
        assert!(io.to_string().contains("offset: 0x10"));
    }
}
