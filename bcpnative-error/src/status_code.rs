use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки схемы и данных
/// - 5xxx: Кодирование / декодирование native-формата
/// - 6xxx: Файловый ввод-вывод
/// - 7xxx: Внешний процесс `bcp`
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    InvalidConfig = 1005,

    // === 2xxx: Схема и данные ===
    UnsupportedType = 2000,
    MissingParameter = 2001,
    InvalidParameter = 2002,
    DuplicateColumn = 2003,
    InvalidColumn = 2004,
    EmptySchema = 2005,
    MissingColumn = 2006,
    TypeMismatch = 2007,
    LengthExceeded = 2008,
    InvalidValue = 2009,

    // === 5xxx: Native-формат ===
    EncodingError = 5000,
    DecodingError = 5001,
    CorruptedData = 5002,

    // === 6xxx: IO ===
    Io = 6000,
    NotFound = 6001,
    PermissionDenied = 6002,
    UnexpectedEof = 6003,

    // === 7xxx: Внешний процесс ===
    ProgramNotFound = 7000,
    ProcessFailed = 7001,
    AuthConfig = 7002,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Использует `TryFrom<u32>` из `num_enum`; возвращает `None`, если
    /// значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка во входных данных: схема или значение строки (диапазон 2xxx).
    ///
    /// Такие ошибки исправляются на стороне вызывающего кода, повторный
    /// запуск с теми же данными даст тот же результат.
    pub fn is_input_error(&self) -> bool {
        (2000..=2999).contains(&self.code()) || matches!(self, Self::InvalidArgs)
    }

    /// Ошибка окружения: файловая система или внешний процесс.
    pub fn is_environment_error(&self) -> bool {
        matches!(self.code(), 6000..=7999)
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Internal | Self::CorruptedData | Self::ProcessFailed
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::UnsupportedType
            | Self::MissingParameter
            | Self::InvalidParameter
            | Self::DuplicateColumn
            | Self::InvalidColumn
            | Self::EmptySchema
            | Self::MissingColumn
            | Self::TypeMismatch
            | Self::LengthExceeded
            | Self::InvalidValue
            | Self::InvalidArgs => LogLevel::Info,
            Self::Internal | Self::CorruptedData | Self::ProcessFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Код завершения процесса для CLI.
    ///
    /// 2 для ошибок входных данных, 3 для ошибок окружения, 1 для прочих.
    pub fn exit_code(&self) -> i32 {
        if self.is_input_error() {
            2
        } else if self.is_environment_error() {
            3
        } else {
            1
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
