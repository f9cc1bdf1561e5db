//! Реестр поддерживаемых SQL-типов и их раскладки в native-формате `bcp`.
//!
//! Каждый тип однозначно отображается на [`EncodingRule`]: ширину префикса
//! длины, ширину данных и теги XML format-файла. Одно и то же правило читают
//! кодировщик, эталонный декодер и генератор format-файла, поэтому
//! расхождение между payload и дескриптором невозможно по построению.

use std::fmt;

use bcpnative_error::NativeError;

/// Максимальная длина VARCHAR(n) в символах.
pub const VARCHAR_MAX_LENGTH: u32 = 8000;
/// Максимальная длина NVARCHAR(n) в UTF-16 code units.
pub const NVARCHAR_MAX_LENGTH: u32 = 4000;

/// Поддерживаемые SQL-типы (закрытое множество).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Bit,
    Float,
    Real,
    Date,
    DateTime2,
    /// `max_length` в символах Latin-1
    VarChar {
        max_length: u32,
    },
    /// `max_length` в UTF-16 code units
    NVarChar {
        max_length: u32,
    },
    Geometry,
}

/// Вид поля в секции `<RECORD>` format-файла.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    NativePrefix,
    CharPrefix,
    NCharPrefix,
}

/// Ширина данных поля без учёта префикса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    /// Фиксированное число байт; префикс всегда равен этой ширине
    Fixed(u8),
    /// Переменная длина, не больше `max_bytes`; префикс содержит число байт
    Variable { max_bytes: u32 },
}

/// Правило кодирования одного типа.
///
/// Null-маркер: `prefix_length` байт `0xFF` без данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingRule {
    pub prefix_length: u8,
    pub data: DataWidth,
    pub field_type: FieldType,
    pub column_type: &'static str,
}

static NULL_BYTES: [u8; 4] = [0xFF; 4];

pub const TINYINT_RULE: EncodingRule = EncodingRule::native(1, "SQLTINYINT");
pub const SMALLINT_RULE: EncodingRule = EncodingRule::native(2, "SQLSMALLINT");
pub const INT_RULE: EncodingRule = EncodingRule::native(4, "SQLINT");
pub const BIGINT_RULE: EncodingRule = EncodingRule::native(8, "SQLBIGINT");
pub const BIT_RULE: EncodingRule = EncodingRule::native(1, "SQLBIT");
pub const FLOAT_RULE: EncodingRule = EncodingRule::native(8, "SQLFLT8");
pub const REAL_RULE: EncodingRule = EncodingRule::native(4, "SQLFLT4");
pub const DATE_RULE: EncodingRule = EncodingRule::native(3, "SQLDATE");
pub const DATETIME2_RULE: EncodingRule = EncodingRule::native(8, "SQLDATETIME2");
pub const GEOMETRY_RULE: EncodingRule = EncodingRule {
    prefix_length: 4,
    data: DataWidth::Variable {
        max_bytes: i32::MAX as u32,
    },
    field_type: FieldType::NativePrefix,
    column_type: "SQLUDT",
};

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SqlType {
    /// Правило кодирования для типа.
    pub const fn rule(&self) -> EncodingRule {
        match *self {
            SqlType::TinyInt => TINYINT_RULE,
            SqlType::SmallInt => SMALLINT_RULE,
            SqlType::Int => INT_RULE,
            SqlType::BigInt => BIGINT_RULE,
            SqlType::Bit => BIT_RULE,
            SqlType::Float => FLOAT_RULE,
            SqlType::Real => REAL_RULE,
            SqlType::Date => DATE_RULE,
            SqlType::DateTime2 => DATETIME2_RULE,
            SqlType::VarChar { max_length } => EncodingRule {
                prefix_length: 2,
                data: DataWidth::Variable {
                    max_bytes: max_length,
                },
                field_type: FieldType::CharPrefix,
                column_type: "SQLVARYCHAR",
            },
            SqlType::NVarChar { max_length } => EncodingRule {
                prefix_length: 2,
                data: DataWidth::Variable {
                    max_bytes: max_length.saturating_mul(2),
                },
                field_type: FieldType::NCharPrefix,
                column_type: "SQLNVARCHAR",
            },
            SqlType::Geometry => GEOMETRY_RULE,
        }
    }

    /// Каноническое имя типа без параметров.
    pub const fn name(&self) -> &'static str {
        match self {
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Int => "INT",
            SqlType::BigInt => "BIGINT",
            SqlType::Bit => "BIT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Date => "DATE",
            SqlType::DateTime2 => "DATETIME2",
            SqlType::VarChar { .. } => "VARCHAR",
            SqlType::NVarChar { .. } => "NVARCHAR",
            SqlType::Geometry => "GEOMETRY",
        }
    }

    /// Объявленная длина для строковых типов.
    pub const fn max_length(&self) -> Option<u32> {
        match self {
            SqlType::VarChar { max_length } | SqlType::NVarChar { max_length } => {
                Some(*max_length)
            }
            _ => None,
        }
    }
}

impl EncodingRule {
    const fn native(
        width: u8,
        column_type: &'static str,
    ) -> Self {
        Self {
            prefix_length: 1,
            data: DataWidth::Fixed(width),
            field_type: FieldType::NativePrefix,
            column_type,
        }
    }

    /// Байты null-маркера.
    pub fn null_marker(&self) -> &'static [u8] {
        &NULL_BYTES[..self.prefix_length as usize]
    }

    /// Ширина данных для типов фиксированной длины.
    pub const fn fixed_width(&self) -> Option<u8> {
        match self.data {
            DataWidth::Fixed(n) => Some(n),
            DataWidth::Variable { .. } => None,
        }
    }

    /// Число байт, которое займёт непустое поле фиксированной длины.
    pub const fn fixed_field_len(&self) -> Option<usize> {
        match self.data {
            DataWidth::Fixed(n) => Some(self.prefix_length as usize + n as usize),
            DataWidth::Variable { .. } => None,
        }
    }
}

impl FieldType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldType::NativePrefix => "NativePrefix",
            FieldType::CharPrefix => "CharPrefix",
            FieldType::NCharPrefix => "NCharPrefix",
        }
    }

    /// Разбирает значение атрибута `xsi:type` элемента `<FIELD>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NativePrefix" => Some(FieldType::NativePrefix),
            "CharPrefix" => Some(FieldType::CharPrefix),
            "NCharPrefix" => Some(FieldType::NCharPrefix),
            _ => None,
        }
    }
}

/// Разбирает объявленное имя типа.
///
/// Имя нечувствительно к регистру и окружающим пробелам. Длина строкового
/// типа может быть указана в самом имени (`VARCHAR(50)`) или отдельно через
/// `max_length`; если заданы оба значения, они должны совпадать. Для
/// `DATETIME2` допускается только точность 7.
pub fn resolve(
    type_name: &str,
    max_length: Option<u32>,
) -> Result<SqlType, NativeError> {
    let (base, inline) = split_parameter(type_name)?;

    match base.as_str() {
        "TINYINT" => no_parameter(SqlType::TinyInt, inline),
        "SMALLINT" => no_parameter(SqlType::SmallInt, inline),
        "INT" | "INTEGER" => no_parameter(SqlType::Int, inline),
        "BIGINT" => no_parameter(SqlType::BigInt, inline),
        "BIT" => no_parameter(SqlType::Bit, inline),
        "FLOAT" => no_parameter(SqlType::Float, inline),
        "REAL" => no_parameter(SqlType::Real, inline),
        "DATE" => no_parameter(SqlType::Date, inline),
        "DATETIME2" => match inline.as_deref() {
            None | Some("7") => Ok(SqlType::DateTime2),
            Some(other) => Err(invalid_parameter(
                "DATETIME2",
                "precision",
                format!("only scale 7 is supported, got {other}"),
            )),
        },
        "GEOMETRY" => no_parameter(SqlType::Geometry, inline),
        "VARCHAR" => {
            let n = string_length("VARCHAR", inline, max_length, VARCHAR_MAX_LENGTH)?;
            Ok(SqlType::VarChar { max_length: n })
        }
        "NVARCHAR" => {
            let n = string_length("NVARCHAR", inline, max_length, NVARCHAR_MAX_LENGTH)?;
            Ok(SqlType::NVarChar { max_length: n })
        }
        _ => Err(unsupported(type_name)),
    }
}

/// Делит `NAME(param)` на имя в верхнем регистре и необязательный параметр.
fn split_parameter(type_name: &str) -> Result<(String, Option<String>), NativeError> {
    let trimmed = type_name.trim();
    let Some(open) = trimmed.find('(') else {
        return Ok((trimmed.to_ascii_uppercase(), None));
    };

    let Some(inner) = trimmed[open + 1..].strip_suffix(')') else {
        return Err(unsupported(type_name));
    };
    let base = trimmed[..open].trim().to_ascii_uppercase();
    Ok((base, Some(inner.trim().to_ascii_uppercase())))
}

fn no_parameter(
    sql_type: SqlType,
    inline: Option<String>,
) -> Result<SqlType, NativeError> {
    match inline {
        None => Ok(sql_type),
        Some(p) => Err(invalid_parameter(
            sql_type.name(),
            "type parameter",
            format!("{} does not take a parameter, got ({p})", sql_type.name()),
        )),
    }
}

fn string_length(
    sql_type: &str,
    inline: Option<String>,
    explicit: Option<u32>,
    limit: u32,
) -> Result<u32, NativeError> {
    let inline = match inline {
        None => None,
        Some(p) if p == "MAX" => {
            return Err(invalid_parameter(
                sql_type,
                "max_length",
                format!("{sql_type}(MAX) is not supported"),
            ))
        }
        Some(p) => Some(p.parse::<u32>().map_err(|_| {
            invalid_parameter(sql_type, "max_length", format!("'{p}' is not a number"))
        })?),
    };

    let length = match (inline, explicit) {
        (Some(a), Some(b)) if a != b => {
            return Err(invalid_parameter(
                sql_type,
                "max_length",
                format!("declared as {a} in the type name but {b} explicitly"),
            ))
        }
        (Some(n), _) | (None, Some(n)) => n,
        (None, None) => {
            return Err(NativeError::MissingParameter {
                column: String::new(),
                sql_type: sql_type.to_string(),
                parameter: "max_length",
            })
        }
    };

    if length == 0 || length > limit {
        return Err(invalid_parameter(
            sql_type,
            "max_length",
            format!("must be between 1 and {limit}, got {length}"),
        ));
    }
    Ok(length)
}

fn unsupported(type_name: &str) -> NativeError {
    NativeError::UnsupportedType {
        type_name: type_name.trim().to_string(),
        column: None,
    }
}

fn invalid_parameter(
    sql_type: &str,
    parameter: &'static str,
    reason: String,
) -> NativeError {
    NativeError::InvalidParameter {
        column: String::new(),
        sql_type: sql_type.to_string(),
        parameter,
        reason,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для SqlType
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for SqlType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.max_length() {
            Some(n) => write!(f, "{}({n})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
