//! Кодирование одного значения в поле native-формата.
//!
//! Поле состоит из little-endian префикса длины и данных. Для null пишется
//! только префикс из байт `0xFF`. Ширина префикса и данных берётся из
//! [`EncodingRule`](super::registry::EncodingRule) колонки.

use std::{borrow::Cow, io::Write};

use bcpnative_error::NativeError;
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::NaiveDateTime;

use super::{geometry, registry::SqlType, temporal, value::Value};
use crate::schema::ResolvedColumn;

/// Записывает значение `value` колонки `column` в `w`.
///
/// Возвращает число записанных байт. Ошибка содержит имя колонки; номер
/// строки добавляет сериализатор.
pub fn encode_field<W: Write + ?Sized>(
    w: &mut W,
    value: &Value,
    column: &ResolvedColumn,
) -> Result<usize, NativeError> {
    encode_value(w, value, column.sql_type).map_err(|e| e.with_column(column.name.as_str()))
}

/// Кодирует значение в новый буфер.
pub fn encode_to_vec(
    value: &Value,
    column: &ResolvedColumn,
) -> Result<Vec<u8>, NativeError> {
    let mut buf = Vec::with_capacity(column.rule.prefix_length as usize + 8);
    encode_field(&mut buf, value, column)?;
    Ok(buf)
}

fn encode_value<W: Write + ?Sized>(
    w: &mut W,
    value: &Value,
    sql_type: SqlType,
) -> Result<usize, NativeError> {
    let rule = sql_type.rule();

    if value.is_null() {
        let marker = rule.null_marker();
        w.write_all(marker).map_err(write_error)?;
        return Ok(marker.len());
    }

    match sql_type {
        SqlType::TinyInt => {
            let v = integer(value, sql_type, 0, i64::from(u8::MAX))?;
            write_fixed(w, 1, |w| w.write_u8(v as u8))
        }
        SqlType::SmallInt => {
            let v = integer(value, sql_type, i64::from(i16::MIN), i64::from(i16::MAX))?;
            write_fixed(w, 2, |w| w.write_i16::<LittleEndian>(v as i16))
        }
        SqlType::Int => {
            let v = integer(value, sql_type, i64::from(i32::MIN), i64::from(i32::MAX))?;
            write_fixed(w, 4, |w| w.write_i32::<LittleEndian>(v as i32))
        }
        SqlType::BigInt => {
            let v = integer(value, sql_type, i64::MIN, i64::MAX)?;
            write_fixed(w, 8, |w| w.write_i64::<LittleEndian>(v))
        }
        SqlType::Bit => {
            let v = bit(value, sql_type)?;
            write_fixed(w, 1, |w| w.write_u8(u8::from(v)))
        }
        SqlType::Float => {
            let v = float(value, sql_type)?;
            write_fixed(w, 8, |w| w.write_f64::<LittleEndian>(v))
        }
        SqlType::Real => {
            let v = float(value, sql_type)? as f32;
            if !v.is_finite() {
                return Err(invalid(sql_type, "value overflows single precision"));
            }
            write_fixed(w, 4, |w| w.write_f32::<LittleEndian>(v))
        }
        SqlType::Date => {
            let days = temporal::day_count(datetime(value, sql_type)?.date())
                .map_err(|reason| invalid(sql_type, reason))?;
            write_fixed(w, 3, |w| w.write_u24::<LittleEndian>(days))
        }
        SqlType::DateTime2 => {
            let dt = datetime(value, sql_type)?;
            let days =
                temporal::day_count(dt.date()).map_err(|reason| invalid(sql_type, reason))?;
            let ticks =
                temporal::time_ticks(dt.time()).map_err(|reason| invalid(sql_type, reason))?;
            write_fixed(w, 8, |w| {
                w.write_uint::<LittleEndian>(ticks, 5)?;
                w.write_u24::<LittleEndian>(days)
            })
        }
        SqlType::VarChar { max_length } => {
            let text = text(value, sql_type)?;
            let bytes = latin1(&text, sql_type)?;
            check_length(bytes.len(), max_length, "characters")?;
            write_u16_prefixed(w, &bytes)
        }
        SqlType::NVarChar { max_length } => {
            let text = text(value, sql_type)?;
            let units: Vec<u16> = text.encode_utf16().collect();
            check_length(units.len(), max_length, "UTF-16 code units")?;
            let byte_len = units.len() * 2;
            w.write_u16::<LittleEndian>(byte_len as u16)
                .map_err(write_error)?;
            for unit in units {
                w.write_u16::<LittleEndian>(unit).map_err(write_error)?;
            }
            Ok(2 + byte_len)
        }
        SqlType::Geometry => {
            let bytes = geometry_bytes(value)?;
            let len = i32::try_from(bytes.len()).map_err(|_| NativeError::LengthExceeded {
                max_length: i32::MAX as u64,
                actual: bytes.len() as u64,
                unit: "bytes",
                column: None,
                row: None,
            })?;
            w.write_i32::<LittleEndian>(len).map_err(write_error)?;
            w.write_all(&bytes).map_err(write_error)?;
            Ok(4 + bytes.len())
        }
    }
}

/// Пишет префикс фиксированной ширины и данные.
fn write_fixed<W, F>(
    w: &mut W,
    width: u8,
    data: F,
) -> Result<usize, NativeError>
where
    W: Write + ?Sized,
    F: FnOnce(&mut W) -> std::io::Result<()>,
{
    w.write_u8(width).map_err(write_error)?;
    data(w).map_err(write_error)?;
    Ok(1 + width as usize)
}

fn write_u16_prefixed<W: Write + ?Sized>(
    w: &mut W,
    bytes: &[u8],
) -> Result<usize, NativeError> {
    w.write_u16::<LittleEndian>(bytes.len() as u16)
        .map_err(write_error)?;
    w.write_all(bytes).map_err(write_error)?;
    Ok(2 + bytes.len())
}

fn integer(
    value: &Value,
    sql_type: SqlType,
    min: i64,
    max: i64,
) -> Result<i64, NativeError> {
    let v = match value {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(invalid(sql_type, format!("{f} is not a finite number")));
            }
            if f.fract() != 0.0 {
                return Err(invalid(sql_type, format!("{f} has a fractional part")));
            }
            // i64::MAX as f64 округляется до 2^63, поэтому граница исключающая
            if *f < min as f64 || *f >= max as f64 + 1.0 {
                return Err(out_of_range(sql_type, f, min, max));
            }
            *f as i64
        }
        other => return Err(mismatch("integer, bool or integral float", other)),
    };

    if v < min || v > max {
        return Err(out_of_range(sql_type, v, min, max));
    }
    Ok(v)
}

fn bit(
    value: &Value,
    sql_type: SqlType,
) -> Result<bool, NativeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        Value::Float(f) if f.is_finite() => Ok(*f != 0.0),
        Value::Float(f) => Err(invalid(sql_type, format!("{f} is not a finite number"))),
        other => Err(mismatch("bool or number", other)),
    }
}

fn float(
    value: &Value,
    sql_type: SqlType,
) -> Result<f64, NativeError> {
    let v = match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        other => return Err(mismatch("float or int", other)),
    };
    if !v.is_finite() {
        return Err(invalid(
            sql_type,
            format!("{v} is not representable in SQL Server"),
        ));
    }
    Ok(v)
}

fn datetime(
    value: &Value,
    sql_type: SqlType,
) -> Result<NaiveDateTime, NativeError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::Date(d) => Ok(d.and_time(chrono::NaiveTime::MIN)),
        Value::Text(s) => temporal::parse_datetime_text(s).ok_or_else(|| {
            invalid(
                sql_type,
                format!("'{}' is not an ISO-8601 date or datetime", s.trim()),
            )
        }),
        other => Err(mismatch("date, datetime or ISO-8601 text", other)),
    }
}

fn text(
    value: &Value,
    sql_type: SqlType,
) -> Result<Cow<'_, str>, NativeError> {
    match value {
        Value::Text(s) => Ok(Cow::Borrowed(s.as_str())),
        Value::Int(i) => Ok(Cow::Owned(i.to_string())),
        Value::Bool(b) => Ok(Cow::Owned(b.to_string())),
        Value::Float(f) if f.is_finite() => Ok(Cow::Owned(f.to_string())),
        Value::Float(f) => Err(invalid(sql_type, format!("{f} has no text form"))),
        other => Err(mismatch("text or scalar", other)),
    }
}

fn latin1<'a>(
    text: &'a str,
    sql_type: SqlType,
) -> Result<Cow<'a, [u8]>, NativeError> {
    if text.is_ascii() {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }

    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                invalid(
                    sql_type,
                    format!(
                        "character '{c}' (U+{:04X}) is not representable in Latin-1",
                        u32::from(c)
                    ),
                )
            })
        })
        .collect::<Result<Vec<u8>, _>>()
        .map(Cow::Owned)
}

fn geometry_bytes(value: &Value) -> Result<Cow<'_, [u8]>, NativeError> {
    const EXPECTED: &str = "geometry bytes or hex string";
    match value {
        Value::Bytes(b) => Ok(Cow::Borrowed(b.as_slice())),
        Value::Text(s) => geometry::parse_hex(s)
            .map(Cow::Owned)
            .ok_or_else(|| mismatch(EXPECTED, value)),
        other => Err(mismatch(EXPECTED, other)),
    }
}

fn check_length(
    actual: usize,
    max_length: u32,
    unit: &'static str,
) -> Result<(), NativeError> {
    if actual > max_length as usize {
        return Err(NativeError::LengthExceeded {
            max_length: u64::from(max_length),
            actual: actual as u64,
            unit,
            column: None,
            row: None,
        });
    }
    Ok(())
}

fn mismatch(
    expected: &str,
    got: &Value,
) -> NativeError {
    NativeError::TypeMismatch {
        expected: expected.to_string(),
        got: got.describe(),
        column: None,
        row: None,
    }
}

fn invalid(
    sql_type: SqlType,
    reason: impl Into<String>,
) -> NativeError {
    NativeError::InvalidValue {
        sql_type: sql_type.name().to_string(),
        reason: reason.into(),
        column: None,
        row: None,
    }
}

fn out_of_range<V: std::fmt::Display>(
    sql_type: SqlType,
    v: V,
    min: i64,
    max: i64,
) -> NativeError {
    invalid(sql_type, format!("{v} is outside {min}..={max}"))
}

fn write_error(e: std::io::Error) -> NativeError {
    NativeError::io("writing native field", None, e)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
