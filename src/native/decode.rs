//! Эталонный декодер native-payload.
//!
//! Читает поток, записанный [`NativeWriter`](super::NativeWriter), обратно
//! в строки значений по той же схеме. Используется для проверки файлов
//! (`bcpnative inspect`) и в тестах. Любое несоответствие раскладке
//! (усечённая строка, неверный префикс, недопустимая дата) сообщается как
//! [`NativeError::Corrupted`] со смещением начала поля.

use std::io::{self, Read};

use bcpnative_error::NativeError;
use byteorder::{ByteOrder, LittleEndian};

use super::{
    registry::{DataWidth, SqlType},
    temporal,
    value::Value,
};
use crate::schema::{ResolvedColumn, ResolvedSchema};

/// Итератор строк native-payload.
pub struct NativeReader<'s, R: Read> {
    inner: R,
    schema: &'s ResolvedSchema,
    offset: u64,
    row: u64,
    done: bool,
}

impl<'s, R: Read> NativeReader<'s, R> {
    pub fn new(
        inner: R,
        schema: &'s ResolvedSchema,
    ) -> Self {
        Self {
            inner,
            schema,
            offset: 0,
            row: 0,
            done: false,
        }
    }

    /// Текущее смещение в байтах от начала потока.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Читает следующую строку. `Ok(None)` означает конец потока на границе
    /// строки.
    pub fn read_row(&mut self) -> Result<Option<Vec<Value>>, NativeError> {
        let Some(lead) = self.read_lead_byte()? else {
            return Ok(None);
        };

        let schema = self.schema;
        let mut values = Vec::with_capacity(schema.len());
        let mut lead = Some(lead);
        for column in schema.iter() {
            let value = self
                .read_field(column, lead.take())
                .map_err(|e| e.with_row(self.row))?;
            values.push(value);
        }

        self.row += 1;
        Ok(Some(values))
    }

    /// Первый байт строки: отличает чистый конец потока от усечения.
    fn read_lead_byte(&mut self) -> Result<Option<u8>, NativeError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(NativeError::io("reading native payload", None, e)),
            }
        }
    }

    fn read_field(
        &mut self,
        column: &ResolvedColumn,
        lead: Option<u8>,
    ) -> Result<Value, NativeError> {
        let start = self.offset - u64::from(lead.is_some());
        let rule = column.rule;
        let prefix_len = rule.prefix_length as usize;

        let mut prefix = [0u8; 4];
        let rest = match lead {
            Some(b) => {
                prefix[0] = b;
                1
            }
            None => 0,
        };
        self.fill(&mut prefix[rest..prefix_len], column, start)?;
        let prefix = &prefix[..prefix_len];

        if prefix == rule.null_marker() {
            return Ok(Value::Null);
        }

        match rule.data {
            DataWidth::Fixed(width) => {
                if prefix[0] != width {
                    return Err(corrupted(
                        format!("prefix 0x{:02X}, expected 0x{width:02X}", prefix[0]),
                        start,
                        column,
                    ));
                }
                let mut data = [0u8; 8];
                let data = &mut data[..width as usize];
                self.fill(data, column, start)?;
                decode_fixed(column.sql_type, data).map_err(|reason| corrupted(reason, start, column))
            }
            DataWidth::Variable { max_bytes } => {
                let len = match prefix_len {
                    2 => u64::from(LittleEndian::read_u16(prefix)),
                    _ => {
                        let n = LittleEndian::read_i32(prefix);
                        u64::try_from(n).map_err(|_| {
                            corrupted(format!("negative length {n}"), start, column)
                        })?
                    }
                };
                if len > u64::from(max_bytes) {
                    return Err(corrupted(
                        format!("length {len} exceeds maximum {max_bytes}"),
                        start,
                        column,
                    ));
                }
                let data = self.read_exact_vec(len, column, start)?;
                decode_variable(column.sql_type, data)
                    .map_err(|reason| corrupted(reason, start, column))
            }
        }
    }

    fn fill(
        &mut self,
        buf: &mut [u8],
        column: &ResolvedColumn,
        start: u64,
    ) -> Result<(), NativeError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(corrupted("truncated field".to_string(), start, column))
            }
            Err(e) => Err(NativeError::io("reading native payload", None, e)),
        }
    }

    /// Читает `len` байт, не выделяя память заранее под заявленную длину.
    fn read_exact_vec(
        &mut self,
        len: u64,
        column: &ResolvedColumn,
        start: u64,
    ) -> Result<Vec<u8>, NativeError> {
        let mut data = Vec::with_capacity(len.min(8192) as usize);
        let read = (&mut self.inner)
            .take(len)
            .read_to_end(&mut data)
            .map_err(|e| NativeError::io("reading native payload", None, e))?;
        self.offset += read as u64;
        if (read as u64) < len {
            return Err(corrupted("truncated field".to_string(), start, column));
        }
        Ok(data)
    }
}

fn decode_fixed(
    sql_type: SqlType,
    data: &[u8],
) -> Result<Value, String> {
    let value = match sql_type {
        SqlType::TinyInt => Value::Int(i64::from(data[0])),
        SqlType::SmallInt => Value::Int(i64::from(LittleEndian::read_i16(data))),
        SqlType::Int => Value::Int(i64::from(LittleEndian::read_i32(data))),
        SqlType::BigInt => Value::Int(LittleEndian::read_i64(data)),
        SqlType::Bit => match data[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(format!("bit byte 0x{other:02X}")),
        },
        SqlType::Float => Value::Float(LittleEndian::read_f64(data)),
        SqlType::Real => Value::Float(f64::from(LittleEndian::read_f32(data))),
        SqlType::Date => Value::Date(read_date(&data[..3])?),
        SqlType::DateTime2 => {
            let ticks = LittleEndian::read_uint(&data[..5], 5);
            let time = temporal::time_from_ticks(ticks)
                .ok_or_else(|| format!("time ticks {ticks} exceed one day"))?;
            Value::DateTime(read_date(&data[5..8])?.and_time(time))
        }
        SqlType::VarChar { .. } | SqlType::NVarChar { .. } | SqlType::Geometry => {
            return Err(format!("{sql_type} is not a fixed-width type"))
        }
    };
    Ok(value)
}

fn read_date(data: &[u8]) -> Result<chrono::NaiveDate, String> {
    let days = LittleEndian::read_u24(data);
    temporal::date_from_day_count(days).ok_or_else(|| format!("day count {days} is past 9999-12-31"))
}

fn decode_variable(
    sql_type: SqlType,
    data: Vec<u8>,
) -> Result<Value, String> {
    match sql_type {
        SqlType::VarChar { .. } => Ok(Value::Text(data.iter().map(|&b| char::from(b)).collect())),
        SqlType::NVarChar { .. } => {
            if data.len() % 2 != 0 {
                return Err(format!("odd UTF-16 byte length {}", data.len()));
            }
            let units: Vec<u16> = data.chunks_exact(2).map(LittleEndian::read_u16).collect();
            String::from_utf16(&units)
                .map(Value::Text)
                .map_err(|_| "invalid UTF-16 data".to_string())
        }
        SqlType::Geometry => Ok(Value::Bytes(data)),
        _ => Err(format!("{sql_type} is not a variable-width type")),
    }
}

fn corrupted(
    reason: String,
    offset: u64,
    column: &ResolvedColumn,
) -> NativeError {
    NativeError::Corrupted {
        reason,
        offset: Some(offset),
        column: Some(column.name.clone()),
        row: None,
    }
}

impl<R: Read> Iterator for NativeReader<'_, R> {
    type Item = Result<Vec<Value>, NativeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
