//! Потоковая сериализация строк в native-payload.
//!
//! Строки пишутся подряд без разделителей, поля внутри строки в порядке
//! схемы. Строка сначала целиком кодируется во внутренний буфер и только
//! потом попадает в приёмник, поэтому при ошибке в приёмник не уходит
//! частично записанная строка.

use std::io::Write;

use bcpnative_error::NativeError;
use tracing::trace;

use super::{encode::encode_field, row::RowAccess};
use crate::schema::ResolvedSchema;

/// Итог записи.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub rows: u64,
    pub bytes: u64,
    pub nulls: u64,
}

/// Сериализатор строк поверх произвольного [`Write`].
///
/// Держит в памяти не больше одной закодированной строки.
pub struct NativeWriter<'s, W: Write> {
    sink: W,
    schema: &'s ResolvedSchema,
    row_buf: Vec<u8>,
    stats: WriteStats,
}

impl<'s, W: Write> NativeWriter<'s, W> {
    pub fn new(
        sink: W,
        schema: &'s ResolvedSchema,
    ) -> Self {
        let capacity = schema.fixed_row_len().unwrap_or(256);
        Self {
            sink,
            schema,
            row_buf: Vec::with_capacity(capacity),
            stats: WriteStats::default(),
        }
    }

    /// Кодирует и записывает одну строку. Возвращает её размер в байтах.
    ///
    /// Ошибка содержит номер строки (с нуля) и имя колонки.
    pub fn write_row<R: RowAccess + ?Sized>(
        &mut self,
        row: &R,
    ) -> Result<usize, NativeError> {
        let index = self.stats.rows;
        self.row_buf.clear();
        let mut nulls = 0;

        for column in self.schema.iter() {
            let value = row.value_for(column).ok_or_else(|| NativeError::MissingColumn {
                column: column.name.clone(),
                row: Some(index),
            })?;
            if value.is_null() {
                nulls += 1;
            }
            encode_field(&mut self.row_buf, value, column).map_err(|e| e.with_row(index))?;
        }

        self.sink
            .write_all(&self.row_buf)
            .map_err(|e| NativeError::io("writing native payload", None, e))?;

        let len = self.row_buf.len();
        self.stats.rows += 1;
        self.stats.bytes += len as u64;
        self.stats.nulls += nulls;
        trace!(row = index, bytes = len, "Row encoded");
        Ok(len)
    }

    /// Записывает все строки итератора. Возвращает число записанных строк.
    pub fn write_rows<I>(
        &mut self,
        rows: I,
    ) -> Result<u64, NativeError>
    where
        I: IntoIterator,
        I::Item: RowAccess,
    {
        let before = self.stats.rows;
        for row in rows {
            self.write_row(&row)?;
        }
        Ok(self.stats.rows - before)
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Сбрасывает приёмник и возвращает его вместе со статистикой.
    pub fn finish(mut self) -> Result<(W, WriteStats), NativeError> {
        self.sink
            .flush()
            .map_err(|e| NativeError::io("flushing native payload", None, e))?;
        Ok((self.sink, self.stats))
    }
}

/// Сериализует все строки в `sink`.
pub fn serialize<I, W>(
    rows: I,
    schema: &ResolvedSchema,
    sink: W,
) -> Result<(W, WriteStats), NativeError>
where
    I: IntoIterator,
    I::Item: RowAccess,
    W: Write,
{
    let mut writer = NativeWriter::new(sink, schema);
    writer.write_rows(rows)?;
    writer.finish()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        native::{Row, Value},
        row,
        schema::{validate, TableSchema},
    };

    fn id_name_schema() -> ResolvedSchema {
        validate(&TableSchema::new().column("id", "INT").sized_column("name", "VARCHAR", 5))
            .unwrap()
    }

    #[test]
    fn test_two_rows_with_nulls() {
        let schema = id_name_schema();
        let rows = vec![
            row! { "id" => 1, "name" => "ab" },
            row! { "id" => Value::Null, "name" => Value::Null },
        ];
        let (out, stats) = serialize(&rows, &schema, Vec::new()).unwrap();

        assert_eq!(
            out,
            [0x04, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x61, 0x62, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            stats,
            WriteStats {
                rows: 2,
                bytes: 12,
                nulls: 2
            }
        );
    }

    #[test]
    fn test_positional_rows() {
        let schema = id_name_schema();
        let rows = vec![vec![Value::Int(1), Value::from("ab")]];
        let (out, _) = serialize(rows, &schema, Vec::new()).unwrap();
        assert_eq!(out, [0x04, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x61, 0x62]);
    }

    #[test]
    fn test_missing_column_reports_row() {
        let schema = id_name_schema();
        let rows: Vec<Row> = vec![row! { "id" => 1, "name" => "a" }, row! { "id" => 2 }];
        let err = serialize(&rows, &schema, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            NativeError::MissingColumn { ref column, row: Some(1) } if column == "name"
        ));
    }

    #[test]
    fn test_failed_row_is_not_written() {
        let schema = id_name_schema();
        let mut writer = NativeWriter::new(Vec::new(), &schema);
        writer.write_row(&row! { "id" => 1, "name" => "ok" }).unwrap();

        let err = writer
            .write_row(&row! { "id" => 2, "name" => "too long" })
            .unwrap_err();
        assert_eq!(err.row(), Some(1));
        assert!(err.to_string().contains("column: name"));

        let (out, stats) = writer.finish().unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn test_extra_keys_ignored() {
        let schema = id_name_schema();
        let mut writer = NativeWriter::new(Vec::new(), &schema);
        let n = writer
            .write_row(&row! { "name" => "", "id" => 0, "unused" => 3.5 })
            .unwrap();
        assert_eq!(n, 7);
    }

    #[test]
    fn test_write_rows_counts() {
        let schema = validate(&TableSchema::new().column("flag", "BIT")).unwrap();
        let mut writer = NativeWriter::new(Vec::new(), &schema);
        let written = writer
            .write_rows((0..10).map(|i| vec![Value::Bool(i % 2 == 0)]))
            .unwrap();
        assert_eq!(written, 10);
        assert_eq!(writer.stats().bytes, 20);
    }
}
