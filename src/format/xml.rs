//! Чтение и запись XML format-файла `bcp`.

use std::{collections::BTreeMap, io::Write};

use bcpnative_error::NativeError;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Reader, Writer,
};

use super::descriptor::FormatField;
use crate::native::registry::FieldType;

pub const BULKLOAD_NAMESPACE: &str = "http://schemas.microsoft.com/sqlserver/2004/bulkload/format";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Записывает format-файл в `w`.
pub fn write_xml<W: Write>(
    w: W,
    fields: &[FormatField],
) -> Result<W, NativeError> {
    let mut writer = Writer::new_with_indent(w, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(write_error)?;

    let mut root = BytesStart::new("BCPFORMAT");
    root.push_attribute(("xmlns", BULKLOAD_NAMESPACE));
    root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
    writer.write_event(Event::Start(root)).map_err(write_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("RECORD")))
        .map_err(write_error)?;
    for field in fields {
        let id = field.ordinal.to_string();
        let prefix = field.prefix_length.to_string();
        let mut element = BytesStart::new("FIELD");
        element.push_attribute(("ID", id.as_str()));
        element.push_attribute(("xsi:type", field.field_type.as_str()));
        element.push_attribute(("PREFIX_LENGTH", prefix.as_str()));
        if let Some(max_length) = field.max_length {
            element.push_attribute(("MAX_LENGTH", max_length.to_string().as_str()));
        }
        if let Some(collation) = &field.collation {
            element.push_attribute(("COLLATION", collation.as_str()));
        }
        writer.write_event(Event::Empty(element)).map_err(write_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("RECORD")))
        .map_err(write_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("ROW")))
        .map_err(write_error)?;
    for field in fields {
        let source = field.ordinal.to_string();
        let mut element = BytesStart::new("COLUMN");
        element.push_attribute(("SOURCE", source.as_str()));
        element.push_attribute(("NAME", field.column_name.as_str()));
        element.push_attribute(("xsi:type", field.column_type.as_str()));
        writer.write_event(Event::Empty(element)).map_err(write_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("ROW")))
        .map_err(write_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("BCPFORMAT")))
        .map_err(write_error)?;

    let mut w = writer.into_inner();
    w.write_all(b"\n")
        .map_err(|e| NativeError::io("writing format file", None, e))?;
    Ok(w)
}

/// Возвращает format-файл строкой.
pub fn render_xml(fields: &[FormatField]) -> Result<String, NativeError> {
    let bytes = write_xml(Vec::new(), fields)?;
    String::from_utf8(bytes).map_err(write_error)
}

/// Разбирает format-файл обратно в список полей (упорядочен по `ID`).
pub fn parse_xml(xml: &str) -> Result<Vec<FormatField>, NativeError> {
    let mut reader = Reader::from_str(xml);

    let mut record: BTreeMap<u32, FormatField> = BTreeMap::new();
    let mut columns: BTreeMap<u32, (String, String)> = BTreeMap::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"FIELD" => {
                    let attrs = attributes(e, position)?;
                    let id = number::<u32>(&attrs, "ID", position)?;
                    let field_type = required(&attrs, "xsi:type", position)?;
                    let field_type = FieldType::parse(field_type).ok_or_else(|| {
                        corrupted(format!("unsupported FIELD type '{field_type}'"), position)
                    })?;
                    let field = FormatField {
                        ordinal: id,
                        prefix_length: number::<u8>(&attrs, "PREFIX_LENGTH", position)?,
                        field_type,
                        max_length: match attrs.get("MAX_LENGTH") {
                            Some(_) => Some(number::<u32>(&attrs, "MAX_LENGTH", position)?),
                            None => None,
                        },
                        collation: attrs.get("COLLATION").cloned(),
                        terminator: attrs.get("TERMINATOR").map(|t| t.as_bytes().to_vec()),
                        column_name: String::new(),
                        column_type: String::new(),
                    };
                    if record.insert(id, field).is_some() {
                        return Err(corrupted(format!("duplicate FIELD ID {id}"), position));
                    }
                }
                b"COLUMN" => {
                    let attrs = attributes(e, position)?;
                    let source = number::<u32>(&attrs, "SOURCE", position)?;
                    let name = required(&attrs, "NAME", position)?.to_string();
                    let column_type = required(&attrs, "xsi:type", position)?.to_string();
                    if columns.insert(source, (name, column_type)).is_some() {
                        return Err(corrupted(
                            format!("duplicate COLUMN SOURCE {source}"),
                            position,
                        ));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(corrupted(format!("malformed XML: {e}"), position)),
        }
    }

    if record.len() != columns.len() {
        return Err(corrupted(
            format!(
                "{} FIELD elements but {} COLUMN elements",
                record.len(),
                columns.len()
            ),
            xml.len() as u64,
        ));
    }

    record
        .into_iter()
        .map(|(id, mut field)| {
            let (name, column_type) = columns
                .remove(&id)
                .ok_or_else(|| corrupted(format!("FIELD {id} has no COLUMN"), xml.len() as u64))?;
            field.column_name = name;
            field.column_type = column_type;
            Ok(field)
        })
        .collect()
}

fn attributes(
    e: &BytesStart<'_>,
    position: u64,
) -> Result<BTreeMap<String, String>, NativeError> {
    let mut map = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| corrupted(format!("bad attribute: {err}"), position))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| corrupted(format!("bad attribute value: {err}"), position))?
            .to_string();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<'a>(
    attrs: &'a BTreeMap<String, String>,
    key: &str,
    position: u64,
) -> Result<&'a str, NativeError> {
    attrs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| corrupted(format!("missing attribute {key}"), position))
}

fn number<T: std::str::FromStr>(
    attrs: &BTreeMap<String, String>,
    key: &str,
    position: u64,
) -> Result<T, NativeError> {
    let raw = required(attrs, key, position)?;
    raw.parse()
        .map_err(|_| corrupted(format!("attribute {key}='{raw}' is not a number"), position))
}

fn corrupted(
    reason: String,
    offset: u64,
) -> NativeError {
    NativeError::Corrupted {
        reason,
        offset: Some(offset),
        column: None,
        row: None,
    }
}

fn write_error<E: std::fmt::Display>(e: E) -> NativeError {
    NativeError::Io {
        operation: "writing format file".to_string(),
        path: None,
        kind: std::io::ErrorKind::Other,
        reason: e.to_string(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
