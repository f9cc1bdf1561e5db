//! Сквозные тесты: схема → строки → файлы на диске → обратное чтение.

use std::fs;

use bcpnative::{
    artifact::ArtifactWriter,
    format::{check_against_schema, parse_xml},
    native::{encode_to_vec, NativeReader},
    row,
    schema::{validate, ResolvedSchema, TableSchema},
    NativeError, Value,
};
use chrono::NaiveDate;
use quick_xml::{events::Event, Reader};
use tempfile::tempdir;

fn reference_schema() -> ResolvedSchema {
    validate(&TableSchema::new().column("id", "INT").sized_column("name", "VARCHAR", 5)).unwrap()
}

/// Пары (`PREFIX_LENGTH`, `xsi:type`) из элементов `FIELD`.
fn field_prefixes(xml: &str) -> Vec<(u8, String)> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Empty(e) if e.name().as_ref() == b"FIELD" => {
                let mut prefix = None;
                let mut kind = None;
                for attr in e.attributes() {
                    let attr = attr.unwrap();
                    let value = attr.unescape_value().unwrap().to_string();
                    match attr.key.as_ref() {
                        b"PREFIX_LENGTH" => prefix = Some(value.parse().unwrap()),
                        b"xsi:type" => kind = Some(value),
                        _ => {}
                    }
                }
                out.push((prefix.unwrap(), kind.unwrap()));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out
}

#[test]
fn test_reference_batch_on_disk() {
    let dir = tempdir().unwrap();
    let schema = reference_schema();
    let rows = vec![
        row! { "id" => 1, "name" => "ab" },
        row! { "id" => Value::Null, "name" => Value::Null },
    ];

    let summary = ArtifactWriter::with_base(dir.path().join("batch_1"))
        .write(&schema, &rows)
        .unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.nulls, 2);

    let payload = fs::read(dir.path().join("batch_1.dat")).unwrap();
    assert_eq!(
        payload,
        [0x04, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x61, 0x62, 0xFF, 0xFF, 0xFF]
    );

    let xml = fs::read_to_string(dir.path().join("batch_1.xml")).unwrap();
    assert_eq!(
        field_prefixes(&xml),
        [(1, "NativePrefix".to_string()), (2, "CharPrefix".to_string())]
    );
    check_against_schema(&parse_xml(&xml).unwrap(), &schema).unwrap();

    let decoded: Vec<_> = NativeReader::new(payload.as_slice(), &schema)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        decoded,
        [
            vec![Value::Int(1), Value::Text("ab".into())],
            vec![Value::Null, Value::Null]
        ]
    );
}

#[test]
fn test_every_type_through_files() {
    let dir = tempdir().unwrap();
    let schema = validate(
        &TableSchema::new()
            .column("t", "TINYINT")
            .column("s", "SMALLINT")
            .column("i", "INT")
            .column("b", "BIGINT")
            .column("flag", "BIT")
            .column("f", "FLOAT")
            .column("r", "REAL")
            .column("d", "DATE")
            .column("ts", "DATETIME2")
            .sized_column("v", "VARCHAR", 10)
            .sized_column("nv", "NVARCHAR", 10)
            .column("g", "GEOMETRY"),
    )
    .unwrap();

    let ts = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_micro_opt(13, 45, 30, 123_456)
        .unwrap();
    let full = row! {
        "t" => 255,
        "s" => -2,
        "i" => 42,
        "b" => i64::MIN,
        "flag" => true,
        "f" => 2.5,
        "r" => 0.5f32,
        "d" => NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        "ts" => ts,
        "v" => "café",
        "nv" => "привет 🌍",
        "g" => "0x0102",
    };
    let empty = row! {
        "t" => Value::Null, "s" => Value::Null, "i" => Value::Null, "b" => Value::Null,
        "flag" => Value::Null, "f" => Value::Null, "r" => Value::Null, "d" => Value::Null,
        "ts" => Value::Null, "v" => Value::Null, "nv" => Value::Null, "g" => Value::Null,
    };

    let summary = ArtifactWriter::with_base(dir.path().join("all"))
        .write(&schema, [&full, &empty])
        .unwrap();
    assert_eq!(summary.nulls, 12);

    let xml = fs::read_to_string(&summary.descriptor_path).unwrap();
    let prefixes: Vec<u8> = field_prefixes(&xml).into_iter().map(|(p, _)| p).collect();
    assert_eq!(prefixes, [1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 4]);
    assert!(xml.contains(r#"NAME="g" xsi:type="SQLUDT""#));
    assert!(xml.contains(r#"MAX_LENGTH="20""#));

    let payload = fs::read(&summary.payload_path).unwrap();
    let rows: Vec<_> = NativeReader::new(payload.as_slice(), &schema)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows[0],
        [
            Value::Int(255),
            Value::Int(-2),
            Value::Int(42),
            Value::Int(i64::MIN),
            Value::Bool(true),
            Value::Float(2.5),
            Value::Float(0.5),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            Value::DateTime(ts),
            Value::Text("café".into()),
            Value::Text("привет 🌍".into()),
            Value::Bytes(vec![1, 2]),
        ]
    );
    assert!(rows[1].iter().all(Value::is_null));

    // нулевая строка: 9 × FF, FFFF, FFFF, FFFFFFFF
    let null_row = &payload[payload.len() - 17..];
    assert!(null_row.iter().all(|&b| b == 0xFF));
}

#[test]
fn test_golden_vectors() {
    let schema = validate(
        &TableSchema::new()
            .column("d", "DATE")
            .column("ts", "DATETIME2")
            .column("g", "GEOMETRY"),
    )
    .unwrap();
    let date = &schema.columns()[0];
    let datetime = &schema.columns()[1];
    let geometry = &schema.columns()[2];

    let cases = [
        (NaiveDate::from_ymd_opt(1, 1, 1).unwrap(), "03000000"),
        (NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), "0353460B"),
        (NaiveDate::from_ymd_opt(9999, 12, 31).unwrap(), "03DAB937"),
    ];
    for (d, expected) in cases {
        assert_eq!(
            hex::encode_upper(encode_to_vec(&Value::Date(d), date).unwrap()),
            expected,
            "{d}"
        );
    }

    let ts = Value::Text("2024-01-15T13:45:30.123456".into());
    assert_eq!(
        hex::encode_upper(encode_to_vec(&ts, datetime).unwrap()),
        "08800F41527353460B"
    );

    assert_eq!(
        encode_to_vec(&Value::Null, geometry).unwrap(),
        [0xFF, 0xFF, 0xFF, 0xFF]
    );
    let raw = encode_to_vec(&Value::Bytes(vec![0xE6, 0x10]), geometry).unwrap();
    let hex_text = encode_to_vec(&Value::from("0xE610"), geometry).unwrap();
    let bare = encode_to_vec(&Value::from("e6 10"), geometry).unwrap();
    assert_eq!(raw, [0x02, 0x00, 0x00, 0x00, 0xE6, 0x10]);
    assert_eq!(raw, hex_text);
    assert_eq!(raw, bare);
}

#[test]
fn test_failed_batch_leaves_no_files() {
    let dir = tempdir().unwrap();
    let schema = reference_schema();
    let rows = vec![
        row! { "id" => 1, "name" => "ok" },
        row! { "id" => 2 },
    ];

    let err = ArtifactWriter::with_base(dir.path().join("broken"))
        .write(&schema, &rows)
        .unwrap_err();
    assert!(matches!(
        err,
        NativeError::MissingColumn { ref column, row: Some(1) } if column == "name"
    ));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_truncated_payload_is_reported() {
    let schema = reference_schema();
    let payload = [0x04, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x61];

    let mut reader = NativeReader::new(&payload[..], &schema);
    let err = reader.read_row().unwrap_err();
    match err {
        NativeError::Corrupted { offset, column, .. } => {
            assert_eq!(offset, Some(5));
            assert_eq!(column.as_deref(), Some("name"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
