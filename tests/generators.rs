//! Генераторы proptest для схем и строк native-формата.

#![allow(dead_code)]

use bcpnative::{
    native::SqlType,
    schema::{validate, ColumnSpec, ResolvedSchema, TableSchema},
    Value,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use proptest::{collection::vec, prelude::*};

/// Объявление колонки случайного типа.
pub fn arb_column_type() -> impl Strategy<Value = (String, Option<u32>)> {
    prop_oneof![
        Just(("TINYINT".to_string(), None)),
        Just(("SMALLINT".to_string(), None)),
        Just(("INT".to_string(), None)),
        Just(("BIGINT".to_string(), None)),
        Just(("BIT".to_string(), None)),
        Just(("FLOAT".to_string(), None)),
        Just(("REAL".to_string(), None)),
        Just(("DATE".to_string(), None)),
        Just(("DATETIME2".to_string(), None)),
        (1u32..=40).prop_map(|n| ("VARCHAR".to_string(), Some(n))),
        (1u32..=40).prop_map(|n| ("NVARCHAR".to_string(), Some(n))),
        Just(("GEOMETRY".to_string(), None)),
    ]
}

/// Типы без переменной части.
pub fn arb_fixed_column_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("TINYINT"),
        Just("SMALLINT"),
        Just("INT"),
        Just("BIGINT"),
        Just("BIT"),
        Just("FLOAT"),
        Just("REAL"),
        Just("DATE"),
        Just("DATETIME2"),
    ]
    .prop_map(str::to_string)
}

fn to_schema(types: Vec<(String, Option<u32>)>) -> ResolvedSchema {
    let columns = types
        .into_iter()
        .enumerate()
        .map(|(i, (type_name, max_length))| ColumnSpec {
            name: format!("c{i}"),
            type_name,
            max_length,
        })
        .collect();
    validate(&TableSchema { columns }).expect("generated schema must be valid")
}

pub fn arb_schema() -> impl Strategy<Value = ResolvedSchema> {
    vec(arb_column_type(), 1..8).prop_map(to_schema)
}

pub fn arb_fixed_schema() -> impl Strategy<Value = ResolvedSchema> {
    vec(arb_fixed_column_type().prop_map(|t| (t, None)), 1..8).prop_map(to_schema)
}

pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
    // 0001-01-01 ..= 9999-12-31
    (1i32..=3_652_059).prop_map(|d| NaiveDate::from_num_days_from_ce_opt(d).unwrap())
}

pub fn arb_datetime() -> impl Strategy<Value = NaiveDateTime> {
    (arb_date(), 0u64..864_000_000_000).prop_map(|(date, ticks)| {
        let secs = (ticks / 10_000_000) as u32;
        let nanos = (ticks % 10_000_000) as u32 * 100;
        date.and_time(NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap())
    })
}

/// Значение, которое кодировщик примет для `sql_type` и декодер вернёт
/// без изменений.
pub fn arb_value_for(sql_type: SqlType) -> BoxedStrategy<Value> {
    let value = match sql_type {
        SqlType::TinyInt => (0i64..=255).prop_map(Value::Int).boxed(),
        SqlType::SmallInt => any::<i16>().prop_map(|v| Value::Int(v.into())).boxed(),
        SqlType::Int => any::<i32>().prop_map(|v| Value::Int(v.into())).boxed(),
        SqlType::BigInt => any::<i64>().prop_map(Value::Int).boxed(),
        SqlType::Bit => any::<bool>().prop_map(Value::Bool).boxed(),
        SqlType::Float => (-1e300f64..1e300).prop_map(Value::Float).boxed(),
        SqlType::Real => (-1e30f32..1e30)
            .prop_map(|v| Value::Float(f64::from(v)))
            .boxed(),
        SqlType::Date => arb_date().prop_map(Value::Date).boxed(),
        SqlType::DateTime2 => arb_datetime().prop_map(Value::DateTime).boxed(),
        SqlType::VarChar { max_length } => vec(any::<u8>(), 0..=max_length as usize)
            .prop_map(|bytes| Value::Text(bytes.into_iter().map(char::from).collect()))
            .boxed(),
        // не больше двух UTF-16 единиц на символ
        SqlType::NVarChar { max_length } => vec(any::<char>(), 0..=(max_length / 2) as usize)
            .prop_map(|chars| Value::Text(chars.into_iter().collect()))
            .boxed(),
        SqlType::Geometry => vec(any::<u8>(), 0..64).prop_map(Value::Bytes).boxed(),
    };
    prop_oneof![1 => Just(Value::Null), 4 => value].boxed()
}

pub fn arb_row(schema: &ResolvedSchema) -> BoxedStrategy<Vec<Value>> {
    let fields: Vec<_> = schema.iter().map(|c| arb_value_for(c.sql_type)).collect();
    fields.boxed()
}

/// Схема вместе со строками для неё.
pub fn arb_rows(
    schema: impl Strategy<Value = ResolvedSchema>,
    max_rows: usize,
) -> impl Strategy<Value = (ResolvedSchema, Vec<Vec<Value>>)> {
    schema.prop_flat_map(move |schema| {
        let rows = vec(arb_row(&schema), 0..max_rows);
        (Just(schema), rows)
    })
}
