//! Property-based тесты native-кодека
//!
//! Случайные схемы и строки проходят через `NativeWriter` и обратно через
//! `NativeReader`; для схем только из фиксированных типов проверяется
//! длина payload.

use bcpnative::{
    format::{generate, DEFAULT_COLLATION},
    native::{DataWidth, NativeReader, NativeWriter},
    Value,
};
use proptest::prelude::*;

mod generators;
use generators::*;

const PROPTEST_CASES: u32 = 256;

fn encode_rows(
    schema: &bcpnative::ResolvedSchema,
    rows: &[Vec<Value>],
) -> Vec<u8> {
    let mut writer = NativeWriter::new(Vec::new(), schema);
    writer.write_rows(rows).unwrap();
    writer.finish().unwrap().0
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROPTEST_CASES,
        .. ProptestConfig::default()
    })]

    /// Любые допустимые строки читаются обратно без изменений.
    #[test]
    fn prop_round_trip((schema, rows) in arb_rows(arb_schema(), 16)) {
        let payload = encode_rows(&schema, &rows);

        let decoded: Vec<Vec<Value>> = NativeReader::new(payload.as_slice(), &schema)
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(decoded, rows);
    }

    /// Для фиксированных типов длина payload = N × Σ(префикс + ширина).
    #[test]
    fn prop_fixed_width_length((schema, rows) in arb_rows(arb_fixed_schema(), 16)) {
        let payload = encode_rows(&schema, &rows);

        let row_len: usize = schema
            .iter()
            .map(|c| match c.rule.data {
                DataWidth::Fixed(width) => usize::from(c.rule.prefix_length) + usize::from(width),
                DataWidth::Variable { .. } => unreachable!("fixed schema"),
            })
            .sum();
        prop_assert_eq!(schema.fixed_row_len(), Some(row_len));
        prop_assert_eq!(payload.len(), rows.len() * row_len);
    }

    /// Format-файл описывает те же префиксы и тот же порядок полей.
    #[test]
    fn prop_descriptor_matches_rules(schema in arb_schema()) {
        let fields = generate(&schema, DEFAULT_COLLATION);
        prop_assert_eq!(fields.len(), schema.len());
        for (field, column) in fields.iter().zip(schema.iter()) {
            prop_assert_eq!(field.ordinal as usize, column.ordinal + 1);
            prop_assert_eq!(field.prefix_length, column.rule.prefix_length);
            prop_assert_eq!(field.field_type, column.rule.field_type);
            prop_assert_eq!(&field.column_name, &column.name);
        }
    }

    /// Строка из одних NULL состоит только из маркеров.
    #[test]
    fn prop_null_row_is_markers(schema in arb_schema()) {
        let row = vec![Value::Null; schema.len()];
        let payload = encode_rows(&schema, &[row]);

        let expected: Vec<u8> = schema
            .iter()
            .flat_map(|c| c.rule.null_marker().to_vec())
            .collect();
        prop_assert_eq!(payload, expected);
    }
}
