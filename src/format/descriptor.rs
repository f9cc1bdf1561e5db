use bcpnative_error::NativeError;

use crate::{
    native::registry::{DataWidth, FieldType},
    schema::ResolvedSchema,
};

/// Коллация строковых полей по умолчанию.
pub const DEFAULT_COLLATION: &str = "SQL_Latin1_General_CP1_CI_AS";

/// Описание одного поля format-файла: пара `<FIELD>` + `<COLUMN>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatField {
    /// Номер поля (`ID` / `SOURCE`), начиная с 1
    pub ordinal: u32,
    pub prefix_length: u8,
    pub field_type: FieldType,
    /// `MAX_LENGTH` в байтах, только для строковых полей
    pub max_length: Option<u32>,
    pub collation: Option<String>,
    /// В native-формате всегда `None`
    pub terminator: Option<Vec<u8>>,
    pub column_name: String,
    pub column_type: String,
}

/// Строит описание полей из проверенной схемы.
///
/// Ширина префикса и тип поля берутся из того же правила, по которому
/// кодируются данные.
pub fn generate(
    schema: &ResolvedSchema,
    collation: &str,
) -> Vec<FormatField> {
    schema
        .iter()
        .map(|column| {
            let rule = column.rule;
            let is_text = matches!(
                rule.field_type,
                FieldType::CharPrefix | FieldType::NCharPrefix
            );
            let max_length = match (is_text, rule.data) {
                (true, DataWidth::Variable { max_bytes }) => Some(max_bytes),
                _ => None,
            };

            FormatField {
                ordinal: column.ordinal as u32 + 1,
                prefix_length: rule.prefix_length,
                field_type: rule.field_type,
                max_length,
                collation: is_text.then(|| collation.to_string()),
                terminator: None,
                column_name: column.name.clone(),
                column_type: rule.column_type.to_string(),
            }
        })
        .collect()
}

/// Проверяет, что format-файл описывает ту же раскладку, что и схема:
/// порядок, имена, ширина префиксов, типы полей и колонок, длины.
pub fn check_against_schema(
    fields: &[FormatField],
    schema: &ResolvedSchema,
) -> Result<(), NativeError> {
    if fields.len() != schema.len() {
        return Err(mismatch(format!(
            "format file has {} fields, schema has {} columns",
            fields.len(),
            schema.len()
        )));
    }

    // коллация не влияет на раскладку байт
    for (field, expected) in fields.iter().zip(generate(schema, "")) {
        let same = field.ordinal == expected.ordinal
            && field.prefix_length == expected.prefix_length
            && field.field_type == expected.field_type
            && field.max_length == expected.max_length
            && field.terminator.is_none()
            && field.column_name == expected.column_name
            && field.column_type == expected.column_type;
        if !same {
            return Err(mismatch(format!(
                "field {} ('{}') differs from column '{}' ({} prefix {})",
                field.ordinal,
                field.column_name,
                expected.column_name,
                expected.column_type,
                expected.prefix_length
            )));
        }
    }
    Ok(())
}

fn mismatch(reason: String) -> NativeError {
    NativeError::Corrupted {
        reason,
        offset: None,
        column: None,
        row: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, TableSchema};

    fn schema() -> ResolvedSchema {
        validate(
            &TableSchema::new()
                .column("id", "INT")
                .sized_column("name", "VARCHAR", 5)
                .sized_column("title", "NVARCHAR", 20)
                .column("shape", "GEOMETRY"),
        )
        .unwrap()
    }

    #[test]
    fn test_generate() {
        let fields = generate(&schema(), DEFAULT_COLLATION);
        assert_eq!(fields.len(), 4);

        let prefixes: Vec<_> = fields.iter().map(|f| f.prefix_length).collect();
        assert_eq!(prefixes, [1, 2, 2, 4]);

        assert_eq!(fields[0].ordinal, 1);
        assert_eq!(fields[0].max_length, None);
        assert_eq!(fields[0].collation, None);
        assert_eq!(fields[1].max_length, Some(5));
        assert_eq!(fields[1].collation.as_deref(), Some(DEFAULT_COLLATION));
        assert_eq!(fields[2].field_type, FieldType::NCharPrefix);
        assert_eq!(fields[2].max_length, Some(40));
        assert_eq!(fields[3].field_type, FieldType::NativePrefix);
        assert_eq!(fields[3].column_type, "SQLUDT");
        assert_eq!(fields[3].max_length, None);
        assert!(fields.iter().all(|f| f.terminator.is_none()));
    }

    #[test]
    fn test_check_against_schema() {
        let schema = schema();
        let mut fields = generate(&schema, "Latin1_General_100_CI_AS");
        assert!(check_against_schema(&fields, &schema).is_ok());

        fields[1].prefix_length = 1;
        assert!(check_against_schema(&fields, &schema).is_err());

        fields.pop();
        let err = check_against_schema(&fields, &schema).unwrap_err();
        assert!(err.to_string().contains("3 fields"));
    }
}
