use std::collections::HashSet;

use bcpnative_error::NativeError;
use tracing::debug;

use super::types::{ResolvedColumn, ResolvedSchema, TableSchema};
use crate::native::registry;

/// Максимальная длина идентификатора SQL Server.
pub const MAX_COLUMN_NAME_CHARS: usize = 128;

/// Проверяет схему и разрешает типы колонок.
///
/// Ошибки: пустая схема, пустое или слишком длинное имя колонки, повтор
/// имени (без учёта регистра, как в SQL Server с CI-коллацией), неизвестный
/// тип, отсутствующая или недопустимая длина строкового типа.
pub fn validate(schema: &TableSchema) -> Result<ResolvedSchema, NativeError> {
    if schema.columns.is_empty() {
        return Err(NativeError::EmptySchema);
    }

    let mut seen = HashSet::with_capacity(schema.columns.len());
    let mut resolved = Vec::with_capacity(schema.columns.len());

    for (ordinal, spec) in schema.columns.iter().enumerate() {
        check_name(&spec.name)?;

        if !seen.insert(spec.name.to_lowercase()) {
            return Err(NativeError::DuplicateColumn {
                column: spec.name.clone(),
            });
        }

        let sql_type = registry::resolve(&spec.type_name, spec.max_length)
            .map_err(|e| e.with_column(spec.name.as_str()))?;
        let rule = sql_type.rule();

        debug!(
            column = %spec.name,
            ordinal,
            sql_type = %sql_type,
            prefix_length = rule.prefix_length,
            "Column resolved"
        );

        resolved.push(ResolvedColumn {
            ordinal,
            name: spec.name.clone(),
            sql_type,
            rule,
        });
    }

    Ok(ResolvedSchema::from_columns(resolved))
}

fn check_name(name: &str) -> Result<(), NativeError> {
    let reason = if name.trim().is_empty() {
        "name must not be empty"
    } else if name.chars().count() > MAX_COLUMN_NAME_CHARS {
        "name is longer than 128 characters"
    } else if name.chars().any(char::is_control) {
        "name contains control characters"
    } else {
        return Ok(());
    };

    Err(NativeError::InvalidColumnName {
        column: name.to_string(),
        reason: reason.to_string(),
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
