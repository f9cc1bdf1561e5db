use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::native::registry::{EncodingRule, SqlType};

/// Объявленная (непроверенная) колонка.
///
/// В JSON имя типа хранится в поле `type`:
/// `{"name": "title", "type": "VARCHAR", "max_length": 100}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", alias = "type_name")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Упорядоченный список колонок. Порядок задаёт порядок полей в payload и
/// в format-файле.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

/// Колонка после проверки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Позиция в схеме, начиная с нуля
    pub ordinal: usize,
    pub name: String,
    pub sql_type: SqlType,
    pub rule: EncodingRule,
}

/// Проверенная схема. Клонирование дешёвое.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    columns: Arc<[ResolvedColumn]>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ColumnSpec {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            max_length: None,
        }
    }

    pub fn with_max_length(
        mut self,
        max_length: u32,
    ) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет колонку фиксированного типа.
    pub fn column(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.columns.push(ColumnSpec::new(name, type_name));
        self
    }

    /// Добавляет строковую колонку с длиной.
    pub fn sized_column(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        max_length: u32,
    ) -> Self {
        self.columns
            .push(ColumnSpec::new(name, type_name).with_max_length(max_length));
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ResolvedSchema {
    pub(crate) fn from_columns(columns: Vec<ResolvedColumn>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedColumn> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Колонка по точному имени.
    pub fn column(
        &self,
        name: &str,
    ) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Размер непустой строки в байтах, если все колонки фиксированной
    /// ширины.
    pub fn fixed_row_len(&self) -> Option<usize> {
        self.columns
            .iter()
            .map(|c| c.rule.fixed_field_len())
            .sum()
    }
}

impl FromIterator<ColumnSpec> for TableSchema {
    fn from_iter<I: IntoIterator<Item = ColumnSpec>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResolvedSchema {
    type Item = &'a ResolvedColumn;
    type IntoIter = std::slice::Iter<'a, ResolvedColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
