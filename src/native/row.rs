use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
};

use super::value::Value;
use crate::schema::ResolvedColumn;

/// Строка с доступом по имени колонки. Лишние ключи игнорируются.
pub type Row = HashMap<String, Value>;

/// Доступ к значению колонки внутри строки.
///
/// `None` означает, что строка вообще не содержит колонку (ошибка
/// `MissingColumn`); явный null передаётся как `Some(&Value::Null)`.
pub trait RowAccess {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value>;
}

impl<S: BuildHasher> RowAccess for HashMap<String, Value, S> {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        self.get(&column.name)
    }
}

impl RowAccess for BTreeMap<String, Value> {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        self.get(&column.name)
    }
}

/// Позиционная строка: индекс равен порядковому номеру колонки в схеме.
impl RowAccess for [Value] {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        self.get(column.ordinal)
    }
}

impl RowAccess for Vec<Value> {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        self.as_slice().value_for(column)
    }
}

impl<const N: usize> RowAccess for [Value; N] {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        self.as_slice().value_for(column)
    }
}

impl<T: RowAccess + ?Sized> RowAccess for &T {
    fn value_for(
        &self,
        column: &ResolvedColumn,
    ) -> Option<&Value> {
        (**self).value_for(column)
    }
}

/// Собирает [`Row`] из пар `(имя, значение)`.
///
/// ```ignore
/// let row = row! { "id" => 1, "name" => "ab" };
/// ```
#[macro_export]
macro_rules! row {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut row = $crate::native::Row::new();
        $(
            row.insert(::std::string::String::from($name), $crate::native::Value::from($value));
        )*
        row
    }};
}
