//! Объявление схемы таблицы и её проверка.
//!
//! [`TableSchema`] описывает колонки в том виде, в каком их объявил
//! пользователь. [`validate`] превращает её в неизменяемую
//! [`ResolvedSchema`], которую затем разделяют кодировщик, декодер и
//! генератор format-файла.

pub mod types;
pub mod validate;

pub use types::{ColumnSpec, ResolvedColumn, ResolvedSchema, TableSchema};
pub use validate::{validate, MAX_COLUMN_NAME_CHARS};
