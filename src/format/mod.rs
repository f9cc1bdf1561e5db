//! XML format-файл для загрузки native-payload через `bcp -f`.

pub mod descriptor;
pub mod xml;

pub use descriptor::{check_against_schema, generate, FormatField, DEFAULT_COLLATION};
pub use xml::{parse_xml, render_xml, write_xml};
