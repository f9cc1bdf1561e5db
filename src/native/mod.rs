//! Native-формат `bcp`: реестр типов, кодировщик полей, потоковый
//! сериализатор строк и эталонный декодер.

pub mod decode;
pub mod encode;
pub mod geometry;
pub mod registry;
pub mod row;
pub mod serialize;
pub mod temporal;
pub mod value;

pub use decode::NativeReader;
pub use encode::{encode_field, encode_to_vec};
pub use registry::{resolve, DataWidth, EncodingRule, FieldType, SqlType};
pub use row::{Row, RowAccess};
pub use serialize::{serialize, NativeWriter, WriteStats};
pub use value::Value;
