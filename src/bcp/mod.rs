//! Запуск утилиты `bcp` для загрузки native-артефактов.

pub mod bulk;
pub mod command;

pub use bulk::{bulk_insert_native, BulkOutcome, NativeBulkInsert};
pub use command::{parse_rows_copied, Authentication, BcpCommand, BcpOutput};
