/// Atomic writing of the payload/format-file pair.
pub mod artifact;
/// Running the `bcp` utility: command line, process, batch loading.
pub mod bcp;
/// Settings loading (defaults, TOML file, `BCPNATIVE_*` environment).
pub mod config;
/// XML format file: generation, rendering, parsing.
pub mod format;
/// Logging setup (filters, formatting, sinks).
pub mod logging;
/// Native-format codec: type registry, field encoder, row serializer, reader.
pub mod native;
/// Table schema declaration and validation.
pub mod schema;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Artifact writer and its summary.
pub use artifact::{artifact_paths, ArtifactSummary, ArtifactWriter};
/// bcp invocation and batch loading.
pub use bcp::{bulk_insert_native, Authentication, BcpCommand, BcpOutput, BulkOutcome, NativeBulkInsert};
/// Error types from the shared error crate.
pub use bcpnative_error::{
    BcpProcessError, BcpResult, ErrorExt, NativeError, ResultExt, SettingsError, StackError,
    StatusCode,
};
/// Settings.
pub use config::BcpSettings;
/// Format file.
pub use format::{check_against_schema, generate, parse_xml, render_xml, write_xml, FormatField};
/// Logging.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Codec.
pub use native::{
    encode_field, serialize, FieldType, NativeReader, NativeWriter, Row, RowAccess, SqlType,
    Value, WriteStats,
};
/// Schema.
pub use schema::{validate, ColumnSpec, ResolvedColumn, ResolvedSchema, TableSchema};
