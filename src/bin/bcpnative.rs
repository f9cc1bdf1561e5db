//! CLI bcpnative
//!
//! Генерация format-файлов, запись native-payload, просмотр payload в
//! виде JSON lines и загрузка пакетов через `bcp`.

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use bcpnative::{
    artifact::ArtifactWriter,
    bcp::{bulk_insert_native, BulkOutcome},
    config::BcpSettings,
    format::{check_against_schema, generate, parse_xml, write_xml},
    logging::init_logging,
    native::{NativeReader, Row, Value},
    schema::{validate, ResolvedSchema, TableSchema},
};
use bcpnative_error::{BcpProcessError, ErrorExt, NativeError, SettingsError, StackError};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, error};

/// Аргументы командной строки.
#[derive(Parser)]
#[command(name = "bcpnative")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SQL Server bcp native-format writer and loader", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML-файл настроек
    #[arg(short, long, env = "BCPNATIVE_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Только ошибки
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Сгенерировать XML format-файл по схеме
    FormatFile {
        /// JSON-схема `{"columns": [...]}`
        #[arg(short, long)]
        schema: PathBuf,
        /// Куда записать; без параметра печатается в stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        collation: Option<String>,
    },
    /// Записать строки из JSON lines в `<base>.dat` и `<base>.xml`
    Encode {
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON lines, `-` для stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        /// Базовый путь артефактов
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        collation: Option<String>,
    },
    /// Прочитать native-payload и вывести строки как JSON lines
    Inspect {
        #[arg(short, long)]
        schema: PathBuf,
        /// Файл `.dat`
        payload: PathBuf,
        /// Сверить format-файл со схемой перед чтением
        #[arg(short, long)]
        format: Option<PathBuf>,
        /// Максимум строк для вывода
        #[arg(short = 'n', long)]
        limit: Option<u64>,
    },
    /// Записать артефакты и загрузить их через bcp
    Load {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        /// Целевая таблица, например `MyDb.dbo.MyTable`
        #[arg(short, long)]
        table: String,
        /// Базовый путь временных артефактов
        #[arg(short, long)]
        base: PathBuf,
        /// Сервер (`host,port`), переопределяет настройки
        #[arg(long)]
        server: Option<String>,
        /// Делить вход на пакеты по N строк (`<base>_<n>.dat`)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = BcpSettings::load(cli.config.as_deref()).context("Loading settings")?;
    if cli.quiet {
        settings.logging.level = "error".to_string();
    } else if cli.verbose {
        settings.logging.level = "debug".to_string();
    }

    let handle = init_logging(settings.logging.clone())
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;
    debug!(settings = ?settings, "Settings loaded");

    let result = handle_command(cli.command, settings);
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Command failed");
    }
    handle.shutdown();
    result
}

fn handle_command(
    command: Commands,
    mut settings: BcpSettings,
) -> Result<()> {
    match command {
        Commands::FormatFile {
            schema,
            output,
            collation,
        } => {
            let schema = load_schema(&schema)?;
            let collation = collation.unwrap_or(settings.collation);
            let fields = generate(&schema, &collation);
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Creating {}", path.display()))?;
                    let mut w = write_xml(BufWriter::new(file), &fields)?;
                    w.flush()?;
                }
                None => {
                    let mut w = write_xml(io::stdout().lock(), &fields)?;
                    w.flush()?;
                }
            }
            Ok(())
        }

        Commands::Encode {
            schema,
            input,
            output,
            collation,
        } => {
            let schema = load_schema(&schema)?;
            let summary = ArtifactWriter::with_base(&output)
                .collation(collation.unwrap_or(settings.collation))
                .try_write(&schema, read_rows(&input)?)?;
            println!(
                "{}",
                json!({
                    "payload": summary.payload_path.display().to_string(),
                    "descriptor": summary.descriptor_path.display().to_string(),
                    "rows": summary.rows,
                    "nulls": summary.nulls,
                    "payload_bytes": summary.payload_bytes,
                    "descriptor_bytes": summary.descriptor_bytes,
                })
            );
            Ok(())
        }

        Commands::Inspect {
            schema,
            payload,
            format,
            limit,
        } => {
            let schema = load_schema(&schema)?;
            if let Some(format) = format {
                let xml = fs::read_to_string(&format)
                    .with_context(|| format!("Reading {}", format.display()))?;
                let fields = parse_xml(&xml)?;
                check_against_schema(&fields, &schema)
                    .with_context(|| format!("{} does not match the schema", format.display()))?;
            }
            inspect(&schema, &payload, limit)
        }

        Commands::Load {
            schema,
            input,
            table,
            base,
            server,
            chunk_size,
        } => {
            if server.is_some() {
                settings.server = server;
            }
            let schema = load_schema(&schema)?;
            let rows = read_rows(&input)?.collect::<Result<Vec<_>>>()?;
            debug!(rows = rows.len(), input = %input.display(), "Rows read");

            match chunk_size {
                Some(0) => bail!("--chunk-size must be greater than zero"),
                Some(size) if !rows.is_empty() => {
                    for (n, chunk) in rows.chunks(size).enumerate() {
                        let batch = n as u64 + 1;
                        let mut chunk_base = base.clone().into_os_string();
                        chunk_base.push(format!("_{batch}"));
                        let outcome = bulk_insert_native(
                            &settings,
                            &schema,
                            chunk,
                            &table,
                            Path::new(&chunk_base),
                            Some(batch),
                        )?;
                        report_outcome(Some(batch), &outcome);
                    }
                }
                _ => {
                    let outcome =
                        bulk_insert_native(&settings, &schema, &rows, &table, &base, None)?;
                    report_outcome(None, &outcome);
                }
            }
            Ok(())
        }
    }
}

fn load_schema(path: &Path) -> Result<ResolvedSchema> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Reading schema {}", path.display()))?;
    let declared: TableSchema = serde_json::from_str(&text)
        .with_context(|| format!("Parsing schema {}", path.display()))?;
    Ok(validate(&declared)?)
}

/// Строки JSON lines: каждая строка это объект `{"column": value, ...}`.
///
/// Строки разбираются лениво, по мере чтения входа.
fn read_rows(path: &Path) -> Result<impl Iterator<Item = Result<Row>>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(io::stdin().lock()))
    } else {
        let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    Ok(reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| parse_row(index + 1, line).transpose()))
}

/// Пустые строки пропускаются (`Ok(None)`).
fn parse_row(
    line_no: usize,
    line: io::Result<String>,
) -> Result<Option<Row>> {
    let line = line.with_context(|| format!("Reading line {line_no}"))?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    let parsed: serde_json::Value =
        serde_json::from_str(&line).with_context(|| format!("Parsing line {line_no}"))?;
    let serde_json::Value::Object(object) = parsed else {
        bail!("line {line_no}: expected a JSON object");
    };
    let mut row = Row::with_capacity(object.len());
    for (column, json) in &object {
        let value = Value::from_json(json).ok_or_else(|| {
            anyhow!("line {line_no}: column '{column}' holds an array or object")
        })?;
        row.insert(column.clone(), value);
    }
    Ok(Some(row))
}

fn inspect(
    schema: &ResolvedSchema,
    payload: &Path,
    limit: Option<u64>,
) -> Result<()> {
    let file = File::open(payload).with_context(|| format!("Opening {}", payload.display()))?;
    let mut reader = NativeReader::new(BufReader::new(file), schema);
    let mut out = BufWriter::new(io::stdout().lock());

    let mut printed = 0u64;
    while limit.map_or(true, |max| printed < max) {
        let Some(values) = reader.read_row()? else {
            break;
        };
        let object: serde_json::Map<String, serde_json::Value> = schema
            .iter()
            .zip(&values)
            .map(|(column, value)| (column.name.clone(), value.to_json()))
            .collect();
        writeln!(out, "{}", serde_json::Value::Object(object))?;
        printed += 1;
    }
    out.flush()?;
    debug!(rows = printed, bytes = reader.offset(), "Payload inspected");
    Ok(())
}

fn report_outcome(
    batch: Option<u64>,
    outcome: &BulkOutcome,
) {
    let line = match outcome {
        BulkOutcome::Skipped => json!({ "batch": batch, "skipped": true }),
        BulkOutcome::Loaded { artifacts, output } => json!({
            "batch": batch,
            "rows": artifacts.rows,
            "payload_bytes": artifacts.payload_bytes,
            "rows_copied": output.rows_copied,
        }),
    };
    println!("{line}");
}

/// Код выхода: 2 для ошибок входных данных, 3 для окружения, 1 для прочих.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<StackError>() {
            return e.status_code().exit_code();
        }
        if let Some(e) = cause.downcast_ref::<NativeError>() {
            return e.status_code().exit_code();
        }
        if let Some(e) = cause.downcast_ref::<BcpProcessError>() {
            return e.status_code().exit_code();
        }
        if let Some(e) = cause.downcast_ref::<SettingsError>() {
            return e.status_code().exit_code();
        }
        if cause.is::<serde_json::Error>() {
            return 2;
        }
    }
    1
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row() {
        let row = parse_row(1, Ok(r#"{"id": 1, "name": null}"#.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::Null));

        assert!(parse_row(2, Ok("   ".to_string())).unwrap().is_none());

        let err = parse_row(3, Ok("[1, 2]".to_string())).unwrap_err();
        assert!(err.to_string().contains("line 3"));

        let err = parse_row(4, Ok("{oops".to_string())).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_encode_stops_at_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.jsonl");
        fs::write(&input, "{\"id\": 1, \"name\": \"ab\"}\n\n{bad json\n").unwrap();
        let schema = validate(
            &TableSchema::new().column("id", "INT").sized_column("name", "VARCHAR", 5),
        )
        .unwrap();

        let err = ArtifactWriter::with_base(dir.path().join("out"))
            .try_write(&schema, read_rows(&input).unwrap())
            .unwrap_err();
        assert!(format!("{err:#}").contains("Parsing line 3"));
        assert_eq!(exit_code(&err), 2);
        assert!(!dir.path().join("out.dat").exists());
        assert!(!dir.path().join("out.xml").exists());
    }
}
