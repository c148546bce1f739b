//! Interact CLI - Command-line interface for the Interact telemetry engine
//!
//! Commands:
//! - replay: Replay an interaction trace and write the emitted records (batch mode)
//! - run: Replay a trace streamed on stdin, writing records as they are emitted
//! - validate: Validate interaction trace schema
//! - doctor: Diagnose configuration and identity storage
//! - endpoint: Resolve the collector endpoint for a page
//! - schema: Print input/output schema information

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use interact_telemetry::config::EngineConfig;
use interact_telemetry::engine::Engine;
use interact_telemetry::environment::{EnvironmentProbe, StaticEnvironment, UserAgentProbe};
use interact_telemetry::identity::{resolve_visitor_id, FileIdentityStore, MemoryIdentityStore};
use interact_telemetry::page::PageSnapshot;
use interact_telemetry::record::OutgoingRecord;
use interact_telemetry::trace::{TraceAdapter, TraceReplayer, TraceValidationError, SCHEMA_VERSION};
use interact_telemetry::transport::{MemoryTransport, NdjsonTransport, Transport};
use interact_telemetry::{TelemetryError, ENGINE_VERSION, PRODUCER_NAME};

/// Interact - engagement telemetry engine
#[derive(Parser)]
#[command(name = "interact")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Replay page interaction traces into engagement records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace file and write the emitted records (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Replay a trace streamed on stdin (streaming mode)
    Run {
        #[command(flatten)]
        engine: EngineArgs,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate interaction trace schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and identity storage
    Doctor {
        /// Check engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check identity store file
        #[arg(long)]
        identity_file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the collector WebSocket endpoint for a page URL
    Endpoint {
        /// Page URL the engine runs on
        page_url: String,

        /// Engine configuration file ([collector] section)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the collector application key
        #[arg(long)]
        app_key: Option<String>,

        /// Use the development collector port
        #[arg(long)]
        dev: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

/// Options shared by the commands that build an engine
#[derive(Args)]
struct EngineArgs {
    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Visitor identifier (overrides the identity store)
    #[arg(long)]
    visitor_id: Option<String>,

    /// Identity store file; a visitor id is minted and saved if absent
    #[arg(long)]
    identity_file: Option<PathBuf>,

    /// User agent used for the first-emission environment snapshot
    #[arg(long)]
    user_agent: Option<String>,

    /// Referring page reported with the first emission
    #[arg(long)]
    referrer: Option<String>,

    /// Page URL until the trace provides one
    #[arg(long, default_value = "about:blank")]
    url: String,

    /// Viewport height until the trace provides a layout
    #[arg(long, default_value = "800")]
    viewport_height: f64,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (interact.trace.v1)
    Input,
    /// Output schema (emitted record)
    Output,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), InteractCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            engine,
        } => cmd_replay(&input, &output, input_format, output_format, &engine),

        Commands::Run { engine, flush } => cmd_run(&engine, flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            identity_file,
            json,
        } => cmd_doctor(config.as_deref(), identity_file.as_deref(), json),

        Commands::Endpoint {
            page_url,
            config,
            app_key,
            dev,
        } => cmd_endpoint(&page_url, config.as_deref(), app_key, dev),

        Commands::Schema { schema_type, json_schema } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    args: &EngineArgs,
) -> Result<(), InteractCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => TraceAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => TraceAdapter::parse_array(&input_data)?,
    };

    if events.is_empty() {
        return Err(InteractCliError::NoEvents);
    }
    TraceAdapter::ensure_valid(&events)?;

    let mut replayer = build_replayer(args, MemoryTransport::new())?;
    let records = replayer.replay(&events);
    log::info!("replayed {} events into {} records", events.len(), records.len());

    let output_data = format_output(&records, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(args: &EngineArgs, flush: bool) -> Result<(), InteractCliError> {
    let transport = NdjsonTransport::new(io::stdout()).flushing(flush);
    let mut replayer = build_replayer(args, transport)?;

    let stdin = io::stdin();
    let mut last_at: Option<u64> = None;

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let Some(event) = TraceAdapter::parse_line(&line, line_num + 1)? else {
            continue;
        };

        // Validate the event
        event.validate()?;
        if let Some(previous) = last_at.filter(|prev| event.at_ms < *prev) {
            return Err(InteractCliError::Validation(TraceValidationError::OutOfOrder {
                at_ms: event.at_ms,
                previous,
            }));
        }
        last_at = Some(event.at_ms);

        replayer.apply(&event);
    }

    log::info!(
        "stream closed after {} emissions",
        replayer.engine().emissions()
    );
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), InteractCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => TraceAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => TraceAdapter::parse_array(&input_data)?,
    };

    let results = TraceAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                at_ms: r.at_ms,
                event_type: events[r.index].kind.type_name().to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - {} at {} ms (index {}): {}",
                    err.event_type, err.at_ms, err.index, err.error
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(InteractCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    identity_file: Option<&Path>,
    json: bool,
) -> Result<(), InteractCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Interact version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        let check = match EngineConfig::from_file(config_path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (modules {:?}, emit interval {} ms, inactivity window {} ms)",
                    config.modules, config.min_emit_interval_ms, config.inactivity_window_ms
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    if let Some(identity_path) = identity_file {
        let check = if !identity_path.exists() {
            DoctorCheck {
                name: "identity".to_string(),
                status: CheckStatus::Warning,
                message: "Identity file does not exist; it will be created on first run"
                    .to_string(),
            }
        } else {
            match FileIdentityStore::open(identity_path) {
                Ok(store) => DoctorCheck {
                    name: "identity".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Identity file valid ({} entries)", store.len()),
                },
                Err(e) => DoctorCheck {
                    name: "identity".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Interact Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InteractCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_endpoint(
    page_url: &str,
    config: Option<&Path>,
    app_key: Option<String>,
    dev: bool,
) -> Result<(), InteractCliError> {
    let mut collector = match config {
        Some(path) => EngineConfig::from_file(path)?.collector,
        None => EngineConfig::default().collector,
    };
    if let Some(key) = app_key {
        collector.app_key = key;
    }
    if dev {
        collector.production = false;
    }

    println!("{}", collector.endpoint(page_url)?);
    Ok(())
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), InteractCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One JSON object per line with an `at_ms` page-clock time and a `type`:");
                println!();
                println!("- layout          viewport {{ scroll_y, height }}, sections [{{ id, name, top, height }}], optional url");
                println!("- pointer_move    a qualifying pointer interaction");
                println!("- scroll          scroll_y: the new viewport offset");
                println!("- transport_open  the collector connection is ready");
                println!("- tick            advance time only");
                println!("- unload          stop every timer");
                println!();
                println!("Event times must never decrease. Geometry is in CSS pixels, document space.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: emitted record");
                println!();
                println!("- uuid: durable visitor identifier");
                println!("- request_uuid: identifier of this emission");
                println!("- url: page URL at emission time");
                println!("- ts: engaged milliseconds since the previous emission (optional)");
                println!("- sections: [{{ nm, ts }}] dwell per section this window (optional)");
                println!("- browser, os, browser_type, browser_version, referrer: first emission only");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, InteractCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn build_replayer<T: Transport>(
    args: &EngineArgs,
    transport: T,
) -> Result<TraceReplayer<T>, InteractCliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let visitor_id = match (&args.visitor_id, &args.identity_file) {
        (Some(id), _) => id.clone(),
        (None, Some(path)) => {
            let mut store = FileIdentityStore::open(path)?;
            resolve_visitor_id(&mut store, &config.identity)
        }
        (None, None) => resolve_visitor_id(&mut MemoryIdentityStore::new(), &config.identity),
    };

    let probe: Box<dyn EnvironmentProbe> = match &args.user_agent {
        Some(ua) => Box::new(UserAgentProbe::new(ua.clone(), args.referrer.clone())),
        None => Box::new(StaticEnvironment(None)),
    };

    let engine = Engine::new(config, visitor_id, probe, transport)?;
    let page = PageSnapshot::new(args.url.clone(), args.viewport_height);
    Ok(TraceReplayer::new(engine, page))
}

fn format_output(records: &[OutgoingRecord], format: &OutputFormat) -> Result<String, InteractCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Interact page interaction trace event",
        "type": "object",
        "required": ["at_ms", "type"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "at_ms": { "type": "integer", "minimum": 0 },
            "type": {
                "type": "string",
                "enum": ["layout", "pointer_move", "scroll", "transport_open", "tick", "unload"]
            },
            "url": { "type": "string" },
            "viewport": {
                "type": "object",
                "required": ["height"],
                "properties": {
                    "scroll_y": { "type": "number", "minimum": 0 },
                    "height": { "type": "number", "minimum": 0 }
                }
            },
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "name", "top", "height"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "name": { "type": "string" },
                        "top": { "type": "number", "minimum": 0 },
                        "height": { "type": "number", "minimum": 0 }
                    }
                }
            },
            "scroll_y": { "type": "number", "minimum": 0 }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "interact.record",
        "description": "Interact engagement record",
        "type": "object",
        "required": ["uuid", "request_uuid", "url"],
        "properties": {
            "uuid": { "type": "string" },
            "request_uuid": { "type": "string" },
            "url": { "type": "string" },
            "ts": { "type": "integer", "minimum": 0 },
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["nm", "ts"],
                    "properties": {
                        "nm": { "type": "string" },
                        "ts": { "type": "integer", "minimum": 0 }
                    }
                }
            },
            "browser": { "type": "string" },
            "os": { "type": "string" },
            "browser_type": { "type": "string", "enum": ["browser", "bot"] },
            "browser_version": { "type": "string" },
            "referrer": { "type": "string" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum InteractCliError {
    Io(io::Error),
    Telemetry(TelemetryError),
    Json(serde_json::Error),
    Validation(TraceValidationError),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for InteractCliError {
    fn from(e: io::Error) -> Self {
        InteractCliError::Io(e)
    }
}

impl From<TelemetryError> for InteractCliError {
    fn from(e: TelemetryError) -> Self {
        InteractCliError::Telemetry(e)
    }
}

impl From<serde_json::Error> for InteractCliError {
    fn from(e: serde_json::Error) -> Self {
        InteractCliError::Json(e)
    }
}

impl From<TraceValidationError> for InteractCliError {
    fn from(e: TraceValidationError) -> Self {
        InteractCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InteractCliError> for CliError {
    fn from(e: InteractCliError) -> Self {
        match e {
            InteractCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InteractCliError::Telemetry(e) => telemetry_error(e),
            InteractCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InteractCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'interact validate' for details".to_string()),
            },
            InteractCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            InteractCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            InteractCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn telemetry_error(e: TelemetryError) -> CliError {
    let (code, hint) = match &e {
        TelemetryError::ConfigError(_) | TelemetryError::TomlError(_) => {
            ("CONFIG_ERROR", "Run 'interact doctor --config <file>' for details")
        }
        TelemetryError::ParseError(_) | TelemetryError::JsonError(_) => {
            ("PARSE_ERROR", "Ensure input matches interact.trace.v1 schema")
        }
        TelemetryError::InvalidTrace(_) => {
            ("VALIDATION_ERROR", "Run 'interact validate' for details")
        }
        TelemetryError::IdentityError(_) => {
            ("IDENTITY_ERROR", "Check or remove the identity file")
        }
        TelemetryError::UrlError(_) => ("URL_ERROR", "Pass an absolute page URL"),
        TelemetryError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
        TelemetryError::TransportError(_) => ("TRANSPORT_ERROR", "Check the output stream"),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    at_ms: u64,
    event_type: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
