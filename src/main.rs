//! Litehouse CLI Entry Point
//!
//! This is the main binary entry point for the Litehouse CLI.
//! It provides four subcommands:
//! - `connection` - Connection profile management
//! - `saved` - Saved query library
//! - `entity` - Resolve the root entity label of a query
//! - `export` - Export a JSON record array as csv, xlsx, or json
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use litehouse::export::{reset_scratch_dir, DEFAULT_EXPORT_PREFIX};
use litehouse::{
    resolve_entity, write_export, AppPaths, AuthMode, ConfigStore, ConnectionInput,
    ConnectionProfile, ErrorEnvelope, ErrorInfo, ExportFormat, LitehouseError, Metadata,
    QueryInput, RecordSet, SuccessEnvelope,
};

/// Litehouse - Billing Platform Admin CLI
#[derive(Parser)]
#[command(name = "litehouse")]
#[command(about = "Connection manager, saved queries and exports for a billing platform API")]
#[command(version)]
struct Cli {
    /// Application home holding config.json and the downloads directory
    #[arg(long, env = "LITEHOUSE_HOME", global = true)]
    home: Option<PathBuf>,

    /// Log level for stderr output (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connection profiles
    Connection {
        #[command(subcommand)]
        action: ConnectionCommand,
    },

    /// Manage saved queries
    Saved {
        #[command(subcommand)]
        action: SavedCommand,
    },

    /// Print the root entity label of a query
    Entity {
        /// Query text
        sql: String,
    },

    /// Export a JSON array of records
    Export {
        /// File containing a JSON array of objects
        #[arg(long)]
        input: PathBuf,

        /// Output format: csv, xlsx, or json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Target directory (defaults to the downloads scratch directory,
        /// which is cleared before each export into it)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// File name prefix
        #[arg(long, default_value = DEFAULT_EXPORT_PREFIX)]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum ConnectionCommand {
    /// List all connections
    List,
    /// Show one connection (credentials are never printed)
    Show { id: String },
    /// Add a connection and enable it
    Add(ConnectionArgs),
    /// Replace the settings of a connection
    Update {
        id: String,
        #[command(flatten)]
        args: ConnectionArgs,
    },
    /// Delete a connection
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Make a connection the enabled one
    Enable { id: String },
}

#[derive(Args)]
struct ConnectionArgs {
    #[arg(long)]
    name: String,

    /// Base URL of the org's API
    #[arg(long)]
    url: String,

    #[arg(long, default_value = "")]
    username: String,

    /// Prompted for when omitted on a terminal
    #[arg(long)]
    password: Option<String>,

    #[arg(long, default_value = "")]
    client_id: String,

    /// Prompted for when omitted on a terminal
    #[arg(long)]
    client_secret: Option<String>,

    /// basic or oauth
    #[arg(long, default_value = "basic")]
    auth_mode: String,

    #[arg(long)]
    auth_version: Option<String>,

    #[arg(long)]
    rest_version: Option<String>,

    /// TLS certificate or verification path
    #[arg(long)]
    cert: Option<String>,
}

#[derive(Subcommand)]
enum SavedCommand {
    /// List saved queries, newest first
    List,
    /// Show one saved query
    Show { id: String },
    /// Save a query definition
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 0)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Delete a saved query
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Connection { action } => match action {
                ConnectionCommand::List => "connection list",
                ConnectionCommand::Show { .. } => "connection show",
                ConnectionCommand::Add(_) => "connection add",
                ConnectionCommand::Update { .. } => "connection update",
                ConnectionCommand::Delete { .. } => "connection delete",
                ConnectionCommand::Enable { .. } => "connection enable",
            },
            Self::Saved { action } => match action {
                SavedCommand::List => "saved list",
                SavedCommand::Show { .. } => "saved show",
                SavedCommand::Save { .. } => "saved save",
                SavedCommand::Delete { .. } => "saved delete",
            },
            Self::Entity { .. } => "entity",
            Self::Export { .. } => "export",
        }
    }
}

/// Connection as printed by the CLI
#[derive(Serialize)]
struct ConnectionView<'a> {
    id: &'a str,
    name: &'a str,
    url: &'a str,
    username: &'a str,
    auth_mode: AuthMode,
    auth_version: &'a str,
    rest_version: &'a str,
    verify: Option<&'a str>,
    enabled: bool,
}

impl<'a> ConnectionView<'a> {
    fn new(profile: &'a ConnectionProfile, enabled_id: &str) -> Self {
        Self {
            id: &profile.id,
            name: &profile.name,
            url: &profile.base_url,
            username: &profile.username,
            auth_mode: profile.auth_mode,
            auth_version: &profile.auth_version,
            rest_version: &profile.rest_version,
            verify: profile.request_options.verify.as_deref(),
            enabled: profile.id == enabled_id,
        }
    }
}

/// Data and row count of a successful command
struct CommandOutput {
    data: Value,
    rows: Option<usize>,
}

impl CommandOutput {
    fn data(data: Value) -> Self {
        Self { data, rows: None }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let command = cli.command.name();
    let started = Instant::now();

    match run(cli) {
        Ok(output) => {
            let elapsed = elapsed_ms(started);
            let meta = match output.rows {
                Some(rows) => Metadata::with_rows(elapsed, rows),
                None => Metadata::new(elapsed),
            };
            emit(&SuccessEnvelope::new(command, output.data, meta));
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<LitehouseError>() {
            Some(e) => {
                emit(&ErrorEnvelope::from_error(command, e));
                if e.is_warning() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            None => {
                let info = ErrorInfo::new("INTERNAL_ERROR", format!("{err:#}"));
                emit(&ErrorEnvelope::new(command, info));
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("litehouse={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn emit<T: Serialize>(envelope: &T) {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => println!("{json}"),
        Err(e) => println!(
            r#"{{"ok": false, "error": {{"code": "INTERNAL_ERROR", "message": "Failed to serialize output: {e}"}}}}"#
        ),
    }
}

fn run(cli: Cli) -> anyhow::Result<CommandOutput> {
    let paths = AppPaths::resolve(cli.home)?;
    let store = ConfigStore::open(&paths.config_file)?;

    match cli.command {
        Commands::Connection { action } => run_connection(&store, action),
        Commands::Saved { action } => run_saved(&store, action),
        Commands::Entity { sql } => {
            Ok(CommandOutput::data(json!({ "entity": resolve_entity(&sql) })))
        }
        Commands::Export {
            input,
            format,
            out_dir,
            prefix,
        } => run_export(&paths, &input, &format, out_dir, &prefix),
    }
}

/// Export records read from `input`
///
/// Without `--out-dir` the artifact goes to the downloads scratch directory,
/// which is cleared first so it only ever holds the latest export.
fn run_export(
    paths: &AppPaths,
    input: &Path,
    format: &str,
    out_dir: Option<PathBuf>,
    prefix: &str,
) -> anyhow::Result<CommandOutput> {
    let format: ExportFormat = format.parse()?;
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let value: Value = serde_json::from_str(&contents).map_err(|e| {
        LitehouseError::invalid_input(format!("{} is not valid JSON: {e}", input.display()))
    })?;

    let records = RecordSet::from_json(value)?;
    if records.is_empty() {
        let message = format!("No data found in {}.", input.display());
        return Err(LitehouseError::empty_result(message).into());
    }

    let dir = match out_dir {
        Some(dir) => dir,
        None => {
            reset_scratch_dir(&paths.downloads_dir)?;
            paths.downloads_dir.clone()
        }
    };
    let path = write_export(&dir, prefix, &records, format)?;

    Ok(CommandOutput {
        data: json!({
            "path": path,
            "format": format.extension(),
            "columns": records.columns(),
        }),
        rows: Some(records.len()),
    })
}

fn run_connection(store: &ConfigStore, action: ConnectionCommand) -> anyhow::Result<CommandOutput> {
    let enabled_id = store.snapshot().enabled_connection;

    match action {
        ConnectionCommand::List => {
            let connections = store.connections();
            let views: Vec<_> =
                connections.iter().map(|c| ConnectionView::new(c, &enabled_id)).collect();
            Ok(CommandOutput {
                data: json!({ "connections": views, "enabled": enabled_id }),
                rows: Some(views.len()),
            })
        }
        ConnectionCommand::Show { id } => {
            let profile = store.connection(&id)?;
            let view = ConnectionView::new(&profile, &enabled_id);
            Ok(CommandOutput::data(serde_json::to_value(view)?))
        }
        ConnectionCommand::Add(args) => {
            let input = connection_input(args, None)?;
            let id = store.create_connection(input)?;
            Ok(CommandOutput::data(json!({ "id": id, "enabled": true })))
        }
        ConnectionCommand::Update { id, args } => {
            let existing = store.connection(&id)?;
            let input = connection_input(args, Some(&existing))?;
            store.update_connection(&id, input)?;
            Ok(CommandOutput::data(json!({ "id": id })))
        }
        ConnectionCommand::Delete { id, yes } => {
            let profile = store.connection(&id)?;
            if !yes && !confirm(&format!("Delete connection '{}'?", profile.name))? {
                return Ok(CommandOutput::data(json!({ "id": id, "deleted": false })));
            }
            store.delete_connection(&id)?;
            Ok(CommandOutput::data(json!({
                "id": id,
                "deleted": true,
                "enabled": store.snapshot().enabled_connection,
            })))
        }
        ConnectionCommand::Enable { id } => {
            store.set_enabled_connection(&id)?;
            Ok(CommandOutput::data(json!({ "enabled": id })))
        }
    }
}

fn run_saved(store: &ConfigStore, action: SavedCommand) -> anyhow::Result<CommandOutput> {
    match action {
        SavedCommand::List => {
            let queries = store.saved_queries();
            Ok(CommandOutput { rows: Some(queries.len()), data: json!({ "queries": queries }) })
        }
        SavedCommand::Show { id } => {
            Ok(CommandOutput::data(serde_json::to_value(store.saved_query(&id)?)?))
        }
        SavedCommand::Save { name, text, limit, offset } => {
            let id = store.save_query(QueryInput {
                name,
                text,
                limit,
                offset,
            })?;
            let saved = store.saved_query(&id)?;
            Ok(CommandOutput::data(json!({ "id": id, "entity": saved.entity })))
        }
        SavedCommand::Delete { id, yes } => {
            let query = store.saved_query(&id)?;
            if !yes && !confirm(&format!("Delete saved query '{}'?", query.name))? {
                return Ok(CommandOutput::data(json!({ "id": id, "deleted": false })));
            }
            store.delete_query(&id)?;
            Ok(CommandOutput::data(json!({ "id": id, "deleted": true })))
        }
    }
}

fn connection_input(
    args: ConnectionArgs,
    existing: Option<&ConnectionProfile>,
) -> anyhow::Result<ConnectionInput> {
    let password = secret(args.password, "Password", existing.map(|p| p.password.as_str()))?;
    let client_secret =
        secret(args.client_secret, "Client secret", existing.map(|p| p.client_secret.as_str()))?;

    Ok(ConnectionInput {
        name: args.name,
        base_url: args.url,
        username: args.username,
        password,
        client_id: args.client_id,
        client_secret,
        auth_mode: args.auth_mode.parse()?,
        auth_version: args.auth_version,
        rest_version: args.rest_version,
        cert_path: args.cert,
    })
}

/// Use the flag value, else prompt on a terminal, else keep the stored value
///
/// An empty answer at the prompt keeps the stored value too.
fn secret(given: Option<String>, prompt: &str, existing: Option<&str>) -> anyhow::Result<String> {
    if let Some(value) = given {
        return Ok(value);
    }

    let kept = existing.unwrap_or_default().to_string();
    if !std::io::stdin().is_terminal() {
        return Ok(kept);
    }

    let entered = dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read from terminal")?;

    Ok(if entered.is_empty() { kept } else { entered })
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!(LitehouseError::invalid_input(
            "Refusing to delete without confirmation; pass --yes"
        ));
    }

    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read from terminal")
}
