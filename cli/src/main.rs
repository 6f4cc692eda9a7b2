//! CLI entrypoint for conductor
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use conductor_application::{
    Aggregator, AutoApproveArbiter, CompositeSessionUpdates, ConnectionRegistry,
    InMemoryPermissionStore, PermissionArbiter, PermissionGate, PermissionStore, PromptOutcome,
    PromptTurnUseCase, SessionConcurrencyGuard, SessionUpdateSink, ToolCallOutcome,
    ToolCallTracker,
};
use conductor_domain::{PermissionKey, SessionId};
use conductor_infrastructure::{
    ConfigLoader, FileConfig, FilePermissionStore, JsonlSessionUpdateLog, McpConnector,
};
use conductor_presentation::{
    Cli, Command, ConsoleFormatter, ConsolePermissionArbiter, ConsoleSessionUpdates, OutputFormat,
    PermissionsCommand,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CLIENT_NAME: &str = "conductor";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref());

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };
    config.validate().context("Invalid configuration")?;

    info!(servers = config.servers.len(), "Starting conductor");

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let store = open_permission_store(&config)?;

    let mut params = config.execution_params();
    if let Command::Call {
        timeout: Some(secs),
        ..
    } = &command
    {
        if *secs == 0 {
            bail!("--timeout must be greater than 0");
        }
        params = params.with_call_timeout(Duration::from_secs(*secs));
    }

    // === Dependency Injection ===
    let connector = Arc::new(McpConnector::new(CLIENT_NAME, env!("CARGO_PKG_VERSION")));
    let registry = Arc::new(
        ConnectionRegistry::new(connector)
            .with_policy(config.reconnect_policy())
            .with_default_timeout(params.call_timeout)
            .with_max_tools_per_server(params.max_tools_per_server),
    );
    for server in config.server_configs()? {
        registry.register(server)?;
    }

    let arbiter: Arc<dyn PermissionArbiter> = if cli.yes {
        Arc::new(AutoApproveArbiter)
    } else {
        Arc::new(ConsolePermissionArbiter::new())
    };
    let gate = Arc::new(PermissionGate::new(store, arbiter).with_mode(params.permission_mode));

    let mut sinks: Vec<Arc<dyn SessionUpdateSink>> = vec![Arc::new(ConsoleSessionUpdates::new())];
    if let Some(path) = &cli.updates_log {
        match JsonlSessionUpdateLog::new(path) {
            Some(log) => sinks.push(Arc::new(log)),
            None => warn!(path = %path.display(), "Session update log disabled"),
        }
    }
    let tracker = Arc::new(ToolCallTracker::new(Arc::new(CompositeSessionUpdates::new(
        sinks,
    ))));

    let aggregator = Arc::new(
        Aggregator::new(registry.clone(), tracker, gate.clone()).with_params(params),
    );

    let exit = match command {
        Command::Tools { refresh } => {
            let tools = if refresh {
                aggregator.refresh().await
            } else {
                aggregator.list_tools().await
            };
            match cli.output {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_tools(&tools)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::tools_json(&tools)),
            }
            ExitCode::SUCCESS
        }
        Command::Status => {
            for (server, result) in registry.connect_all().await {
                if let Err(e) = result {
                    warn!(server = %server, error = %e, "Server unavailable");
                }
            }
            let handles = registry.statuses();
            match cli.output {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_status(&handles)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::status_json(&handles)),
            }
            ExitCode::SUCCESS
        }
        Command::Call { name, args, .. } => run_call(aggregator, &name, &args, cli.output).await?,
        // Connections are lazy; nothing is spawned for permission management
        Command::Permissions { action } => {
            run_permissions(&action, gate.store().as_ref(), cli.output)?
        }
    };

    registry.disconnect_all().await;
    Ok(exit)
}

/// Install the tracing subscriber.
///
/// Returns the guard that flushes the log file; keep it alive until exit.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "conductor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

fn open_permission_store(config: &FileConfig) -> Result<Arc<dyn PermissionStore>> {
    if !config.permissions.persist {
        return Ok(Arc::new(InMemoryPermissionStore::new()));
    }
    let path = config
        .permissions
        .path
        .clone()
        .or_else(ConfigLoader::default_permissions_path)
        .context("No data directory for the permission table; set permissions.path")?;
    let store = FilePermissionStore::open(&path)
        .with_context(|| format!("Failed to open permission table {}", path.display()))?;
    Ok(Arc::new(store))
}

fn run_permissions(
    action: &PermissionsCommand,
    store: &dyn PermissionStore,
    output: OutputFormat,
) -> Result<ExitCode> {
    match action {
        PermissionsCommand::List => {
            let records = store.list()?;
            match output {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_permissions(&records)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::permissions_json(&records)),
            }
        }
        PermissionsCommand::Forget { key } => {
            let Some(key) = PermissionKey::decode(key) else {
                bail!("Expected <server>/<tool>, got '{}'", key);
            };
            if store.remove(&key)? {
                println!("Forgot {}", key.encode());
            } else {
                println!("No decision remembered for {}", key.encode());
            }
        }
        PermissionsCommand::Clear => {
            store.clear()?;
            println!("All remembered decisions cleared");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Run one call as a prompt turn so Ctrl-C cancels it cleanly.
async fn run_call(
    aggregator: Arc<Aggregator>,
    name: &str,
    args: &str,
    output: OutputFormat,
) -> Result<ExitCode> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("Tool arguments must be valid JSON")?;
    if !arguments.is_object() {
        bail!("Tool arguments must be a JSON object");
    }

    let guard = Arc::new(SessionConcurrencyGuard::new());
    let session_id = SessionId::new(format!("cli-{}", std::process::id()));
    guard.open_session(session_id.clone(), Vec::new());

    let interrupt = {
        let guard = guard.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling tool call");
                guard.cancel(&session_id);
            }
        })
    };

    let use_case = PromptTurnUseCase::new(guard, aggregator);
    let outcome = use_case
        .run(&session_id, |ctx| async move {
            ctx.call_tool(name, arguments).await
        })
        .await;
    interrupt.abort();

    match outcome {
        PromptOutcome::Completed(report) => {
            match output {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_report(&report)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::report_json(&report)),
            }
            let ok = matches!(&report.outcome, ToolCallOutcome::Completed(r) if !r.is_error);
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        PromptOutcome::Failed(message) => bail!(message),
        PromptOutcome::Cancelled => {
            eprintln!("Cancelled");
            Ok(ExitCode::from(130))
        }
        PromptOutcome::Refused(refusal) => bail!("Call refused: {:?}", refusal),
    }
}
