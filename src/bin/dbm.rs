use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use db_manager::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one command against a database and print the result as JSON")]
struct Args {
    /// Read provider, connection string and timeout from a JSON config file
    #[arg(long, conflicts_with_all = ["provider", "connection_string"])]
    config: Option<PathBuf>,
    #[arg(long, value_enum, requires = "connection_string")]
    provider: Option<ProviderKind>,
    #[arg(long)]
    connection_string: Option<String>,
    /// Command timeout in seconds; 0 disables the limit
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Run a query and print every row
    Select { sql: String },
    /// Run a query and print the first column of the first row
    Scalar { sql: String },
    /// Run a statement and print the rows affected
    Exec { sql: String },
    /// Run a stored procedure and print every row
    Proc {
        name: String,
        /// `name=value` pairs; repeat for more parameters
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, DbValue)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, DbValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value = if value.eq_ignore_ascii_case("null") {
        DbValue::Null
    } else if let Ok(i) = value.parse::<i64>() {
        DbValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        DbValue::Float(f)
    } else {
        DbValue::Text(value.to_string())
    };
    Ok((name.to_string(), value))
}

fn manager(args: &Args) -> Result<DbManager, DbManagerError> {
    let mut config = match (&args.config, args.provider, &args.connection_string) {
        (Some(path), _, _) => ManagerConfig::from_json_file(path)?,
        (None, Some(provider), Some(conn)) => ManagerConfig::new(provider.to_string(), conn),
        _ => {
            return Err(DbManagerError::ConfigError(
                "either --config or --provider with --connection-string is required".to_string(),
            ));
        }
    };
    if let Some(secs) = args.timeout {
        config.command_timeout_secs = secs;
    }
    DbManager::from_config(&config)
}

async fn run(args: Args) -> Result<serde_json::Value, DbManagerError> {
    let mgr = manager(&args)?;
    let output = match args.action {
        Action::Select { sql } => mgr.execute_select_statement(&sql).await?.to_json_rows(),
        Action::Scalar { sql } => {
            serde_json::to_value(mgr.execute_select_statement_scalar(&sql).await?)
                .unwrap_or(serde_json::Value::Null)
        }
        Action::Exec { sql } => serde_json::json!({
            "rows_affected": mgr.execute_non_query(&sql).await?
        }),
        Action::Proc { name, params } => {
            let params: Parameters = params.into_iter().collect();
            mgr.execute_stored_procedure(&params, &name)
                .await?
                .to_json_rows()
        }
    };
    Ok(output)
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string());
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err.root_cause());
            ExitCode::FAILURE
        }
    }
}
