use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use enviro_acquire::app::Acquirer;
use enviro_acquire::config::ConfigLoader;
use enviro_acquire::domain::{ParamValue, Parameters, Provider};
use enviro_acquire::error::{AcquireError, ErrorKind};
use enviro_acquire::filter::FilterSpec;
use enviro_acquire::output::JsonOutput;

#[derive(Parser)]
#[command(name = "enviro-acq")]
#[command(about = "Acquire, normalize and filter environmental datasets")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch one dataset and print its summary and provenance as JSON")]
    Acquire(AcquireArgs),
    #[command(about = "List providers and their required parameters")]
    Providers,
}

#[derive(Args)]
struct AcquireArgs {
    provider: Provider,

    #[arg(long = "param", short = 'p', value_parser = parse_param)]
    params: Vec<(String, ParamValue)>,

    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value_t = 5)]
    rows: usize,
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    Ok((key.to_string(), ParamValue::parse_cli(value)))
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<AcquireError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AcquireError) -> u8 {
    match error.kind() {
        ErrorKind::InvalidRequest | ErrorKind::MissingLocalFile => 2,
        ErrorKind::NetworkError => 3,
        ErrorKind::ExtractionError | ErrorKind::EmptyDataset => 4,
        ErrorKind::Other => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Acquire(args) => run_acquire(args),
        Commands::Providers => {
            let listing = Provider::ALL
                .iter()
                .map(|provider| {
                    serde_json::json!({
                        "provider": provider.to_string(),
                        "required": provider.required_keys(),
                    })
                })
                .collect::<Vec<_>>();
            JsonOutput::print_json(&listing).into_diagnostic()
        }
    }
}

fn run_acquire(args: AcquireArgs) -> miette::Result<()> {
    let settings = ConfigLoader::resolve(args.config.as_deref())?;
    let parameters = args.params.into_iter().collect::<Parameters>();
    let filters = args
        .filters
        .iter()
        .map(|raw| {
            serde_json::from_str::<FilterSpec>(raw)
                .map_err(|err| AcquireError::InvalidRequest(format!("filter `{raw}`: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let acquirer = Acquirer::http(settings)?;
    let result = acquirer.acquire_with_filters(args.provider, parameters, filters)?;
    JsonOutput::print_result(&result, args.rows).into_diagnostic()?;
    Ok(())
}
