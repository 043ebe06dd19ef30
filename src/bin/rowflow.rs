//! Command-line entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rowflow::config::DEFAULT_TIMEOUT_MS;
use rowflow::destination::bigquery::DEFAULT_BASE_URL;
use rowflow::handler::record_favorite_flavor;
use rowflow::source::read_csv;
use rowflow::{
    BigQueryDestination, Credentials, Pipeline, PipelineConfig, Record, ReqwestHttpClient,
    Result, RowflowError, SubmissionWorkflow, TableId, TextGenerator, VertexTextGenerator,
    WorkflowConfig,
};

#[derive(Parser)]
#[command(name = "rowflow", version, about = "Submit rows to BigQuery and verify what was accepted")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Access token sent as a bearer token
    #[arg(long, global = true, env = "ROWFLOW_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-call timeout in milliseconds
    #[arg(long, global = true, env = "ROWFLOW_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert rows from a JSON array or CSV file into a table
    Insert {
        /// Destination table, project.dataset.table
        #[arg(long)]
        table: TableId,
        /// Rows file (.csv, or JSON array of objects)
        #[arg(long)]
        file: PathBuf,
        /// Fields every row must carry
        #[arg(long, value_delimiter = ',')]
        require: Vec<String>,
        /// Insert valid rows even when others are invalid
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        skip_invalid_rows: bool,
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
    /// Record one favorite flavor from a JSON body
    Flavor {
        #[arg(long)]
        table: TableId,
        /// Request body, e.g. '{"email":"a@x.com","favorite_flavor":"mint"}'
        #[arg(long)]
        body: String,
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
    /// Send one prompt to a text-generation model and print the completion
    Generate {
        /// Full :predict URL of the model
        #[arg(long, env = "ROWFLOW_PREDICT_URL")]
        predict_url: String,
        #[arg(long)]
        prompt: String,
    },
    /// Run the sales automation pipeline configured by ROWFLOW_* variables
    Run,
}

fn read_rows(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return read_csv(path);
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn credentials(token: Option<String>) -> Credentials {
    token.map(Credentials::Bearer).unwrap_or_default()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let http = Arc::new(ReqwestHttpClient::new());
    let creds = credentials(cli.token);

    match cli.command {
        Command::Insert {
            table,
            file,
            require,
            skip_invalid_rows,
            base_url,
        } => {
            let mut config = WorkflowConfig::new(table)
                .with_credentials(creds)
                .with_timeout_ms(cli.timeout_ms);
            config.skip_invalid_rows = skip_invalid_rows;

            let destination = BigQueryDestination::new(http, &config).with_base_url(base_url);
            let workflow = SubmissionWorkflow::new(config, Arc::new(destination));

            let rows = read_rows(&file)?;
            let outcome = workflow.submit_records(rows, &require).await?;
            print_json(&outcome)?;
            Ok(if outcome.is_all_accepted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Flavor {
            table,
            body,
            base_url,
        } => {
            let config = WorkflowConfig::new(table)
                .with_credentials(creds)
                .with_timeout_ms(cli.timeout_ms);
            let destination = BigQueryDestination::new(http, &config).with_base_url(base_url);
            let workflow = SubmissionWorkflow::new(config, Arc::new(destination));

            let body: serde_json::Value = serde_json::from_str(&body)?;
            print_json(&record_favorite_flavor(&workflow, body).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate {
            predict_url,
            prompt,
        } => {
            let generator = VertexTextGenerator::new(http, predict_url, creds, cli.timeout_ms);
            match generator.generate(&prompt).await? {
                Some(text) => {
                    println!("{}", text);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("model returned no completion");
                    Ok(ExitCode::from(2))
                }
            }
        }
        Command::Run => {
            let config = PipelineConfig::from_env()?;
            let report = Pipeline::from_config(config, http).run().await;
            print_json(&report)?;
            Ok(if report.has_failures() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "rowflow failed");
            match e {
                RowflowError::Validation { .. } | RowflowError::Config(_) => ExitCode::from(64),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
