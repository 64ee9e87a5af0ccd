use crate::infra::Pipeline;
use crate::report::render_report;
use crate::server;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use medicare_pa::config::AppConfig;
use medicare_pa::identifiers::{Icd10Code, Mbi, Npi};
use medicare_pa::telemetry;
use medicare_pa::workflows::determination::{
    render_dashboard, CaseIntake, DeterminationError, LetterState,
};
use medicare_pa::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Medicare PA Determination",
    about = "Run prior authorization determinations for Original Medicare cases",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Check an identifier's format offline
    Validate {
        #[command(subcommand)]
        identifier: ValidateCommand,
    },
    /// Evaluate one case file and print the dashboard
    Check(CheckArgs),
}

#[derive(Subcommand, Debug)]
enum ValidateCommand {
    /// Medicare Beneficiary Identifier
    Mbi { value: String },
    /// National Provider Identifier
    Npi { value: String },
    /// ICD-10-CM diagnosis code
    Icd10 { value: String },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Case intake JSON (same shape as the determinations endpoint body)
    #[arg(long = "case")]
    pub(crate) case_file: PathBuf,
    /// Print the dashboard as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Validate { identifier } => {
            println!("{}", validate_identifier(&identifier)?);
            Ok(())
        }
        Command::Check(args) => run_check(args).await,
    }
}

fn validate_identifier(identifier: &ValidateCommand) -> Result<String, DeterminationError> {
    Ok(match identifier {
        ValidateCommand::Mbi { value } => format!("valid MBI: {}", Mbi::parse(value)?),
        ValidateCommand::Npi { value } => format!("valid NPI: {}", Npi::parse(value)?),
        ValidateCommand::Icd10 { value } => {
            let code = Icd10Code::parse(value)?;
            let billable = if code.is_billable() {
                "billable"
            } else {
                "header code, not billable"
            };
            format!("valid ICD-10-CM code: {} ({billable})", code.formatted())
        }
    })
}

fn parse_case(raw: &str) -> Result<CaseIntake, DeterminationError> {
    serde_json::from_str(raw)
        .map_err(|err| DeterminationError::Format(format!("Invalid case file: {err}")))
}

async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_cli(&config.telemetry)?;

    let raw = tokio::fs::read_to_string(&args.case_file).await?;
    let case = Arc::new(parse_case(&raw)?.validate()?);

    let pipeline = Pipeline::from_config(&config)?;
    let results = pipeline.orchestrator.evaluate(case.clone()).await;
    let view = render_dashboard(0, &case, &results, &LetterState::Idle);

    if args.json {
        let rendered = serde_json::to_string_pretty(&view)
            .map_err(|err| DeterminationError::Format(format!("Unable to encode dashboard: {err}")))?;
        println!("{rendered}");
    } else {
        print!("{}", render_report(&view, Local::now().date_naive()));
    }
    Ok(())
}
