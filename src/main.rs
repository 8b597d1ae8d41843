use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, miette};
use paysession::application::orchestrator::SessionOrchestrator;
use paysession::config::AppConfig;
use paysession::domain::outcome::CompletionPayload;
use paysession::domain::ports::SecretFetcherBox;
use paysession::domain::session::{CustomerId, SessionKind};
use paysession::infrastructure::headless::{HeadlessHost, ScriptedFlow};
use paysession::infrastructure::http::HttpSecretFetcher;
use paysession::infrastructure::in_memory::InMemorySecretFetcher;
use paysession::interfaces::json::session_writer::SessionWriter;
use paysession::telemetry;
use std::io;

/// Customer id used when simulating with a static secret and none is configured.
const LOCAL_CUSTOMER: &str = "cus_local";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a client secret from the configured backend and print the session
    Fetch {
        /// Session kind: bank-link, card-setup or payment
        #[arg(long)]
        kind: SessionKind,

        /// Customer id (defaults to PAYSESSION_CUSTOMER_ID)
        #[arg(long)]
        customer: Option<String>,
    },
    /// Run a full fetch/present cycle against a scripted provider flow
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct SimulateArgs {
    /// Session kind: bank-link, card-setup or payment
    #[arg(long)]
    kind: SessionKind,

    /// Customer id (defaults to PAYSESSION_CUSTOMER_ID)
    #[arg(long)]
    customer: Option<String>,

    /// Use this client secret instead of calling the backend
    #[arg(long)]
    secret: Option<String>,

    /// Outcome the scripted flow reports
    #[arg(long, value_enum, default_value_t = ScriptedOutcome::Completed)]
    outcome: ScriptedOutcome,

    /// Linked account id reported with a completed outcome
    #[arg(long)]
    account: Option<String>,

    /// Failure reason reported with a failed outcome
    #[arg(long, default_value = "payment failed")]
    reason: String,

    /// Simulate a host with no displayable surface
    #[arg(long)]
    no_host: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScriptedOutcome {
    Completed,
    Canceled,
    Failed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_tracing(cli.verbose) {
        eprintln!("WARNING: structured logging unavailable: {e}");
    }

    let config = AppConfig::from_env().into_diagnostic()?;

    match cli.command {
        Command::Fetch { kind, customer } => fetch(config, kind, customer).await,
        Command::Simulate(args) => simulate(config, args).await,
    }
}

async fn fetch(config: AppConfig, kind: SessionKind, customer: Option<String>) -> Result<()> {
    let customer = resolve_customer(customer, &config, None)?;
    let fetcher: SecretFetcherBox = Box::new(HttpSecretFetcher::new(config.clone()).into_diagnostic()?);

    // Never presented; the fetch command stops at Ready.
    let orchestrator = SessionOrchestrator::new(
        kind,
        customer,
        fetcher,
        Box::new(ScriptedFlow::canceling()),
        config.orchestrator_settings(kind),
    );

    let fetched = orchestrator.fetch().await;
    write_summary(&orchestrator)?;
    fetched.into_diagnostic()
}

async fn simulate(config: AppConfig, args: SimulateArgs) -> Result<()> {
    let fallback = args.secret.as_ref().map(|_| LOCAL_CUSTOMER);
    let customer = resolve_customer(args.customer, &config, fallback)?;

    let fetcher: SecretFetcherBox = match args.secret {
        Some(secret) => Box::new(InMemorySecretFetcher::with_secret(secret)),
        None => Box::new(HttpSecretFetcher::new(config.clone()).into_diagnostic()?),
    };

    let flow = match args.outcome {
        ScriptedOutcome::Completed => {
            ScriptedFlow::completing(args.account.map(CompletionPayload::with_account))
        }
        ScriptedOutcome::Canceled => ScriptedFlow::canceling(),
        ScriptedOutcome::Failed => ScriptedFlow::failing(args.reason),
    };
    let host = if args.no_host {
        HeadlessHost::unavailable()
    } else {
        HeadlessHost::available()
    };

    let orchestrator = SessionOrchestrator::new(
        args.kind,
        customer,
        fetcher,
        Box::new(flow),
        config.orchestrator_settings(args.kind),
    );

    let result = match orchestrator.fetch().await {
        Ok(()) => orchestrator.present(&host).await.map(|_| ()),
        Err(e) => Err(e),
    };
    write_summary(&orchestrator)?;
    result.into_diagnostic()
}

fn resolve_customer(
    flag: Option<String>,
    config: &AppConfig,
    fallback: Option<&str>,
) -> Result<CustomerId> {
    let raw = flag
        .or_else(|| config.customer_id.clone())
        .or_else(|| fallback.map(str::to_string))
        .ok_or_else(|| miette!("no customer id; pass --customer or set PAYSESSION_CUSTOMER_ID"))?;
    CustomerId::new(raw).into_diagnostic()
}

fn write_summary(orchestrator: &SessionOrchestrator) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = SessionWriter::new(stdout.lock());
    writer
        .write_session(&orchestrator.session())
        .into_diagnostic()
}
