//! HackPortal push tooling CLI.
//!
//! This is the main binary entry point. It hosts the background delivery
//! worker and a few operator commands; see the `hackportal` library for
//! the registration manager itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hackportal::env::Environment;
use hackportal::notifications::{SystemOpener, TerminalNotifier};
use hackportal::portal::PortalClient;
use hackportal::{BackgroundWorker, Config, HttpBackend, PushBackend, PushToken, WorkerConfig, WorkerScript};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "hackportal")]
#[command(version)]
#[command(about = "HackPortal push notification tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background delivery worker on stdin/stdout
    Worker {
        /// Worker script URL the worker was registered with
        #[arg(long)]
        script: Option<String>,
    },
    /// Print the worker script URL for the current configuration
    ScriptUrl,
    /// Send a dry-run message to a token and report deliverability
    Probe {
        /// Push token to probe
        token: String,
    },
    /// Store a push token with the backend
    RegisterToken {
        /// Push token to store
        token: String,
    },
    /// List the organizing team
    Members,
    /// List answered FAQ questions
    Faq,
    /// Print the current configuration (credentials excluded)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; the worker owns stdout for notification output
    let default_filter = Environment::current().default_log_filter();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Worker { script } => run_worker(&config, script.as_deref()).await?,
        Commands::ScriptUrl => {
            let script = WorkerScript::new(&config.site_url, &config.provider, &config.icon_url)?;
            println!("{script}");
        }
        Commands::Probe { token } => {
            anyhow::ensure!(
                config.has_server_token(),
                "HACKPORTAL_SERVER_TOKEN must be set to probe tokens"
            );
            let backend = HttpBackend::from_config(&config)?;
            let token = PushToken::from(token);
            let report = backend.probe(&token).await?;
            match report.error {
                None => println!("{token}: deliverable"),
                Some(error) => println!("{token}: not deliverable ({error})"),
            }
        }
        Commands::RegisterToken { token } => {
            let backend = HttpBackend::from_config(&config)?;
            backend.register_token(&PushToken::from(token)).await?;
            println!("Token registered with {}", config.site_url);
        }
        Commands::Members => {
            let portal = PortalClient::from_config(&config)?;
            for member in portal.members().await? {
                println!("{:>3}. {} - {}", member.rank, member.name, member.description);
            }
        }
        Commands::Faq => {
            let portal = PortalClient::from_config(&config)?;
            for faq in portal.faqs().await? {
                println!("Q: {}\nA: {}\n", faq.question, faq.answer);
            }
        }
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

/// Runs the background worker until stdin closes.
async fn run_worker(config: &Config, script: Option<&str>) -> Result<()> {
    let script = script
        .map(WorkerScript::parse)
        .transpose()
        .context("Invalid --script")?;
    let worker_config = WorkerConfig::from_script(script.as_ref(), config);

    let worker = BackgroundWorker::new(
        worker_config,
        Box::new(TerminalNotifier::stdout()),
        Box::new(SystemOpener),
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    worker.run(stdin).await?;
    Ok(())
}
