mod config;
mod notifier;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use config::AppConfig;
use consentry_browser::ChromiumPage;
use consentry_classifier::{ClassifierAdapter, HttpInferenceClient};
use consentry_core::{NoticePicker, Notifier};
use consentry_engine::{Collaborators, FixedNoticePicker, HeuristicNoticePicker, Orchestrator};
use consentry_scheduler::{ScanCommand, ScanController, ScanOutcome};
use consentry_storage::JsonFileStorage;
use notifier::TracingNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consentry", version, about = "Cookie-consent notice auditor")]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the store and reports
    #[arg(long, global = true)]
    output: Option<String>,

    /// Launch the browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,

    #[arg(long, global = true)]
    viewport_width: Option<u32>,

    #[arg(long, global = true)]
    viewport_height: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Audit the consent notice of a site
    Scan {
        url: String,
        /// Structural locator of the notice; overlays are searched when omitted
        #[arg(long, conflicts_with = "no_notice")]
        notice: Option<String>,
        /// The site shows no notice
        #[arg(long)]
        no_notice: bool,
    },
    /// Continue the interrupted scan from its last checkpoint
    Resume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut app = AppConfig::load(args.config.as_deref())
        .await
        .context("loading configuration")?;
    if args.visible {
        app.browser.headless = false;
    }
    if let Some(width) = args.viewport_width {
        app.browser.viewport_width = width;
    }
    if let Some(height) = args.viewport_height {
        app.browser.viewport_height = height;
    }
    if let Some(output) = args.output {
        app.output_dir = output;
    }

    let (command, picker): (ScanCommand, Arc<dyn NoticePicker>) = match args.command {
        Command::Scan { url, no_notice: true, .. } => (ScanCommand::DeclareNoNotice { url }, Arc::new(HeuristicNoticePicker)),
        Command::Scan { url, notice: Some(locator), .. } => {
            (ScanCommand::Start { url }, Arc::new(FixedNoticePicker::new(locator)))
        }
        Command::Scan { url, .. } => (ScanCommand::Start { url }, Arc::new(HeuristicNoticePicker)),
        Command::Resume => (ScanCommand::Resume, Arc::new(HeuristicNoticePicker)),
    };

    let page = Arc::new(ChromiumPage::launch(&app.browser, app.timeout_config()).await?);
    info!(headless = app.browser.headless, output = %app.output_dir, "browser launched");

    let storage = Arc::new(JsonFileStorage::new(&app.output_dir)?);
    let inference = Arc::new(HttpInferenceClient::new(app.classifier_url.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let collaborators = Collaborators {
        page: page.clone(),
        store: storage.clone(),
        reports: storage,
        classifier: Arc::new(ClassifierAdapter::new(inference.clone(), inference.clone(), notifier.clone())),
        cookie_classifier: inference,
        picker,
        notifier,
    };

    let (controller, receiver) = ScanController::new(Orchestrator::new(collaborators, app.scan.clone()), 4);
    controller.submit(command)?;

    // a weak handle keeps the channel closable once the scan is done
    let interrupt = controller.sender().downgrade();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling the running scan");
            if let Some(sender) = interrupt.upgrade() {
                let _ = sender.send(ScanCommand::Cancel).await;
            }
        }
    });

    let outcomes = controller.run(receiver).await;
    watcher.abort();

    match Arc::try_unwrap(page) {
        Ok(page) => {
            if let Err(e) = page.close().await {
                warn!(error = %e, "browser did not close cleanly");
            }
        }
        Err(_) => warn!("browser still referenced, leaving it to exit with the process"),
    }

    let mut failed = false;
    for outcome in outcomes {
        match outcome {
            ScanOutcome::Finished(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            ScanOutcome::NothingToResume => info!("no interrupted scan to resume"),
            ScanOutcome::Cancelled { session_id } => info!(?session_id, "scan cancelled"),
            ScanOutcome::Rejected(command) => warn!(?command, "command rejected"),
            ScanOutcome::Failed { command, error } if error.is_stale() => {
                info!(?command, "scan stopped after cancel");
            }
            ScanOutcome::Failed { command, error } => {
                error!(?command, error = %error, "scan failed");
                failed = true;
            }
        }
    }
    if failed {
        bail!("scan failed");
    }
    Ok(())
}
