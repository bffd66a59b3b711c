use consentry_core::{AuditError, ScanReport};
use consentry_engine::Orchestrator;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{info, warn};

/// Operator requests, delivered over the controller's channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScanCommand {
    Start { url: String },
    DeclareNoNotice { url: String },
    Resume,
    Cancel,
}

#[derive(Debug)]
pub enum ScanOutcome {
    Finished(Box<ScanReport>),
    Failed { command: ScanCommand, error: AuditError },
    /// Another scan was in flight
    Rejected(ScanCommand),
    NothingToResume,
    Cancelled { session_id: Option<u64> },
}

/// Feeds commands to one orchestrator, keeping at most one scan in flight.
pub struct ScanController {
    orchestrator: Arc<Orchestrator>,
    sender: mpsc::Sender<ScanCommand>,
    in_flight: Arc<Semaphore>,
}

impl Clone for ScanController {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            sender: self.sender.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl ScanController {
    pub fn new(orchestrator: Orchestrator, capacity: usize) -> (Self, mpsc::Receiver<ScanCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        let controller = Self {
            orchestrator: Arc::new(orchestrator),
            sender: tx,
            in_flight: Arc::new(Semaphore::new(1)),
        };
        (controller, rx)
    }

    pub fn submit(&self, command: ScanCommand) -> Result<(), mpsc::error::TrySendError<ScanCommand>> {
        self.sender.try_send(command)
    }

    pub fn sender(&self) -> mpsc::Sender<ScanCommand> {
        self.sender.clone()
    }

    /// Processes commands until every other handle is dropped and the running scan is done.
    /// Cancels are handled inline so they reach the store while a scan is suspended.
    pub async fn run(self, mut receiver: mpsc::Receiver<ScanCommand>) -> Vec<ScanOutcome> {
        let Self {
            orchestrator,
            sender,
            in_flight,
        } = self;
        drop(sender);

        let mut scans = FuturesUnordered::new();
        let mut outcomes = Vec::new();

        loop {
            tokio::select! {
                Some(command) = receiver.recv() => {
                    if command == ScanCommand::Cancel {
                        match orchestrator.cancel().await {
                            Ok(session_id) => outcomes.push(ScanOutcome::Cancelled { session_id }),
                            Err(error) => {
                                warn!(error = %error, "cancel failed");
                                outcomes.push(ScanOutcome::Failed { command, error });
                            }
                        }
                        continue;
                    }

                    let Ok(permit) = Arc::clone(&in_flight).try_acquire_owned() else {
                        warn!(?command, "a scan is already in flight, rejecting");
                        outcomes.push(ScanOutcome::Rejected(command));
                        continue;
                    };

                    let orchestrator = Arc::clone(&orchestrator);
                    scans.push(async move {
                        let result = match &command {
                            ScanCommand::Start { url } => orchestrator.start(url).await.map(Some),
                            ScanCommand::DeclareNoNotice { url } => orchestrator.declare_no_notice(url).await.map(Some),
                            ScanCommand::Resume => orchestrator.resume().await,
                            ScanCommand::Cancel => Ok(None),
                        };
                        drop(permit);
                        (command, result)
                    });
                }
                Some((command, result)) = scans.next() => {
                    let outcome = match result {
                        Ok(Some(report)) => {
                            info!(report_id = %report.report_id, violations = report.has_violations(), "scan succeeded");
                            ScanOutcome::Finished(Box::new(report))
                        }
                        Ok(None) => ScanOutcome::NothingToResume,
                        Err(error) => {
                            if error.is_stale() {
                                info!(?command, "scan stopped after cancel");
                            } else {
                                warn!(?command, error = %error, "scan failed");
                            }
                            ScanOutcome::Failed { command, error }
                        }
                    };
                    outcomes.push(outcome);
                }
                else => break,
            }
        }
        outcomes
    }
}
