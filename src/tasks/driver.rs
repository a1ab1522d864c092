//! Pumps one task's engine over a bidirectional message channel.
//!
//! The transport (a WebSocket in production) hands the driver an outbound
//! [`MessageSink`] and an inbound stream of raw client text. The driver runs
//! the engine and routes client scores to it concurrently, and always
//! removes the task from the directory before returning the close code the
//! transport should use.

use super::config::OrchestratorConfig;
use super::orchestrator::Orchestrator;
use crate::error::TaskError;
use crate::ga::{ClientMessage, FitnessBroker, MessageSink, ServerMessage};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How the transport should close the client channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Run completed, or the client went away.
    Normal,
    /// Another driver already owns the task.
    PolicyViolation,
    /// The engine failed.
    InternalError,
    /// No such task.
    TaskNotFound,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::PolicyViolation => 1008,
            CloseCode::InternalError => 1011,
            CloseCode::TaskNotFound => 4004,
        }
    }
}

/// The driver's half of a client connection.
pub struct DriverEnd {
    pub outbound: MessageSink,
    pub inbound: mpsc::Receiver<String>,
}

/// The transport's half: drains server messages and forwards client text.
pub struct TransportEnd {
    pub outbound: mpsc::Receiver<ServerMessage>,
    pub inbound: mpsc::Sender<String>,
}

/// Allocates both directions of a connection with `config.outbound_capacity` slots each.
pub fn connection(config: &OrchestratorConfig) -> (DriverEnd, TransportEnd) {
    let (out_tx, out_rx) = mpsc::channel(config.outbound_capacity);
    let (in_tx, in_rx) = mpsc::channel(config.outbound_capacity);
    (
        DriverEnd {
            outbound: out_tx,
            inbound: in_rx,
        },
        TransportEnd {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

/// Runs `task_id` to a terminal state.
///
/// Closing `inbound` cancels the run; any pending remote evaluation is
/// abandoned and its correlation slot released.
pub async fn drive_task(
    orchestrator: &Orchestrator,
    task_id: Uuid,
    outbound: MessageSink,
    mut inbound: mpsc::Receiver<String>,
) -> CloseCode {
    let mut engine = match orchestrator.start(task_id).await {
        Ok(engine) => engine,
        Err(TaskError::AlreadyRunning(_)) => {
            warn!(%task_id, "task already has a driver");
            return CloseCode::PolicyViolation;
        }
        Err(e) => {
            warn!(%task_id, error = %e, "cannot drive task");
            return CloseCode::TaskNotFound;
        }
    };
    let broker = engine.fitness_broker();

    let code = {
        let run = engine.evolve(&outbound);
        tokio::pin!(run);

        loop {
            tokio::select! {
                result = &mut run => {
                    break match result {
                        Ok(report) => {
                            info!(
                                %task_id,
                                generations = report.generations,
                                best_fitness = report.best_fitness,
                                "task finished"
                            );
                            CloseCode::Normal
                        }
                        Err(e) => {
                            error!(%task_id, error = %e, "task failed");
                            CloseCode::InternalError
                        }
                    };
                }
                message = inbound.recv() => match message {
                    Some(text) => route_client_message(task_id, broker.as_deref(), &text),
                    None => {
                        info!(%task_id, "client disconnected, cancelling task");
                        break CloseCode::Normal;
                    }
                },
            }
        }
    };

    orchestrator.remove(task_id).await;
    code
}

/// Delivers a `FITNESS_RESULTS` message to the task's pending evaluation.
fn route_client_message(task_id: Uuid, broker: Option<&FitnessBroker>, text: &str) {
    let (sender, scores) = match ClientMessage::parse(text) {
        Ok(ClientMessage::FitnessResults { task_id, scores }) => (task_id, scores),
        Err(e) => {
            warn!(%task_id, error = %e, "ignoring malformed client message");
            return;
        }
    };

    let matches = sender
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .is_some_and(|id| id == task_id);

    match (matches, scores, broker) {
        (true, Some(scores), Some(broker)) => {
            if !broker.resolve(task_id, scores) {
                warn!(%task_id, "fitness results arrived with no evaluation pending");
            }
        }
        (true, Some(_), None) => warn!(%task_id, "task does not accept fitness results"),
        (false, _, _) => warn!(%task_id, sender = ?sender, "ignoring fitness results for another task"),
        (true, None, _) => warn!(%task_id, "ignoring fitness results without scores"),
    }
}
