//! Messages exchanged with the client of a running task.
//!
//! Server to client:
//! - [`EvaluationRequest`]: `{"type": "EVALUATE_POPULATION", "population", "generation", "taskId"}`
//! - [`ProgressUpdate`]: one per generation
//!
//! Client to server:
//! - [`ClientMessage::FitnessResults`]: `{"type": "FITNESS_RESULTS", "taskId", "scores"}`

use super::runner::EngineState;
use super::types::ActionSequence;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound half of a task's client channel.
pub type MessageSink = mpsc::Sender<ServerMessage>;

/// Anything the engine sends to its client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Evaluate(EvaluationRequest),
    Progress(ProgressUpdate),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Population handed to the client for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "EVALUATE_POPULATION")]
pub struct EvaluationRequest {
    pub population: Vec<ActionSequence>,
    pub generation: usize,
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
}

/// Per-generation progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: Uuid,
    pub generation: usize,
    /// Best fitness so far, sign-corrected for display.
    pub best_fitness: f64,
    pub best_solution: serde_json::Value,
    /// Mean fitness of this generation, sign-corrected for display.
    pub average_fitness: f64,
    /// Population standard deviation of this generation's fitness.
    pub population_diversity: f64,
    pub status: EngineState,
}

/// Messages accepted from the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "FITNESS_RESULTS")]
    FitnessResults {
        #[serde(rename = "taskId")]
        task_id: Option<String>,
        scores: Option<Vec<f64>>,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
