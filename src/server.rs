//! The boundary between the client and a remote simulation server.
//!
//! The wire schema is owned by the transport; these types are the shapes the
//! client consumes from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::progress::ProgressState;
use crate::simulation::SimulationRequest;
use crate::Error;

/// A connection to a simulation server.
///
/// One connection is shared by every task submitted through it and must be
/// safe for concurrent use.
pub trait Connection: Send + Sync {
    /// Submits a simulation and returns the long-running operation tracking it.
    fn submit(&self, request: &SimulationRequest) -> Result<Operation, Error>;

    /// Fetches the current state of an operation.
    fn get_operation(&self, name: &str) -> Result<Operation, Error>;

    /// Requests cancellation of an operation. Does not wait for it to stop.
    fn cancel_operation(&self, name: &str) -> Result<(), Error>;

    /// Downloads a remote result file into `dest_dir`, returning the local path.
    fn download(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf, Error>;

    /// A human readable description of the server endpoint.
    fn describe(&self) -> String {
        String::from("simulation server")
    }
}

/// A raw progress message as reported by the server.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub state: ProgressState,
    pub percent_complete: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
}

/// Progress metadata attached to a long-running operation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub simulation_id: String,
    pub state: ProgressState,
    pub percent_complete: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
}

/// A long-running operation on the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    /// The server-side name of the operation.
    pub name: String,
    pub done: bool,
    pub metadata: OperationMetadata,
    /// Present once `done` is set.
    #[serde(default)]
    pub result: Option<OperationResult>,
}

/// How a finished operation ended.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Response(SimulationResponse),
    Error(OperationError),
}

/// Status codes carried by an operation error.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    Internal,
    Unavailable,
}

/// An error reported for a finished operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationError {
    pub code: StatusCode,
    pub message: String,
    #[serde(default)]
    pub logs: Vec<LogFile>,
}

/// One log file produced by the solver.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    pub contents: String,
}

/// The result payload of a successful simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub id: String,
    #[serde(default)]
    pub logs: Vec<LogFile>,
    pub result: ResponseKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    MeltPool(MeltPoolMessage),
    Porosity { solid_ratio: f64 },
    Microstructure(MicrostructureMessage),
    /// Results that must be downloaded from the server.
    ThermalHistory { remote_path: String },
}

/// Melt pool dimensions sampled over the bead, one entry per time step.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeltPoolMessage {
    pub length: Vec<f64>,
    pub width: Vec<f64>,
    pub depth: Vec<f64>,
    pub reference_width: Vec<f64>,
    pub reference_depth: Vec<f64>,
    /// Remote path of the thermal history files, if they were requested.
    #[serde(default)]
    pub thermal_history_path: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct MicrostructureMessage {
    pub xy_average_grain_size: f64,
    pub xz_average_grain_size: f64,
    pub yz_average_grain_size: f64,
}

/// Flattens solver log files into a single string, each file preceded by its name.
pub fn flatten_logs(logs: &[LogFile]) -> String {
    logs.iter()
        .map(|log| format!("File: {}\n{}\n", log.name, log.contents))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_logs_in_order() {
        let logs = vec![
            LogFile {
                name: "a.log".to_string(),
                contents: "first".to_string(),
            },
            LogFile {
                name: "b.log".to_string(),
                contents: "second".to_string(),
            },
        ];

        assert_eq!(flatten_logs(&logs), "File: a.log\nfirst\nFile: b.log\nsecond\n");
        assert_eq!(flatten_logs(&[]), "");
    }

    #[test]
    fn operation_reads_from_json() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "op-1",
                "done": true,
                "metadata": {
                    "simulation_id": "a",
                    "state": "COMPLETED",
                    "percent_complete": 100
                },
                "result": { "response": {
                    "id": "a",
                    "result": { "porosity": { "solid_ratio": 0.98 } }
                } }
            }"#,
        )
        .unwrap();

        assert!(op.done);
        assert_eq!(op.metadata.state, ProgressState::Completed);
        assert!(matches!(
            op.result,
            Some(OperationResult::Response(SimulationResponse {
                result: ResponseKind::Porosity { .. },
                ..
            }))
        ));
    }
}
