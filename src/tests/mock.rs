//! A scripted server standing in for a real connection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::TaskSettings;
use crate::progress::{ProgressEvent, ProgressHandler, ProgressState};
use crate::server::{
    Connection, LogFile, MeltPoolMessage, Operation, OperationError, OperationMetadata,
    OperationResult, ResponseKind, SimulationResponse, StatusCode,
};
use crate::simulation::{
    MachineParameters, PorosityInput, SimulationInput, SimulationRequest, SingleBeadInput,
};
use crate::task::SimulationTask;
use crate::Error;

/// Replays scripted operations per simulation. Once a script runs out, the
/// last operation returned is repeated.
#[derive(Default)]
pub struct ScriptedConnection {
    scripts: Mutex<HashMap<String, VecDeque<Result<Operation, Error>>>>,
    last: Mutex<HashMap<String, Operation>>,
    rejected: HashSet<String>,
    pub submits: Mutex<Vec<String>>,
    pub polls: Mutex<Vec<String>>,
    pub cancels: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<(String, PathBuf)>>,
}

impl ScriptedConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A connection refusing to submit the given simulations.
    pub fn rejecting(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            rejected: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        })
    }

    /// Queues the responses to successive polls of simulation `id`.
    pub fn script(&self, id: &str, responses: Vec<Result<Operation, Error>>) {
        self.scripts
            .lock()
            .entry(operation_name(id))
            .or_default()
            .extend(responses);
    }

    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().clone()
    }

    pub fn polls(&self) -> Vec<String> {
        self.polls.lock().clone()
    }
}

impl Connection for ScriptedConnection {
    fn submit(&self, request: &SimulationRequest) -> Result<Operation, Error> {
        self.submits.lock().push(request.id.clone());
        if self.rejected.contains(&request.id) {
            return Err(Error::Connection("server unavailable".to_string()));
        }
        let op = operation(&request.id, ProgressState::Waiting, 0, "");
        self.last.lock().insert(op.name.clone(), op.clone());
        Ok(op)
    }

    fn get_operation(&self, name: &str) -> Result<Operation, Error> {
        self.polls.lock().push(name.to_string());
        let next = self.scripts.lock().get_mut(name).and_then(VecDeque::pop_front);
        match next {
            Some(Ok(op)) => {
                self.last.lock().insert(name.to_string(), op.clone());
                Ok(op)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Connection(format!("unknown operation {name}"))),
        }
    }

    fn cancel_operation(&self, name: &str) -> Result<(), Error> {
        self.cancels.lock().push(name.to_string());
        Ok(())
    }

    fn download(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf, Error> {
        self.downloads
            .lock()
            .push((remote_path.to_string(), dest_dir.to_path_buf()));
        Ok(dest_dir.join("download.zip"))
    }
}

/// Collects every event it receives.
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingHandler {
    pub fn states(&self) -> Vec<(String, ProgressState)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.simulation_id.clone(), e.state))
            .collect()
    }
}

impl ProgressHandler for RecordingHandler {
    fn update(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

pub fn operation_name(id: &str) -> String {
    format!("operations/{id}")
}

pub fn operation(id: &str, state: ProgressState, percent: u32, context: &str) -> Operation {
    Operation {
        name: operation_name(id),
        done: false,
        metadata: OperationMetadata {
            simulation_id: id.to_string(),
            state,
            percent_complete: percent,
            message: String::new(),
            context: context.to_string(),
        },
        result: None,
    }
}

pub fn running(id: &str, percent: u32, context: &str) -> Result<Operation, Error> {
    Ok(operation(id, ProgressState::Running, percent, context))
}

pub fn porosity_done(id: &str, relative_density: f64) -> Result<Operation, Error> {
    let mut op = operation(id, ProgressState::Completed, 100, "");
    op.done = true;
    op.result = Some(OperationResult::Response(SimulationResponse {
        id: id.to_string(),
        logs: vec![LogFile {
            name: "solver.log".to_string(),
            contents: "done".to_string(),
        }],
        result: ResponseKind::Porosity {
            solid_ratio: relative_density,
        },
    }));
    Ok(op)
}

pub fn single_bead_done(id: &str, thermal_history: Option<&str>) -> Result<Operation, Error> {
    let mut op = operation(id, ProgressState::Completed, 100, "");
    op.done = true;
    op.result = Some(OperationResult::Response(SimulationResponse {
        id: id.to_string(),
        logs: Vec::new(),
        result: ResponseKind::MeltPool(MeltPoolMessage {
            length: vec![2e-4, 3e-4, 4e-4],
            width: vec![1e-4, 1e-4, 1e-4],
            depth: vec![5e-5, 6e-5, 7e-5],
            reference_width: vec![8e-5, 8e-5, 8e-5],
            reference_depth: vec![4e-5, 4e-5, 4e-5],
            thermal_history_path: thermal_history.map(str::to_string),
        }),
    }));
    Ok(op)
}

pub fn failed(id: &str, message: &str) -> Result<Operation, Error> {
    let mut op = operation(id, ProgressState::Running, 40, "Solving Layer 2");
    op.done = true;
    op.result = Some(OperationResult::Error(OperationError {
        code: StatusCode::Internal,
        message: message.to_string(),
        logs: vec![LogFile {
            name: "solver.log".to_string(),
            contents: "diverged".to_string(),
        }],
    }));
    Ok(op)
}

pub fn cancelled(id: &str) -> Result<Operation, Error> {
    let mut op = operation(id, ProgressState::Running, 10, "");
    op.done = true;
    op.result = Some(OperationResult::Error(OperationError {
        code: StatusCode::Cancelled,
        message: "cancelled".to_string(),
        logs: Vec::new(),
    }));
    Ok(op)
}

pub fn unreachable() -> Result<Operation, Error> {
    Err(Error::Connection("connection reset".to_string()))
}

pub fn porosity_input(id: &str) -> SimulationInput {
    SimulationInput::Porosity(PorosityInput {
        id: id.to_string(),
        material: "IN718".to_string(),
        machine: MachineParameters::default(),
        size: [3e-3; 3],
    })
}

pub fn single_bead_input(id: &str) -> SimulationInput {
    SimulationInput::SingleBead(SingleBeadInput {
        id: id.to_string(),
        material: "IN718".to_string(),
        machine: MachineParameters::default(),
        bead_length: 3e-3,
        output_thermal_history: false,
    })
}

pub fn settings(user_data_path: &Path) -> TaskSettings {
    TaskSettings {
        poll_interval: Duration::ZERO,
        max_poll_failures: 2,
        wait_timeout: None,
        user_data_path: user_data_path.to_path_buf(),
    }
}

/// Submits `input` through `connection` and wraps the operation in a task.
pub fn submit(
    connection: &Arc<ScriptedConnection>,
    input: SimulationInput,
    settings: &TaskSettings,
) -> SimulationTask {
    let operation = connection
        .submit(&input.to_request())
        .expect("scripted submit");
    SimulationTask::new(connection.clone(), operation, input, settings.clone())
}
