use std::sync::Arc;
use std::time::Instant;

use crate::config::TaskSettings;
use crate::progress::{ProgressEvent, ProgressHandler, ProgressState};
use crate::server::{
    flatten_logs, Connection, Operation, OperationResult, ResponseKind, SimulationResponse,
    StatusCode,
};
use crate::simulation::{SimulationInput, SimulationStatus};
use crate::summary::{
    MeltPool, MicrostructureSummary, PorositySummary, SimulationError, SimulationSummary,
    SingleBeadSummary, ThermalHistorySummary,
};
use crate::Error;

/// How a simulation task ended.
#[derive(Clone, PartialEq, Debug)]
pub enum TaskOutcome {
    Completed(SimulationSummary),
    Failed(SimulationError),
    Cancelled,
}

/// A client-side handle to one simulation running on the server.
///
/// A task is terminal once its operation has finished; from then on it never
/// contacts the server again and its state never changes.
pub struct SimulationTask {
    connection: Arc<dyn Connection>,
    input: SimulationInput,
    operation_name: Option<String>,
    settings: TaskSettings,
    last_progress: ProgressEvent,
    outcome: Option<TaskOutcome>,
}

impl SimulationTask {
    /// Creates a task tracking `operation`, the operation returned when `input` was submitted.
    pub fn new(
        connection: Arc<dyn Connection>,
        operation: Operation,
        input: SimulationInput,
        settings: TaskSettings,
    ) -> Self {
        let last_progress = ProgressEvent {
            simulation_id: input.id().to_string(),
            state: ProgressState::New,
            percent_complete: 0,
            message: String::new(),
            context: String::new(),
        };
        let mut task = Self {
            connection,
            input,
            operation_name: Some(operation.name.clone()),
            settings,
            last_progress,
            outcome: None,
        };
        task.apply(operation);
        task
    }

    /// Creates a task for an input that never reached the server.
    pub fn failed(
        connection: Arc<dyn Connection>,
        input: SimulationInput,
        message: String,
        settings: TaskSettings,
    ) -> Self {
        let simulation_id = input.id().to_string();
        Self {
            connection,
            operation_name: None,
            settings,
            last_progress: ProgressEvent {
                simulation_id: simulation_id.clone(),
                state: ProgressState::Error,
                percent_complete: 0,
                message: message.clone(),
                context: String::new(),
            },
            outcome: Some(TaskOutcome::Failed(SimulationError {
                simulation_id,
                message,
                logs: String::new(),
            })),
            input,
        }
    }

    #[inline]
    pub fn simulation_id(&self) -> &str {
        self.input.id()
    }

    #[inline]
    pub fn input(&self) -> &SimulationInput {
        &self.input
    }

    /// The server-side operation name, `None` if submission failed.
    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// The most recently observed progress.
    #[inline]
    pub fn last_progress(&self) -> &ProgressEvent {
        &self.last_progress
    }

    #[inline]
    pub fn state(&self) -> ProgressState {
        self.last_progress.state
    }

    /// Whether the task has reached a terminal state.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    /// The summary of the simulation, present only if it completed.
    pub fn summary(&self) -> Option<&SimulationSummary> {
        match self.outcome {
            Some(TaskOutcome::Completed(ref summary)) => Some(summary),
            _ => None,
        }
    }

    /// The failure of the simulation, present only if it errored.
    pub fn error(&self) -> Option<&SimulationError> {
        match self.outcome {
            Some(TaskOutcome::Failed(ref error)) => Some(error),
            _ => None,
        }
    }

    /// Polls the server once and returns the latest progress.
    ///
    /// A terminal task returns its final progress without contacting the server.
    /// Transport failures are returned as is; retrying is up to the caller.
    pub fn status(&mut self) -> Result<ProgressEvent, Error> {
        let name = match (&self.outcome, &self.operation_name) {
            (None, Some(name)) => name.clone(),
            _ => return Ok(self.last_progress.clone()),
        };

        let operation = self.connection.get_operation(&name)?;
        Ok(self.apply(operation))
    }

    /// Blocks until the task is terminal, passing every polled event to `handler`.
    ///
    /// Returns immediately if the task is already terminal. Failed polls are
    /// retried on the next cycle until `max_poll_failures` consecutive failures.
    pub fn wait(&mut self, handler: Option<&dyn ProgressHandler>) -> Result<&TaskOutcome, Error> {
        self.poll_until_done(handler)?;
        self.outcome.as_ref().ok_or_else(|| {
            Error::Connection(format!(
                "operation for simulation \"{}\" ended without an outcome",
                self.simulation_id()
            ))
        })
    }

    fn poll_until_done(&mut self, handler: Option<&dyn ProgressHandler>) -> Result<(), Error> {
        if self.is_done() {
            return Ok(());
        }

        tracing::debug!(simulation_id = %self.simulation_id(), "waiting for simulation");
        let started = Instant::now();
        let mut failures = 0;

        loop {
            match self.status() {
                Ok(event) => {
                    failures = 0;
                    if let Some(handler) = handler {
                        handler.update(&event);
                    }
                    if self.is_done() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        simulation_id = %self.simulation_id(),
                        attempt = failures,
                        error = %e,
                        "failed to poll simulation"
                    );
                    if failures > self.settings.max_poll_failures {
                        tracing::error!(
                            simulation_id = %self.simulation_id(),
                            "giving up on simulation"
                        );
                        return Err(Error::PollRetriesExhausted {
                            simulation_id: self.simulation_id().to_string(),
                            attempts: failures,
                        });
                    }
                }
            }

            if let Some(timeout) = self.settings.wait_timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::Timeout(self.simulation_id().to_string()));
                }
            }
            std::thread::sleep(self.settings.poll_interval);
        }
    }

    /// Requests cancellation. The task stays running until a later poll sees it cancelled.
    /// Does nothing for a terminal task.
    pub fn cancel(&self) -> Result<(), Error> {
        let name = match (&self.outcome, &self.operation_name) {
            (None, Some(name)) => name,
            _ => return Ok(()),
        };

        tracing::debug!(simulation_id = %self.simulation_id(), operation = %name, "cancelling");
        self.connection.cancel_operation(name)
    }

    /// Records a freshly fetched operation and returns the progress it carries.
    fn apply(&mut self, operation: Operation) -> ProgressEvent {
        let mut event = ProgressEvent::from_operation_metadata(&operation.metadata);
        event.simulation_id = self.simulation_id().to_string();

        if operation.done {
            let outcome = self.finish(operation.result, &mut event);
            tracing::info!(
                simulation_id = %self.simulation_id(),
                state = %event.state,
                "simulation finished"
            );
            self.outcome = Some(outcome);
        }

        self.last_progress = event.clone();
        event
    }

    /// Turns the result of a finished operation into an outcome, forcing
    /// `event` into the matching final state.
    fn finish(&self, result: Option<OperationResult>, event: &mut ProgressEvent) -> TaskOutcome {
        match result {
            Some(OperationResult::Response(response)) => {
                match self.create_summary(&response, event.state) {
                    Ok(summary) => {
                        if event.state != ProgressState::Warning {
                            event.state = ProgressState::Completed;
                        }
                        TaskOutcome::Completed(summary)
                    }
                    Err(e) => self.fail(event, e.to_string(), String::new()),
                }
            }
            Some(OperationResult::Error(err)) if err.code == StatusCode::Cancelled => {
                event.state = ProgressState::Cancelled;
                TaskOutcome::Cancelled
            }
            Some(OperationResult::Error(err)) if err.code != StatusCode::Ok => {
                let logs = flatten_logs(&err.logs);
                self.fail(event, err.message, logs)
            }
            _ if event.state == ProgressState::Cancelled => TaskOutcome::Cancelled,
            _ => self.fail(
                event,
                String::from("operation finished without a result"),
                String::new(),
            ),
        }
    }

    fn fail(&self, event: &mut ProgressEvent, message: String, logs: String) -> TaskOutcome {
        event.state = ProgressState::Error;
        event.message = message.clone();
        TaskOutcome::Failed(SimulationError {
            simulation_id: self.simulation_id().to_string(),
            message,
            logs,
        })
    }

    fn create_summary(
        &self,
        response: &SimulationResponse,
        state: ProgressState,
    ) -> Result<SimulationSummary, Error> {
        let simulation_id = self.simulation_id().to_string();
        let status = if state == ProgressState::Warning {
            SimulationStatus::Warning
        } else {
            SimulationStatus::Completed
        };
        let logs = flatten_logs(&response.logs);

        let summary = match response.result {
            ResponseKind::MeltPool(ref msg) => {
                let thermal_history_output = match msg.thermal_history_path.as_deref() {
                    Some(remote) if !remote.is_empty() => {
                        Some(self.download(remote, "thermal_history")?)
                    }
                    _ => None,
                };
                SimulationSummary::SingleBead(SingleBeadSummary {
                    simulation_id,
                    melt_pool: MeltPool::from_message(msg),
                    thermal_history_output,
                    logs,
                    status,
                })
            }
            ResponseKind::Porosity { solid_ratio } => SimulationSummary::Porosity(PorositySummary {
                simulation_id,
                relative_density: solid_ratio,
                logs,
                status,
            }),
            ResponseKind::Microstructure(ref msg) => SimulationSummary::Microstructure(
                MicrostructureSummary::from_message(simulation_id, msg, logs, status),
            ),
            ResponseKind::ThermalHistory { ref remote_path } => {
                let output_dir = self.download(remote_path, "coax_ave_output")?;
                SimulationSummary::ThermalHistory(ThermalHistorySummary {
                    simulation_id,
                    output_dir,
                    logs,
                    status,
                })
            }
        };

        Ok(summary)
    }

    /// Downloads a result file into `<user data>/<simulation id>/<subdir>`.
    fn download(&self, remote: &str, subdir: &str) -> Result<std::path::PathBuf, Error> {
        let dir = self
            .settings
            .user_data_path
            .join(self.simulation_id())
            .join(subdir);
        std::fs::create_dir_all(&dir)?;
        self.connection.download(remote, &dir)?;
        Ok(dir)
    }
}

impl std::fmt::Debug for SimulationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationTask")
            .field("simulation_id", &self.simulation_id())
            .field("operation_name", &self.operation_name)
            .field("last_progress", &self.last_progress)
            .field("outcome", &self.outcome)
            .finish()
    }
}
