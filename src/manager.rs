use std::time::Duration;

use crate::progress::{ProgressEvent, ProgressHandler};
use crate::summary::{SimulationError, SimulationSummary};
use crate::task::{SimulationTask, TaskOutcome};
use crate::Error;

const DEFAULT_CANCEL_DELAY: Duration = Duration::from_millis(100);

/// Owns a batch of simulation tasks, in submission order.
///
/// One task failing, on the server or while being polled, never stops the
/// manager from processing the others.
#[derive(Debug)]
pub struct SimulationTaskManager {
    tasks: Vec<SimulationTask>,
    cancel_delay: Duration,
}

impl SimulationTaskManager {
    #[inline]
    pub fn new() -> Self {
        Self::with_cancel_delay(DEFAULT_CANCEL_DELAY)
    }

    /// Creates a manager pausing `cancel_delay` between cancellation requests.
    #[inline]
    pub fn with_cancel_delay(cancel_delay: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            cancel_delay,
        }
    }

    pub fn add_task(&mut self, task: SimulationTask) {
        self.tasks.push(task);
    }

    #[inline]
    pub fn tasks(&self) -> &[SimulationTask] {
        &self.tasks
    }

    pub fn simulation_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.simulation_id()).collect()
    }

    /// Whether every task is terminal. Does not contact the server.
    pub fn done(&self) -> bool {
        self.tasks.iter().all(SimulationTask::is_done)
    }

    /// Polls every task once, in submission order.
    ///
    /// A task whose poll fails is logged and reported with its last known
    /// progress, so the returned list always covers every task.
    pub fn status(
        &mut self,
        handler: Option<&dyn ProgressHandler>,
    ) -> Vec<(String, ProgressEvent)> {
        let mut statuses = Vec::with_capacity(self.tasks.len());

        for task in self.tasks.iter_mut() {
            let event = match task.status() {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        simulation_id = %task.simulation_id(),
                        error = %e,
                        "skipping simulation status, reporting last known progress"
                    );
                    task.last_progress().clone()
                }
            };
            if let Some(handler) = handler {
                handler.update(&event);
            }
            statuses.push((task.simulation_id().to_string(), event));
        }

        statuses
    }

    /// Waits for every task in turn.
    ///
    /// Tasks run concurrently on the server and waiting on a finished task
    /// returns at once, so this takes as long as the slowest simulation.
    /// Every task is waited on even if an earlier wait fails; the first
    /// failure is returned afterwards.
    pub fn wait_all(&mut self, handler: Option<&dyn ProgressHandler>) -> Result<(), Error> {
        let mut first_error = None;

        for task in self.tasks.iter_mut() {
            if let Err(e) = task.wait(handler) {
                tracing::warn!(simulation_id = %task.simulation_id(), error = %e, "wait failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Requests cancellation of every task, in submission order.
    ///
    /// Requests are spaced by the cancel delay. Failed requests are logged and skipped.
    pub fn cancel_all(&self) {
        for (i, task) in self.tasks.iter().enumerate() {
            if i > 0 && !self.cancel_delay.is_zero() {
                std::thread::sleep(self.cancel_delay);
            }
            if let Err(e) = task.cancel() {
                tracing::warn!(simulation_id = %task.simulation_id(), error = %e, "cancel failed");
            }
        }
    }

    /// The summaries of completed simulations, in submission order.
    pub fn summaries(&self) -> Vec<&SimulationSummary> {
        self.tasks.iter().filter_map(SimulationTask::summary).collect()
    }

    /// The errors of failed simulations, in submission order.
    pub fn errors(&self) -> Vec<&SimulationError> {
        self.tasks.iter().filter_map(SimulationTask::error).collect()
    }

    /// Every task's outcome, `None` for tasks still running.
    pub fn outcomes(&self) -> Vec<(&str, Option<&TaskOutcome>)> {
        self.tasks
            .iter()
            .map(|t| (t.simulation_id(), t.outcome()))
            .collect()
    }
}

impl Default for SimulationTaskManager {
    fn default() -> Self {
        Self::new()
    }
}
