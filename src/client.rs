use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::manager::SimulationTaskManager;
use crate::progress::{ConsoleProgressHandler, ProgressHandler};
use crate::server::Connection;
use crate::simulation::{short_id, SimulationInput, SimulationType};
use crate::study::{ParametricStudy, ParametricStudyProgressHandler};
use crate::task::SimulationTask;
use crate::Error;

/// Runs simulations on a simulation server.
pub struct Additive {
    connection: Arc<dyn Connection>,
    config: ClientConfig,
}

impl Additive {
    /// Creates a client submitting through `connection`.
    #[inline]
    pub fn new(connection: Arc<dyn Connection>, config: ClientConfig) -> Self {
        tracing::info!(
            server = %connection.describe(),
            user_data_path = %config.user_data_path.display(),
            "additive client ready"
        );
        Self { connection, config }
    }

    #[inline]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submits simulations without waiting for them, returning a manager tracking them.
    ///
    /// Inputs are validated before anything is submitted: the batch must be
    /// non-empty, every input must name a material, and IDs must be unique.
    /// Inputs without an ID are given one. A submission that fails becomes an
    /// already failed task so the rest of the batch still runs.
    pub fn simulate_async(
        &self,
        mut inputs: Vec<SimulationInput>,
    ) -> Result<SimulationTaskManager, Error> {
        validate_inputs(&mut inputs)?;
        let settings = self.config.task_settings()?;

        tracing::info!(count = inputs.len(), "starting simulations");
        let mut manager = SimulationTaskManager::with_cancel_delay(self.config.cancel_delay());

        for input in inputs {
            let task = match self.connection.submit(&input.to_request()) {
                Ok(operation) => {
                    tracing::debug!(
                        simulation_id = %input.id(),
                        operation = %operation.name,
                        "submitted simulation"
                    );
                    SimulationTask::new(self.connection.clone(), operation, input, settings.clone())
                }
                Err(e) => {
                    tracing::warn!(simulation_id = %input.id(), error = %e, "submission failed");
                    SimulationTask::failed(
                        self.connection.clone(),
                        input,
                        e.to_string(),
                        settings.clone(),
                    )
                }
            };
            manager.add_task(task);
        }

        Ok(manager)
    }

    /// Runs simulations to completion.
    ///
    /// A single simulation without a handler reports to a console progress bar.
    /// Failed simulations do not make this fail; inspect the returned manager's
    /// `summaries` and `errors`.
    pub fn simulate(
        &self,
        inputs: Vec<SimulationInput>,
        handler: Option<&dyn ProgressHandler>,
    ) -> Result<SimulationTaskManager, Error> {
        let single = inputs.len() == 1;
        let mut manager = self.simulate_async(inputs)?;

        let console;
        let handler = match handler {
            Some(handler) => Some(handler),
            None if single => {
                console = ConsoleProgressHandler::new();
                Some(&console as &dyn ProgressHandler)
            }
            None => None,
        };

        manager.wait_all(handler)?;
        Ok(manager)
    }

    /// Runs the pending simulations of a study, lowest priority value first,
    /// keeping the study's status and results up to date.
    ///
    /// Rows without a material are skipped.
    pub fn run_study(
        &self,
        study: &Arc<Mutex<ParametricStudy>>,
        types: Option<&[SimulationType]>,
        priority: Option<u32>,
    ) -> Result<SimulationTaskManager, Error> {
        let inputs: Vec<SimulationInput> = study
            .lock()
            .pending(types, priority)
            .into_iter()
            .filter(|row| {
                let has_material = !row.input.material().is_empty();
                if !has_material {
                    tracing::warn!(simulation_id = %row.id, "no material assigned, skipping");
                }
                has_material
            })
            .map(|row| row.input.clone())
            .collect();

        if inputs.is_empty() {
            tracing::info!("no pending simulations in study");
            return Ok(SimulationTaskManager::with_cancel_delay(self.config.cancel_delay()));
        }

        let handler = ParametricStudyProgressHandler::new(study.clone());
        let mut manager = self.simulate_async(inputs)?;
        let waited = manager.wait_all(Some(&handler));

        let outcomes = manager.outcomes();
        study
            .lock()
            .update(outcomes.into_iter().filter_map(|(id, o)| o.map(|o| (id, o))))?;

        waited?;
        Ok(manager)
    }
}

/// Checks the preconditions of a batch, assigning IDs to inputs without one.
fn validate_inputs(inputs: &mut [SimulationInput]) -> Result<(), Error> {
    if inputs.is_empty() {
        return Err(Error::NoInputs);
    }

    let mut ids = HashSet::with_capacity(inputs.len());
    for input in inputs.iter_mut() {
        if input.id().is_empty() {
            input.set_id(short_id());
        }
        if input.material().is_empty() {
            return Err(Error::MissingMaterial(input.id().to_string()));
        }
        if !ids.insert(input.id().to_string()) {
            return Err(Error::DuplicateId(input.id().to_string()));
        }
    }

    Ok(())
}
