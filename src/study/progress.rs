use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{ProgressEvent, ProgressHandler, ProgressState};
use crate::simulation::SimulationStatus;
use crate::study::{ParametricStudy, StudyRecord};

/// Keeps the status column of a parametric study in step with simulation progress.
///
/// Repeated events in the same state are dropped, so polling a quiet
/// simulation does not rewrite the study.
pub struct ParametricStudyProgressHandler<S: StudyRecord = ParametricStudy> {
    study: Arc<Mutex<S>>,
    last_states: Mutex<HashMap<String, ProgressState>>,
}

impl<S: StudyRecord> ParametricStudyProgressHandler<S> {
    /// Creates a handler updating `study`. All writes go through the study's lock.
    #[inline]
    pub fn new(study: Arc<Mutex<S>>) -> Self {
        Self {
            study,
            last_states: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn study(&self) -> &Arc<Mutex<S>> {
        &self.study
    }
}

impl<S: StudyRecord> ProgressHandler for ParametricStudyProgressHandler<S> {
    fn update(&self, event: &ProgressEvent) {
        let mut last_states = self.last_states.lock();
        if last_states.get(&event.simulation_id) == Some(&event.state) {
            return;
        }

        let status = match event.state {
            ProgressState::Waiting => Some(SimulationStatus::Pending),
            ProgressState::Cancelled => Some(SimulationStatus::Cancelled),
            ProgressState::Running => Some(SimulationStatus::Running),
            ProgressState::Warning => Some(SimulationStatus::Warning),
            ProgressState::Completed => Some(SimulationStatus::Completed),
            ProgressState::Error => Some(SimulationStatus::Error),
            // tracking starts after creation
            ProgressState::New => None,
        };

        if let Some(status) = status {
            tracing::debug!(simulation_id = %event.simulation_id, ?status, "updating study");
            let message = match event.state {
                ProgressState::Error => Some(event.message.as_str()),
                _ => None,
            };
            let result = self
                .study
                .lock()
                .set_status(&event.simulation_id, status, message);
            if let Err(e) = result {
                // leave the cache alone so the next poll retries the write
                tracing::warn!(
                    simulation_id = %event.simulation_id,
                    error = %e,
                    "failed to update study"
                );
                return;
            }
        }

        last_states.insert(event.simulation_id.clone(), event.state);
    }
}
