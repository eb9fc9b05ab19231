//! Progress reporting for remote simulations.

mod console;

pub use console::ConsoleProgressHandler;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::server::{OperationMetadata, ProgressMessage};

/// The lifecycle state of one remote simulation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressState {
    /// Created and not yet queued to run.
    New,
    /// Queued and waiting to start.
    Waiting,
    /// Running on the server.
    #[serde(alias = "EXECUTING")]
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
    /// Cancelled before finishing.
    Cancelled,
    /// Still running, but the solver reported a warning.
    Warning,
}

impl ProgressState {
    /// Whether no further transitions can occur from this state.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point-in-time snapshot of one simulation's progress.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The stable identity of the submitted simulation.
    pub simulation_id: String,
    pub state: ProgressState,
    /// Percent complete within the current `context`.
    pub percent_complete: u32,
    /// Free text, may carry solver diagnostics.
    pub message: String,
    /// The current execution phase, e.g. "Solving Layer 3".
    pub context: String,
}

impl ProgressEvent {
    /// Creates an event from a raw progress message reported for `simulation_id`.
    pub fn from_status_message(simulation_id: &str, msg: &ProgressMessage) -> Self {
        Self {
            simulation_id: simulation_id.to_string(),
            state: msg.state,
            percent_complete: msg.percent_complete.min(100),
            message: msg.message.clone(),
            context: msg.context.clone(),
        }
    }

    /// Creates an event from the metadata attached to a long-running operation.
    pub fn from_operation_metadata(metadata: &OperationMetadata) -> Self {
        Self {
            simulation_id: metadata.simulation_id.clone(),
            state: metadata.state,
            percent_complete: metadata.percent_complete.min(100),
            message: metadata.message.clone(),
            context: metadata.context.clone(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} - {}% - {} - {}",
            self.simulation_id, self.state, self.percent_complete, self.context, self.message,
        )
    }
}

/// Consumes progress events.
///
/// Handlers are shared between tasks and may be called from several threads,
/// so `update` takes `&self` and implementations synchronize internally.
/// An update must never fail; implementations log what they cannot apply.
pub trait ProgressHandler: Send + Sync {
    fn update(&self, event: &ProgressEvent);
}

impl<H: ProgressHandler + ?Sized> ProgressHandler for std::sync::Arc<H> {
    #[inline]
    fn update(&self, event: &ProgressEvent) {
        (**self).update(event)
    }
}
