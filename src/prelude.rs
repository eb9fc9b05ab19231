//! Includes commonly used library components.

pub use crate::{
    Additive,
    ClientConfig,
    ConsoleProgressHandler,
    Error,
    ParametricStudy,
    ParametricStudyProgressHandler,
    ProgressEvent,
    ProgressHandler,
    ProgressState,
    SimulationError,
    SimulationSummary,
    SimulationTask,
    SimulationTaskManager,
    StudyRecord,
    TaskOutcome,
};
pub use crate::server::Connection;
pub use crate::simulation::{
    MachineParameters,
    SimulationInput,
    SimulationStatus,
    SimulationType,
};
