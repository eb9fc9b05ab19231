//! A client framework for running additive manufacturing simulations on a remote server.
//!
//! Simulations are submitted through an [`Additive`] client, tracked by
//! [`SimulationTask`]s, and collected by a [`SimulationTaskManager`]. Progress
//! flows to any [`ProgressHandler`], such as a console progress bar or a
//! [`ParametricStudy`] being kept up to date.

mod client;
mod config;
mod manager;
mod task;

pub mod logging;
pub mod prelude;
pub mod progress;
pub mod server;
pub mod simulation;
pub mod study;
pub mod summary;

pub use client::Additive;
pub use config::{ClientConfig, TaskSettings};
pub use manager::SimulationTaskManager;
pub use progress::{ConsoleProgressHandler, ProgressEvent, ProgressHandler, ProgressState};
pub use study::{ParametricStudy, ParametricStudyProgressHandler, StudyRecord};
pub use summary::{SimulationError, SimulationSummary};
pub use task::{SimulationTask, TaskOutcome};

/// Represents an error in the client.
///
/// A simulation failing on the server is not an `Error`; see [`SimulationError`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Duplicate simulation ID \"{0}\" in input list")]
    DuplicateId(String),
    #[error("No simulation inputs provided")]
    NoInputs,
    #[error("A material is not assigned to simulation \"{0}\"")]
    MissingMaterial(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Gave up polling simulation \"{simulation_id}\" after {attempts} failed attempts")]
    PollRetriesExhausted {
        simulation_id: String,
        attempts: u32,
    },
    #[error("Timed out waiting for simulation \"{0}\"")]
    Timeout(String),
    #[error("Simulation \"{0}\" is not in the study")]
    UnknownSimulation(String),
    #[error("{path} is not a valid parametric study ( {reason} )")]
    InvalidStudy {
        path: String,
        reason: String,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Failed to install logger: {0}")]
    Logging(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
