//! Parametric studies: persisted tables of simulations run as one experiment.

mod progress;

pub use progress::ParametricStudyProgressHandler;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::simulation::{short_id, SimulationInput, SimulationStatus, SimulationType};
use crate::summary::SimulationSummary;
use crate::task::TaskOutcome;
use crate::Error;

/// Current version of the study file format.
pub const FORMAT_VERSION: u32 = 3;
/// Priority assigned to new simulations. Lower values run first.
pub const DEFAULT_PRIORITY: u32 = 1;
/// Iteration assigned to new simulations.
pub const DEFAULT_ITERATION: u32 = 0;
const FILE_EXTENSION: &str = "ps";

/// The per-row operations a progress handler needs from a study.
pub trait StudyRecord: Send {
    /// Sets a simulation's status, and its error message if one is given.
    fn set_status(
        &mut self,
        id: &str,
        status: SimulationStatus,
        message: Option<&str>,
    ) -> Result<(), Error>;

    fn set_priority(&mut self, id: &str, priority: u32) -> Result<(), Error>;

    fn set_iteration(&mut self, id: &str, iteration: u32) -> Result<(), Error>;
}

/// Results extracted from a completed simulation.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyResults {
    /// Median melt pool dimensions [m].
    pub melt_pool_width: Option<f64>,
    pub melt_pool_depth: Option<f64>,
    pub melt_pool_length: Option<f64>,
    pub melt_pool_length_over_width: Option<f64>,
    pub melt_pool_reference_width: Option<f64>,
    pub melt_pool_reference_depth: Option<f64>,
    pub melt_pool_reference_depth_over_width: Option<f64>,
    pub relative_density: Option<f64>,
    /// Average grain sizes [microns].
    pub xy_average_grain_size: Option<f64>,
    pub xz_average_grain_size: Option<f64>,
    pub yz_average_grain_size: Option<f64>,
}

/// One simulation in a study.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct StudyRow {
    pub id: String,
    pub simulation_type: SimulationType,
    pub status: SimulationStatus,
    pub priority: u32,
    pub iteration: u32,
    pub input: SimulationInput,
    #[serde(default)]
    pub results: StudyResults,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct StudyFile {
    format_version: u32,
    rows: Vec<StudyRow>,
}

/// A table of simulations keyed by unique ID, saved to disk after every change.
#[derive(Debug)]
pub struct ParametricStudy {
    path: PathBuf,
    rows: Vec<StudyRow>,
}

impl ParametricStudy {
    /// Opens the study at `path`, creating it if it does not exist.
    ///
    /// A `.ps` extension is added if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = with_extension(path.as_ref());
        if path.exists() {
            return Self::load(path);
        }

        let study = Self {
            path,
            rows: Vec::new(),
        };
        study.save()?;
        tracing::info!(path = %study.path.display(), "created parametric study");
        Ok(study)
    }

    /// Loads an existing study. Later saves overwrite the same file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let invalid = |reason: String| Error::InvalidStudy {
            path: path.display().to_string(),
            reason,
        };

        if !path.is_file() {
            return Err(invalid("not a file".to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let file: StudyFile = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        if file.format_version > FORMAT_VERSION {
            return Err(invalid(format!(
                "format version {} is newer than supported version {}",
                file.format_version, FORMAT_VERSION,
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows: file.rows,
        })
    }

    pub fn save(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StudyFile {
            format_version: FORMAT_VERSION,
            rows: self.rows.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Changes where the study is saved and saves it there.
    ///
    /// A `.ps` extension is added if missing.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        self.path = with_extension(path.as_ref());
        self.save()
    }

    #[inline]
    pub fn rows(&self) -> &[StudyRow] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&StudyRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds simulations to the study, returning their IDs.
    ///
    /// An input whose ID is already taken is given a new unique ID prefixed by the old one.
    pub fn add_inputs(
        &mut self,
        inputs: &[SimulationInput],
        priority: u32,
        iteration: u32,
        status: SimulationStatus,
    ) -> Result<Vec<String>, Error> {
        let mut ids = Vec::with_capacity(inputs.len());

        for input in inputs {
            let mut input = input.clone();
            let id = self.unique_id(input.id());
            input.set_id(id.clone());
            self.rows.push(StudyRow {
                id: id.clone(),
                simulation_type: input.simulation_type(),
                status,
                priority,
                iteration,
                input,
                results: StudyResults::default(),
                error_message: None,
            });
            ids.push(id);
        }

        self.save()?;
        Ok(ids)
    }

    fn unique_id(&self, id: &str) -> String {
        if !id.is_empty() && self.row(id).is_none() {
            return id.to_string();
        }
        let prefix = if id.is_empty() { "sim" } else { id };
        loop {
            let candidate = format!("{}_{}", prefix, short_id());
            if self.row(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn row_mut(&mut self, id: &str) -> Result<&mut StudyRow, Error> {
        self.rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::UnknownSimulation(id.to_string()))
    }

    /// Sets a simulation's status and replaces its error message, clearing it when `None`.
    pub fn set_status(
        &mut self,
        id: &str,
        status: SimulationStatus,
        message: Option<&str>,
    ) -> Result<(), Error> {
        let row = self.row_mut(id)?;
        row.status = status;
        row.error_message = message.map(str::to_string);
        self.save()
    }

    pub fn set_priority(&mut self, id: &str, priority: u32) -> Result<(), Error> {
        self.row_mut(id)?.priority = priority;
        self.save()
    }

    /// Sets the iteration number, used to track the evolution of a design of experiments.
    pub fn set_iteration(&mut self, id: &str, iteration: u32) -> Result<(), Error> {
        self.row_mut(id)?.iteration = iteration;
        self.save()
    }

    pub fn remove(&mut self, ids: &[&str]) -> Result<(), Error> {
        self.rows.retain(|r| !ids.contains(&r.id.as_str()));
        self.save()
    }

    /// Removes every simulation.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.rows.clear();
        self.save()
    }

    /// Pending simulations, lowest priority value first.
    ///
    /// `types` and `priority` narrow the selection when given.
    pub fn pending(
        &self,
        types: Option<&[SimulationType]>,
        priority: Option<u32>,
    ) -> Vec<&StudyRow> {
        let mut rows: Vec<&StudyRow> = self
            .rows
            .iter()
            .filter(|r| r.status == SimulationStatus::Pending)
            .filter(|r| types.map_or(true, |t| t.contains(&r.simulation_type)))
            .filter(|r| priority.map_or(true, |p| r.priority == p))
            .collect();
        rows.sort_by_key(|r| r.priority);
        rows
    }

    /// Records the outcomes of finished simulations. Unknown IDs are skipped.
    pub fn update<'a, I>(&mut self, outcomes: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (&'a str, &'a TaskOutcome)>,
    {
        for (id, outcome) in outcomes {
            let row = match self.row_mut(id) {
                Ok(row) => row,
                Err(_) => {
                    tracing::warn!(simulation_id = %id, "no study row for simulation, skipping");
                    continue;
                }
            };
            match outcome {
                TaskOutcome::Completed(summary) => {
                    row.status = summary.status();
                    row.error_message = None;
                    apply_summary(&mut row.results, summary);
                }
                TaskOutcome::Failed(error) => {
                    row.status = SimulationStatus::Error;
                    row.error_message = Some(error.message.clone());
                }
                TaskOutcome::Cancelled => {
                    row.status = SimulationStatus::Cancelled;
                    row.error_message = None;
                }
            }
        }

        self.save()
    }
}

impl StudyRecord for ParametricStudy {
    fn set_status(
        &mut self,
        id: &str,
        status: SimulationStatus,
        message: Option<&str>,
    ) -> Result<(), Error> {
        ParametricStudy::set_status(self, id, status, message)
    }

    fn set_priority(&mut self, id: &str, priority: u32) -> Result<(), Error> {
        ParametricStudy::set_priority(self, id, priority)
    }

    fn set_iteration(&mut self, id: &str, iteration: u32) -> Result<(), Error> {
        ParametricStudy::set_iteration(self, id, iteration)
    }
}

/// Appends the study extension unless `path` already has it.
fn with_extension(path: &Path) -> PathBuf {
    if path.extension().map_or(false, |ext| ext == FILE_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn apply_summary(results: &mut StudyResults, summary: &SimulationSummary) {
    match summary {
        SimulationSummary::SingleBead(s) => {
            let mp = &s.melt_pool;
            results.melt_pool_width = mp.median_width();
            results.melt_pool_depth = mp.median_depth();
            results.melt_pool_length = mp.median_length();
            results.melt_pool_length_over_width = ratio(mp.median_length(), mp.median_width());
            results.melt_pool_reference_width = mp.median_reference_width();
            results.melt_pool_reference_depth = mp.median_reference_depth();
            results.melt_pool_reference_depth_over_width =
                ratio(mp.median_reference_depth(), mp.median_reference_width());
        }
        SimulationSummary::Porosity(s) => results.relative_density = Some(s.relative_density),
        SimulationSummary::Microstructure(s) => {
            results.xy_average_grain_size = Some(s.xy_average_grain_size);
            results.xz_average_grain_size = Some(s.xz_average_grain_size);
            results.yz_average_grain_size = Some(s.yz_average_grain_size);
        }
        SimulationSummary::ThermalHistory(_) => {}
    }
}
