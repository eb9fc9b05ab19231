use std::path::PathBuf;

use crate::server::{MeltPoolMessage, MicrostructureMessage};
use crate::simulation::{SimulationStatus, SimulationType};

/// Melt pool dimensions over the length of a single bead.
///
/// One row per time step, columns as in [`MeltPool::COLUMNS`].
#[derive(Clone, PartialEq, Debug)]
pub struct MeltPool {
    data: ndarray::Array2<f64>,
}

impl MeltPool {
    pub const COLUMNS: [&'static str; 5] =
        ["length", "width", "depth", "reference_width", "reference_depth"];
    const LENGTH: usize = 0;
    const WIDTH: usize = 1;
    const DEPTH: usize = 2;
    const REFERENCE_WIDTH: usize = 3;
    const REFERENCE_DEPTH: usize = 4;

    /// Builds the table from a server message. Short columns are padded with NaN.
    pub fn from_message(msg: &MeltPoolMessage) -> Self {
        let columns = [
            &msg.length,
            &msg.width,
            &msg.depth,
            &msg.reference_width,
            &msg.reference_depth,
        ];
        let nrows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
        let data = ndarray::Array2::from_shape_fn((nrows, columns.len()), |(i, j)| {
            columns[j].get(i).copied().unwrap_or(f64::NAN)
        });

        Self { data }
    }

    #[inline]
    pub fn data(&self) -> ndarray::ArrayView2<f64> {
        self.data.view()
    }

    pub fn median_length(&self) -> Option<f64> {
        self.column_median(Self::LENGTH)
    }

    pub fn median_width(&self) -> Option<f64> {
        self.column_median(Self::WIDTH)
    }

    pub fn median_depth(&self) -> Option<f64> {
        self.column_median(Self::DEPTH)
    }

    pub fn median_reference_width(&self) -> Option<f64> {
        self.column_median(Self::REFERENCE_WIDTH)
    }

    pub fn median_reference_depth(&self) -> Option<f64> {
        self.column_median(Self::REFERENCE_DEPTH)
    }

    /// Median of one column, ignoring NaN. `None` if the column has no values.
    fn column_median(&self, column: usize) -> Option<f64> {
        let mut values: Vec<f64> = self
            .data
            .column(column)
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct SingleBeadSummary {
    pub simulation_id: String,
    pub melt_pool: MeltPool,
    /// Local directory holding downloaded thermal history files.
    pub thermal_history_output: Option<PathBuf>,
    pub logs: String,
    pub status: SimulationStatus,
}

#[derive(Clone, PartialEq, Debug)]
pub struct PorositySummary {
    pub simulation_id: String,
    pub relative_density: f64,
    pub logs: String,
    pub status: SimulationStatus,
}

#[derive(Clone, PartialEq, Debug)]
pub struct MicrostructureSummary {
    pub simulation_id: String,
    /// Average grain sizes [microns].
    pub xy_average_grain_size: f64,
    pub xz_average_grain_size: f64,
    pub yz_average_grain_size: f64,
    pub logs: String,
    pub status: SimulationStatus,
}

impl MicrostructureSummary {
    pub(crate) fn from_message(
        simulation_id: String,
        msg: &MicrostructureMessage,
        logs: String,
        status: SimulationStatus,
    ) -> Self {
        Self {
            simulation_id,
            xy_average_grain_size: msg.xy_average_grain_size,
            xz_average_grain_size: msg.xz_average_grain_size,
            yz_average_grain_size: msg.yz_average_grain_size,
            logs,
            status,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct ThermalHistorySummary {
    pub simulation_id: String,
    /// Local directory holding the coaxial average sensor output.
    pub output_dir: PathBuf,
    pub logs: String,
    pub status: SimulationStatus,
}

/// The result of a successfully completed simulation.
#[derive(Clone, PartialEq, Debug)]
pub enum SimulationSummary {
    SingleBead(SingleBeadSummary),
    Porosity(PorositySummary),
    Microstructure(MicrostructureSummary),
    ThermalHistory(ThermalHistorySummary),
}

impl SimulationSummary {
    pub fn simulation_id(&self) -> &str {
        match self {
            Self::SingleBead(s) => &s.simulation_id,
            Self::Porosity(s) => &s.simulation_id,
            Self::Microstructure(s) => &s.simulation_id,
            Self::ThermalHistory(s) => &s.simulation_id,
        }
    }

    pub fn logs(&self) -> &str {
        match self {
            Self::SingleBead(s) => &s.logs,
            Self::Porosity(s) => &s.logs,
            Self::Microstructure(s) => &s.logs,
            Self::ThermalHistory(s) => &s.logs,
        }
    }

    /// `Completed`, or `Warning` if the solver finished with warnings.
    pub fn status(&self) -> SimulationStatus {
        match self {
            Self::SingleBead(s) => s.status,
            Self::Porosity(s) => s.status,
            Self::Microstructure(s) => s.status,
            Self::ThermalHistory(s) => s.status,
        }
    }

    pub fn simulation_type(&self) -> SimulationType {
        match self {
            Self::SingleBead(_) => SimulationType::SingleBead,
            Self::Porosity(_) => SimulationType::Porosity,
            Self::Microstructure(_) => SimulationType::Microstructure,
            Self::ThermalHistory(_) => SimulationType::ThermalHistory,
        }
    }
}

/// A simulation that failed on the server, or could not be submitted.
///
/// This is a value, not a fatal error: one failed simulation never aborts
/// the rest of its batch.
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
#[error("simulation {simulation_id} failed: {message}")]
pub struct SimulationError {
    pub simulation_id: String,
    pub message: String,
    pub logs: String,
}
