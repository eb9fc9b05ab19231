use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kinds of simulation the server can run.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SimulationType {
    SingleBead,
    Porosity,
    Microstructure,
    ThermalHistory,
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The status of a simulation as recorded in a parametric study.
///
/// Variants are listed in order of precedence.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SimulationStatus {
    /// Finished successfully.
    Completed,
    /// Finished with warnings.
    Warning,
    /// Errored before finishing.
    Error,
    Cancelled,
    Running,
    /// Queued and waiting to run.
    Pending,
    /// Created but not yet queued.
    New,
    /// Do not run this simulation.
    Skip,
}

/// Machine parameters shared by every simulation type.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineParameters {
    /// Laser power [W].
    pub laser_power: f64,
    /// Laser scan speed [m/s].
    pub scan_speed: f64,
    /// Heater temperature [C].
    pub heater_temperature: f64,
    /// Powder layer thickness [m].
    pub layer_thickness: f64,
    /// Laser beam diameter [m].
    pub beam_diameter: f64,
    /// Hatch scan angle of the first layer [degrees].
    pub starting_layer_angle: f64,
    /// Hatch rotation between layers [degrees].
    pub layer_rotation_angle: f64,
    /// Hatch spacing [m].
    pub hatch_spacing: f64,
    /// Slicing stripe width [m].
    pub slicing_stripe_width: f64,
}

impl Default for MachineParameters {
    fn default() -> Self {
        Self {
            laser_power: 195.0,
            scan_speed: 1.0,
            heater_temperature: 80.0,
            layer_thickness: 5e-5,
            beam_diameter: 1e-4,
            starting_layer_angle: 57.0,
            layer_rotation_angle: 67.0,
            hatch_spacing: 1e-4,
            slicing_stripe_width: 0.01,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SingleBeadInput {
    pub id: String,
    pub material: String,
    pub machine: MachineParameters,
    /// Length of the bead to simulate [m].
    pub bead_length: f64,
    /// Whether to produce thermal history output files.
    #[serde(default)]
    pub output_thermal_history: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PorosityInput {
    pub id: String,
    pub material: String,
    pub machine: MachineParameters,
    /// Sample size along x, y and z [m].
    pub size: [f64; 3],
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MicrostructureInput {
    pub id: String,
    pub material: String,
    pub machine: MachineParameters,
    /// Minimum corner of the sample [m].
    pub sample_min: [f64; 3],
    /// Sample size along x, y and z [m].
    pub sample_size: [f64; 3],
    pub sensor_dimension: f64,
    /// Thermal parameters to use instead of computing them.
    #[serde(default)]
    pub thermal_parameters: Option<ThermalParameters>,
    #[serde(default)]
    pub random_seed: Option<u32>,
}

/// User supplied thermal parameters for a microstructure simulation.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ThermalParameters {
    /// [K/s]
    pub cooling_rate: f64,
    /// [K/m]
    pub thermal_gradient: f64,
    /// [m]
    pub melt_pool_width: f64,
    /// [m]
    pub melt_pool_depth: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ThermalHistoryInput {
    pub id: String,
    pub material: String,
    pub machine: MachineParameters,
    /// Build geometry file.
    pub geometry_path: PathBuf,
    /// Radius of the coaxial average sensor [m].
    pub coax_ave_sensor_radius: f64,
}

/// The input of one simulation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimulationInput {
    SingleBead(SingleBeadInput),
    Porosity(PorosityInput),
    Microstructure(MicrostructureInput),
    ThermalHistory(ThermalHistoryInput),
}

impl SimulationInput {
    pub fn id(&self) -> &str {
        match self {
            Self::SingleBead(i) => &i.id,
            Self::Porosity(i) => &i.id,
            Self::Microstructure(i) => &i.id,
            Self::ThermalHistory(i) => &i.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Self::SingleBead(i) => i.id = id,
            Self::Porosity(i) => i.id = id,
            Self::Microstructure(i) => i.id = id,
            Self::ThermalHistory(i) => i.id = id,
        }
    }

    pub fn material(&self) -> &str {
        match self {
            Self::SingleBead(i) => &i.material,
            Self::Porosity(i) => &i.material,
            Self::Microstructure(i) => &i.material,
            Self::ThermalHistory(i) => &i.material,
        }
    }

    pub fn machine(&self) -> &MachineParameters {
        match self {
            Self::SingleBead(i) => &i.machine,
            Self::Porosity(i) => &i.machine,
            Self::Microstructure(i) => &i.machine,
            Self::ThermalHistory(i) => &i.machine,
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

    /// Converts the input into the request submitted to the server.
    pub fn to_request(&self) -> SimulationRequest {
        SimulationRequest {
            id: self.id().to_string(),
            simulation_type: self.simulation_type(),
            input: self.clone(),
        }
    }
}

/// A request to run one simulation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub id: String,
    pub simulation_type: SimulationType,
    pub input: SimulationInput,
}

/// Generates a short unique simulation ID.
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
