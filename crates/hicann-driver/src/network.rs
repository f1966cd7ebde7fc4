//! Logical network description.
//!
//! Populations of cells and the projections between them, as handed to the
//! mapping service. Projections are immutable once created.

use std::fmt;

use hicann_chip::Receptor;
use serde::{Deserialize, Serialize};

use crate::error::{HicannError, Result};

/// Population handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PopulationId(pub u32);

impl fmt::Display for PopulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Population({})", self.0)
    }
}

/// Projection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectionId(pub u32);

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Projection({})", self.0)
    }
}

/// Conductance-based leaky integrate-and-fire parameters (biological units:
/// nF, mV, ms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronParameters {
    /// Membrane capacitance (nF)
    pub cm: f64,
    /// Reset potential after a spike (mV)
    pub v_reset: f64,
    /// Resting potential (mV)
    pub v_rest: f64,
    /// Spike threshold (mV)
    pub v_thresh: f64,
    /// Inhibitory reversal potential (mV)
    pub e_rev_i: f64,
    /// Excitatory reversal potential (mV)
    pub e_rev_e: f64,
    /// Membrane time constant (ms)
    pub tau_m: f64,
    /// Refractory period (ms)
    pub tau_refrac: f64,
    /// Excitatory synaptic time constant (ms)
    pub tau_syn_e: f64,
    /// Inhibitory synaptic time constant (ms)
    pub tau_syn_i: f64,
}

impl Default for NeuronParameters {
    fn default() -> Self {
        Self {
            cm: 0.2,
            v_reset: -70.0,
            v_rest: -20.0,
            v_thresh: -10.0,
            e_rev_i: -100.0,
            e_rev_e: 60.0,
            tau_m: 20.0,
            tau_refrac: 0.1,
            tau_syn_e: 5.0,
            tau_syn_i: 5.0,
        }
    }
}

/// Cell model of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    /// Hardware neuron
    IfCondExp(NeuronParameters),
    /// External stimulus replaying fixed spike times (ms)
    SpikeSourceArray {
        /// Spike times in ms, ascending
        spike_times: Vec<f64>,
    },
}

impl CellType {
    /// True for cells that are emulated on a HICANN neuron.
    pub fn is_neuron(&self) -> bool {
        matches!(self, Self::IfCondExp(_))
    }
}

/// Connectivity pattern of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    /// Every source neuron connects to every target neuron
    AllToAll {
        /// Relative weight, 1.0 = strongest
        weight: f64,
    },
}

impl Connector {
    /// Weight carried by every connection.
    pub const fn weight(self) -> f64 {
        match self {
            Self::AllToAll { weight } => weight,
        }
    }
}

/// A group of identical cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    id: PopulationId,
    size: usize,
    cell: CellType,
    record_spikes: bool,
    record_voltage: bool,
}

impl Population {
    /// Population handle
    pub const fn id(&self) -> PopulationId {
        self.id
    }

    /// Number of cells
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Cell model
    pub const fn cell(&self) -> &CellType {
        &self.cell
    }

    /// True if spikes are recorded
    pub const fn records_spikes(&self) -> bool {
        self.record_spikes
    }

    /// True if the membrane voltage is recorded
    pub const fn records_voltage(&self) -> bool {
        self.record_voltage
    }
}

/// A logical connection between two populations.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    id: ProjectionId,
    source: PopulationId,
    target: PopulationId,
    connector: Connector,
    receptor: Receptor,
}

impl Projection {
    /// Projection handle
    pub const fn id(&self) -> ProjectionId {
        self.id
    }

    /// Presynaptic population
    pub const fn source(&self) -> PopulationId {
        self.source
    }

    /// Postsynaptic population
    pub const fn target(&self) -> PopulationId {
        self.target
    }

    /// Connectivity pattern
    pub const fn connector(&self) -> Connector {
        self.connector
    }

    /// Synaptic input driven on the target
    pub const fn receptor(&self) -> Receptor {
        self.receptor
    }
}

/// Network under construction or handed to the mapping service.
#[derive(Debug, Clone, Default)]
pub struct Network {
    populations: Vec<Population>,
    projections: Vec<Projection>,
}

impl Network {
    /// Empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a population of `size` cells.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidConfig`] for an empty population.
    pub fn add_population(&mut self, size: usize, cell: CellType) -> Result<PopulationId> {
        if size == 0 {
            return Err(HicannError::invalid_config("population size must be positive"));
        }
        let id = PopulationId(u32::try_from(self.populations.len()).map_err(|_| {
            HicannError::invalid_config("too many populations")
        })?);
        self.populations.push(Population {
            id,
            size,
            cell,
            record_spikes: false,
            record_voltage: false,
        });
        Ok(id)
    }

    /// Enable spike and/or voltage recording.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::UnknownPopulation`] for a foreign handle.
    pub fn record(&mut self, population: PopulationId, spikes: bool, voltage: bool) -> Result<()> {
        let pop = self
            .populations
            .get_mut(population.0 as usize)
            .ok_or(HicannError::UnknownPopulation { population })?;
        pop.record_spikes |= spikes;
        pop.record_voltage |= voltage;
        Ok(())
    }

    /// Connect two populations.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::UnknownPopulation`] if either end is unknown and
    /// [`HicannError::InvalidConfig`] if the target is not a neuron population
    /// or the weight is negative.
    pub fn connect(
        &mut self,
        source: PopulationId,
        target: PopulationId,
        connector: Connector,
        receptor: Receptor,
    ) -> Result<ProjectionId> {
        self.population(source)?;
        if !self.population(target)?.cell.is_neuron() {
            return Err(HicannError::invalid_config(format!(
                "{target} is not a neuron population"
            )));
        }
        let weight = connector.weight();
        if weight.is_nan() || weight < 0.0 {
            return Err(HicannError::invalid_config(format!(
                "connector weight {weight} must be non-negative"
            )));
        }
        let id = ProjectionId(u32::try_from(self.projections.len()).map_err(|_| {
            HicannError::invalid_config("too many projections")
        })?);
        self.projections.push(Projection {
            id,
            source,
            target,
            connector,
            receptor,
        });
        Ok(id)
    }

    /// Look up a population.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::UnknownPopulation`] for a foreign handle.
    pub fn population(&self, id: PopulationId) -> Result<&Population> {
        self.populations
            .get(id.0 as usize)
            .ok_or(HicannError::UnknownPopulation { population: id })
    }

    /// Look up a projection.
    pub fn projection(&self, id: ProjectionId) -> Option<&Projection> {
        self.projections.get(id.0 as usize)
    }

    /// All populations, in creation order
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// All projections, in creation order
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }
}
