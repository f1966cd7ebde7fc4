//! Backend abstraction for wafer runs
//!
//! One interface over the physical wafer and the software emulator: execute
//! the configured network for a fixed duration, expose what was recorded,
//! reset between runs.

use std::fmt::{self, Debug};

use crate::error::Result;
use crate::mapping::MappingResultIndex;
use crate::network::{Network, PopulationId};
use crate::wafer::WaferConfig;

/// Wafer backend trait - run/reset primitive plus recording accessors
pub trait WaferBackend: Debug + Send {
    /// Get backend type for logging
    fn backend_type(&self) -> BackendType;

    /// Apply the configuration tree and run the network for
    /// `request.duration_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HicannError::HardwareRunFailure`] on any run fault and
    /// [`crate::HicannError::InvalidState`] if the previous run was not reset.
    fn run(&mut self, request: &RunRequest<'_>) -> Result<()>;

    /// Clear run and recording state. Configuration is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HicannError::HardwareRunFailure`] if the reset fails.
    fn reset(&mut self) -> Result<()>;

    /// Membrane voltage recorded for a population during the last run
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was run or the population was not
    /// recorded.
    fn voltage_trace(&self, population: PopulationId) -> Result<Vec<VoltageSample>>;

    /// Spikes recorded for a population during the last run
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was run or the population was not
    /// recorded.
    fn spike_times(&self, population: PopulationId) -> Result<Vec<Spike>>;

    /// Give up the hardware. Called once when the session ends.
    fn release(&mut self) {}
}

/// Everything a run needs.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Logical network
    pub network: &'a Network,
    /// Where the network lives on the wafer
    pub mapping: &'a MappingResultIndex,
    /// Configuration to apply before running
    pub wafer: &'a WaferConfig,
    /// Emulated biological time
    pub duration_ms: f64,
    /// Pre-run verification mode
    pub checks: RunChecks,
}

/// Pre-run verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunChecks {
    /// Verify the configuration against the mapping before running
    Verify,
    /// Run without verification (configuration already checked)
    Skip,
}

/// One membrane voltage sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageSample {
    /// Cell index within the population
    pub cell: usize,
    /// Biological time (ms)
    pub time_ms: f64,
    /// Membrane voltage (mV)
    pub voltage_mv: f64,
}

/// One recorded spike
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    /// Cell index within the population
    pub cell: usize,
    /// Biological time (ms)
    pub time_ms: f64,
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendType {
    /// Software emulator, no hardware required
    Software,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software => write!(f, "Software (emulator)"),
        }
    }
}
