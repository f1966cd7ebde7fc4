//! Experiment configuration.
//!
//! Compiled-in defaults reproduce the single-neuron weight sweep; a JSON file
//! may override any subset of fields, and `WAFER` in the environment selects
//! the wafer.

use std::path::{Path, PathBuf};

use hicann_chip::{HicannOnWafer, Wafer};
use serde::{Deserialize, Serialize};

use crate::analog::SharedAnalogParameters;
use crate::error::{HicannError, Result};
use crate::network::NeuronParameters;
use crate::results::DEFAULT_RESULTS_FILE;
use crate::sweep::SweepPoint;

/// Environment variable selecting the wafer.
pub const WAFER_ENV: &str = "WAFER";

/// Wafer used when nothing else is configured.
pub const DEFAULT_WAFER: u32 = 33;

/// Chip the observed neuron is pinned to.
pub const DEFAULT_HICANN: u16 = 297;

/// Everything needed to run the single-neuron weight sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Wafer id
    pub wafer: u32,
    /// Chip the observed neuron is placed on
    pub hicann: u16,
    /// Sweep points in order; `null` is the disabled sentinel
    pub weights: Vec<Option<u8>>,
    /// V_gmax floating-gate value (0..=1023)
    pub gmax: u16,
    /// Per-row gmax divisor (2..=30)
    pub gmax_div: u8,
    /// Emulated time per run (ms)
    pub duration_ms: f64,
    /// Directory receiving the per-point text files
    pub output_dir: PathBuf,
    /// Archive path
    pub results_path: PathBuf,
    /// Replace an existing archive
    pub overwrite: bool,
    /// Parameters of the observed neuron
    pub neuron: NeuronParameters,
    /// Excitatory stimulus spike times (ms)
    pub excitatory_spike_times: Vec<f64>,
    /// Inhibitory stimulus spike times (ms)
    pub inhibitory_spike_times: Vec<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            wafer: DEFAULT_WAFER,
            hicann: DEFAULT_HICANN,
            weights: vec![None, Some(0), Some(5), Some(10), Some(15)],
            gmax: 1023,
            gmax_div: 2,
            duration_ms: 1500.0,
            output_dir: PathBuf::from("."),
            results_path: PathBuf::from(DEFAULT_RESULTS_FILE),
            overwrite: true,
            neuron: NeuronParameters::default(),
            excitatory_spike_times: vec![250.0, 500.0, 520.0, 540.0, 1250.0],
            inhibitory_spike_times: vec![750.0, 1000.0, 1020.0, 1040.0, 1250.0],
        }
    }
}

impl ExperimentConfig {
    /// Defaults with the `WAFER` environment override applied.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidConfig`] if `WAFER` is not a wafer id.
    pub fn from_env() -> Result<Self> {
        Self::default().with_wafer_from(std::env::var(WAFER_ENV).ok().as_deref())
    }

    /// Load a JSON file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HicannError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            HicannError::invalid_config(format!("cannot parse {}: {e}", path.display()))
        })
    }

    /// Replace the wafer with a textual override, if present.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidConfig`] if `raw` is not an unsigned
    /// integer.
    pub fn with_wafer_from(mut self, raw: Option<&str>) -> Result<Self> {
        if let Some(raw) = raw {
            self.wafer = raw.trim().parse().map_err(|_| {
                HicannError::invalid_config(format!("{WAFER_ENV}={raw:?} is not a wafer id"))
            })?;
        }
        Ok(self)
    }

    /// Target wafer
    pub const fn wafer(&self) -> Wafer {
        Wafer(self.wafer)
    }

    /// Chip of the observed neuron
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidConfig`] for an id beyond the wafer.
    pub fn hicann(&self) -> Result<HicannOnWafer> {
        HicannOnWafer::new(self.hicann)
            .map_err(|e| HicannError::invalid_config(format!("hicann: {e}")))
    }

    /// Sweep points in order
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidSynapseParameter`] for weights above 15.
    pub fn sweep_points(&self) -> Result<Vec<SweepPoint>> {
        self.weights.iter().copied().map(SweepPoint::from_option).collect()
    }

    /// Validated shared analog settings
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidSynapseParameter`] for out-of-range
    /// values.
    pub fn analog(&self) -> Result<SharedAnalogParameters> {
        SharedAnalogParameters::new(self.gmax, self.gmax_div)
    }

    /// Check every field that can be out of range.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.hicann()?;
        self.sweep_points()?;
        self.analog()?;
        if !(self.duration_ms.is_finite() && self.duration_ms > 0.0) {
            return Err(HicannError::invalid_config(format!(
                "duration_ms {} must be positive",
                self.duration_ms
            )));
        }
        let times = self
            .excitatory_spike_times
            .iter()
            .chain(&self.inhibitory_spike_times);
        if let Some(t) = times.copied().find(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(HicannError::invalid_config(format!(
                "spike time {t} ms must be finite and non-negative"
            )));
        }
        Ok(())
    }
}
