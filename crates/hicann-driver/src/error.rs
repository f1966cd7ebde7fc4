//! Error types for HICANN configuration and sweep operations

use std::path::PathBuf;

use hicann_chip::{CoordError, HicannOnWafer};
use thiserror::Error;

use crate::network::{PopulationId, ProjectionId};

/// Result type alias for HICANN operations
pub type Result<T> = std::result::Result<T, HicannError>;

/// Errors that can occur while mapping, configuring or running an experiment
#[derive(Debug, Error)]
pub enum HicannError {
    /// The mapping result holds no entry for a projection of the experiment
    #[error("No mapping result for {projection}")]
    MappingUnavailable {
        /// Projection that was looked up
        projection: ProjectionId,
    },

    /// The mapping service could not place or route the network
    #[error("Mapping failed: {reason}")]
    MappingFailed {
        /// Reason for failure
        reason: String,
    },

    /// A weight, divisor or analog value is outside the hardware range
    #[error("Invalid synapse parameter: {reason}")]
    InvalidSynapseParameter {
        /// Reason for failure
        reason: String,
    },

    /// The blocking run (or reset) primitive reported a fault
    #[error("Hardware run failed: {reason}")]
    HardwareRunFailure {
        /// Reason for failure
        reason: String,
    },

    /// A result file could not be written or read
    #[error("Failed to persist {}: {reason}", path.display())]
    PersistenceFailure {
        /// File that was being written
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Any error raised while processing one sweep point
    #[error("Sweep point '{label}' failed: {source}")]
    SweepPointFailed {
        /// Label of the failing sweep point
        label: String,
        /// Underlying error
        #[source]
        source: Box<HicannError>,
    },

    /// Chip is not part of the wafer configuration
    #[error("{hicann} is not allocated")]
    NotAllocated {
        /// Chip that was addressed
        hicann: HicannOnWafer,
    },

    /// Population id not known to the network
    #[error("Unknown population {population}")]
    UnknownPopulation {
        /// Population that was referenced
        population: PopulationId,
    },

    /// Experiment configuration is inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    /// Backend or experiment is in an invalid state
    #[error("Invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },
}

impl HicannError {
    /// Create a mapping failed error
    pub fn mapping_failed(reason: impl Into<String>) -> Self {
        Self::MappingFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid synapse parameter error
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidSynapseParameter {
            reason: reason.into(),
        }
    }

    /// Create a hardware run failure
    pub fn run_failure(reason: impl Into<String>) -> Self {
        Self::HardwareRunFailure {
            reason: reason.into(),
        }
    }

    /// Create a persistence failure
    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Attach the label of the sweep point being processed
    pub fn at_sweep_point(self, label: impl Into<String>) -> Self {
        Self::SweepPointFailed {
            label: label.into(),
            source: Box::new(self),
        }
    }

    /// Label of the failing sweep point, if this error came out of a sweep
    pub fn sweep_label(&self) -> Option<&str> {
        match self {
            Self::SweepPointFailed { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }
}

impl From<CoordError> for HicannError {
    fn from(err: CoordError) -> Self {
        Self::invalid_parameter(err.to_string())
    }
}
