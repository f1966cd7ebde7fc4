//! Configuration, mapping and sweep driver for HICANN wafer experiments.
//!
//! This crate holds the software side of a wafer experiment: the network
//! description, the mapping stage, the per-wafer configuration tree, the
//! shared analog programmer and the digital weight sweep that runs on top of
//! a [`WaferBackend`].
//!
//! # Control flow
//!
//! ```text
//! Network ──MappingService──▶ MappingResultIndex + WaferConfig
//!                                   │
//!                    program_shared_parameters (once)
//!                                   │
//!          ┌──── for each SweepPoint ────────────────────────┐
//!          │ reconfigure ─▶ run ─▶ TraceSink::persist ─▶ reset │
//!          └──────────────────────────────────────────────────┘
//!                                   │
//!                     MappingResults::save (gzip XML)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use hicann_driver::prelude::*;
//!
//! # fn main() -> hicann_driver::Result<()> {
//! let config = ExperimentConfig::from_env()?;
//! let mut mapper = PlacementMapper::new(config.hicann()?);
//! let mut sink = TextFileSink::create(&config.output_dir)?;
//! let outcome = run_single_neuron_sweep(
//!     &config,
//!     Box::new(SoftwareBackend::new()),
//!     &mut mapper,
//!     &mut sink,
//! )?;
//! println!("{:?}", outcome.report.labels);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod analog;
mod backend;
pub mod backends;
pub mod config;
mod decoder_cache;
mod error;
pub mod experiment;
pub mod mapping;
pub mod network;
pub mod recording;
pub mod results;
mod session;
pub mod sweep;
pub mod wafer;

pub use analog::{program_shared_parameters, SharedAnalogParameters};
pub use backend::{BackendType, RunChecks, RunRequest, Spike, VoltageSample, WaferBackend};
pub use backends::SoftwareBackend;
pub use config::ExperimentConfig;
pub use decoder_cache::{FirstTouchCache, OriginalDecoderCache};
pub use error::{HicannError, Result};
pub use experiment::{build_single_neuron_network, run_single_neuron_sweep, SweepOutcome};
pub use mapping::{
    ManualPlacement, MappedSynapse, MappingOutcome, MappingResultIndex, MappingService,
    PlacementMapper,
};
pub use network::{CellType, Connector, Network, NeuronParameters, PopulationId, ProjectionId};
pub use recording::{MemorySink, TextFileSink, TraceSink};
pub use results::{MappingResults, ResultsSummary};
pub use session::HardwareSession;
pub use sweep::{Experiment, Mapped, Programmed, SweepPoint, SweepReport};
pub use wafer::{HicannConfig, WaferConfig};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        run_single_neuron_sweep, Experiment, ExperimentConfig, HardwareSession, HicannError,
        ManualPlacement, MappingResults, MappingService, Network, PlacementMapper, Result,
        SharedAnalogParameters, SoftwareBackend, SweepPoint, TextFileSink, TraceSink,
        WaferBackend, WaferConfig,
    };
}
