//! Single-neuron digital weight sweep, end to end.
//!
//! One neuron receives an excitatory and an inhibitory spike train through
//! one projection each. The network is mapped once, the shared analog
//! parameters are written, every configured weight is swept and the final
//! configuration is archived.

use std::path::PathBuf;

use hicann_chip::Receptor;
use tracing::info;

use crate::backend::WaferBackend;
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::mapping::{ManualPlacement, MappingService};
use crate::network::{CellType, Connector, Network, PopulationId, ProjectionId};
use crate::recording::TraceSink;
use crate::results::ResultsSummary;
use crate::session::HardwareSession;
use crate::sweep::{Experiment, Mapped, SweepReport};

/// The experiment network and its handles.
#[derive(Debug, Clone)]
pub struct SingleNeuronNetwork {
    /// Network description
    pub network: Network,
    /// Observed neuron (voltage and spikes recorded)
    pub neuron: PopulationId,
    /// Excitatory stimulus → neuron
    pub excitatory: ProjectionId,
    /// Inhibitory stimulus → neuron
    pub inhibitory: ProjectionId,
}

/// Build the network described by `config`.
///
/// # Errors
///
/// Propagates network construction errors.
pub fn build_single_neuron_network(config: &ExperimentConfig) -> Result<SingleNeuronNetwork> {
    let mut network = Network::new();

    let neuron = network.add_population(1, CellType::IfCondExp(config.neuron))?;
    network.record(neuron, true, true)?;

    let stim_exc = network.add_population(
        1,
        CellType::SpikeSourceArray {
            spike_times: config.excitatory_spike_times.clone(),
        },
    )?;
    let stim_inh = network.add_population(
        1,
        CellType::SpikeSourceArray {
            spike_times: config.inhibitory_spike_times.clone(),
        },
    )?;

    let full = Connector::AllToAll { weight: 1.0 };
    let excitatory = network.connect(stim_exc, neuron, full, Receptor::Excitatory)?;
    let inhibitory = network.connect(stim_inh, neuron, full, Receptor::Inhibitory)?;

    Ok(SingleNeuronNetwork {
        network,
        neuron,
        excitatory,
        inhibitory,
    })
}

/// What a completed sweep produced.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Points run, in order
    pub report: SweepReport,
    /// Where the archive was written
    pub results_path: PathBuf,
    /// Counts over the archived configuration
    pub summary: ResultsSummary,
}

/// Map, program, sweep and archive.
///
/// The backend is released when this returns, on every path. The archive
/// is written only if every sweep point succeeded.
///
/// # Errors
///
/// Returns configuration and mapping errors before anything runs, a
/// [`crate::HicannError::SweepPointFailed`] naming the failing point, or a
/// persistence error for the archive.
pub fn run_single_neuron_sweep(
    config: &ExperimentConfig,
    backend: Box<dyn WaferBackend>,
    mapper: &mut dyn MappingService,
    sink: &mut dyn TraceSink,
) -> Result<SweepOutcome> {
    config.validate()?;
    let points = config.sweep_points()?;
    let analog = config.analog()?;

    let built = build_single_neuron_network(config)?;
    let mut placement = ManualPlacement::new();
    placement.on_hicann(built.neuron, config.hicann()?);

    let mut session = HardwareSession::open(backend);
    let outcome = mapper.map(&built.network, config.wafer(), &placement)?;
    let mut experiment =
        Experiment::<Mapped>::new(built.network, built.neuron, outcome, config.duration_ms)?
            .program_analog(&analog)?;

    let report = experiment.sweep(&mut session, &points, sink)?;
    drop(session);

    let results = experiment.into_results();
    results.save(&config.results_path, config.overwrite)?;
    info!(
        "Sweep of {} points on {} complete",
        report.labels.len(),
        config.wafer()
    );

    Ok(SweepOutcome {
        report,
        results_path: config.results_path.clone(),
        summary: results.summary(),
    })
}
