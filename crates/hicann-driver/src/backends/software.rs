// SPDX-License-Identifier: AGPL-3.0-only

//! Software (emulated wafer) backend
//!
//! Implements [`WaferBackend`] with a fixed-step emulation of the mapped
//! network, driven entirely by the configuration tree:
//!
//! - spike-source events travel on the L1 address assigned by the mapping;
//! - a synapse passes an event only if it is `Active` and its decoder equals
//!   the low four bits of that address, so a `Disabled` synapse never does;
//! - each passed event increments the target's excitatory or inhibitory
//!   conductance according to the row's receptor.
//!
//! ## Conductance model
//!
//! ```text
//! Δg = (weight / 15) · (V_gmax[sel] / 1023) / gmax_div · G_NOMINAL
//! C_m dV/dt = g_L (E_L − V) + g_e (E_e − V) + g_i (E_i − V)
//! ```
//!
//! Units are nF, µS, mV and ms. Conductances decay exponentially; the
//! membrane is integrated with forward Euler at [`TIME_STEP_MS`].

use std::collections::BTreeMap;

use hicann_chip::{Receptor, SharedParameter};
use tracing::{debug, info};

use crate::backend::{
    BackendType, RunChecks, RunRequest, Spike, VoltageSample, WaferBackend,
};
use crate::error::{HicannError, Result};
use crate::network::{CellType, NeuronParameters, PopulationId};

/// Integration step (ms).
pub const TIME_STEP_MS: f64 = 0.1;

/// Conductance of a full-weight synapse at full V_gmax and divisor 1 (µS).
pub const G_NOMINAL_US: f64 = 0.02;

/// Presynaptic cell: population and index.
type Source = (PopulationId, usize);

#[derive(Debug, Clone, Copy)]
struct Route {
    population: PopulationId,
    cell: usize,
    receptor: Receptor,
    increment_us: f64,
}

#[derive(Debug, Clone, Copy)]
struct CellState {
    v: f64,
    g_exc: f64,
    g_inh: f64,
    refractory_until: u64,
}

#[derive(Debug, Clone, Default)]
struct Recording {
    voltage: Option<Vec<VoltageSample>>,
    spikes: Option<Vec<Spike>>,
}

/// Software (emulated wafer) backend.
///
/// Holds recordings of the last run only; [`WaferBackend::reset`] must be
/// called between runs.
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    recordings: BTreeMap<PopulationId, Recording>,
    has_run: bool,
    runs: usize,
    released: bool,
}

impl SoftwareBackend {
    /// Create an idle emulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed runs since creation
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// True once the session released the backend
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Check that everything the run will touch exists in the configuration.
    fn verify(request: &RunRequest<'_>) -> Result<()> {
        for pop in request.network.populations() {
            if pop.cell().is_neuron() {
                let placement = request.mapping.placement(pop.id()).ok_or_else(|| {
                    HicannError::run_failure(format!("verification: {} is not placed", pop.id()))
                })?;
                if !request.wafer.is_allocated(placement.hicann) {
                    return Err(HicannError::run_failure(format!(
                        "verification: {} of {} is not allocated",
                        placement.hicann,
                        pop.id()
                    )));
                }
            }
        }
        for proj in request.network.projections() {
            for item in request.mapping.find(proj.id())? {
                if !request.wafer.is_allocated(item.synapse.hicann) {
                    return Err(HicannError::run_failure(format!(
                        "verification: {} is not addressable",
                        item.synapse
                    )));
                }
            }
        }
        debug!("SoftwareBackend: configuration verified");
        Ok(())
    }

    /// Resolve every mapped synapse into a conductance route, dropping
    /// synapses whose decoder does not match the source address.
    fn build_routes(request: &RunRequest<'_>) -> Result<BTreeMap<Source, Vec<Route>>> {
        let mut routes: BTreeMap<Source, Vec<Route>> = BTreeMap::new();

        for proj in request.network.projections() {
            for item in request.mapping.find(proj.id())? {
                let config = request.wafer.synapse(item.synapse)?;
                let address = request
                    .mapping
                    .address(proj.source(), item.source_index)
                    .ok_or_else(|| {
                        HicannError::run_failure(format!(
                            "{} cell {} has no L1 address",
                            proj.source(),
                            item.source_index
                        ))
                    })?;
                if !config.accepts(address) {
                    continue;
                }

                let chip = request.wafer.hicann(item.synapse.hicann)?;
                let row = chip.row(item.synapse.synapse.driver, item.synapse.synapse.row);
                let select = SharedParameter::gmax(row.sel_vgmax).ok_or_else(|| {
                    HicannError::invalid_parameter(format!(
                        "V_gmax select {} out of range",
                        row.sel_vgmax
                    ))
                })?;
                let gmax = chip
                    .floating_gates
                    .shared(item.synapse.synapse.fg_block(), select);
                let increment_us = config.weight().fraction() * gmax.fraction()
                    / f64::from(row.gmax_div.value())
                    * G_NOMINAL_US;

                routes
                    .entry((proj.source(), item.source_index))
                    .or_default()
                    .push(Route {
                        population: proj.target(),
                        cell: item.target_index,
                        receptor: row.receptor,
                        increment_us,
                    });
            }
        }
        Ok(routes)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn simulate(&mut self, request: &RunRequest<'_>, routes: &BTreeMap<Source, Vec<Route>>) {
        let steps = (request.duration_ms / TIME_STEP_MS).round().max(0.0) as u64;

        let mut schedule: BTreeMap<u64, Vec<Source>> = BTreeMap::new();
        let mut cells: BTreeMap<PopulationId, (NeuronParameters, Vec<CellState>)> =
            BTreeMap::new();

        for pop in request.network.populations() {
            match pop.cell() {
                CellType::SpikeSourceArray { spike_times } => {
                    for &t in spike_times.iter().filter(|t| t.is_finite() && **t >= 0.0) {
                        let step = (t / TIME_STEP_MS).round() as u64;
                        if step < steps {
                            for cell in 0..pop.size() {
                                schedule.entry(step).or_default().push((pop.id(), cell));
                            }
                        }
                    }
                }
                CellType::IfCondExp(params) => {
                    let rest = CellState {
                        v: params.v_rest,
                        g_exc: 0.0,
                        g_inh: 0.0,
                        refractory_until: 0,
                    };
                    cells.insert(pop.id(), (*params, vec![rest; pop.size()]));
                }
            }
            if pop.records_spikes() || pop.records_voltage() {
                self.recordings.insert(
                    pop.id(),
                    Recording {
                        voltage: pop.records_voltage().then(Vec::new),
                        spikes: pop.records_spikes().then(Vec::new),
                    },
                );
            }
        }

        let mut fired: Vec<Source> = Vec::new();
        for step in 0..steps {
            let time_ms = step as f64 * TIME_STEP_MS;

            let mut events = schedule.remove(&step).unwrap_or_default();
            events.append(&mut fired);
            for source in &events {
                for route in routes.get(source).into_iter().flatten() {
                    if let Some(state) = cells
                        .get_mut(&route.population)
                        .and_then(|(_, states)| states.get_mut(route.cell))
                    {
                        match route.receptor {
                            Receptor::Excitatory => state.g_exc += route.increment_us,
                            Receptor::Inhibitory => state.g_inh += route.increment_us,
                        }
                    }
                }
            }

            for (&population, (params, states)) in &mut cells {
                let g_leak = params.cm / params.tau_m;
                let decay_exc = (-TIME_STEP_MS / params.tau_syn_e).exp();
                let decay_inh = (-TIME_STEP_MS / params.tau_syn_i).exp();
                let refractory_steps = (params.tau_refrac / TIME_STEP_MS).ceil() as u64;
                let recording = self.recordings.get_mut(&population);
                let mut spikes_out = Vec::new();
                let mut voltage_out = Vec::new();

                for (cell, state) in states.iter_mut().enumerate() {
                    if step < state.refractory_until {
                        state.v = params.v_reset;
                    } else {
                        let current = g_leak * (params.v_rest - state.v)
                            + state.g_exc * (params.e_rev_e - state.v)
                            + state.g_inh * (params.e_rev_i - state.v);
                        state.v += TIME_STEP_MS * current / params.cm;
                        if state.v >= params.v_thresh {
                            spikes_out.push(Spike { cell, time_ms });
                            fired.push((population, cell));
                            state.v = params.v_reset;
                            state.refractory_until = step + refractory_steps;
                        }
                    }
                    state.g_exc *= decay_exc;
                    state.g_inh *= decay_inh;
                    voltage_out.push(VoltageSample {
                        cell,
                        time_ms,
                        voltage_mv: state.v,
                    });
                }

                if let Some(recording) = recording {
                    if let Some(spikes) = recording.spikes.as_mut() {
                        spikes.extend(spikes_out);
                    }
                    if let Some(voltage) = recording.voltage.as_mut() {
                        voltage.extend(voltage_out);
                    }
                }
            }
        }
    }

    fn recording(&self, population: PopulationId) -> Result<&Recording> {
        if !self.has_run {
            return Err(HicannError::invalid_state("no run since last reset"));
        }
        self.recordings
            .get(&population)
            .ok_or_else(|| HicannError::invalid_state(format!("{population} is not recorded")))
    }
}

impl WaferBackend for SoftwareBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn run(&mut self, request: &RunRequest<'_>) -> Result<()> {
        if self.released {
            return Err(HicannError::invalid_state("backend already released"));
        }
        if self.has_run {
            return Err(HicannError::invalid_state(
                "previous run was not reset; call reset() first",
            ));
        }
        if !(request.duration_ms.is_finite() && request.duration_ms > 0.0) {
            return Err(HicannError::run_failure(format!(
                "run duration {} ms must be positive",
                request.duration_ms
            )));
        }
        if request.checks == RunChecks::Verify {
            Self::verify(request)?;
        }

        let routes = Self::build_routes(request)?;
        debug!(
            "SoftwareBackend: {} active routes, {} ms",
            routes.values().map(Vec::len).sum::<usize>(),
            request.duration_ms
        );
        self.simulate(request, &routes);
        self.has_run = true;
        self.runs += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.recordings.clear();
        self.has_run = false;
        Ok(())
    }

    fn voltage_trace(&self, population: PopulationId) -> Result<Vec<VoltageSample>> {
        self.recording(population)?.voltage.clone().ok_or_else(|| {
            HicannError::invalid_state(format!("{population} has no voltage recording"))
        })
    }

    fn spike_times(&self, population: PopulationId) -> Result<Vec<Spike>> {
        self.recording(population)?.spikes.clone().ok_or_else(|| {
            HicannError::invalid_state(format!("{population} has no spike recording"))
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            info!("SoftwareBackend: released after {} runs", self.runs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analog::{program_shared_parameters, SharedAnalogParameters};
    use crate::mapping::{ManualPlacement, MappingOutcome, MappingService, PlacementMapper};
    use crate::network::{Connector, Network, ProjectionId};
    use crate::wafer::WaferConfig;
    use hicann_chip::{HicannOnWafer, SynapseWeight, Wafer};

    struct Bench {
        network: Network,
        neuron: PopulationId,
        projection: ProjectionId,
        outcome: MappingOutcome,
    }

    fn bench() -> Bench {
        let mut network = Network::new();
        let neuron = network
            .add_population(1, CellType::IfCondExp(NeuronParameters::default()))
            .unwrap();
        network.record(neuron, true, true).unwrap();
        let stim = network
            .add_population(
                1,
                CellType::SpikeSourceArray {
                    spike_times: vec![100.0, 120.0, 140.0],
                },
            )
            .unwrap();
        let projection = network
            .connect(stim, neuron, Connector::AllToAll { weight: 1.0 }, Receptor::Excitatory)
            .unwrap();

        let mut placement = ManualPlacement::new();
        placement.on_hicann(neuron, HicannOnWafer::new(297).unwrap());
        let mut outcome = PlacementMapper::new(HicannOnWafer::new(0).unwrap())
            .map(&network, Wafer(33), &placement)
            .unwrap();
        program_shared_parameters(&mut outcome.wafer, &SharedAnalogParameters::new(1023, 2).unwrap())
            .unwrap();
        Bench {
            network,
            neuron,
            projection,
            outcome,
        }
    }

    fn set_weight(b: &mut Bench, weight: Option<u8>) {
        let items = b.outcome.index.find(b.projection).unwrap().to_vec();
        for item in items {
            let mut proxy = b.outcome.wafer.synapse_proxy(item.synapse).unwrap();
            match (weight, proxy.decoder()) {
                (Some(w), Some(decoder)) => proxy.enable(decoder, SynapseWeight::new(w).unwrap()),
                _ => proxy.disable(),
            }
        }
    }

    fn request<'a>(b: &'a Bench, wafer: &'a WaferConfig) -> RunRequest<'a> {
        RunRequest {
            network: &b.network,
            mapping: &b.outcome.index,
            wafer,
            duration_ms: 300.0,
            checks: RunChecks::Verify,
        }
    }

    fn spike_count(weight: Option<u8>) -> usize {
        let mut b = bench();
        set_weight(&mut b, weight);
        let mut backend = SoftwareBackend::new();
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        backend.spike_times(b.neuron).unwrap().len()
    }

    #[test]
    fn full_weight_makes_the_neuron_fire() {
        assert!(spike_count(Some(15)) > 0);
    }

    #[test]
    fn disabled_and_zero_weight_stay_silent() {
        assert_eq!(spike_count(None), 0);
        assert_eq!(spike_count(Some(0)), 0);
    }

    #[test]
    fn larger_weight_fires_at_least_as_often() {
        assert!(spike_count(Some(15)) >= spike_count(Some(5)));
    }

    #[test]
    fn unprogrammed_gmax_blocks_all_input() {
        let mut b = bench();
        let hicann = HicannOnWafer::new(297).unwrap();
        let fgs = &mut b.outcome.wafer.hicann_mut(hicann).unwrap().floating_gates;
        for block in hicann_chip::FgBlockOnHicann::iter_all() {
            for p in SharedParameter::GMAX {
                fgs.set_shared(block, p, hicann_chip::FgValue::ZERO);
            }
        }
        let mut backend = SoftwareBackend::new();
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        assert!(backend.spike_times(b.neuron).unwrap().is_empty());
    }

    #[test]
    fn voltage_trace_covers_the_run_at_rest_without_input() {
        let mut b = bench();
        set_weight(&mut b, None);
        let mut backend = SoftwareBackend::new();
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        let trace = backend.voltage_trace(b.neuron).unwrap();
        assert_eq!(trace.len(), 3000);
        assert!(trace.iter().all(|s| (s.voltage_mv - -20.0).abs() < 1e-9));
    }

    #[test]
    fn second_run_requires_reset() {
        let b = bench();
        let mut backend = SoftwareBackend::new();
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        let err = backend.run(&request(&b, &b.outcome.wafer)).unwrap_err();
        assert!(matches!(err, HicannError::InvalidState { .. }));

        backend.reset().unwrap();
        assert!(backend.spike_times(b.neuron).is_err());
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        assert_eq!(backend.runs(), 2);
    }

    #[test]
    fn verification_rejects_unallocated_chip() {
        let b = bench();
        let empty = WaferConfig::new(Wafer(33));
        let mut backend = SoftwareBackend::new();
        let err = backend.run(&request(&b, &empty)).unwrap_err();
        assert!(matches!(err, HicannError::HardwareRunFailure { .. }));
    }

    #[test]
    fn unrecorded_population_is_an_error() {
        let b = bench();
        let mut backend = SoftwareBackend::new();
        backend.run(&request(&b, &b.outcome.wafer)).unwrap();
        assert!(backend.voltage_trace(PopulationId(1)).is_err());
    }

    #[test]
    fn release_is_idempotent_and_blocks_runs() {
        let b = bench();
        let mut backend = SoftwareBackend::new();
        backend.release();
        backend.release();
        assert!(backend.is_released());
        assert!(backend.run(&request(&b, &b.outcome.wafer)).is_err());
    }
}
