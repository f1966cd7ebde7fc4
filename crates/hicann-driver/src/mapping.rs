//! Mapping result index and the mapping service seam.
//!
//! Mapping turns a [`Network`] into placed neurons, L1 addresses for every
//! cell and concrete hardware synapses for every projection. It runs once;
//! the sweep then reuses the [`MappingResultIndex`] for every sweep point
//! without re-mapping.

use std::collections::BTreeMap;

use hicann_chip::coords::{
    ROWS_PER_SYNAPSE_DRIVER, SYNAPSE_COLUMNS_PER_HICANN, SYNAPSE_DRIVERS_PER_HICANN,
};
use hicann_chip::{
    HicannOnWafer, L1Address, NeuronOnHicann, RowOnSynapseDriver, SynapseDriverOnHicann,
    SynapseOnHicann, SynapseOnWafer, SynapseWeight, Wafer,
};
use tracing::{debug, info};

use crate::error::{HicannError, Result};
use crate::network::{Network, PopulationId, ProjectionId};
use crate::wafer::WaferConfig;

/// One realized connection: logical source/target cell and the hardware
/// synapse carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedSynapse {
    /// Index of the presynaptic cell in its population
    pub source_index: usize,
    /// Index of the postsynaptic cell in its population
    pub target_index: usize,
    /// Hardware synapse
    pub synapse: SynapseOnWafer,
}

impl MappedSynapse {
    /// Hardware synapse realizing this connection
    pub const fn hardware_synapse(&self) -> SynapseOnWafer {
        self.synapse
    }
}

/// Where the cells of a neuron population live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeuronPlacement {
    /// Chip holding the population
    pub hicann: HicannOnWafer,
    /// Denmem of each cell, by cell index
    pub neurons: Vec<NeuronOnHicann>,
}

/// Read-only association from projections to hardware synapses, plus the
/// placement and addressing decisions behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingResultIndex {
    synapses: BTreeMap<ProjectionId, Vec<MappedSynapse>>,
    placements: BTreeMap<PopulationId, NeuronPlacement>,
    addresses: BTreeMap<PopulationId, Vec<L1Address>>,
}

impl MappingResultIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the synapses realizing a projection (possibly none).
    pub fn insert_projection(&mut self, projection: ProjectionId, synapses: Vec<MappedSynapse>) {
        self.synapses.insert(projection, synapses);
    }

    /// Record where a neuron population was placed.
    pub fn insert_placement(&mut self, population: PopulationId, placement: NeuronPlacement) {
        self.placements.insert(population, placement);
    }

    /// Record the L1 address of every cell of a population.
    pub fn insert_addresses(&mut self, population: PopulationId, addresses: Vec<L1Address>) {
        self.addresses.insert(population, addresses);
    }

    /// Hardware synapses of a projection, in mapping order. An empty slice
    /// means the projection was pruned.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::MappingUnavailable`] if the projection was never
    /// mapped.
    pub fn find(&self, projection: ProjectionId) -> Result<&[MappedSynapse]> {
        self.synapses
            .get(&projection)
            .map(Vec::as_slice)
            .ok_or(HicannError::MappingUnavailable { projection })
    }

    /// Placement of a neuron population
    pub fn placement(&self, population: PopulationId) -> Option<&NeuronPlacement> {
        self.placements.get(&population)
    }

    /// Every placed population, ascending
    pub fn placements(&self) -> impl Iterator<Item = (PopulationId, &NeuronPlacement)> + '_ {
        self.placements.iter().map(|(&population, placement)| (population, placement))
    }

    /// L1 addresses of every addressed population, ascending
    pub fn addresses(&self) -> impl Iterator<Item = (PopulationId, &[L1Address])> + '_ {
        self.addresses
            .iter()
            .map(|(&population, addresses)| (population, addresses.as_slice()))
    }

    /// L1 address of one cell
    pub fn address(&self, population: PopulationId, index: usize) -> Option<L1Address> {
        self.addresses.get(&population)?.get(index).copied()
    }

    /// Mapped projections, ascending
    pub fn projections(&self) -> impl Iterator<Item = ProjectionId> + '_ {
        self.synapses.keys().copied()
    }

    /// Total number of hardware synapses over all projections
    pub fn synapse_count(&self) -> usize {
        self.synapses.values().map(Vec::len).sum()
    }
}

/// Placement hints: populations pinned to a chip.
#[derive(Debug, Clone, Default)]
pub struct ManualPlacement {
    hicanns: BTreeMap<PopulationId, HicannOnWafer>,
}

impl ManualPlacement {
    /// No hints
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a population to a chip.
    pub fn on_hicann(&mut self, population: PopulationId, hicann: HicannOnWafer) -> &mut Self {
        self.hicanns.insert(population, hicann);
        self
    }

    /// Chip a population is pinned to
    pub fn hicann_for(&self, population: PopulationId) -> Option<HicannOnWafer> {
        self.hicanns.get(&population).copied()
    }
}

/// Everything a mapping run produces.
#[derive(Debug, Clone)]
pub struct MappingOutcome {
    /// Projection → hardware synapse association
    pub index: MappingResultIndex,
    /// Post-mapping configuration tree of the target wafer
    pub wafer: WaferConfig,
}

/// Mapping stage: network in, index and configuration tree out.
///
/// Deterministic per invocation.
pub trait MappingService {
    /// Map `network` onto `wafer`, honouring `placement`.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::MappingFailed`] if the network does not fit.
    fn map(
        &mut self,
        network: &Network,
        wafer: Wafer,
        placement: &ManualPlacement,
    ) -> Result<MappingOutcome>;
}

/// Digital weight for a relative connector weight: `round(clamp(w, 0, 1) · 15)`.
pub fn digital_weight(weight: f64) -> SynapseWeight {
    let scaled = (weight.clamp(0.0, 1.0) * f64::from(SynapseWeight::MAX.value())).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = scaled as u8;
    SynapseWeight::new(raw).unwrap_or(SynapseWeight::MAX)
}

/// Synapse driver rows in the top half of a chip.
const TOP_ROWS: usize =
    (SYNAPSE_DRIVERS_PER_HICANN / 2) as usize * ROWS_PER_SYNAPSE_DRIVER as usize;

/// Deterministic mapper for small experiments.
///
/// Neuron populations go to their pinned chip (or `default_hicann`) and take
/// top-half denmems in order. Every cell gets the next L1 address whose
/// decoder bits are not reserved. Each (projection, source cell) pair gets
/// its own top-half driver row; the synapse in the target neuron's column is
/// enabled with the source's decoder and the digital connector weight.
/// Projections whose digital weight is zero are pruned.
#[derive(Debug, Clone)]
pub struct PlacementMapper {
    default_hicann: HicannOnWafer,
}

impl PlacementMapper {
    /// Mapper placing unpinned populations on `default_hicann`
    pub const fn new(default_hicann: HicannOnWafer) -> Self {
        Self { default_hicann }
    }

    fn place_neurons(
        &self,
        network: &Network,
        placement: &ManualPlacement,
        wafer: &mut WaferConfig,
        index: &mut MappingResultIndex,
    ) -> Result<()> {
        let mut next_neuron: BTreeMap<HicannOnWafer, u16> = BTreeMap::new();

        for pop in network.populations().iter().filter(|p| p.cell().is_neuron()) {
            let hicann = placement.hicann_for(pop.id()).unwrap_or(self.default_hicann);
            wafer.allocate(hicann);

            let first = next_neuron.entry(hicann).or_insert(0);
            let neurons = (0..pop.size())
                .map(|i| {
                    u16::try_from(i)
                        .ok()
                        .and_then(|i| first.checked_add(i))
                        .filter(|&n| n < SYNAPSE_COLUMNS_PER_HICANN)
                        .and_then(|n| NeuronOnHicann::new(n).ok())
                        .ok_or_else(|| {
                            HicannError::mapping_failed(format!(
                                "{hicann} has no free neuron for {} cell {i}",
                                pop.id()
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            *first += u16::try_from(neurons.len()).unwrap_or(u16::MAX);

            debug!("{} → {hicann}, {} neurons", pop.id(), neurons.len());
            index.insert_placement(pop.id(), NeuronPlacement { hicann, neurons });
        }
        Ok(())
    }

    fn assign_addresses(network: &Network, index: &mut MappingResultIndex) -> Result<()> {
        let mut free = L1Address::iter_all().filter(|a| a.decoder().is_some());
        for pop in network.populations() {
            let addresses = (0..pop.size())
                .map(|_| {
                    free.next().ok_or_else(|| {
                        HicannError::mapping_failed(format!("out of L1 addresses at {}", pop.id()))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            index.insert_addresses(pop.id(), addresses);
        }
        Ok(())
    }

    fn route_projections(
        network: &Network,
        wafer: &mut WaferConfig,
        index: &mut MappingResultIndex,
    ) -> Result<()> {
        let mut next_row: BTreeMap<HicannOnWafer, usize> = BTreeMap::new();

        for proj in network.projections() {
            let weight = digital_weight(proj.connector().weight());
            if weight == SynapseWeight::MIN {
                debug!("{} pruned (zero digital weight)", proj.id());
                index.insert_projection(proj.id(), Vec::new());
                continue;
            }

            let target = index.placement(proj.target()).cloned().ok_or_else(|| {
                HicannError::mapping_failed(format!("{} has no placement", proj.target()))
            })?;
            let source_size = network.population(proj.source())?.size();
            let mut items = Vec::with_capacity(source_size * target.neurons.len());

            for source_index in 0..source_size {
                let address = index.address(proj.source(), source_index).ok_or_else(|| {
                    HicannError::mapping_failed(format!(
                        "{} cell {source_index} has no L1 address",
                        proj.source()
                    ))
                })?;
                let decoder = address.decoder().ok_or_else(|| {
                    HicannError::mapping_failed(format!("{address} collides with the disabled decoder"))
                })?;

                let slot = next_row.entry(target.hicann).or_insert(0);
                if *slot >= TOP_ROWS {
                    return Err(HicannError::mapping_failed(format!(
                        "{} has no free synapse row for {}",
                        target.hicann,
                        proj.id()
                    )));
                }
                let driver = SynapseDriverOnHicann::new(u8::try_from(*slot / 2).unwrap_or(u8::MAX))?;
                let row = if *slot % 2 == 0 {
                    RowOnSynapseDriver::Top
                } else {
                    RowOnSynapseDriver::Bottom
                };
                *slot += 1;

                let config = wafer.hicann_mut(target.hicann)?;
                config.row_mut(driver, row).receptor = proj.receptor();

                for (target_index, neuron) in target.neurons.iter().enumerate() {
                    let synapse = SynapseOnWafer::new(
                        target.hicann,
                        SynapseOnHicann::new(driver, row, neuron.column()),
                    );
                    wafer.synapse_proxy(synapse)?.enable(decoder, weight);
                    items.push(MappedSynapse {
                        source_index,
                        target_index,
                        synapse,
                    });
                }
            }

            debug!("{} → {} synapses", proj.id(), items.len());
            index.insert_projection(proj.id(), items);
        }
        Ok(())
    }
}

impl MappingService for PlacementMapper {
    fn map(
        &mut self,
        network: &Network,
        wafer: Wafer,
        placement: &ManualPlacement,
    ) -> Result<MappingOutcome> {
        let mut config = WaferConfig::new(wafer);
        let mut index = MappingResultIndex::new();

        self.place_neurons(network, placement, &mut config, &mut index)?;
        Self::assign_addresses(network, &mut index)?;
        Self::route_projections(network, &mut config, &mut index)?;

        info!(
            "Mapped {} projections onto {} synapses on {wafer} ({} HICANNs)",
            network.projections().len(),
            index.synapse_count(),
            config.allocated_hicanns().len()
        );
        Ok(MappingOutcome {
            index,
            wafer: config,
        })
    }
}
