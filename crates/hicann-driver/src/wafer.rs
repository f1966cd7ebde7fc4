//! Configuration tree of one wafer.
//!
//! The tree is an owned value with a single writer: the mapping service
//! creates it, the analog programmer and the sweep controller mutate it in
//! place, the backend reads it at run time and the result archive stores it.
//!
//! ```text
//! WaferConfig
//! └── HicannConfig (one per allocated chip)
//!     ├── FloatingGates   shared values per FG block, one FgConfig per pass
//!     ├── rows            gmax divisor / V_gmax select / receptor per driver row
//!     └── synapses        sparse; an absent synapse reads as Disabled
//! ```

use std::collections::BTreeMap;

use hicann_chip::floating_gate::DEFAULT_PROGRAMMING_PASSES;
use hicann_chip::{
    FgBlockOnHicann, FgConfig, FgValue, GmaxDiv, HicannOnWafer, Receptor, RowOnSynapseDriver,
    SharedParameter, SynapseConfig, SynapseDecoder, SynapseDriverOnHicann, SynapseOnHicann,
    SynapseOnWafer, SynapseWeight, Wafer,
};
use crate::error::{HicannError, Result};

/// Floating-gate state of one chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingGates {
    shared: BTreeMap<(FgBlockOnHicann, SharedParameter), FgValue>,
    passes: Vec<FgConfig>,
}

impl Default for FloatingGates {
    fn default() -> Self {
        Self {
            shared: BTreeMap::new(),
            passes: vec![FgConfig::default(); DEFAULT_PROGRAMMING_PASSES],
        }
    }
}

impl FloatingGates {
    /// Shared parameter of a block; never-written cells read as zero.
    pub fn shared(&self, block: FgBlockOnHicann, parameter: SharedParameter) -> FgValue {
        self.shared
            .get(&(block, parameter))
            .copied()
            .unwrap_or(FgValue::ZERO)
    }

    /// Every explicitly written shared value, by block then parameter.
    pub fn shared_values(
        &self,
    ) -> impl Iterator<Item = (FgBlockOnHicann, SharedParameter, FgValue)> + '_ {
        self.shared.iter().map(|(&(block, parameter), &value)| (block, parameter, value))
    }

    /// Set a shared parameter of a block.
    pub fn set_shared(&mut self, block: FgBlockOnHicann, parameter: SharedParameter, value: FgValue) {
        self.shared.insert((block, parameter), value);
    }

    /// Number of programming passes.
    pub fn programming_passes(&self) -> usize {
        self.passes.len()
    }

    /// Change the number of programming passes; new passes start from the
    /// default register image.
    pub fn set_programming_passes(&mut self, passes: usize) {
        self.passes.resize(passes, FgConfig::default());
    }

    /// Register images of every pass, in programming order.
    pub fn fg_configs(&self) -> &[FgConfig] {
        &self.passes
    }

    /// Register image of one pass.
    pub fn fg_config(&self, pass: usize) -> Option<FgConfig> {
        self.passes.get(pass).copied()
    }

    /// Replace the register image of one pass.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidState`] if the pass does not exist.
    pub fn set_fg_config(&mut self, pass: usize, config: FgConfig) -> Result<()> {
        let configured = self.passes.len();
        let slot = self.passes.get_mut(pass).ok_or_else(|| {
            HicannError::invalid_state(format!(
                "programming pass {pass} does not exist ({configured} configured)"
            ))
        })?;
        *slot = config;
        Ok(())
    }
}

/// Configuration of one synapse driver row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowConfig {
    /// Divisor applied to the selected V_gmax
    pub gmax_div: GmaxDiv,
    /// Which of V_gmax0..3 the row uses
    pub sel_vgmax: u8,
    /// Synaptic input the row drives
    pub receptor: Receptor,
}

/// Configuration of one chip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HicannConfig {
    /// Analog parameter memory
    pub floating_gates: FloatingGates,
    rows: BTreeMap<(SynapseDriverOnHicann, RowOnSynapseDriver), RowConfig>,
    synapses: BTreeMap<SynapseOnHicann, SynapseConfig>,
}

impl HicannConfig {
    /// Row configuration; never-written rows read as default.
    pub fn row(&self, driver: SynapseDriverOnHicann, row: RowOnSynapseDriver) -> RowConfig {
        self.rows.get(&(driver, row)).copied().unwrap_or_default()
    }

    /// Mutable row configuration.
    pub fn row_mut(
        &mut self,
        driver: SynapseDriverOnHicann,
        row: RowOnSynapseDriver,
    ) -> &mut RowConfig {
        self.rows.entry((driver, row)).or_default()
    }

    /// Every explicitly written row, in driver order.
    pub fn configured_rows(
        &self,
    ) -> impl Iterator<Item = (SynapseDriverOnHicann, RowOnSynapseDriver, RowConfig)> + '_ {
        self.rows.iter().map(|(&(driver, row), &config)| (driver, row, config))
    }

    /// Synapse configuration; never-written synapses read as disabled.
    pub fn synapse(&self, synapse: SynapseOnHicann) -> SynapseConfig {
        self.synapses.get(&synapse).copied().unwrap_or_default()
    }

    /// Mutable synapse configuration.
    pub fn synapse_mut(&mut self, synapse: SynapseOnHicann) -> &mut SynapseConfig {
        self.synapses.entry(synapse).or_default()
    }

    /// Every explicitly written synapse, in coordinate order.
    pub fn configured_synapses(&self) -> impl Iterator<Item = (SynapseOnHicann, SynapseConfig)> + '_ {
        self.synapses.iter().map(|(s, c)| (*s, *c))
    }
}

/// Read/write handle on one synapse of the tree.
#[derive(Debug)]
pub struct SynapseProxy<'a> {
    slot: &'a mut SynapseConfig,
}

impl SynapseProxy<'_> {
    /// Current configuration.
    pub fn get(&self) -> SynapseConfig {
        *self.slot
    }

    /// Current decoder, `None` if disabled.
    pub fn decoder(&self) -> Option<SynapseDecoder> {
        self.slot.decoder()
    }

    /// Current weight, zero if disabled.
    pub fn weight(&self) -> SynapseWeight {
        self.slot.weight()
    }

    /// Overwrite the configuration.
    pub fn set(&mut self, config: SynapseConfig) {
        *self.slot = config;
    }

    /// Enable with a decoder and weight.
    pub fn enable(&mut self, decoder: SynapseDecoder, weight: SynapseWeight) {
        self.set(SynapseConfig::active(decoder, weight));
    }

    /// Make the synapse electrically dark.
    pub fn disable(&mut self) {
        self.set(SynapseConfig::Disabled);
    }
}

/// Configuration tree of one wafer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaferConfig {
    wafer: Wafer,
    hicanns: BTreeMap<HicannOnWafer, HicannConfig>,
}

impl WaferConfig {
    /// Empty tree: no chip allocated.
    pub fn new(wafer: Wafer) -> Self {
        Self {
            wafer,
            hicanns: BTreeMap::new(),
        }
    }

    /// Wafer this tree configures.
    pub const fn wafer(&self) -> Wafer {
        self.wafer
    }

    /// Allocate a chip (idempotent) and return its configuration.
    pub fn allocate(&mut self, hicann: HicannOnWafer) -> &mut HicannConfig {
        self.hicanns.entry(hicann).or_default()
    }

    /// True if the chip is part of the experiment.
    pub fn is_allocated(&self, hicann: HicannOnWafer) -> bool {
        self.hicanns.contains_key(&hicann)
    }

    /// Allocated chips, ascending.
    pub fn allocated_hicanns(&self) -> Vec<HicannOnWafer> {
        self.hicanns.keys().copied().collect()
    }

    /// Allocated chips with their configuration, ascending.
    pub fn hicanns(&self) -> impl Iterator<Item = (HicannOnWafer, &HicannConfig)> + '_ {
        self.hicanns.iter().map(|(&hicann, config)| (hicann, config))
    }

    /// Configuration of an allocated chip.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::NotAllocated`] otherwise.
    pub fn hicann(&self, hicann: HicannOnWafer) -> Result<&HicannConfig> {
        self.hicanns
            .get(&hicann)
            .ok_or(HicannError::NotAllocated { hicann })
    }

    /// Mutable configuration of an allocated chip.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::NotAllocated`] otherwise.
    pub fn hicann_mut(&mut self, hicann: HicannOnWafer) -> Result<&mut HicannConfig> {
        self.hicanns
            .get_mut(&hicann)
            .ok_or(HicannError::NotAllocated { hicann })
    }

    /// Current configuration of a synapse.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::NotAllocated`] if its chip is not allocated.
    pub fn synapse(&self, synapse: SynapseOnWafer) -> Result<SynapseConfig> {
        Ok(self.hicann(synapse.hicann)?.synapse(synapse.synapse))
    }

    /// Proxy for reading and writing one synapse.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::NotAllocated`] if its chip is not allocated.
    pub fn synapse_proxy(&mut self, synapse: SynapseOnWafer) -> Result<SynapseProxy<'_>> {
        let slot = self.hicann_mut(synapse.hicann)?.synapse_mut(synapse.synapse);
        Ok(SynapseProxy { slot })
    }
}
