//! Compressed archive of the final mapping and configuration.
//!
//! The archive is gzip-compressed XML holding the configuration tree of the
//! wafer and the mapping result index, as of the end of the sweep:
//!
//! ```text
//! <results wafer="33">
//!   <hicann id="297">
//!     <shared block="0" parameter="VGmax0" value="1023"/>
//!     <pass><maxcycle>255</maxcycle>...</pass>
//!     <row driver="0" row="Top" gmax_div="2" sel_vgmax="0" receptor="excitatory"/>
//!     <synapse driver="0" row="Top" column="0" decoder="2" weight="15"/>
//!   </hicann>
//!   <projection id="0">
//!     <synapse source="0" target="0" hicann="297" driver="0" row="Top" column="0"/>
//!   </projection>
//!   <placement population="0" hicann="297"><neuron id="0"/></placement>
//!   <addresses population="1"><address value="2"/></addresses>
//! </results>
//! ```
//!
//! Disabled synapses are stored as their register image (reserved decoder,
//! weight zero).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hicann_chip::{
    FgBlockOnHicann, FgConfig, FgValue, GmaxDiv, HicannOnWafer, L1Address, NeuronOnHicann,
    RawSynapse, Receptor, RowOnSynapseDriver, SharedParameter, SynapseColumnOnHicann,
    SynapseConfig, SynapseDriverOnHicann, SynapseOnHicann, SynapseOnWafer, Wafer,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HicannError, Result};
use crate::mapping::{MappedSynapse, MappingResultIndex, NeuronPlacement};
use crate::network::{PopulationId, ProjectionId};
use crate::wafer::{RowConfig, WaferConfig};

/// Default archive file name.
pub const DEFAULT_RESULTS_FILE: &str = "results.xml.gz";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Final state of a mapped experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingResults {
    /// Configuration tree
    pub wafer: WaferConfig,
    /// Projection → hardware synapse association
    pub mapping: MappingResultIndex,
}

/// Counts shown by `hicann inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultsSummary {
    /// Wafer the configuration targets
    pub wafer: Wafer,
    /// Allocated chips
    pub hicanns: usize,
    /// Mapped projections, pruned ones included
    pub projections: usize,
    /// Hardware synapses over all projections
    pub mapped_synapses: usize,
    /// Mapped synapses currently active
    pub active_synapses: usize,
    /// Mapped synapses currently disabled
    pub disabled_synapses: usize,
}

impl MappingResults {
    /// Bundle a tree and its index.
    pub fn new(wafer: WaferConfig, mapping: MappingResultIndex) -> Self {
        Self { wafer, mapping }
    }

    /// Write the archive to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::PersistenceFailure`] if `path` exists and
    /// `overwrite` is false, or if writing fails.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && path.exists() {
            return Err(HicannError::persistence(
                path,
                "file exists and overwrite is disabled",
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HicannError::persistence(path, e))?;
        }

        let xml = quick_xml::se::to_string(&ResultsDocument::from(self))
            .map_err(|e| HicannError::persistence(path, e))?;

        let file = File::create(path).map_err(|e| HicannError::persistence(path, e))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        writeln!(encoder, "{XML_DECLARATION}")
            .and_then(|()| encoder.write_all(xml.as_bytes()))
            .map_err(|e| HicannError::persistence(path, e))?;
        encoder
            .finish()
            .and_then(|mut out| out.flush())
            .map_err(|e| HicannError::persistence(path, e))?;

        info!(
            "Wrote mapping results ({} synapses on {} HICANNs) to {}",
            self.mapping.synapse_count(),
            self.wafer.allocated_hicanns().len(),
            path.display()
        );
        Ok(())
    }

    /// Read an archive written by [`MappingResults::save`].
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::PersistenceFailure`] if the file cannot be read
    /// or decoded, or holds values out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| HicannError::persistence(path, e))?;
        let mut xml = String::new();
        GzDecoder::new(BufReader::new(file))
            .read_to_string(&mut xml)
            .map_err(|e| HicannError::persistence(path, e))?;
        let document: ResultsDocument =
            quick_xml::de::from_str(&xml).map_err(|e| HicannError::persistence(path, e))?;
        Self::try_from(document).map_err(|e| HicannError::persistence(path, e))
    }

    /// Counts over the archive.
    pub fn summary(&self) -> ResultsSummary {
        let mut summary = ResultsSummary {
            wafer: self.wafer.wafer(),
            hicanns: self.wafer.allocated_hicanns().len(),
            projections: self.mapping.projections().count(),
            mapped_synapses: 0,
            active_synapses: 0,
            disabled_synapses: 0,
        };
        for projection in self.mapping.projections() {
            for item in self.mapping.find(projection).unwrap_or_default() {
                summary.mapped_synapses += 1;
                match self.wafer.synapse(item.synapse) {
                    Ok(config) if !config.is_disabled() => summary.active_synapses += 1,
                    _ => summary.disabled_synapses += 1,
                }
            }
        }
        summary
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "results")]
struct ResultsDocument {
    #[serde(rename = "@wafer")]
    wafer: u32,
    #[serde(rename = "hicann", default)]
    hicanns: Vec<HicannElement>,
    #[serde(rename = "projection", default)]
    projections: Vec<ProjectionElement>,
    #[serde(rename = "placement", default)]
    placements: Vec<PlacementElement>,
    #[serde(rename = "addresses", default)]
    addresses: Vec<AddressesElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HicannElement {
    #[serde(rename = "@id")]
    id: HicannOnWafer,
    #[serde(rename = "shared", default)]
    shared: Vec<SharedElement>,
    #[serde(rename = "pass", default)]
    passes: Vec<FgConfig>,
    #[serde(rename = "row", default)]
    rows: Vec<RowElement>,
    #[serde(rename = "synapse", default)]
    synapses: Vec<SynapseElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SharedElement {
    #[serde(rename = "@block")]
    block: FgBlockOnHicann,
    #[serde(rename = "@parameter")]
    parameter: SharedParameter,
    #[serde(rename = "@value")]
    value: FgValue,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowElement {
    #[serde(rename = "@driver")]
    driver: SynapseDriverOnHicann,
    #[serde(rename = "@row")]
    row: RowOnSynapseDriver,
    #[serde(rename = "@gmax_div")]
    gmax_div: GmaxDiv,
    #[serde(rename = "@sel_vgmax")]
    sel_vgmax: u8,
    #[serde(rename = "@receptor")]
    receptor: Receptor,
}

#[derive(Debug, Serialize, Deserialize)]
struct SynapseElement {
    #[serde(rename = "@driver")]
    driver: SynapseDriverOnHicann,
    #[serde(rename = "@row")]
    row: RowOnSynapseDriver,
    #[serde(rename = "@column")]
    column: SynapseColumnOnHicann,
    #[serde(rename = "@decoder")]
    decoder: u8,
    #[serde(rename = "@weight")]
    weight: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectionElement {
    #[serde(rename = "@id")]
    id: ProjectionId,
    #[serde(rename = "synapse", default)]
    synapses: Vec<MappedElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MappedElement {
    #[serde(rename = "@source")]
    source: usize,
    #[serde(rename = "@target")]
    target: usize,
    #[serde(rename = "@hicann")]
    hicann: HicannOnWafer,
    #[serde(rename = "@driver")]
    driver: SynapseDriverOnHicann,
    #[serde(rename = "@row")]
    row: RowOnSynapseDriver,
    #[serde(rename = "@column")]
    column: SynapseColumnOnHicann,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlacementElement {
    #[serde(rename = "@population")]
    population: PopulationId,
    #[serde(rename = "@hicann")]
    hicann: HicannOnWafer,
    #[serde(rename = "neuron", default)]
    neurons: Vec<NeuronElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NeuronElement {
    #[serde(rename = "@id")]
    id: NeuronOnHicann,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddressesElement {
    #[serde(rename = "@population")]
    population: PopulationId,
    #[serde(rename = "address", default)]
    addresses: Vec<AddressElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddressElement {
    #[serde(rename = "@value")]
    value: L1Address,
}

impl From<&MappingResults> for ResultsDocument {
    fn from(results: &MappingResults) -> Self {
        let hicanns = results
            .wafer
            .hicanns()
            .map(|(id, config)| HicannElement {
                id,
                shared: config
                    .floating_gates
                    .shared_values()
                    .map(|(block, parameter, value)| SharedElement {
                        block,
                        parameter,
                        value,
                    })
                    .collect(),
                passes: config.floating_gates.fg_configs().to_vec(),
                rows: config
                    .configured_rows()
                    .map(|(driver, row, cfg)| RowElement {
                        driver,
                        row,
                        gmax_div: cfg.gmax_div,
                        sel_vgmax: cfg.sel_vgmax,
                        receptor: cfg.receptor,
                    })
                    .collect(),
                synapses: config
                    .configured_synapses()
                    .map(|(synapse, cfg)| {
                        let raw = cfg.to_raw();
                        SynapseElement {
                            driver: synapse.driver,
                            row: synapse.row,
                            column: synapse.column,
                            decoder: raw.decoder,
                            weight: raw.weight,
                        }
                    })
                    .collect(),
            })
            .collect();

        let projections = results
            .mapping
            .projections()
            .map(|id| ProjectionElement {
                id,
                synapses: results
                    .mapping
                    .find(id)
                    .unwrap_or_default()
                    .iter()
                    .map(|item| MappedElement {
                        source: item.source_index,
                        target: item.target_index,
                        hicann: item.synapse.hicann,
                        driver: item.synapse.synapse.driver,
                        row: item.synapse.synapse.row,
                        column: item.synapse.synapse.column,
                    })
                    .collect(),
            })
            .collect();

        let placements = results
            .mapping
            .placements()
            .map(|(population, placement)| PlacementElement {
                population,
                hicann: placement.hicann,
                neurons: placement
                    .neurons
                    .iter()
                    .map(|&id| NeuronElement { id })
                    .collect(),
            })
            .collect();

        let addresses = results
            .mapping
            .addresses()
            .map(|(population, addresses)| AddressesElement {
                population,
                addresses: addresses
                    .iter()
                    .map(|&value| AddressElement { value })
                    .collect(),
            })
            .collect();

        Self {
            wafer: results.wafer.wafer().0,
            hicanns,
            projections,
            placements,
            addresses,
        }
    }
}

impl TryFrom<ResultsDocument> for MappingResults {
    type Error = HicannError;

    fn try_from(document: ResultsDocument) -> Result<Self> {
        let mut wafer = WaferConfig::new(Wafer(document.wafer));
        for element in document.hicanns {
            let hicann = wafer.allocate(element.id);
            for shared in element.shared {
                hicann
                    .floating_gates
                    .set_shared(shared.block, shared.parameter, shared.value);
            }
            hicann
                .floating_gates
                .set_programming_passes(element.passes.len());
            for (pass, config) in element.passes.into_iter().enumerate() {
                hicann.floating_gates.set_fg_config(pass, config)?;
            }
            for row in element.rows {
                *hicann.row_mut(row.driver, row.row) = RowConfig {
                    gmax_div: row.gmax_div,
                    sel_vgmax: row.sel_vgmax,
                    receptor: row.receptor,
                };
            }
            for synapse in element.synapses {
                let coordinate = SynapseOnHicann::new(synapse.driver, synapse.row, synapse.column);
                *hicann.synapse_mut(coordinate) = SynapseConfig::from_raw(RawSynapse {
                    decoder: synapse.decoder,
                    weight: synapse.weight,
                })?;
            }
        }

        let mut mapping = MappingResultIndex::new();
        for projection in document.projections {
            let synapses = projection
                .synapses
                .into_iter()
                .map(|item| MappedSynapse {
                    source_index: item.source,
                    target_index: item.target,
                    synapse: SynapseOnWafer::new(
                        item.hicann,
                        SynapseOnHicann::new(item.driver, item.row, item.column),
                    ),
                })
                .collect();
            mapping.insert_projection(projection.id, synapses);
        }
        for placement in document.placements {
            mapping.insert_placement(
                placement.population,
                NeuronPlacement {
                    hicann: placement.hicann,
                    neurons: placement.neurons.into_iter().map(|n| n.id).collect(),
                },
            );
        }
        for addresses in document.addresses {
            mapping.insert_addresses(
                addresses.population,
                addresses.addresses.into_iter().map(|a| a.value).collect(),
            );
        }

        Ok(Self::new(wafer, mapping))
    }
}
