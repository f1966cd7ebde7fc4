//! Digital weight sweep over a mapped and programmed experiment.
//!
//! The mapping stage runs once. Every sweep point then rewrites the synapses
//! of the experiment's projections in place, runs the wafer, stores the
//! observed population's traces and resets. Disabling a synapse destroys its
//! decoder in the configuration tree, so the decoder each synapse had on
//! first touch is kept in an [`OriginalDecoderCache`] and used to re-enable
//! it at later points.
//!
//! ```text
//! Experiment<Mapped> ──program_analog──▶ Experiment<Programmed> ──sweep──▶ MappingResults
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use hicann_chip::{SynapseConfig, SynapseDecoder, SynapseOnWafer, SynapseWeight};
use tracing::{debug, info};

use crate::analog::{program_shared_parameters, SharedAnalogParameters};
use crate::backend::{RunChecks, RunRequest};
use crate::decoder_cache::OriginalDecoderCache;
use crate::error::{HicannError, Result};
use crate::mapping::{MappingOutcome, MappingResultIndex};
use crate::network::{Network, PopulationId, ProjectionId};
use crate::recording::TraceSink;
use crate::results::MappingResults;
use crate::session::HardwareSession;
use crate::wafer::WaferConfig;

/// One entry of a sweep: a digital weight or the disabled sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPoint {
    /// Enable every target synapse with this weight
    Weight(SynapseWeight),
    /// Make every target synapse electrically dark
    Disabled,
}

impl SweepPoint {
    /// Label used in log lines and output file names: the weight or
    /// `disabled`.
    pub fn label(self) -> String {
        self.to_string()
    }

    /// `None` is the disabled sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::InvalidSynapseParameter`] for weights above 15.
    pub fn from_option(weight: Option<u8>) -> Result<Self> {
        match weight {
            Some(w) => Ok(Self::Weight(SynapseWeight::new(w)?)),
            None => Ok(Self::Disabled),
        }
    }

    /// Sweep of the single-neuron experiment: disabled, 0, 5, 10, 15.
    pub fn default_sweep() -> Vec<Self> {
        let mut points = vec![Self::Disabled];
        points.extend(
            [0, 5, 10, 15]
                .into_iter()
                .filter_map(|w| SynapseWeight::new(w).ok())
                .map(Self::Weight),
        );
        points
    }

    /// Configuration this point applies to a synapse whose first-touch
    /// decoder was `original`. A synapse without decoder stays dark.
    ///
    /// For such a synapse a weight point still writes `Disabled`, so its
    /// weight reads zero rather than the requested value.
    pub fn config_for(self, original: Option<SynapseDecoder>) -> SynapseConfig {
        match (self, original) {
            (Self::Weight(weight), Some(decoder)) => SynapseConfig::active(decoder, weight),
            _ => SynapseConfig::Disabled,
        }
    }
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weight(w) => write!(f, "{}", w.value()),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for SweepPoint {
    type Err = HicannError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if ["disabled", "none", "null"]
            .iter()
            .any(|sentinel| s.eq_ignore_ascii_case(sentinel))
        {
            return Ok(Self::Disabled);
        }
        let raw: u8 = s
            .parse()
            .map_err(|_| HicannError::invalid_parameter(format!("invalid sweep point '{s}'")))?;
        Self::from_option(Some(raw))
    }
}

/// Hardware synapses of `projections`, in projection order.
///
/// # Errors
///
/// Returns [`HicannError::MappingUnavailable`] for the first projection the
/// index does not know.
pub fn resolve_targets(
    index: &MappingResultIndex,
    projections: &[ProjectionId],
) -> Result<Vec<SynapseOnWafer>> {
    let mut targets = Vec::new();
    for &projection in projections {
        let items = index.find(projection)?;
        if items.is_empty() {
            debug!("{projection} is mapped to no synapses");
        }
        targets.extend(items.iter().map(|item| item.hardware_synapse()));
    }
    Ok(targets)
}

/// Apply one sweep point to `targets`, caching each synapse's decoder on
/// first touch. Returns the number of synapses written.
///
/// # Errors
///
/// Returns [`HicannError::NotAllocated`] if a target lies on a chip the tree
/// does not hold.
pub fn reconfigure(
    wafer: &mut WaferConfig,
    cache: &mut OriginalDecoderCache,
    targets: &[SynapseOnWafer],
    point: SweepPoint,
) -> Result<usize> {
    for &synapse in targets {
        let mut proxy = wafer.synapse_proxy(synapse)?;
        let original = cache.record_if_absent(synapse, proxy.decoder());
        proxy.set(point.config_for(original));
    }
    Ok(targets.len())
}

/// Labels of the points run, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweep point labels in run order
    pub labels: Vec<String>,
    /// Synapses rewritten per point
    pub synapses_per_point: usize,
}

/// Phase marker: mapped, shared analog parameters not yet written.
#[derive(Debug)]
pub struct Mapped;

/// Phase marker: shared analog parameters written, ready to sweep.
#[derive(Debug)]
pub struct Programmed;

/// A mapped single-wafer experiment.
#[derive(Debug)]
pub struct Experiment<Phase> {
    network: Network,
    observed: PopulationId,
    projections: Vec<ProjectionId>,
    index: MappingResultIndex,
    wafer: WaferConfig,
    cache: OriginalDecoderCache,
    duration_ms: f64,
    phase: PhantomData<Phase>,
}

impl<Phase> Experiment<Phase> {
    /// Logical network
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Population whose traces are stored per point
    pub const fn observed(&self) -> PopulationId {
        self.observed
    }

    /// Mapping result index
    pub fn index(&self) -> &MappingResultIndex {
        &self.index
    }

    /// Current configuration tree
    pub fn wafer(&self) -> &WaferConfig {
        &self.wafer
    }

    /// First-touch decoders
    pub fn decoder_cache(&self) -> &OriginalDecoderCache {
        &self.cache
    }

    /// Emulated time per run
    pub const fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

impl Experiment<Mapped> {
    /// Wrap a mapping outcome. Every projection of `network` is swept.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::UnknownPopulation`] if `observed` is not part
    /// of the network and [`HicannError::InvalidConfig`] for a non-positive
    /// duration.
    pub fn new(
        network: Network,
        observed: PopulationId,
        outcome: MappingOutcome,
        duration_ms: f64,
    ) -> Result<Self> {
        network.population(observed)?;
        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            return Err(HicannError::invalid_config(format!(
                "run duration {duration_ms} ms must be positive"
            )));
        }
        let projections = network.projections().iter().map(|p| p.id()).collect();
        Ok(Self {
            network,
            observed,
            projections,
            index: outcome.index,
            wafer: outcome.wafer,
            cache: OriginalDecoderCache::new(),
            duration_ms,
            phase: PhantomData,
        })
    }

    /// Write the shared analog parameters; required once before sweeping.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`program_shared_parameters`].
    pub fn program_analog(
        mut self,
        params: &SharedAnalogParameters,
    ) -> Result<Experiment<Programmed>> {
        let chips = program_shared_parameters(&mut self.wafer, params)?;
        info!(
            "Programmed gmax={} gmax_div={} on {chips} HICANNs",
            params.gmax.value(),
            params.gmax_div.value()
        );
        Ok(Experiment {
            network: self.network,
            observed: self.observed,
            projections: self.projections,
            index: self.index,
            wafer: self.wafer,
            cache: self.cache,
            duration_ms: self.duration_ms,
            phase: PhantomData,
        })
    }
}

impl Experiment<Programmed> {
    /// Run every point in order: reconfigure, run, store traces, reset.
    ///
    /// Targets are resolved before the first write. The first run of the
    /// session verifies the configuration; later runs skip verification.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::MappingUnavailable`] (unwrapped, nothing
    /// written) if a projection has no mapping result. Any error raised while
    /// processing a point is wrapped in [`HicannError::SweepPointFailed`]
    /// carrying its label; the sweep stops there.
    pub fn sweep(
        &mut self,
        session: &mut HardwareSession,
        points: &[SweepPoint],
        sink: &mut dyn TraceSink,
    ) -> Result<SweepReport> {
        let targets = resolve_targets(&self.index, &self.projections)?;
        let mut report = SweepReport {
            labels: Vec::with_capacity(points.len()),
            synapses_per_point: targets.len(),
        };

        for &point in points {
            let label = point.label();
            info!("running measurement with digital weight {label}");
            self.run_point(session, point, &targets, &label, sink)
                .map_err(|e| e.at_sweep_point(label.as_str()))?;
            report.labels.push(label);
        }
        Ok(report)
    }

    fn run_point(
        &mut self,
        session: &mut HardwareSession,
        point: SweepPoint,
        targets: &[SynapseOnWafer],
        label: &str,
        sink: &mut dyn TraceSink,
    ) -> Result<()> {
        let written = reconfigure(&mut self.wafer, &mut self.cache, targets, point)?;
        debug!("Weight {label}: {written} synapses rewritten");

        let checks = if session.runs() == 0 {
            RunChecks::Verify
        } else {
            RunChecks::Skip
        };
        session.run(&RunRequest {
            network: &self.network,
            mapping: &self.index,
            wafer: &self.wafer,
            duration_ms: self.duration_ms,
            checks,
        })?;

        let voltage = session.voltage_trace(self.observed)?;
        let spikes = session.spike_times(self.observed)?;
        sink.persist(label, &voltage, &spikes)?;
        session.reset()
    }

    /// Configuration tree and mapping index as of the last point.
    pub fn into_results(self) -> MappingResults {
        MappingResults::new(self.wafer, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hicann_chip::{
        HicannOnWafer, RowOnSynapseDriver, SynapseColumnOnHicann, SynapseDriverOnHicann,
        SynapseOnHicann, Wafer,
    };

    fn synapse(column: u16) -> SynapseOnWafer {
        SynapseOnWafer::new(
            HicannOnWafer::new(297).unwrap(),
            SynapseOnHicann::new(
                SynapseDriverOnHicann::new(3).unwrap(),
                RowOnSynapseDriver::Bottom,
                SynapseColumnOnHicann::new(column).unwrap(),
            ),
        )
    }

    fn decoder(raw: u8) -> SynapseDecoder {
        SynapseDecoder::new(raw).unwrap()
    }

    fn weight(raw: u8) -> SweepPoint {
        SweepPoint::Weight(SynapseWeight::new(raw).unwrap())
    }

    /// Tree with one chip; synapse(c) is active with decoder c+2, weight 15.
    fn tree(columns: &[u16]) -> WaferConfig {
        let mut wafer = WaferConfig::new(Wafer(33));
        wafer.allocate(HicannOnWafer::new(297).unwrap());
        for &c in columns {
            let d = u8::try_from(c).unwrap() + 2;
            wafer
                .synapse_proxy(synapse(c))
                .unwrap()
                .enable(decoder(d), SynapseWeight::MAX);
        }
        wafer
    }

    #[test]
    fn labels() {
        assert_eq!(SweepPoint::Disabled.label(), "disabled");
        assert_eq!(weight(10).label(), "10");
        assert_eq!(
            SweepPoint::default_sweep()
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>(),
            ["disabled", "0", "5", "10", "15"]
        );
    }

    #[test]
    fn parse_points() {
        assert_eq!("disabled".parse::<SweepPoint>().unwrap(), SweepPoint::Disabled);
        assert_eq!("None".parse::<SweepPoint>().unwrap(), SweepPoint::Disabled);
        assert_eq!(" 5 ".parse::<SweepPoint>().unwrap(), weight(5));
        assert!(matches!(
            "16".parse::<SweepPoint>(),
            Err(HicannError::InvalidSynapseParameter { .. })
        ));
        assert!("-1".parse::<SweepPoint>().is_err());
        assert!(SweepPoint::from_option(Some(16)).is_err());
    }

    #[test]
    fn disabled_then_weight_restores_original_decoder() {
        let mut wafer = tree(&[0, 1]);
        let mut cache = OriginalDecoderCache::new();
        let targets = [synapse(0), synapse(1)];

        reconfigure(&mut wafer, &mut cache, &targets, SweepPoint::Disabled).unwrap();
        for &s in &targets {
            let cfg = wafer.synapse(s).unwrap();
            assert_eq!(cfg, SynapseConfig::Disabled);
            assert_eq!(cfg.to_raw().decoder, 1);
            assert_eq!(cfg.weight(), SynapseWeight::MIN);
        }

        reconfigure(&mut wafer, &mut cache, &targets, weight(10)).unwrap();
        assert_eq!(
            wafer.synapse(synapse(0)).unwrap(),
            SynapseConfig::active(decoder(2), SynapseWeight::new(10).unwrap())
        );
        assert_eq!(
            wafer.synapse(synapse(1)).unwrap(),
            SynapseConfig::active(decoder(3), SynapseWeight::new(10).unwrap())
        );
    }

    #[test]
    fn cache_is_never_overwritten_by_later_points() {
        let mut wafer = tree(&[0]);
        let mut cache = OriginalDecoderCache::new();
        let targets = [synapse(0)];

        for point in [weight(5), SweepPoint::Disabled, weight(0), SweepPoint::Disabled] {
            reconfigure(&mut wafer, &mut cache, &targets, point).unwrap();
            assert_eq!(cache.get(&synapse(0)), Some(Some(decoder(2))));
        }
        reconfigure(&mut wafer, &mut cache, &targets, weight(15)).unwrap();
        assert_eq!(wafer.synapse(synapse(0)).unwrap().decoder(), Some(decoder(2)));
    }

    #[test]
    fn dark_at_first_touch_stays_dark() {
        let mut wafer = tree(&[]);
        let mut cache = OriginalDecoderCache::new();
        let targets = [synapse(7)];
        reconfigure(&mut wafer, &mut cache, &targets, weight(15)).unwrap();
        assert_eq!(wafer.synapse(synapse(7)).unwrap(), SynapseConfig::Disabled);
        assert_eq!(wafer.synapse(synapse(7)).unwrap().weight(), SynapseWeight::MIN);
        assert_eq!(cache.get(&synapse(7)), Some(None));
        assert_eq!(weight(15).config_for(None), SynapseConfig::Disabled);
    }

    #[test]
    fn untargeted_synapses_are_untouched() {
        let mut wafer = tree(&[0, 1]);
        let mut cache = OriginalDecoderCache::new();
        reconfigure(&mut wafer, &mut cache, &[synapse(0)], SweepPoint::Disabled).unwrap();
        assert_eq!(
            wafer.synapse(synapse(1)).unwrap(),
            SynapseConfig::active(decoder(3), SynapseWeight::MAX)
        );
        assert!(!cache.contains(&synapse(1)));
    }

    #[test]
    fn unknown_projection_fails_resolution() {
        let index = MappingResultIndex::new();
        let err = resolve_targets(&index, &[ProjectionId(0)]).unwrap_err();
        assert!(matches!(err, HicannError::MappingUnavailable { .. }));
    }

    #[test]
    fn pruned_projection_contributes_nothing() {
        let mut index = MappingResultIndex::new();
        index.insert_projection(ProjectionId(0), Vec::new());
        assert!(resolve_targets(&index, &[ProjectionId(0)]).unwrap().is_empty());
    }
}
