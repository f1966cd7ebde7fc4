//! Wafer-wide shared analog parameters.
//!
//! The digital weight of a synapse only scales a current whose full-scale
//! value is set by the floating-gate V_gmax references and the per-row gmax
//! divisor. Those set the operating point the digital sweep explores, so they
//! are written once before the first run.
//!
//! ```text
//! I_syn ∝ (weight / 15) · V_gmax[sel] / gmax_div
//! ```

use hicann_chip::{
    FgBlockOnHicann, FgValue, GmaxDiv, RowOnSynapseDriver, SharedParameter, SynapseDriverOnHicann,
};
use tracing::debug;

use crate::error::Result;
use crate::wafer::WaferConfig;

/// DLL resistor bias written on every FG block.
pub const V_DLLRES: u16 = 275;

/// Cascode bias written on every FG block.
pub const V_CCAS: u16 = 800;

/// Validated gain settings for [`program_shared_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedAnalogParameters {
    /// Maximum-conductance reference, written to V_gmax0..3
    pub gmax: FgValue,
    /// Divisor written to every synapse driver row
    pub gmax_div: GmaxDiv,
}

impl SharedAnalogParameters {
    /// Validate raw settings: gmax 0..=1023 (1023 strongest), divisor
    /// 2..=30 (2 strongest).
    ///
    /// # Errors
    ///
    /// Returns [`crate::HicannError::InvalidSynapseParameter`] for out-of-range
    /// values.
    pub fn new(gmax: u16, gmax_div: u8) -> Result<Self> {
        Ok(Self {
            gmax: FgValue::new(gmax)?,
            gmax_div: GmaxDiv::new(gmax_div)?,
        })
    }
}

/// Write the shared analog settings to every allocated chip.
///
/// Per chip: V_gmax0..3 on every FG block, the divisor on every driver row,
/// zero programming biases on every programming pass and the fixed
/// V_dllres / V_ccas values on every FG block. Every call rewrites all of it.
/// Returns the number of chips programmed; zero allocated chips is a no-op.
///
/// # Errors
///
/// Returns an error only if the configuration tree is internally
/// inconsistent (an allocated chip disappearing mid-call).
pub fn program_shared_parameters(
    wafer: &mut WaferConfig,
    params: &SharedAnalogParameters,
) -> Result<usize> {
    let dllres = FgValue::new(V_DLLRES)?;
    let ccas = FgValue::new(V_CCAS)?;
    let hicanns = wafer.allocated_hicanns();

    for &hicann in &hicanns {
        let config = wafer.hicann_mut(hicann)?;

        for block in FgBlockOnHicann::iter_all() {
            for parameter in SharedParameter::GMAX {
                config.floating_gates.set_shared(block, parameter, params.gmax);
            }
        }

        for driver in SynapseDriverOnHicann::iter_all() {
            for row in RowOnSynapseDriver::iter_all() {
                config.row_mut(driver, row).gmax_div = params.gmax_div;
            }
        }

        let fgs = &mut config.floating_gates;
        for pass in 0..fgs.programming_passes() {
            if let Some(mut cfg) = fgs.fg_config(pass) {
                cfg.fg_biasn = 0;
                cfg.fg_bias = 0;
                fgs.set_fg_config(pass, cfg)?;
            }
        }

        for block in FgBlockOnHicann::iter_all() {
            fgs.set_shared(block, SharedParameter::VDllres, dllres);
            fgs.set_shared(block, SharedParameter::VCcas, ccas);
        }

        debug!(
            "{hicann}: gmax={} gmax_div={} over {} programming passes",
            params.gmax.value(),
            params.gmax_div.value(),
            fgs.programming_passes()
        );
    }

    if hicanns.is_empty() {
        debug!("No allocated HICANNs, shared analog parameters untouched");
    }
    Ok(hicanns.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HicannError;
    use hicann_chip::{HicannOnWafer, Wafer};

    fn allocated(hicanns: &[u16]) -> WaferConfig {
        let mut wafer = WaferConfig::new(Wafer(33));
        for &h in hicanns {
            wafer.allocate(HicannOnWafer::new(h).unwrap());
        }
        wafer
    }

    #[test]
    fn writes_every_block_row_and_pass() {
        let mut wafer = allocated(&[297, 298]);
        let params = SharedAnalogParameters::new(1023, 2).unwrap();
        assert_eq!(program_shared_parameters(&mut wafer, &params).unwrap(), 2);

        for hicann in wafer.allocated_hicanns() {
            let config = wafer.hicann(hicann).unwrap();
            let fgs = &config.floating_gates;
            for block in FgBlockOnHicann::iter_all() {
                for p in SharedParameter::GMAX {
                    assert_eq!(fgs.shared(block, p).value(), 1023);
                }
                assert_eq!(fgs.shared(block, SharedParameter::VDllres).value(), V_DLLRES);
                assert_eq!(fgs.shared(block, SharedParameter::VCcas).value(), V_CCAS);
            }
            for driver in SynapseDriverOnHicann::iter_all() {
                for row in RowOnSynapseDriver::iter_all() {
                    assert_eq!(config.row(driver, row).gmax_div.value(), 2);
                }
            }
            for pass in 0..fgs.programming_passes() {
                let cfg = fgs.fg_config(pass).unwrap();
                assert_eq!((cfg.fg_bias, cfg.fg_biasn), (0, 0));
            }
        }
    }

    #[test]
    fn reprogramming_is_idempotent() {
        let params = SharedAnalogParameters::new(700, 11).unwrap();
        let mut wafer = allocated(&[297]);
        program_shared_parameters(&mut wafer, &params).unwrap();
        let first = wafer.clone();
        program_shared_parameters(&mut wafer, &params).unwrap();
        assert_eq!(wafer, first);
    }

    #[test]
    fn every_pass_is_rewritten_on_every_call() {
        let params = SharedAnalogParameters::new(1023, 2).unwrap();
        let mut wafer = allocated(&[297]);
        program_shared_parameters(&mut wafer, &params).unwrap();

        let h = HicannOnWafer::new(297).unwrap();
        let fgs = &mut wafer.hicann_mut(h).unwrap().floating_gates;
        fgs.set_programming_passes(3);
        assert_ne!(fgs.fg_config(2).unwrap().fg_bias, 0);

        program_shared_parameters(&mut wafer, &params).unwrap();
        let fgs = &wafer.hicann(h).unwrap().floating_gates;
        assert_eq!(fgs.fg_config(2).unwrap().fg_bias, 0);
        assert_eq!(fgs.fg_config(2).unwrap().fg_biasn, 0);
    }

    #[test]
    fn no_allocated_chip_is_a_noop() {
        let mut wafer = allocated(&[]);
        let before = wafer.clone();
        let params = SharedAnalogParameters::new(1023, 2).unwrap();
        assert_eq!(program_shared_parameters(&mut wafer, &params).unwrap(), 0);
        assert_eq!(wafer, before);
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        assert!(matches!(
            SharedAnalogParameters::new(1024, 2),
            Err(HicannError::InvalidSynapseParameter { .. })
        ));
        assert!(matches!(
            SharedAnalogParameters::new(1023, 1),
            Err(HicannError::InvalidSynapseParameter { .. })
        ));
    }
}
