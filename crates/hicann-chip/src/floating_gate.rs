// SPDX-License-Identifier: AGPL-3.0-only

//! Floating-gate analog parameter memory.
//!
//! Each HICANN quadrant has one floating-gate block. A block stores shared
//! parameters (one value for the whole quadrant) as 10-bit DAC targets. The
//! cells are written in one or more programming passes; every pass has its
//! own controller register image ([`FgConfig`]).

use std::fmt;

use crate::error::CoordError;

/// Largest floating-gate DAC value.
pub const FG_VALUE_MAX: u16 = 1023;

/// Programming passes configured on a freshly allocated chip.
pub const DEFAULT_PROGRAMMING_PASSES: usize = 2;

/// 10-bit floating-gate DAC target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct FgValue(u16);

impl FgValue {
    /// Zero.
    pub const ZERO: Self = Self(0);
    /// Full scale.
    pub const MAX: Self = Self(FG_VALUE_MAX);

    /// Create a DAC value.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] above 1023.
    pub fn new(value: u16) -> Result<Self, CoordError> {
        if value <= FG_VALUE_MAX {
            Ok(Self(value))
        } else {
            Err(CoordError::out_of_range(
                "FgValue",
                value,
                0,
                i64::from(FG_VALUE_MAX),
            ))
        }
    }

    /// Raw DAC value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Value as a fraction of full scale.
    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(FG_VALUE_MAX)
    }
}

impl TryFrom<u16> for FgValue {
    type Error = CoordError;

    fn try_from(value: u16) -> Result<Self, CoordError> {
        Self::new(value)
    }
}

impl From<FgValue> for u16 {
    fn from(value: FgValue) -> u16 {
        value.0
    }
}

/// Parameters shared by every neuron and synapse of a floating-gate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SharedParameter {
    VReset,
    VDllres,
    VBout,
    VBexp,
    VCcas,
    VDep,
    VDtc,
    VFac,
    VGmax0,
    VGmax1,
    VGmax2,
    VGmax3,
    VM,
    VStdf,
    VThigh,
    VTlow,
    IBreset,
    IBstim,
    VBstdf,
}

impl SharedParameter {
    /// Every shared parameter, in register order.
    pub const ALL: [Self; 19] = [
        Self::VReset,
        Self::VDllres,
        Self::VBout,
        Self::VBexp,
        Self::VCcas,
        Self::VDep,
        Self::VDtc,
        Self::VFac,
        Self::VGmax0,
        Self::VGmax1,
        Self::VGmax2,
        Self::VGmax3,
        Self::VM,
        Self::VStdf,
        Self::VThigh,
        Self::VTlow,
        Self::IBreset,
        Self::IBstim,
        Self::VBstdf,
    ];

    /// The four maximum-conductance references.
    pub const GMAX: [Self; 4] = [Self::VGmax0, Self::VGmax1, Self::VGmax2, Self::VGmax3];

    /// V_gmax reference selected by a synapse driver (0..=3).
    #[must_use]
    pub fn gmax(select: u8) -> Option<Self> {
        Self::GMAX.get(usize::from(select)).copied()
    }

    /// Register name as printed in calibration dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VReset => "V_reset",
            Self::VDllres => "V_dllres",
            Self::VBout => "V_bout",
            Self::VBexp => "V_bexp",
            Self::VCcas => "V_ccas",
            Self::VDep => "V_dep",
            Self::VDtc => "V_dtc",
            Self::VFac => "V_fac",
            Self::VGmax0 => "V_gmax0",
            Self::VGmax1 => "V_gmax1",
            Self::VGmax2 => "V_gmax2",
            Self::VGmax3 => "V_gmax3",
            Self::VM => "V_m",
            Self::VStdf => "V_stdf",
            Self::VThigh => "V_thigh",
            Self::VTlow => "V_tlow",
            Self::IBreset => "I_breset",
            Self::IBstim => "I_bstim",
            Self::VBstdf => "V_bstdf",
        }
    }
}

impl fmt::Display for SharedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Floating-gate controller register image for one programming pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FgConfig {
    /// Maximum write cycles per cell
    pub maxcycle: u8,
    /// Comparator settle time
    pub readtime: u8,
    /// Accepted deviation from target
    pub acceptance: u8,
    /// Write time for voltage cells
    pub voltagewritetime: u8,
    /// Write time for current cells
    pub currentwritetime: u8,
    /// Programming bias (p-side)
    pub fg_bias: u8,
    /// Programming bias (n-side)
    pub fg_biasn: u8,
    /// Write pulse length
    pub pulselength: u8,
    /// Ground V_m during programming
    pub groundvm: bool,
    /// Calibration mode
    pub calib: bool,
}

impl Default for FgConfig {
    fn default() -> Self {
        Self {
            maxcycle: 255,
            readtime: 63,
            acceptance: 2,
            voltagewritetime: 63,
            currentwritetime: 1,
            fg_bias: 8,
            fg_biasn: 5,
            pulselength: 15,
            groundvm: false,
            calib: false,
        }
    }
}
