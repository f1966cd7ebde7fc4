// SPDX-License-Identifier: AGPL-3.0-only

//! Digital synapse encoding.
//!
//! Each synapse of the array holds a 4-bit weight and a 4-bit decoder. An
//! incoming event on the row carries a 6-bit L1 address; the synapse driver
//! decodes the two upper bits, the synapse compares its decoder with the four
//! lower bits and only then releases current proportional to its weight.
//!
//! ## The disabled synapse
//!
//! The mapping stage never hands out an L1 address whose low bits equal
//! [`DISABLED_DECODER_BITS`], so a synapse carrying that decoder can never
//! fire. Here that state is the [`SynapseConfig::Disabled`] variant: a
//! [`SynapseDecoder`] cannot hold the reserved pattern, and only the raw
//! register encoding ([`RawSynapse`]) ever sees it.

use std::fmt;

use crate::error::CoordError;

/// Decoder bit pattern that no L1 address is ever mapped to.
pub const DISABLED_DECODER_BITS: u8 = 1;

/// Number of L1 addresses on an event bus (6 bit).
pub const L1_ADDRESSES: u8 = 64;

/// Digital synaptic weight, 4 bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct SynapseWeight(u8);

impl SynapseWeight {
    /// Weakest weight (no current).
    pub const MIN: Self = Self(0);
    /// Strongest weight.
    pub const MAX: Self = Self(15);

    /// Create a weight.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] above 15.
    pub fn new(value: u8) -> Result<Self, CoordError> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(CoordError::out_of_range(
                "SynapseWeight",
                value,
                0,
                i64::from(Self::MAX.0),
            ))
        }
    }

    /// Raw 4-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Weight as a fraction of [`SynapseWeight::MAX`].
    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(Self::MAX.0)
    }
}

impl TryFrom<u8> for SynapseWeight {
    type Error = CoordError;

    fn try_from(value: u8) -> Result<Self, CoordError> {
        Self::new(value)
    }
}

impl From<SynapseWeight> for u8 {
    fn from(weight: SynapseWeight) -> u8 {
        weight.0
    }
}

impl fmt::Display for SynapseWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoder of an enabled synapse: any 4-bit pattern except the reserved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct SynapseDecoder(u8);

impl SynapseDecoder {
    /// Create a decoder.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] above 15 and [`CoordError::Reserved`]
    /// for [`DISABLED_DECODER_BITS`].
    pub fn new(value: u8) -> Result<Self, CoordError> {
        if value > 0x0F {
            return Err(CoordError::out_of_range("SynapseDecoder", value, 0, 15));
        }
        if value == DISABLED_DECODER_BITS {
            return Err(CoordError::reserved("SynapseDecoder", value));
        }
        Ok(Self(value))
    }

    /// Raw 4-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SynapseDecoder {
    type Error = CoordError;

    fn try_from(value: u8) -> Result<Self, CoordError> {
        Self::new(value)
    }
}

impl From<SynapseDecoder> for u8 {
    fn from(decoder: SynapseDecoder) -> u8 {
        decoder.0
    }
}

impl fmt::Display for SynapseDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 6-bit address of a spike source on the L1 event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct L1Address(u8);

impl L1Address {
    /// Create an address.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] at or above 64.
    pub fn new(value: u8) -> Result<Self, CoordError> {
        if value < L1_ADDRESSES {
            Ok(Self(value))
        } else {
            Err(CoordError::out_of_range(
                "L1Address",
                value,
                0,
                i64::from(L1_ADDRESSES) - 1,
            ))
        }
    }

    /// Every address, ascending.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..L1_ADDRESSES).map(Self)
    }

    /// Raw 6-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Upper two bits, matched by the synapse driver.
    #[must_use]
    pub const fn driver_bits(self) -> u8 {
        self.0 >> 4
    }

    /// Lower four bits, matched by the synapse decoder.
    #[must_use]
    pub const fn decoder_bits(self) -> u8 {
        self.0 & 0x0F
    }

    /// Decoder a synapse needs to accept this address, `None` for addresses
    /// colliding with the disabled pattern.
    #[must_use]
    pub fn decoder(self) -> Option<SynapseDecoder> {
        SynapseDecoder::new(self.decoder_bits()).ok()
    }
}

impl TryFrom<u8> for L1Address {
    type Error = CoordError;

    fn try_from(value: u8) -> Result<Self, CoordError> {
        Self::new(value)
    }
}

impl From<L1Address> for u8 {
    fn from(address: L1Address) -> u8 {
        address.0
    }
}

impl fmt::Display for L1Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L1Address({})", self.0)
    }
}

/// Register image of one synapse: decoder and weight nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSynapse {
    /// Decoder nibble
    pub decoder: u8,
    /// Weight nibble
    pub weight: u8,
}

/// Digital configuration of one synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SynapseConfig {
    /// Synapse accepts events whose decoder bits equal `decoder`.
    Active {
        /// Address match pattern
        decoder: SynapseDecoder,
        /// Digital weight
        weight: SynapseWeight,
    },

    /// Synapse never accepts an event; weight is zero.
    #[default]
    Disabled,
}

impl SynapseConfig {
    /// Enabled synapse.
    #[must_use]
    pub const fn active(decoder: SynapseDecoder, weight: SynapseWeight) -> Self {
        Self::Active { decoder, weight }
    }

    /// Decoder of an enabled synapse.
    #[must_use]
    pub const fn decoder(self) -> Option<SynapseDecoder> {
        match self {
            Self::Active { decoder, .. } => Some(decoder),
            Self::Disabled => None,
        }
    }

    /// Digital weight; zero when disabled.
    #[must_use]
    pub const fn weight(self) -> SynapseWeight {
        match self {
            Self::Active { weight, .. } => weight,
            Self::Disabled => SynapseWeight::MIN,
        }
    }

    /// True for [`SynapseConfig::Disabled`].
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// True if an event with `address` releases current through this synapse.
    #[must_use]
    pub const fn accepts(self, address: L1Address) -> bool {
        match self {
            Self::Active { decoder, .. } => decoder.0 == address.decoder_bits(),
            Self::Disabled => false,
        }
    }

    /// Register encoding.
    #[must_use]
    pub const fn to_raw(self) -> RawSynapse {
        match self {
            Self::Active { decoder, weight } => RawSynapse {
                decoder: decoder.0,
                weight: weight.0,
            },
            Self::Disabled => RawSynapse {
                decoder: DISABLED_DECODER_BITS,
                weight: 0,
            },
        }
    }

    /// Decode a register image. The reserved decoder yields `Disabled`
    /// whatever the weight nibble holds.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] if a nibble exceeds 15.
    pub fn from_raw(raw: RawSynapse) -> Result<Self, CoordError> {
        let weight = SynapseWeight::new(raw.weight)?;
        if raw.decoder == DISABLED_DECODER_BITS {
            return Ok(Self::Disabled);
        }
        Ok(Self::active(SynapseDecoder::new(raw.decoder)?, weight))
    }
}

impl fmt::Display for SynapseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { decoder, weight } => write!(f, "decoder={decoder} weight={weight}"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Divisor applied to V_gmax per synapse driver row. Smaller is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct GmaxDiv(u8);

impl GmaxDiv {
    /// Strongest setting.
    pub const MIN: Self = Self(2);
    /// Weakest setting.
    pub const MAX: Self = Self(30);

    /// Create a divisor.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::OutOfRange`] outside `2..=30`.
    pub fn new(value: u8) -> Result<Self, CoordError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoordError::out_of_range(
                "GmaxDiv",
                value,
                i64::from(Self::MIN.0),
                i64::from(Self::MAX.0),
            ))
        }
    }

    /// Divisor value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for GmaxDiv {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<u8> for GmaxDiv {
    type Error = CoordError;

    fn try_from(value: u8) -> Result<Self, CoordError> {
        Self::new(value)
    }
}

impl From<GmaxDiv> for u8 {
    fn from(div: GmaxDiv) -> u8 {
        div.0
    }
}

/// Synaptic input a synapse row drives on the target neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Receptor {
    /// Excitatory input (reversal potential above rest)
    #[default]
    Excitatory,
    /// Inhibitory input
    Inhibitory,
}

impl fmt::Display for Receptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excitatory => write!(f, "excitatory"),
            Self::Inhibitory => write!(f, "inhibitory"),
        }
    }
}
