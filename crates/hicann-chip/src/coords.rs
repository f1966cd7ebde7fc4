// SPDX-License-Identifier: AGPL-3.0-only

//! Coordinate hierarchy of a HICANN wafer.
//!
//! Every coordinate is a small `Copy` value with a validated constructor, a
//! total order (so it can key a `BTreeMap`) and an `iter_all()` enumerator
//! over every instance on its parent.

use std::fmt;

use crate::error::CoordError;

/// HICANN chips on one wafer.
pub const HICANNS_PER_WAFER: u16 = 384;

/// Floating-gate blocks per HICANN (one per quadrant).
pub const FG_BLOCKS_PER_HICANN: u8 = 4;

/// Synapse drivers per HICANN (112 per half).
pub const SYNAPSE_DRIVERS_PER_HICANN: u8 = 224;

/// Synapse rows driven by one synapse driver.
pub const ROWS_PER_SYNAPSE_DRIVER: u8 = 2;

/// Synapse columns per HICANN (one per dendritic membrane column).
pub const SYNAPSE_COLUMNS_PER_HICANN: u16 = 256;

/// Denmem circuits (neurons) per HICANN, 256 per half.
pub const NEURONS_PER_HICANN: u16 = 512;

macro_rules! ranged_coordinate {
    ($(#[$meta:meta])* $name:ident($repr:ty), $repr_name:literal, $count:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = $repr_name, into = $repr_name))]
        pub struct $name($repr);

        impl $name {
            /// Number of instances on the parent entity.
            pub const COUNT: $repr = $count;

            /// Create from an enumeration index.
            ///
            /// # Errors
            ///
            /// Returns [`CoordError::OutOfRange`] if `value >= COUNT`.
            pub fn new(value: $repr) -> Result<Self, CoordError> {
                if value < $count {
                    Ok(Self(value))
                } else {
                    Err(CoordError::out_of_range(
                        stringify!($name),
                        value,
                        0,
                        i64::from($count) - 1,
                    ))
                }
            }

            /// Enumeration index.
            #[must_use]
            pub const fn value(self) -> $repr {
                self.0
            }

            /// Every instance, in ascending order.
            pub fn iter_all() -> impl Iterator<Item = Self> {
                (0..$count).map(Self)
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = CoordError;

            fn try_from(value: $repr) -> Result<Self, CoordError> {
                Self::new(value)
            }
        }

        impl From<$name> for $repr {
            fn from(coord: $name) -> $repr {
                coord.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

/// Wafer identifier. Any id is valid; availability is a property of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wafer(pub u32);

impl fmt::Display for Wafer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wafer({})", self.0)
    }
}

ranged_coordinate!(
    /// HICANN chip on a wafer, by enumeration index.
    HicannOnWafer(u16), "u16", HICANNS_PER_WAFER
);

ranged_coordinate!(
    /// Floating-gate block on a HICANN. Blocks 0/1 serve the top half
    /// (left/right), 2/3 the bottom half.
    FgBlockOnHicann(u8), "u8", FG_BLOCKS_PER_HICANN
);

ranged_coordinate!(
    /// Synapse driver on a HICANN. Drivers below 112 feed the top synapse array.
    SynapseDriverOnHicann(u8), "u8", SYNAPSE_DRIVERS_PER_HICANN
);

ranged_coordinate!(
    /// Column of the synapse array.
    SynapseColumnOnHicann(u16), "u16", SYNAPSE_COLUMNS_PER_HICANN
);

ranged_coordinate!(
    /// Denmem circuit on a HICANN.
    NeuronOnHicann(u16), "u16", NEURONS_PER_HICANN
);

impl SynapseDriverOnHicann {
    /// True if the driver feeds the top synapse array.
    #[must_use]
    pub const fn is_top(self) -> bool {
        self.0 < SYNAPSE_DRIVERS_PER_HICANN / 2
    }
}

impl SynapseColumnOnHicann {
    /// True if the column lies in the left half of the array.
    #[must_use]
    pub const fn is_left(self) -> bool {
        self.0 < SYNAPSE_COLUMNS_PER_HICANN / 2
    }
}

impl NeuronOnHicann {
    /// Synapse column feeding this neuron.
    #[must_use]
    pub const fn column(self) -> SynapseColumnOnHicann {
        SynapseColumnOnHicann(self.0 % SYNAPSE_COLUMNS_PER_HICANN)
    }

    /// True if the neuron sits in the top half.
    #[must_use]
    pub const fn is_top(self) -> bool {
        self.0 < SYNAPSE_COLUMNS_PER_HICANN
    }
}

/// One of the two synapse rows driven by a synapse driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowOnSynapseDriver {
    /// Upper row
    Top,
    /// Lower row
    Bottom,
}

impl RowOnSynapseDriver {
    /// Both rows, top first.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        [Self::Top, Self::Bottom].into_iter()
    }

    /// Row index on the driver (0 = top).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Top => 0,
            Self::Bottom => 1,
        }
    }
}

impl fmt::Display for RowOnSynapseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

/// A single synapse of a HICANN's synapse array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseOnHicann {
    /// Synapse driver feeding the row
    pub driver: SynapseDriverOnHicann,
    /// Row on that driver
    pub row: RowOnSynapseDriver,
    /// Column of the synapse array
    pub column: SynapseColumnOnHicann,
}

impl SynapseOnHicann {
    /// Create from its three components.
    #[must_use]
    pub const fn new(
        driver: SynapseDriverOnHicann,
        row: RowOnSynapseDriver,
        column: SynapseColumnOnHicann,
    ) -> Self {
        Self {
            driver,
            row,
            column,
        }
    }

    /// Floating-gate block holding the shared parameters of this synapse's quadrant.
    #[must_use]
    pub const fn fg_block(self) -> FgBlockOnHicann {
        let half = if self.driver.is_top() { 0 } else { 2 };
        let side = if self.column.is_left() { 0 } else { 1 };
        FgBlockOnHicann(half + side)
    }
}

impl fmt::Display for SynapseOnHicann {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synapse(driver={}, row={}, column={})",
            self.driver.0, self.row, self.column.0
        )
    }
}

/// A synapse anywhere on the wafer: the hardware synapse reference.
///
/// Ordered by chip first, then driver, row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseOnWafer {
    /// Chip holding the synapse
    pub hicann: HicannOnWafer,
    /// Synapse on that chip
    pub synapse: SynapseOnHicann,
}

impl SynapseOnWafer {
    /// Create from chip and on-chip synapse.
    #[must_use]
    pub const fn new(hicann: HicannOnWafer, synapse: SynapseOnHicann) -> Self {
        Self { hicann, synapse }
    }

    /// Chip holding the synapse.
    #[must_use]
    pub const fn to_hicann_on_wafer(self) -> HicannOnWafer {
        self.hicann
    }
}

impl fmt::Display for SynapseOnWafer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hicann, self.synapse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hicann_range_is_enforced() {
        assert!(HicannOnWafer::new(297).is_ok());
        assert!(HicannOnWafer::new(383).is_ok());
        let err = HicannOnWafer::new(384).unwrap_err();
        assert_eq!(
            err,
            CoordError::OutOfRange {
                what: "HicannOnWafer",
                value: 384,
                min: 0,
                max: 383
            }
        );
    }

    #[test]
    fn iteration_covers_every_instance() {
        assert_eq!(FgBlockOnHicann::iter_all().count(), 4);
        assert_eq!(SynapseDriverOnHicann::iter_all().count(), 224);
        assert_eq!(RowOnSynapseDriver::iter_all().count(), 2);
        assert_eq!(SynapseColumnOnHicann::iter_all().count(), 256);
    }

    #[test]
    fn synapse_quadrant_selects_fg_block() {
        let syn = |d: u8, c: u16| {
            SynapseOnHicann::new(
                SynapseDriverOnHicann::new(d).unwrap(),
                RowOnSynapseDriver::Top,
                SynapseColumnOnHicann::new(c).unwrap(),
            )
        };
        assert_eq!(syn(0, 0).fg_block().value(), 0);
        assert_eq!(syn(0, 200).fg_block().value(), 1);
        assert_eq!(syn(150, 3).fg_block().value(), 2);
        assert_eq!(syn(223, 255).fg_block().value(), 3);
    }

    #[test]
    fn synapse_refs_order_by_chip_first() {
        let s = SynapseOnHicann::new(
            SynapseDriverOnHicann::new(200).unwrap(),
            RowOnSynapseDriver::Bottom,
            SynapseColumnOnHicann::new(255).unwrap(),
        );
        let t = SynapseOnHicann::new(
            SynapseDriverOnHicann::new(0).unwrap(),
            RowOnSynapseDriver::Top,
            SynapseColumnOnHicann::new(0).unwrap(),
        );
        let a = SynapseOnWafer::new(HicannOnWafer::new(1).unwrap(), s);
        let b = SynapseOnWafer::new(HicannOnWafer::new(2).unwrap(), t);
        assert!(a < b);
        assert_eq!(a.to_hicann_on_wafer().value(), 1);
    }

    #[test]
    fn neuron_maps_to_column_and_half() {
        let n = NeuronOnHicann::new(300).unwrap();
        assert_eq!(n.column().value(), 44);
        assert!(!n.is_top());
        assert!(NeuronOnHicann::new(12).unwrap().is_top());
    }
}
