// SPDX-License-Identifier: AGPL-3.0-only

//! Range violations for chip coordinates and register values.

use std::fmt;

/// A value does not fit the silicon it is meant to address or configure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// Value outside the inclusive range `[min, max]`.
    OutOfRange {
        /// What was being constructed (e.g. `"SynapseWeight"`)
        what: &'static str,
        /// Offending value
        value: i64,
        /// Smallest valid value
        min: i64,
        /// Largest valid value
        max: i64,
    },

    /// Value is representable but reserved by the hardware.
    Reserved {
        /// What was being constructed
        what: &'static str,
        /// Offending value
        value: i64,
    },
}

impl CoordError {
    /// Create an out-of-range error.
    pub fn out_of_range(what: &'static str, value: impl Into<i64>, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            what,
            value: value.into(),
            min,
            max,
        }
    }

    /// Create a reserved-value error.
    pub fn reserved(what: &'static str, value: impl Into<i64>) -> Self {
        Self::Reserved {
            what,
            value: value.into(),
        }
    }
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                what,
                value,
                min,
                max,
            } => write!(f, "{what} {value} out of range [{min}, {max}]"),
            Self::Reserved { what, value } => write!(f, "{what} {value} is reserved"),
        }
    }
}

impl std::error::Error for CoordError {}
