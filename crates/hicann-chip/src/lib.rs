// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the HICANN wafer-scale neuromorphic chip.
//!
//! This crate has **no required dependencies** and **no hardware access** — it
//! is a pure model of the silicon: the coordinate hierarchy of a wafer and
//! the encodings of its synapses and floating-gate parameters.
//! Enable the `serde` feature to serialize coordinates and values.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`coords`] | Wafer, HICANN, synapse driver/row/column, FG block, neuron |
//! | [`synapse`] | 4-bit weight and decoder, L1 address, tagged synapse config, gmax divisor |
//! | [`floating_gate`] | Shared FG parameters, 10-bit FG values, programming-pass register image |
//! | [`error`] | Range violations of the above |
//!
//! # Address hierarchy
//!
//! ```text
//! Wafer
//! └── HICANN (384 per wafer)
//!     ├── FG block (4, one per quadrant)
//!     ├── Synapse driver (224) ── row (top / bottom) ── column (256)
//!     └── Neuron (512 denmems, 256 per half)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coords;
pub mod error;
pub mod floating_gate;
pub mod synapse;

pub use coords::{
    FgBlockOnHicann, HicannOnWafer, NeuronOnHicann, RowOnSynapseDriver, SynapseColumnOnHicann,
    SynapseDriverOnHicann, SynapseOnHicann, SynapseOnWafer, Wafer,
};
pub use error::CoordError;
pub use floating_gate::{FgConfig, FgValue, SharedParameter};
pub use synapse::{
    GmaxDiv, L1Address, RawSynapse, Receptor, SynapseConfig, SynapseDecoder, SynapseWeight,
};
