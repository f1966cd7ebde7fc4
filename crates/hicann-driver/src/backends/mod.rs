//! Wafer backend implementations
//!
//! Only the software emulator ships with this crate. Hardware access sits
//! behind the same [`crate::WaferBackend`] trait and is provided by the
//! embedding control system.

pub mod software;

pub use software::SoftwareBackend;
