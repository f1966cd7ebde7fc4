//! Hardware session handle
//!
//! Owns the backend for the duration of an experiment. Dropping the session
//! releases the backend, on success and on every error path alike.

use crate::backend::{BackendType, RunRequest, Spike, VoltageSample, WaferBackend};
use crate::error::Result;
use crate::network::PopulationId;

/// Open connection to a wafer (or its emulator).
#[derive(Debug)]
pub struct HardwareSession {
    backend: Box<dyn WaferBackend>,
    runs: usize,
}

impl HardwareSession {
    /// Take ownership of a backend.
    pub fn open(backend: Box<dyn WaferBackend>) -> Self {
        tracing::info!("Opened {} session", backend.backend_type());
        Self { backend, runs: 0 }
    }

    /// Backend type of this session
    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    /// Runs completed in this session
    #[must_use]
    pub const fn runs(&self) -> usize {
        self.runs
    }

    /// Blocking run for `request.duration_ms`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's run failure unchanged.
    pub fn run(&mut self, request: &RunRequest<'_>) -> Result<()> {
        tracing::debug!(
            "Run {} on {} ({} ms, {:?})",
            self.runs + 1,
            self.backend.backend_type(),
            request.duration_ms,
            request.checks
        );
        self.backend.run(request)?;
        self.runs += 1;
        Ok(())
    }

    /// Clear run and recording state.
    ///
    /// # Errors
    ///
    /// Propagates the backend's reset failure unchanged.
    pub fn reset(&mut self) -> Result<()> {
        self.backend.reset()
    }

    /// Voltage recorded in the last run
    ///
    /// # Errors
    ///
    /// Returns an error if the population was not recorded.
    pub fn voltage_trace(&self, population: PopulationId) -> Result<Vec<VoltageSample>> {
        self.backend.voltage_trace(population)
    }

    /// Spikes recorded in the last run
    ///
    /// # Errors
    ///
    /// Returns an error if the population was not recorded.
    pub fn spike_times(&self, population: PopulationId) -> Result<Vec<Spike>> {
        self.backend.spike_times(population)
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        self.backend.release();
        tracing::info!(
            "Closed {} session after {} runs",
            self.backend.backend_type(),
            self.runs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct StubBackend {
        released: Arc<AtomicBool>,
    }

    impl WaferBackend for StubBackend {
        fn backend_type(&self) -> BackendType {
            BackendType::Software
        }
        fn run(&mut self, _request: &RunRequest<'_>) -> Result<()> {
            Err(crate::HicannError::run_failure("no wafer"))
        }
        fn reset(&mut self) -> Result<()> {
            Ok(())
        }
        fn voltage_trace(&self, _population: PopulationId) -> Result<Vec<VoltageSample>> {
            Ok(Vec::new())
        }
        fn spike_times(&self, _population: PopulationId) -> Result<Vec<Spike>> {
            Ok(Vec::new())
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_releases_backend() {
        let released = Arc::new(AtomicBool::new(false));
        let session = HardwareSession::open(Box::new(StubBackend {
            released: Arc::clone(&released),
        }));
        assert_eq!(session.backend_type(), BackendType::Software);
        assert!(!released.load(Ordering::SeqCst));
        drop(session);
        assert!(released.load(Ordering::SeqCst));
    }
}
