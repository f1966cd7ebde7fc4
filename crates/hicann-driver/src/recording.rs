//! Per-point trace persistence.
//!
//! After each run the sweep hands the observed population's voltage trace
//! and spike times to a [`TraceSink`], keyed by the sweep point's label.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::{Spike, VoltageSample};
use crate::error::{HicannError, Result};

/// Destination for the traces of one sweep point.
pub trait TraceSink {
    /// Store the traces recorded for `label`, replacing earlier ones with the
    /// same label.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::PersistenceFailure`] if the traces cannot be
    /// stored.
    fn persist(&mut self, label: &str, voltage: &[VoltageSample], spikes: &[Spike]) -> Result<()>;
}

/// Writes `membrane_w<label>.txt` and `spikes_w<label>.txt` into a directory.
///
/// One sample per line, every number in `%.18e` notation:
/// `cell time_ms voltage_mV` and `cell time_ms`.
#[derive(Debug, Clone)]
pub struct TextFileSink {
    dir: PathBuf,
}

impl TextFileSink {
    /// Sink writing into `dir`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`HicannError::PersistenceFailure`] if the directory cannot be
    /// created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| HicannError::persistence(&dir, e))?;
        Ok(Self { dir })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the membrane trace for `label`
    pub fn membrane_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("membrane_w{label}.txt"))
    }

    /// Path of the spike list for `label`
    pub fn spikes_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("spikes_w{label}.txt"))
    }
}

impl TraceSink for TextFileSink {
    #[allow(clippy::cast_precision_loss)]
    fn persist(&mut self, label: &str, voltage: &[VoltageSample], spikes: &[Spike]) -> Result<()> {
        write_rows(
            &self.membrane_path(label),
            voltage
                .iter()
                .map(|s| [s.cell as f64, s.time_ms, s.voltage_mv].map(scientific).join(" ")),
        )?;
        write_rows(
            &self.spikes_path(label),
            spikes
                .iter()
                .map(|s| [s.cell as f64, s.time_ms].map(scientific).join(" ")),
        )?;
        debug!(
            "Stored {} voltage samples and {} spikes for weight {label}",
            voltage.len(),
            spikes.len()
        );
        Ok(())
    }
}

fn write_rows(path: &Path, rows: impl Iterator<Item = String>) -> Result<()> {
    let file = File::create(path).map_err(|e| HicannError::persistence(path, e))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        writeln!(out, "{row}").map_err(|e| HicannError::persistence(path, e))?;
    }
    out.flush().map_err(|e| HicannError::persistence(path, e))
}

/// `%.18e` formatting: signed exponent with at least two digits.
fn scientific(value: f64) -> String {
    let formatted = format!("{value:.18e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = exponent
                .strip_prefix('-')
                .map_or(("+", exponent), |digits| ("-", digits));
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

/// Traces of one sweep point kept in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPoint {
    /// Sweep point label
    pub label: String,
    /// Membrane voltage samples
    pub voltage: Vec<VoltageSample>,
    /// Spikes
    pub spikes: Vec<Spike>,
}

/// Keeps every persisted point in memory, in persist order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    points: Vec<RecordedPoint>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Points in persist order
    pub fn points(&self) -> &[RecordedPoint] {
        &self.points
    }

    /// Latest traces stored for `label`
    pub fn get(&self, label: &str) -> Option<&RecordedPoint> {
        self.points.iter().rev().find(|p| p.label == label)
    }
}

impl TraceSink for MemorySink {
    fn persist(&mut self, label: &str, voltage: &[VoltageSample], spikes: &[Spike]) -> Result<()> {
        self.points.push(RecordedPoint {
            label: label.to_owned(),
            voltage: voltage.to_vec(),
            spikes: spikes.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numpy_style_scientific_notation() {
        assert_eq!(scientific(1.5), "1.500000000000000000e+00");
        assert_eq!(scientific(-70.0), "-7.000000000000000000e+01");
        assert_eq!(scientific(0.1), "1.000000000000000056e-01");
        assert_eq!(scientific(0.0), "0.000000000000000000e+00");
        assert_eq!(scientific(1234.5), "1.234500000000000000e+03");
    }

    #[test]
    fn text_sink_writes_both_files_and_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = TextFileSink::create(tmp.path().join("out")).unwrap();
        let voltage = [
            VoltageSample { cell: 0, time_ms: 0.0, voltage_mv: -20.0 },
            VoltageSample { cell: 0, time_ms: 0.1, voltage_mv: -19.5 },
        ];
        let spikes = [Spike { cell: 0, time_ms: 12.5 }];
        sink.persist("15", &voltage, &spikes).unwrap();

        let membrane = std::fs::read_to_string(sink.membrane_path("15")).unwrap();
        assert_eq!(membrane.lines().count(), 2);
        assert_eq!(
            membrane.lines().next().unwrap(),
            "0.000000000000000000e+00 0.000000000000000000e+00 -2.000000000000000000e+01"
        );
        let spike_text = std::fs::read_to_string(sink.spikes_path("15")).unwrap();
        assert_eq!(spike_text, "0.000000000000000000e+00 1.250000000000000000e+01\n");

        sink.persist("15", &voltage[..1], &[]).unwrap();
        let membrane = std::fs::read_to_string(sink.membrane_path("15")).unwrap();
        assert_eq!(membrane.lines().count(), 1);
        assert!(std::fs::read_to_string(sink.spikes_path("15")).unwrap().is_empty());
    }

    #[test]
    fn disabled_label_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = TextFileSink::create(tmp.path()).unwrap();
        assert!(sink.membrane_path("disabled").ends_with("membrane_wdisabled.txt"));
        assert!(sink.spikes_path("disabled").ends_with("spikes_wdisabled.txt"));
    }

    #[test]
    fn memory_sink_keeps_order_and_latest() {
        let mut sink = MemorySink::new();
        sink.persist("0", &[], &[]).unwrap();
        sink.persist("5", &[], &[Spike { cell: 0, time_ms: 1.0 }]).unwrap();
        sink.persist("0", &[], &[Spike { cell: 0, time_ms: 2.0 }]).unwrap();
        let labels: Vec<_> = sink.points().iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["0", "5", "0"]);
        assert_eq!(sink.get("0").unwrap().spikes[0].time_ms, 2.0);
    }
}
