//! Sweep integration tests
//!
//! Full control flow on the software backend: map once, program the shared
//! analog parameters, sweep, archive.

use std::path::Path;
use std::sync::{Arc, Mutex};

use hicann_chip::{HicannOnWafer, SynapseConfig, SynapseWeight};
use hicann_driver::{
    build_single_neuron_network, program_shared_parameters, run_single_neuron_sweep, BackendType,
    Experiment, ExperimentConfig, HardwareSession, HicannError, ManualPlacement, Mapped,
    MappingResults, MappingService, MemorySink, Network, PlacementMapper, PopulationId, ProjectionId,
    Result, RunChecks, RunRequest, SoftwareBackend, Spike, SweepPoint, TextFileSink, TraceSink,
    VoltageSample, WaferBackend,
};

#[derive(Debug, Default)]
struct RunLog {
    checks: Vec<RunChecks>,
    released: bool,
}

/// Software backend that records run modes and can fail a given run.
#[derive(Debug)]
struct LoggingBackend {
    inner: SoftwareBackend,
    fail_on_run: Option<usize>,
    attempts: usize,
    log: Arc<Mutex<RunLog>>,
}

impl LoggingBackend {
    fn new(fail_on_run: Option<usize>) -> (Self, Arc<Mutex<RunLog>>) {
        let log = Arc::new(Mutex::new(RunLog::default()));
        let backend = Self {
            inner: SoftwareBackend::new(),
            fail_on_run,
            attempts: 0,
            log: Arc::clone(&log),
        };
        (backend, log)
    }
}

impl WaferBackend for LoggingBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn run(&mut self, request: &RunRequest<'_>) -> Result<()> {
        self.attempts += 1;
        self.log.lock().unwrap().checks.push(request.checks);
        if self.fail_on_run == Some(self.attempts) {
            return Err(HicannError::run_failure("injected fault"));
        }
        self.inner.run(request)
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn voltage_trace(&self, population: PopulationId) -> Result<Vec<VoltageSample>> {
        self.inner.voltage_trace(population)
    }

    fn spike_times(&self, population: PopulationId) -> Result<Vec<Spike>> {
        self.inner.spike_times(population)
    }

    fn release(&mut self) {
        self.inner.release();
        self.log.lock().unwrap().released = true;
    }
}

/// Text files plus the order in which labels arrived.
struct OrderedSink {
    files: TextFileSink,
    labels: Vec<String>,
}

impl TraceSink for OrderedSink {
    fn persist(&mut self, label: &str, voltage: &[VoltageSample], spikes: &[Spike]) -> Result<()> {
        self.labels.push(label.to_owned());
        self.files.persist(label, voltage, spikes)
    }
}

fn config_in(dir: &Path) -> ExperimentConfig {
    ExperimentConfig {
        output_dir: dir.to_path_buf(),
        results_path: dir.join("results.xml.gz"),
        ..ExperimentConfig::default()
    }
}

fn sink_for(config: &ExperimentConfig) -> OrderedSink {
    OrderedSink {
        files: TextFileSink::create(&config.output_dir).unwrap(),
        labels: Vec::new(),
    }
}

fn mapper(config: &ExperimentConfig) -> PlacementMapper {
    PlacementMapper::new(config.hicann().unwrap())
}

fn text_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".txt"))
        .collect();
    names.sort();
    names
}

#[test]
fn default_sweep_writes_ten_files_and_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    let mut sink = sink_for(&config);
    let (backend, log) = LoggingBackend::new(None);

    let outcome =
        run_single_neuron_sweep(&config, Box::new(backend), &mut mapper(&config), &mut sink)
            .unwrap();

    let expected = ["disabled", "0", "5", "10", "15"];
    assert_eq!(outcome.report.labels, expected);
    assert_eq!(sink.labels, expected);
    assert_eq!(text_files(tmp.path()).len(), 10);
    for label in expected {
        assert!(tmp.path().join(format!("membrane_w{label}.txt")).exists());
        assert!(tmp.path().join(format!("spikes_w{label}.txt")).exists());
    }

    let log = log.lock().unwrap();
    assert!(log.released);
    assert_eq!(
        log.checks,
        [RunChecks::Verify, RunChecks::Skip, RunChecks::Skip, RunChecks::Skip, RunChecks::Skip]
    );

    // archive: last point's weight with the decoders chosen by the mapping
    let built = build_single_neuron_network(&config).unwrap();
    let results = MappingResults::load(&config.results_path).unwrap();
    for projection in [built.excitatory, built.inhibitory] {
        let source = built.network.projection(projection).unwrap().source();
        let address = results.mapping.address(source, 0).unwrap();
        let items = results.mapping.find(projection).unwrap();
        assert_eq!(items.len(), 1);
        let cfg = results.wafer.synapse(items[0].synapse).unwrap();
        assert_eq!(cfg, SynapseConfig::active(address.decoder().unwrap(), SynapseWeight::MAX));
    }
    assert_eq!(outcome.summary.active_synapses, 2);
}

#[test]
fn stronger_weights_drive_the_neuron() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    let mut sink = sink_for(&config);
    run_single_neuron_sweep(
        &config,
        Box::new(SoftwareBackend::new()),
        &mut mapper(&config),
        &mut sink,
    )
    .unwrap();

    let spikes = |label: &str| {
        std::fs::read_to_string(tmp.path().join(format!("spikes_w{label}.txt")))
            .unwrap()
            .lines()
            .count()
    };
    assert_eq!(spikes("disabled"), 0);
    assert_eq!(spikes("0"), 0);
    assert!(spikes("15") > 0);
    assert!(spikes("15") >= spikes("5"));

    let membrane = std::fs::read_to_string(tmp.path().join("membrane_w15.txt")).unwrap();
    assert_eq!(membrane.lines().count(), 15_000);
}

#[test]
fn empty_sweep_archives_the_programmed_configuration() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ExperimentConfig {
        weights: Vec::new(),
        ..config_in(tmp.path())
    };
    let mut sink = sink_for(&config);
    let (backend, log) = LoggingBackend::new(None);

    let outcome =
        run_single_neuron_sweep(&config, Box::new(backend), &mut mapper(&config), &mut sink)
            .unwrap();
    assert!(outcome.report.labels.is_empty());
    assert!(text_files(tmp.path()).is_empty());
    assert!(log.lock().unwrap().checks.is_empty());

    let built = build_single_neuron_network(&config).unwrap();
    let mut placement = ManualPlacement::new();
    placement.on_hicann(built.neuron, config.hicann().unwrap());
    let mut expected = mapper(&config)
        .map(&built.network, config.wafer(), &placement)
        .unwrap();
    program_shared_parameters(&mut expected.wafer, &config.analog().unwrap()).unwrap();

    let results = MappingResults::load(&config.results_path).unwrap();
    assert_eq!(results.wafer, expected.wafer);
    assert_eq!(results.mapping, expected.index);
}

#[test]
fn failure_on_third_point_keeps_earlier_files_and_skips_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    let mut sink = sink_for(&config);
    let (backend, log) = LoggingBackend::new(Some(3));

    let err = run_single_neuron_sweep(&config, Box::new(backend), &mut mapper(&config), &mut sink)
        .unwrap_err();

    assert_eq!(err.sweep_label(), Some("5"));
    assert!(err.to_string().contains("'5'"));
    assert!(matches!(
        err,
        HicannError::SweepPointFailed { ref source, .. }
            if matches!(**source, HicannError::HardwareRunFailure { .. })
    ));
    assert_eq!(
        text_files(tmp.path()),
        [
            "membrane_w0.txt",
            "membrane_wdisabled.txt",
            "spikes_w0.txt",
            "spikes_wdisabled.txt"
        ]
    );
    assert!(!config.results_path.exists());
    assert!(log.lock().unwrap().released);
}

#[test]
fn existing_archive_is_kept_without_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ExperimentConfig {
        overwrite: false,
        weights: vec![Some(15)],
        ..config_in(tmp.path())
    };
    std::fs::write(&config.results_path, b"previous").unwrap();
    let mut sink = sink_for(&config);

    let err = run_single_neuron_sweep(
        &config,
        Box::new(SoftwareBackend::new()),
        &mut mapper(&config),
        &mut sink,
    )
    .unwrap_err();
    assert!(matches!(err, HicannError::PersistenceFailure { .. }));
    assert_eq!(std::fs::read(&config.results_path).unwrap(), b"previous");
}

#[test]
fn missing_projection_aborts_before_any_write() {
    let config = ExperimentConfig::default();
    let built = build_single_neuron_network(&config).unwrap();

    // map a network that lacks the inhibitory projection
    let mut partial = Network::new();
    for pop in built.network.populations() {
        partial.add_population(pop.size(), pop.cell().clone()).unwrap();
    }
    let exc = built.network.projection(built.excitatory).unwrap();
    partial
        .connect(exc.source(), exc.target(), exc.connector(), exc.receptor())
        .unwrap();

    let mut placement = ManualPlacement::new();
    placement.on_hicann(built.neuron, HicannOnWafer::new(297).unwrap());
    let outcome = mapper(&config)
        .map(&partial, config.wafer(), &placement)
        .unwrap();

    let mut experiment =
        Experiment::<Mapped>::new(built.network, built.neuron, outcome, 100.0)
            .unwrap()
            .program_analog(&config.analog().unwrap())
            .unwrap();
    let before = experiment.wafer().clone();

    let mut session = HardwareSession::open(Box::new(SoftwareBackend::new()));
    let mut sink = MemorySink::new();
    let err = experiment
        .sweep(&mut session, &SweepPoint::default_sweep(), &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        HicannError::MappingUnavailable { projection } if projection == ProjectionId(1)
    ));
    assert_eq!(err.sweep_label(), None);
    assert!(sink.points().is_empty());
    assert_eq!(session.runs(), 0);
    assert_eq!(experiment.wafer(), &before);
    assert!(experiment.decoder_cache().is_empty());
}

#[test]
fn repeated_sweeps_share_the_decoder_cache() {
    let config = ExperimentConfig::default();
    let built = build_single_neuron_network(&config).unwrap();
    let mut placement = ManualPlacement::new();
    placement.on_hicann(built.neuron, config.hicann().unwrap());
    let outcome = mapper(&config)
        .map(&built.network, config.wafer(), &placement)
        .unwrap();
    let original = outcome.wafer.clone();

    let mut experiment = Experiment::<Mapped>::new(built.network, built.neuron, outcome, 100.0)
        .unwrap()
        .program_analog(&config.analog().unwrap())
        .unwrap();

    let mut session = HardwareSession::open(Box::new(SoftwareBackend::new()));
    let mut sink = MemorySink::new();
    experiment
        .sweep(&mut session, &[SweepPoint::Disabled], &mut sink)
        .unwrap();
    let report = experiment
        .sweep(&mut session, &["7".parse().unwrap()], &mut sink)
        .unwrap();
    assert_eq!(report.labels, ["7"]);
    assert_eq!(report.synapses_per_point, 2);
    assert_eq!(session.runs(), 2);

    for projection in [built.excitatory, built.inhibitory] {
        let item = experiment.index().find(projection).unwrap()[0];
        let now = experiment.wafer().synapse(item.synapse).unwrap();
        let before = original.synapse(item.synapse).unwrap();
        assert_eq!(now.decoder(), before.decoder());
        assert_eq!(now.weight().value(), 7);
    }
    assert_eq!(experiment.decoder_cache().len(), 2);
    assert_eq!(sink.points().len(), 2);
}
