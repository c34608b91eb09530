use crate::calibration::{CalibrationStore, SignalCalibrator};
use crate::navigation::{AsyncStreamDecoder, ChannelMatrix, DecodeReport};
use crate::prelude::{AssemblyError, ProcessingConfig, ProcessingError, ProcessingResult};
use crate::processing::{
    AlignmentGrid, CrossCorrelationEstimator, InterpolatingAligner, LowPassFilter, SignalAligner,
    SignalFilter, TimeShiftEstimator, VectorSizer,
};
use crate::run::{kinematics, PhysicalParameters, Run, RunId, RunMetadata, SignalMap};
use crate::signal::{
    RawSignal, Signal, SignalDescriptor, SignalMeta, SignalTable, Source, SupplyVoltage,
};
use crate::storage::{RawRun, RunStore};
use crate::telemetry::LogManager;
use chrono::NaiveDateTime;
use ndarray::Array1;
use std::sync::Arc;

fn failure<'a>(run_id: RunId, signal: Option<&'a str>) -> impl FnOnce(ProcessingError) -> AssemblyError + 'a {
    move |source| AssemblyError::new(run_id.to_string(), signal, source)
}

/// Builds a [`Run`] from stored raw data: decode, size, calibrate, align,
/// then derive.
///
/// Holds only shared read-only state, so one assembler can serve every
/// worker of a batch.
#[derive(Clone)]
pub struct RunAssembler {
    config: ProcessingConfig,
    calibrations: Arc<CalibrationStore>,
    table: Arc<SignalTable>,
    estimator: Arc<dyn TimeShiftEstimator>,
    aligner: Arc<dyn SignalAligner>,
    filter: Arc<dyn SignalFilter>,
}

impl RunAssembler {
    /// `table` is resolved once per batch; every run is read against it.
    pub fn new(
        config: ProcessingConfig,
        calibrations: Arc<CalibrationStore>,
        table: Arc<SignalTable>,
    ) -> Self {
        let estimator = Arc::new(CrossCorrelationEstimator::new(config.max_lag_seconds));
        let filter = Arc::new(LowPassFilter::new(config.filter_cutoff_hz));
        Self {
            config,
            calibrations,
            table,
            estimator,
            aligner: Arc::new(InterpolatingAligner),
            filter,
        }
    }

    pub fn assemble(
        &self,
        store: &dyn RunStore,
        run_id: RunId,
        parameters: &PhysicalParameters,
    ) -> Result<Run, AssemblyError> {
        let log = LogManager::for_run(run_id);
        let raw = store.load_run(run_id).map_err(failure(run_id, None))?;
        let metadata = raw.metadata.clone();
        let timestamp = metadata.timestamp().map_err(failure(run_id, None))?;
        let valid_samples = metadata.sample_count().map_err(failure(run_id, None))?;
        if let Ok(recorded) = metadata.run_id() {
            if recorded != run_id {
                log.warn(&format!("file metadata says run {}", recorded));
            }
        }
        log.detail(&metadata.summary());

        let (navigation, decode_report) = self.decode_navigation(&raw);
        if decode_report.corrupted_frames() > 0 {
            log.warn(&format!(
                "{} of {} navigation frames corrupted",
                decode_report.corrupted_frames(),
                decode_report.lines
            ));
        }
        let acquisition =
            VectorSizer::size_matrix(&raw.acquisition, raw.acquisition.nrows(), self.config.sample_count);

        let mut measured = Vec::new();
        for descriptor in self.table.raw() {
            let name = descriptor.signal.as_str();
            let signal = self
                .measured_signal(descriptor, &raw, &acquisition, &navigation, valid_samples, run_id)
                .map_err(failure(run_id, Some(name)))?;
            match signal {
                Some(signal) => measured.push(RawSignal {
                    signal,
                    calibration: descriptor.calibration,
                    sensor: descriptor.sensor.clone(),
                    timestamp,
                    supply: None,
                }),
                None => log.detail(&format!("{} not recorded in this run", name)),
            }
        }

        for index in 0..measured.len() {
            let supply = self
                .supply_for(&measured[index], &measured, timestamp)
                .map_err(failure(run_id, Some(measured[index].name())))?;
            measured[index].supply = supply;
        }

        let mut raw_signals = SignalMap::default();
        let mut calibrated_signals = SignalMap::default();
        for raw_signal in measured {
            let name = raw_signal.name().to_string();
            let calibrated = self
                .calibrate(&raw_signal, timestamp)
                .map_err(failure(run_id, Some(name.as_str())))?;
            calibrated_signals
                .insert(&calibrated.name().to_string(), calibrated)
                .map_err(failure(run_id, Some(name.as_str())))?;
            raw_signals
                .insert(&name, raw_signal)
                .map_err(failure(run_id, Some(name.as_str())))?;
        }
        log.detail(&format!(
            "{} raw signals, {} calibrated",
            raw_signals.len(),
            calibrated_signals.len()
        ));

        let tau = self
            .estimate_tau(&calibrated_signals)
            .map_err(failure(run_id, None))?;
        log.record(&format!("tau = {:.4} s", tau));

        let grid = self
            .alignment_grid(&calibrated_signals, tau)
            .map_err(failure(run_id, None))?;
        log.detail(&format!(
            "aligned window: {} samples at {} Hz",
            grid.count, grid.rate
        ));

        let mut truncated_signals = SignalMap::default();
        for (name, signal) in calibrated_signals.iter() {
            let aligned = self
                .aligner
                .align(signal, &grid)
                .map_err(failure(run_id, Some(name.as_str())))?;
            truncated_signals
                .insert(name, aligned)
                .map_err(failure(run_id, Some(name.as_str())))?;
        }

        let computed_signals =
            kinematics::derive(&truncated_signals, parameters, self.filter.as_ref()).map_err(|source| {
                let signal = match &source {
                    ProcessingError::MissingSignal(name)
                    | ProcessingError::DuplicateSignal(name) => Some(name.clone()),
                    ProcessingError::SignalLengthMismatch { signal, .. } => Some(signal.clone()),
                    _ => None,
                };
                AssemblyError::new(run_id.to_string(), signal.as_deref(), source)
            })?;
        log.record(&format!("{} computed signals", computed_signals.len()));

        Ok(Run {
            id: run_id,
            metadata,
            raw_signals,
            calibrated_signals,
            truncated_signals,
            computed_signals,
            tau,
            parameters: parameters.clone(),
            decode_report,
        })
    }

    fn decode_navigation(&self, raw: &RawRun) -> (ChannelMatrix, DecodeReport) {
        let decoder = AsyncStreamDecoder::new(raw.navigation_columns.len());
        let (matrix, report) = decoder.decode_with_report(&raw.navigation_lines);
        let sized = VectorSizer::size_matrix(&matrix, matrix.nrows(), self.config.sample_count);
        (sized, report)
    }

    fn sample_rate(metadata: &RunMetadata, source: Source) -> ProcessingResult<f64> {
        match source {
            Source::Acquisition => metadata.float("NISampleRate"),
            Source::Navigation => metadata.float("VNavSampleRate"),
            Source::Derived => Err(ProcessingError::UnknownSource(source.to_string())),
        }
    }

    /// The unsized samples of one raw column, or `None` when this run did
    /// not record it. Acquisition rows keep `valid_samples`; navigation rows
    /// keep one sample per recorded line, since the two streams need not
    /// share a rate.
    fn measured_signal(
        &self,
        descriptor: &SignalDescriptor,
        raw: &RawRun,
        acquisition: &ChannelMatrix,
        navigation: &ChannelMatrix,
        valid_samples: usize,
        run_id: RunId,
    ) -> ProcessingResult<Option<Signal>> {
        let name = descriptor.signal.as_str();
        let (columns, matrix, valid) = match descriptor.source {
            Source::Acquisition => (&raw.acquisition_columns, acquisition, valid_samples),
            Source::Navigation => (
                &raw.navigation_columns,
                navigation,
                raw.navigation_lines.len(),
            ),
            Source::Derived => return Err(ProcessingError::UnknownSource(descriptor.source.to_string())),
        };
        let row = match columns.iter().position(|column| column == name) {
            Some(index) if index < matrix.nrows() => matrix.row(index).to_vec(),
            _ => return Ok(None),
        };
        let sample_rate = Self::sample_rate(&raw.metadata, descriptor.source)?;
        let values = VectorSizer::unsize(&row, valid);
        Ok(Some(Signal::new(
            Array1::from(values),
            SignalMeta {
                name: name.to_string(),
                run_id: run_id.to_string(),
                sample_rate,
                source: descriptor.source,
                units: descriptor.units.clone(),
            },
        )))
    }

    /// Supply seen by the sensor during the run, per the calibration that
    /// applies to it: a measured column when the record names one, else
    /// the record's fixed run voltage.
    fn supply_for(
        &self,
        raw: &RawSignal,
        measured: &[RawSignal],
        timestamp: NaiveDateTime,
    ) -> ProcessingResult<Option<SupplyVoltage>> {
        if !SignalCalibrator::requires_calibration(raw) {
            return Ok(None);
        }
        let record = self.calibrations.select_for_date(&raw.sensor, timestamp)?;
        let supply = match record.measures_supply() {
            Some(column) => {
                let values = measured
                    .iter()
                    .find(|other| other.name() == column)
                    .map(|other| other.signal.values().clone())
                    .ok_or_else(|| ProcessingError::MissingSignal(column.to_string()))?;
                SupplyVoltage::PerSample(values)
            }
            None => SupplyVoltage::Constant(record.run_supply_voltage),
        };
        Ok(Some(supply))
    }

    fn calibrate(&self, raw: &RawSignal, timestamp: NaiveDateTime) -> ProcessingResult<Signal> {
        if !SignalCalibrator::requires_calibration(raw) {
            return Ok(raw.signal.clone());
        }
        let record = self.calibrations.select_for_date(&raw.sensor, timestamp)?;
        SignalCalibrator::scale(raw, record, raw.supply()?)
    }

    fn estimate_tau(&self, calibrated: &SignalMap<Signal>) -> ProcessingResult<f64> {
        let acquisition = calibrated.get(&self.config.acquisition_reference)?;
        let navigation = calibrated.get(&self.config.navigation_reference)?;
        self.estimator.estimate(acquisition, navigation)
    }

    fn alignment_grid(&self, calibrated: &SignalMap<Signal>, tau: f64) -> ProcessingResult<AlignmentGrid> {
        let acquisition = calibrated.get(&self.config.acquisition_reference)?;
        let navigation = calibrated.get(&self.config.navigation_reference)?;
        Ok(AlignmentGrid::new(
            tau,
            (acquisition.len(), acquisition.sample_rate()),
            (navigation.len(), navigation.sample_rate()),
        ))
    }
}
