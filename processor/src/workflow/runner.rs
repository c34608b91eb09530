use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use bicyclecore::calibration::CalibrationStore;
use bicyclecore::storage::{JsonExporter, JsonRunStore, RunExporter, RunStore};
use bicyclecore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use bicyclecore::{AssemblyError, PhysicalParameters, ProcessingError, RunAssembler, RunId};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;

/// A run that made it through assembly and export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedRun {
    pub run_id: RunId,
    pub path: PathBuf,
    pub tau: f64,
}

pub struct BatchReport {
    pub exported: Vec<ExportedRun>,
    pub failures: Vec<AssemblyError>,
    pub metrics: MetricsSnapshot,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} runs exported, {} failed, {} corrupted navigation frames",
            self.metrics.runs_processed, self.metrics.runs_failed, self.metrics.corrupted_frames
        )];
        for failure in &self.failures {
            lines.push(format!("  failed: {}", failure));
        }
        lines.join("\n")
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        #[derive(Serialize)]
        struct ReportFile<'a> {
            exported: &'a [ExportedRun],
            failures: Vec<String>,
            metrics: MetricsSnapshot,
        }
        let file = ReportFile {
            exported: &self.exported,
            failures: self.failures.iter().map(ToString::to_string).collect(),
            metrics: self.metrics,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&file).context("encoding batch report")?;
        fs::write(path, json).with_context(|| format!("writing batch report {}", path.display()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Processes the runs of the configured data directory.
    pub fn execute(&self) -> anyhow::Result<BatchReport> {
        let store = Arc::new(JsonRunStore::new(&self.config.data_dir));
        let exporter = Arc::new(JsonExporter::new(&self.config.export_dir));
        let parameters = self.config.load_parameters()?;
        let ids = if self.config.runs.is_empty() {
            store
                .run_ids()
                .with_context(|| format!("listing runs in {}", self.config.data_dir.display()))?
        } else {
            self.config.runs.clone()
        };
        self.process(store, exporter, parameters, ids)
    }

    /// Assembles and exports every run in `ids` on a blocking worker pool.
    /// A failing run is recorded and never stops the others.
    pub fn process(
        &self,
        store: Arc<dyn RunStore>,
        exporter: Arc<dyn RunExporter>,
        parameters: PhysicalParameters,
        ids: Vec<RunId>,
    ) -> anyhow::Result<BatchReport> {
        let log = LogManager::new();
        let records = store.calibrations().context("loading calibration records")?;
        let calibrations = Arc::new(CalibrationStore::from_records(records));
        log.record(&format!(
            "{} runs queued, {} calibration records",
            ids.len(),
            calibrations.len()
        ));

        let table = Arc::new(store.signal_table().context("resolving the signal table")?);
        log.detail(&format!("{} signals in table", table.len()));

        let assembler = RunAssembler::new(self.config.processing.clone(), calibrations, table);
        let parameters = Arc::new(parameters);
        let metrics = Arc::new(MetricsRecorder::new());

        let workers = self.config.workers.max(1);
        let runtime = TokioBuilder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .enable_all()
            .build()
            .context("creating batch runtime")?;

        let (exported, failures) = runtime.block_on(async {
            let handles: Vec<_> = ids
                .into_iter()
                .map(|run_id| {
                    let store = Arc::clone(&store);
                    let exporter = Arc::clone(&exporter);
                    let parameters = Arc::clone(&parameters);
                    let metrics = Arc::clone(&metrics);
                    let assembler = assembler.clone();
                    let handle = tokio::task::spawn_blocking(move || {
                        let run = assembler.assemble(store.as_ref(), run_id, &parameters)?;
                        metrics.record_corrupted_frames(run.decode_report.corrupted_frames());
                        let path = exporter
                            .export(&run)
                            .map_err(|e| AssemblyError::new(run_id.to_string(), None, e))?;
                        Ok::<_, AssemblyError>(ExportedRun {
                            run_id,
                            path,
                            tau: run.tau,
                        })
                    });
                    (run_id, handle)
                })
                .collect();

            let mut exported = Vec::new();
            let mut failures = Vec::new();
            for (run_id, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(join) => Err(AssemblyError::new(
                        run_id.to_string(),
                        None,
                        ProcessingError::Storage(format!("worker stopped: {}", join)),
                    )),
                };
                match outcome {
                    Ok(run) => {
                        metrics.record_processed();
                        exported.push(run);
                    }
                    Err(err) => {
                        log.warn(&err.to_string());
                        metrics.record_error();
                        failures.push(err);
                    }
                }
            }
            (exported, failures)
        });

        let report = BatchReport {
            exported,
            failures,
            metrics: metrics.snapshot(),
        };
        log.record(&format!(
            "batch done: {} exported, {} failed",
            report.metrics.runs_processed, report.metrics.runs_failed
        ));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{synthesize, GeneratorConfig};
    use bicyclecore::prelude::ProcessingConfig;

    fn config(dir: &std::path::Path) -> WorkflowConfig {
        let mut cfg = WorkflowConfig::from_args(dir.join("data"), dir.join("export"), None, 2);
        cfg.processing = ProcessingConfig {
            sample_count: 1000,
            ..ProcessingConfig::default()
        };
        cfg
    }

    fn generator(runs: usize) -> GeneratorConfig {
        GeneratorConfig {
            runs,
            samples: 800,
            seed: 11,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn runner_exports_synthetic_runs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = JsonRunStore::new(&cfg.data_dir);
        synthesize(&store, &generator(2)).unwrap();

        let report = Runner::new(cfg.clone()).execute().unwrap();
        assert!(report.failures.is_empty(), "{}", report.summary());
        assert_eq!(report.exported.len(), 2);
        assert_eq!(report.metrics.runs_processed, 2);
        for run in &report.exported {
            let doc: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&run.path).unwrap()).unwrap();
            assert!(doc["signals"]["ForwardSpeed"]["values"].is_array());
            assert!(doc["signals"]["SteerTorque"].is_object());
            assert!((run.tau - generator(2).lag_seconds).abs() < 0.02, "tau was {}", run.tau);
        }
    }

    #[test]
    fn unreadable_last_run_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = JsonRunStore::new(&cfg.data_dir);
        let ids = synthesize(&store, &generator(3)).unwrap();
        let last = ids[2];
        fs::write(cfg.data_dir.join("runs").join(format!("{}.json", last)), "{}").unwrap();
        assert!(!cfg.data_dir.join("signals.json").exists());

        let report = Runner::new(cfg).execute().unwrap();
        assert_eq!(report.exported.len(), 2, "{}", report.summary());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].run_id, last.to_string());
    }

    #[test]
    fn failing_run_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = JsonRunStore::new(&cfg.data_dir);
        let ids = synthesize(&store, &generator(3)).unwrap();
        fs::write(cfg.data_dir.join("runs").join(format!("{}.json", ids[1])), "{}").unwrap();

        let report = Runner::new(cfg).execute().unwrap();
        assert_eq!(report.exported.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].run_id, ids[1].to_string());
        assert_eq!(report.metrics.runs_failed, 1);
        assert!(report.summary().contains("1 failed"));

        let path = dir.path().join("export").join("batch_report.json");
        report.write_json(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(doc["metrics"]["runs_failed"], 1);
        assert_eq!(doc["failures"].as_array().map(Vec::len), Some(1));
    }
}
