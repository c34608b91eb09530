use crate::navigation::DecodeReport;
use crate::prelude::ProcessingResult;
use crate::run::{PhysicalParameters, Run, RunMetadata};
use crate::signal::{Signal, Source};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Persists processed runs.
pub trait RunExporter: Send + Sync {
    fn export(&self, run: &Run) -> ProcessingResult<PathBuf>;
}

#[derive(Serialize)]
struct ExportedSignal<'a> {
    units: &'a str,
    source: Source,
    #[serde(rename = "sampleRate")]
    sample_rate: f64,
    /// NaN samples are written as `null`.
    values: Vec<Option<f64>>,
}

impl<'a> From<&'a Signal> for ExportedSignal<'a> {
    fn from(signal: &'a Signal) -> Self {
        Self {
            units: signal.units(),
            source: signal.source(),
            sample_rate: signal.sample_rate(),
            values: signal
                .values()
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ExportedRun<'a> {
    #[serde(rename = "runid")]
    run_id: String,
    metadata: &'a RunMetadata,
    tau: f64,
    parameters: &'a PhysicalParameters,
    #[serde(rename = "decodeReport")]
    decode_report: DecodeReport,
    signals: BTreeMap<&'a str, ExportedSignal<'a>>,
}

/// Writes `<dir>/json/<run id>.json` with metadata, tau and computed signals.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, run: &Run) -> PathBuf {
        self.dir.join("json").join(format!("{}.json", run.id))
    }
}

impl RunExporter for JsonExporter {
    fn export(&self, run: &Run) -> ProcessingResult<PathBuf> {
        let document = ExportedRun {
            run_id: run.id.to_string(),
            metadata: &run.metadata,
            tau: run.tau,
            parameters: &run.parameters,
            decode_report: run.decode_report,
            signals: run
                .computed_signals
                .iter()
                .map(|(name, signal)| (name.as_str(), ExportedSignal::from(signal)))
                .collect(),
        };
        let path = self.path_for(run);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string(&document)?)?;
        info!("exported run {} to {}", run.id, path.display());
        Ok(path)
    }
}
