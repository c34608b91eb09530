use anyhow::Context;
use bicyclecore::prelude::ProcessingConfig;
use bicyclecore::{PhysicalParameters, RunId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_workers() -> usize {
    4
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    /// YAML map of physical parameters; `<data_dir>/parameters.yaml` when unset.
    #[serde(default)]
    pub parameters: Option<PathBuf>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Runs to process; every stored run when empty.
    #[serde(default)]
    pub runs: Vec<RunId>,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        data_dir: PathBuf,
        export_dir: PathBuf,
        parameters: Option<PathBuf>,
        workers: usize,
    ) -> Self {
        Self {
            data_dir,
            export_dir,
            parameters,
            workers,
            runs: Vec::new(),
            processing: ProcessingConfig::default(),
        }
    }

    pub fn parameters_path(&self) -> PathBuf {
        self.parameters
            .clone()
            .unwrap_or_else(|| self.data_dir.join("parameters.yaml"))
    }

    pub fn load_parameters(&self) -> anyhow::Result<PhysicalParameters> {
        let path = self.parameters_path();
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading physical parameters {}", path.display()))?;
        let parameters: PhysicalParameters = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing physical parameters {}", path.display()))?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_uses_default_processing() {
        let cfg = WorkflowConfig::from_args("data".into(), "out".into(), None, 2);
        assert_eq!(cfg.processing.sample_count, 18_000);
        assert_eq!(cfg.parameters_path(), PathBuf::from("data").join("parameters.yaml"));
        assert!(cfg.runs.is_empty());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"data_dir: /tmp/runs\nexport_dir: /tmp/out\nruns: [105, 106]\nprocessing:\n  sample_count: 12000\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.runs, vec![RunId(105), RunId(106)]);
        assert_eq!(cfg.processing.sample_count, 12000);
        assert_eq!(cfg.processing.navigation_reference, "AccelerationZ");
    }

    #[test]
    fn parameters_load_from_yaml_map() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"rR: 0.34\nlam: 0.31\n").unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::from_args("data".into(), "out".into(), Some(path.to_path_buf()), 1);
        let parameters = cfg.load_parameters().unwrap();
        assert_eq!(parameters.get("lam").unwrap(), 0.31);
    }
}
