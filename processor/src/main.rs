use anyhow::Context;
use bicyclecore::storage::JsonRunStore;
use clap::Parser;
use log::info;
use generator::profile::{synthesize, GeneratorConfig};
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator {
    pub mod profile;
}

mod workflow {
    pub mod config;
    pub mod runner;
}

#[derive(Parser)]
#[command(author, version, about = "Batch processor for instrumented bicycle runs")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value = "export")]
    export_dir: PathBuf,
    /// YAML map of physical parameters (defaults to <data-dir>/parameters.yaml)
    #[arg(long)]
    parameters: Option<PathBuf>,
    #[arg(long, default_value_t = 4)]
    workers: usize,
    /// Write N synthetic runs into the data directory before processing
    #[arg(long)]
    synthesize: Option<usize>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.data_dir, args.export_dir, args.parameters, args.workers)
    };

    info!(
        "data {}, export {}, {} workers",
        workflow_config.data_dir.display(),
        workflow_config.export_dir.display(),
        workflow_config.workers
    );

    if let Some(runs) = args.synthesize {
        let store = JsonRunStore::new(&workflow_config.data_dir);
        let generator_config = GeneratorConfig {
            runs,
            seed: args.seed,
            ..GeneratorConfig::default()
        };
        let ids = synthesize(&store, &generator_config).with_context(|| {
            format!("synthesizing dataset in {}", workflow_config.data_dir.display())
        })?;
        println!(
            "Synthesized {} runs in {}",
            ids.len(),
            workflow_config.data_dir.display()
        );
    }

    let report_path = workflow_config.export_dir.join("batch_report.json");
    let runner = Runner::new(workflow_config);
    let report = runner.execute().context("running batch")?;
    report.write_json(&report_path)?;
    println!("{}", report.summary());
    for run in &report.exported {
        println!("run {} -> {} (tau {:.3} s)", run.run_id, run.path.display(), run.tau);
    }

    Ok(())
}
