use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use greenprep::config::SplitArgs;
use greenprep::{finish_stage, split_dataset, PipelineConfig};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SplitArgs::parse();

    let config = PipelineConfig {
        val_size: args.val_size,
        seed: args.seed,
        ..PipelineConfig::with_data_dir(&args.common.data_dir)
    };

    info!(
        "Splitting {} with val_size={} and seed={}...",
        config.layout.root.display(),
        config.val_size,
        config.seed
    );

    match split_dataset(&config.layout, config.val_size, config.seed) {
        Ok(report) => finish_stage(&[report], args.common.summary.as_deref()),
        Err(e) => {
            error!("Failed to split dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
