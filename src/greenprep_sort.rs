use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use greenprep::config::SortArgs;
use greenprep::{finish_stage, sort_tree, PipelineConfig};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SortArgs::parse();

    let config = PipelineConfig {
        threshold: args.threshold,
        ..PipelineConfig::with_data_dir(&args.common.data_dir)
    };

    if !args.source.exists() {
        error!(
            "The specified source directory does not exist: {}",
            args.source.display()
        );
        return ExitCode::FAILURE;
    }

    info!(
        "Sorting {} into {} and {}...",
        args.source.display(),
        config.layout.green.display(),
        config.layout.non_green.display()
    );

    match sort_tree(
        &args.source,
        &config.layout.green,
        &config.layout.non_green,
        &config.band,
        config.threshold,
    ) {
        Ok(report) => finish_stage(&[report], args.common.summary.as_deref()),
        Err(e) => {
            error!("Failed to sort images: {}", e);
            ExitCode::FAILURE
        }
    }
}
