use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use greenprep::config::AnnotateArgs;
use greenprep::{annotate_folder, finish_stage, PipelineConfig};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = AnnotateArgs::parse();

    let config = PipelineConfig::with_data_dir(&args.common.data_dir);
    let green_dir = &config.layout.green;
    if !green_dir.exists() {
        error!("The green folder does not exist: {}", green_dir.display());
        return ExitCode::FAILURE;
    }

    info!("Annotating green regions in {}...", green_dir.display());
    match annotate_folder(green_dir, &config.band) {
        Ok(report) => finish_stage(&[report], args.common.summary.as_deref()),
        Err(e) => {
            error!("Failed to annotate {}: {}", green_dir.display(), e);
            ExitCode::FAILURE
        }
    }
}
