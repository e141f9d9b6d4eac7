use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use greenprep::config::SetupArgs;
use greenprep::{ensure_folders_exist, finish_stage, log_file_counts, DataLayout, StageReport};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SetupArgs::parse();

    info!("--- Data preparation setup ---");
    let layout = DataLayout::new(&args.common.data_dir);
    if let Err(e) = ensure_folders_exist(&layout) {
        error!("Failed to set up the data folders: {}", e);
        return ExitCode::FAILURE;
    }

    let mut report = StageReport::new("setup");
    for (folder, count) in log_file_counts(&layout) {
        match count {
            Some(count) => {
                report.discovered += count;
                report.succeeded += 1;
            }
            None => report.record_failure(&folder, "folder could not be read"),
        }
    }

    finish_stage(&[report], args.common.summary.as_deref())
}
