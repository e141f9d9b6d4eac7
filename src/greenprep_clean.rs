use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use greenprep::config::CleanArgs;
use greenprep::{finish_stage, normalize, NormalizeOptions, PipelineConfig, StageReport};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CleanArgs::parse();

    let config = PipelineConfig::with_data_dir(&args.common.data_dir);
    let options = NormalizeOptions::new(config.target_size, config.jpeg_quality);

    let mut reports = Vec::new();
    for folder in config.layout.sorted_folders() {
        info!("Normalizing {}...", folder.display());
        match normalize(folder, &options) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Failed to normalize {}: {}", folder.display(), e);
                let mut report = StageReport::new("normalize");
                report.record_failure(folder, e);
                reports.push(report);
            }
        }
    }

    finish_stage(&reports, args.common.summary.as_deref())
}
