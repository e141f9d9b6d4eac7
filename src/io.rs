use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::DataLayout;
use crate::error::{PrepError, Result};
use crate::types::StageReport;
use crate::utils::{count_files, ensure_directory};

/// Create every folder of the dataset layout that is missing
pub fn ensure_folders_exist(layout: &DataLayout) -> Result<Vec<PathBuf>> {
    layout
        .all_folders()
        .iter()
        .map(|folder| {
            let path = ensure_directory(folder)?;
            debug!("Ensured folder exists: {}", path.display());
            Ok(path)
        })
        .collect()
}

/// Count the regular files in each layout folder and log one line per folder.
///
/// Folders that cannot be read are logged and reported as `None`.
pub fn log_file_counts(layout: &DataLayout) -> Vec<(PathBuf, Option<usize>)> {
    layout
        .all_folders()
        .iter()
        .map(|folder| {
            let count = match count_files(folder) {
                Ok(count) => {
                    info!("{}: {} files", folder.display(), count);
                    Some(count)
                }
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            (folder.to_path_buf(), count)
        })
        .collect()
}

/// Write stage reports as pretty-printed JSON
pub fn write_summary(path: &Path, reports: &[StageReport]) -> Result<()> {
    let file = File::create(path).map_err(|e| PrepError::io("create summary", path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, reports)
        .map_err(std::io::Error::from)
        .and_then(|_| writer.write_all(b"\n"))
        .and_then(|_| writer.flush())
        .map_err(|e| PrepError::io("write summary", path, e))
}

/// Print every report, write the JSON summary if requested, and map the
/// outcome to an exit code: failure when any file failed.
pub fn finish_stage(reports: &[StageReport], summary: Option<&Path>) -> std::process::ExitCode {
    for report in reports {
        report.print_summary();
    }

    let mut ok = reports.iter().all(|report| !report.has_failures());
    if let Some(path) = summary {
        match write_summary(path, reports) {
            Ok(()) => info!("Wrote summary to {}", path.display()),
            Err(e) => {
                log::error!("{}", e);
                ok = false;
            }
        }
    }

    if ok {
        std::process::ExitCode::SUCCESS
    } else {
        std::process::ExitCode::FAILURE
    }
}
