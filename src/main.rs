mod api;
mod cli;
mod config;
mod database;
mod entities;
mod error;
mod query;
mod schema;
mod server;

use std::path::Path;

use cli::Cli;
use config::Config;
use directories::ProjectDirs;
use error::SocietyError;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use log::{debug, error};

const LOG_FILE_SIZE: u64 = 10_000_000;
const LOG_FILES_KEPT: usize = 7;

fn main() {
    let project_dirs = match ProjectDirs::from("", "", "societydb") {
        Some(project_dirs) => project_dirs,
        None => {
            eprintln!("Could not determine the data directory");
            std::process::exit(1);
        }
    };
    let data_dir = project_dirs.data_local_dir().to_path_buf();

    let config = Config::load_config(&project_dirs);

    // The handle must live for the whole run or logging stops
    let _logger = match setup_logging(&data_dir, &config) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());

    if let Err(err) = Cli::handle_command_line(config, data_dir) {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn setup_logging(data_dir: &Path, config: &Config) -> Result<LoggerHandle, SocietyError> {
    let log_spec = format!("societydb={}", config.logging.societydb);

    Logger::try_with_str(&log_spec)
        .and_then(|logger| {
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(data_dir.join("logs"))
                        .basename("societydb"),
                )
                .rotate(
                    Criterion::Size(LOG_FILE_SIZE),
                    Naming::Timestamps,
                    Cleanup::KeepLogFiles(LOG_FILES_KEPT),
                )
                .duplicate_to_stderr(Duplicate::Warn)
                .start()
        })
        .map_err(|e| SocietyError::Error(format!("Failed to start logging: {}", e)))
}
