use std::io;
use std::path::PathBuf;

use clap::Args;
use log::LevelFilter;

/// Locations shared by the server and the maintenance tool.
#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    /// Directory holding one HTML file per page plus shared assets
    #[arg(long, value_name = "DIR", default_value = "pages", env = "GREETCARD_PAGES_DIR")]
    pub pages_dir: PathBuf,

    /// SQLite database holding PageMetadata and PageStatus
    #[arg(long, value_name = "FILE", default_value = "pages.db", env = "GREETCARD_DATABASE")]
    pub database: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "GREETCARD_LOG_LEVEL")]
    pub log_level: LevelFilter,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE", env = "GREETCARD_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl LogArgs {
    pub fn init(&self) -> io::Result<()> {
        match &self.log_file {
            Some(path) => simple_logging::log_to_file(path, self.log_level),
            None => {
                simple_logging::log_to_stderr(self.log_level);
                Ok(())
            }
        }
    }
}
