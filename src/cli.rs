use clap::Parser;

use crate::config::{expand_home, Config, ConfigError, UserEntry};
use crate::pipeline::RunOptions;

/// Archive Reddit saved/liked listings and the imgur media they link to.
#[derive(Debug, Parser)]
#[command(name = "reddit-link-archiver", version, about)]
pub struct Cli {
    /// Ignore any previous data and get everything again.
    #[arg(long)]
    pub fresh_start: bool,

    /// Run the whole archived history through processing again.
    #[arg(long)]
    pub reprocess: bool,

    /// Don't save the resulting data or newest cursor.
    #[arg(long = "no-save")]
    pub no_save: bool,

    /// Process new records: download imgur links and tag them.
    #[arg(long)]
    pub process: bool,

    /// Where to put the archived files.
    #[arg(short, long, env = "ARCHIVE_DIR")]
    pub directory: Option<String>,

    /// Which username to archive. Overrides the user list.
    #[arg(short, long)]
    pub username: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn options(&self) -> RunOptions {
        RunOptions {
            fresh_start: self.fresh_start,
            reprocess: self.reprocess,
            save: !self.no_save,
            process: self.process,
        }
    }

    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.directory {
            config.archive_dir = expand_home(dir);
        }
    }

    /// Users to archive: the `--username` override or the user list file.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the user list cannot be
    /// loaded.
    pub fn users(&self, config: &Config) -> Result<Vec<UserEntry>, ConfigError> {
        match &self.username {
            Some(name) => Ok(vec![UserEntry::with_default_categories(name.clone())]),
            None => config.load_users(),
        }
    }
}
