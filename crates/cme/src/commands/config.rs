//! `cme config` command implementation.

use std::path::PathBuf;

use clap::Args;
use cme_config::Config;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the config command.
#[derive(Args)]
pub(crate) struct ConfigArgs {
    /// Print the effective configuration as TOML (credentials masked).
    #[arg(long)]
    show: bool,

    /// Path to configuration file (default: auto-discover cme.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Execute the config command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or rendered.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;

        if self.show {
            output.document(&config.to_display_toml()?)?;
            return Ok(());
        }

        match &config.config_path {
            Some(path) => output.info(&format!("Using {}", path.display())),
            None => output.info("No cme.toml found, using defaults"),
        }
        output.hint("Run `cme config --show` to print the effective configuration.");
        Ok(())
    }
}
