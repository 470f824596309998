use anyhow::Result;

use crate::config::{Config, GlobalOptions};
use crate::core::runtime::CommandGroup;

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

/// Everything one command invocation needs; owned by that invocation only.
pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be prepared.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self { global, config })
    }

    #[must_use]
    pub fn with_config(global: &'a GlobalOptions, config: Config) -> Self {
        Self { global, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
