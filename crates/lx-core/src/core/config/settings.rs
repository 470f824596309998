use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(self.vars.get(key).map(String::as_str), Some("1"))
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) store: StoreConfig,
    pub(crate) scratch: ScratchConfig,
    pub(crate) multi_image_archive: bool,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if no image store location can be determined.
    pub fn from_env() -> anyhow::Result<Self> {
        let snapshot = EnvSnapshot::capture();
        Self::from_snapshot(&snapshot)
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> anyhow::Result<Self> {
        let store = match snapshot.var("LX_STORE") {
            Some(path) => StoreConfig {
                root: PathBuf::from(path),
                source: "LX_STORE",
            },
            None => {
                let data = dirs_next::data_dir().ok_or_else(|| {
                    anyhow!("unable to determine a data directory; set LX_STORE")
                })?;
                StoreConfig {
                    root: data.join("lx").join("images"),
                    source: "default",
                }
            }
        };
        Ok(Self {
            store,
            scratch: ScratchConfig {
                dir: snapshot.var("LX_TMPDIR").map(PathBuf::from),
            },
            multi_image_archive: snapshot.flag_is_enabled("LX_MULTI_IMAGE_ARCHIVE"),
        })
    }

    /// Configuration with explicit locations, bypassing the environment.
    #[must_use]
    pub fn with_store(root: PathBuf) -> Self {
        Self {
            store: StoreConfig {
                root,
                source: "explicit",
            },
            scratch: ScratchConfig::default(),
            multi_image_archive: false,
        }
    }

    #[must_use]
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    #[must_use]
    pub fn scratch(&self) -> &ScratchConfig {
        &self.scratch
    }

    /// Default for `--multi-image-archive` when the flag is not given.
    #[must_use]
    pub fn multi_image_archive(&self) -> bool {
        self.multi_image_archive
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub source: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ScratchConfig {
    pub dir: Option<PathBuf>,
}
