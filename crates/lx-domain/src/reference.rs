use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// A `name[:tag]` image reference. Digest references are not supported by the
/// local store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("reference is empty"));
        }
        if trimmed.contains('@') {
            return Err(invalid("digest references are not supported"));
        }

        // A colon before the last slash belongs to a registry port.
        let name_start = trimmed.rfind('/').map_or(0, |idx| idx + 1);
        let (repository, tag) = match trimmed[name_start..].rfind(':') {
            Some(idx) => {
                let split = name_start + idx;
                (&trimmed[..split], &trimmed[split + 1..])
            }
            None => (trimmed, DEFAULT_TAG),
        };

        if repository.is_empty() {
            return Err(invalid("repository is empty"));
        }
        for component in repository.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(invalid("repository contains an empty or relative path component"));
            }
            let valid = component.chars().all(|ch| {
                ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-' | ':')
            });
            if !valid {
                return Err(invalid(
                    "repository may only contain lowercase letters, digits, '.', '_', '-' and '/'",
                ));
            }
        }

        if tag.is_empty() || tag.len() > MAX_TAG_LEN {
            return Err(invalid("tag must be between 1 and 128 characters"));
        }
        if tag.starts_with('.') || tag.starts_with('-') {
            return Err(invalid("tag may not start with '.' or '-'"));
        }
        if !tag
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        {
            return Err(invalid(
                "tag may only contain letters, digits, '.', '_' and '-'",
            ));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Relative location of this image inside a layout store.
    pub fn store_path(&self) -> PathBuf {
        let mut path: PathBuf = self.repository.split('/').collect();
        path.push(&self.tag);
        path
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
