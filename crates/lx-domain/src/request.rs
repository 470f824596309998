use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::format::ArchiveFormat;
use crate::reference::ImageReference;

/// Full configuration for one export, built once from parsed arguments and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportRequest {
    /// Destination path; empty means standard output.
    pub output_path: String,
    pub format: ArchiveFormat,
    pub compress: bool,
    pub accept_uncompressed_layers: bool,
    pub quiet: bool,
    pub multi_image_archive: bool,
    pub image_references: Vec<String>,
}

/// Parsed images and extra tags of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTargets {
    pub images: Vec<ImageReference>,
    pub tags: Vec<ImageReference>,
}

impl ExportRequest {
    pub fn new(image_references: Vec<String>) -> Self {
        Self {
            output_path: String::new(),
            format: ArchiveFormat::default(),
            compress: false,
            accept_uncompressed_layers: false,
            quiet: false,
            multi_image_archive: false,
            image_references,
        }
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.output_path.is_empty()
    }

    /// References exported as images: all of them for a multi-image archive,
    /// otherwise only the first.
    pub fn image_arguments(&self) -> &[String] {
        if self.multi_image_archive {
            &self.image_references
        } else {
            &self.image_references[..self.image_references.len().min(1)]
        }
    }

    /// Extra arguments read as tags, present only when more than one argument
    /// was supplied outside multi-image mode.
    pub fn tag_arguments(&self) -> &[String] {
        if !self.multi_image_archive && self.image_references.len() > 1 {
            &self.image_references[1..]
        } else {
            &[]
        }
    }

    pub fn targets(&self) -> Result<ExportTargets, ConfigurationError> {
        if self.image_references.is_empty() {
            return Err(ConfigurationError::MissingImage);
        }
        let images = self
            .image_arguments()
            .iter()
            .map(|raw| ImageReference::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let tags = self
            .tag_arguments()
            .iter()
            .map(|raw| ImageReference::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExportTargets { images, tags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(refs: &[&str]) -> ExportRequest {
        ExportRequest::new(refs.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn single_argument_has_no_tags() {
        let req = request(&["alpine:latest"]);
        assert_eq!(req.image_arguments(), ["alpine:latest".to_string()]);
        assert!(req.tag_arguments().is_empty());
        assert!(req.writes_to_stdout());
    }

    #[test]
    fn extra_arguments_are_tags() {
        let req = request(&["alpine", "mirror/alpine:v1", "backup:1"]);
        let targets = req.targets().unwrap();
        assert_eq!(targets.images.len(), 1);
        assert_eq!(
            targets
                .tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["mirror/alpine:v1", "backup:1"]
        );
    }

    #[test]
    fn multi_image_reads_extra_arguments_as_images() {
        let mut req = request(&["alpine", "busybox:1.36"]);
        req.multi_image_archive = true;
        let targets = req.targets().unwrap();
        assert_eq!(targets.images.len(), 2);
        assert!(targets.tags.is_empty());
    }

    #[test]
    fn empty_references_are_rejected() {
        let req = request(&[]);
        assert_eq!(req.targets().unwrap_err(), ConfigurationError::MissingImage);
        assert!(req.image_arguments().is_empty());
    }
}
