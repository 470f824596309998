//! Archive producers: the trait the export driver writes through, and the
//! layout-store backed implementation.

mod blobs;
mod dir;
mod docker;
mod layers;
mod oci;
mod sink;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use lx_domain::{ArchiveFormat, ExportRequest, ExportTargets, ImageReference};

pub use store::ImageStore;

pub(crate) use dir::may_write_layout;

use crate::config::Config;
use layers::PreparedImage;
use types::MediaFamily;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("image {reference} not found in {}", store.display())]
    ImageNotFound { reference: String, store: PathBuf },
    #[error("invalid image layout at {}: {reason}", path.display())]
    InvalidLayout { path: PathBuf, reason: String },
    #[error("unsupported digest {digest:?} (only sha256 is supported)")]
    UnsupportedDigest { digest: String },
    #[error("blob content does not match {expected} (computed {computed})")]
    DigestMismatch { expected: String, computed: String },
    #[error("unsupported layer media type {media_type}")]
    UnsupportedLayer { media_type: String },
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("refusing to overwrite {}: not a directory layout written by lx", path.display())]
    OutputInUse { path: PathBuf },
    #[error("{0}")]
    Failed(String),
}

impl ProducerError {
    pub(crate) fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        ProducerError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        ProducerError::InvalidLayout {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn reason(&self) -> &'static str {
        match self {
            ProducerError::ImageNotFound { .. } => "image_not_found",
            ProducerError::InvalidLayout { .. } => "invalid_layout",
            ProducerError::UnsupportedDigest { .. } => "unsupported_digest",
            ProducerError::DigestMismatch { .. } => "digest_mismatch",
            ProducerError::UnsupportedLayer { .. } => "unsupported_layer",
            ProducerError::Io { .. } => "io",
            ProducerError::OutputInUse { .. } => "output_in_use",
            ProducerError::Failed(_) => "producer_failed",
        }
    }
}

/// What to write, independent of where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub format: ArchiveFormat,
    pub compress: bool,
    pub accept_uncompressed_layers: bool,
    pub images: Vec<ImageReference>,
    pub tags: Vec<ImageReference>,
}

impl ExportPlan {
    pub fn new(request: &ExportRequest, targets: ExportTargets) -> Self {
        Self {
            format: request.format,
            compress: request.compress,
            accept_uncompressed_layers: request.accept_uncompressed_layers,
            images: targets.images,
            tags: targets.tags,
        }
    }

    /// Names recorded for the image at `index`; extra tags attach to the
    /// first image.
    pub fn repo_tags(&self, index: usize) -> Vec<String> {
        let mut tags = Vec::new();
        if let Some(image) = self.images.get(index) {
            tags.push(image.to_string());
        }
        if index == 0 {
            tags.extend(self.tags.iter().map(ToString::to_string));
        }
        tags
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProduceReport {
    pub images: Vec<ExportedImage>,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedImage {
    pub reference: String,
    pub config_digest: String,
    pub layers: usize,
    pub repo_tags: Vec<String>,
}

/// Writes a complete archive for `plan` at `destination`.
///
/// Implementations must close every handle on `destination` before
/// returning, on success and on failure.
pub trait ArchiveProducer {
    fn produce(&self, destination: &Path, plan: &ExportPlan) -> Result<ProduceReport, ProducerError>;
}

/// Producer reading images from a local store of OCI image layouts.
#[derive(Debug, Clone)]
pub struct LayoutProducer {
    store: ImageStore,
    scratch: Option<PathBuf>,
}

impl LayoutProducer {
    pub fn new(store: ImageStore) -> Self {
        Self {
            store,
            scratch: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            store: ImageStore::new(config.store().root.clone()),
            scratch: config.scratch().dir.clone(),
        }
    }

    #[must_use]
    pub fn with_scratch(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = Some(dir.into());
        self
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir, ProducerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lx-stage-");
        match &self.scratch {
            Some(dir) => builder
                .tempdir_in(dir)
                .map_err(|err| ProducerError::io("create staging directory in", dir, err)),
            None => builder.tempdir().map_err(|err| {
                ProducerError::io("create staging directory in", &std::env::temp_dir(), err)
            }),
        }
    }
}

impl ArchiveProducer for LayoutProducer {
    fn produce(&self, destination: &Path, plan: &ExportPlan) -> Result<ProduceReport, ProducerError> {
        let staging = self.staging_dir()?;
        let mut prepared: Vec<PreparedImage> = Vec::with_capacity(plan.images.len());
        for reference in &plan.images {
            let image = self.store.load(reference)?;
            prepared.push(layers::prepare_image(&image, plan, staging.path())?);
        }
        let Some(first) = prepared.first() else {
            return Err(ProducerError::Failed("no images to export".into()));
        };
        if plan.format != ArchiveFormat::DockerArchive && !plan.tags.is_empty() {
            tracing::debug!(format = %plan.format, tags = plan.tags.len(), "extra tags ignored");
        }

        let bytes_written = match plan.format {
            ArchiveFormat::OciArchive => oci::write_oci_archive(destination, first)?,
            ArchiveFormat::OciDir => dir::write_dir_layout(destination, first, MediaFamily::Oci)?,
            ArchiveFormat::DockerDir => {
                dir::write_dir_layout(destination, first, MediaFamily::Docker)?
            }
            ArchiveFormat::DockerArchive => {
                docker::write_docker_archive(destination, &prepared, plan)?
            }
        };

        let images = prepared
            .iter()
            .enumerate()
            .map(|(index, image)| ExportedImage {
                reference: image.reference.to_string(),
                config_digest: image.config_digest.clone(),
                layers: image.layers.len(),
                repo_tags: if plan.format == ArchiveFormat::DockerArchive {
                    plan.repo_tags(index)
                } else {
                    Vec::new()
                },
            })
            .collect();
        tracing::debug!(
            format = %plan.format,
            destination = %destination.display(),
            bytes_written,
            "archive written"
        );
        Ok(ProduceReport {
            images,
            bytes_written,
        })
    }
}
