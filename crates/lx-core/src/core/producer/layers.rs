use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use lx_domain::{ArchiveFormat, ImageReference};

use super::blobs::{digest_hex, sha256_digest, verify_file, HashingWriter};
use super::store::{ImageStore, StoredImage};
use super::types::{Compression, Descriptor, ImageManifest, MediaFamily};
use super::{ExportPlan, ProducerError};

/// A layer ready to be written, either the store's own blob or a transcoded
/// copy in the staging directory.
#[derive(Debug, Clone)]
pub(crate) struct PreparedBlob {
    pub(crate) digest: String,
    pub(crate) size: u64,
    pub(crate) path: PathBuf,
    pub(crate) compression: Compression,
    pub(crate) staged: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct PreparedImage {
    pub(crate) reference: ImageReference,
    pub(crate) config_digest: String,
    pub(crate) config_bytes: Vec<u8>,
    pub(crate) layers: Vec<PreparedBlob>,
}

impl PreparedImage {
    /// Serialized manifest for `family` and its digest.
    pub(crate) fn manifest(&self, family: MediaFamily) -> Result<(Vec<u8>, String), ProducerError> {
        let manifest = ImageManifest {
            schema_version: 2,
            media_type: Some(family.manifest().to_string()),
            config: Descriptor::new(
                family.config(),
                &self.config_digest,
                self.config_bytes.len() as u64,
            ),
            layers: self
                .layers
                .iter()
                .map(|layer| {
                    Descriptor::new(family.layer(layer.compression), &layer.digest, layer.size)
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&manifest)
            .map_err(|err| ProducerError::Failed(format!("failed to encode manifest: {err}")))?;
        let digest = sha256_digest(&bytes);
        Ok((bytes, digest))
    }
}

/// Layer encoding written for `format`.
///
/// Docker archives always carry plain tars. Directory layouts gzip on
/// request and otherwise keep the stored encoding. OCI layouts also gzip
/// plain layers unless uncompressed layers were explicitly accepted.
pub(crate) fn target_compression(
    format: ArchiveFormat,
    compress: bool,
    accept_uncompressed_layers: bool,
    source: Compression,
) -> Compression {
    match format {
        ArchiveFormat::DockerArchive => Compression::None,
        ArchiveFormat::DockerDir if compress => Compression::Gzip,
        ArchiveFormat::DockerDir => source,
        ArchiveFormat::OciArchive | ArchiveFormat::OciDir => {
            if compress || (source == Compression::None && !accept_uncompressed_layers) {
                Compression::Gzip
            } else {
                source
            }
        }
    }
}

pub(crate) fn prepare_image(
    image: &StoredImage,
    plan: &ExportPlan,
    staging: &Path,
) -> Result<PreparedImage, ProducerError> {
    let mut layers = Vec::with_capacity(image.manifest.layers.len());
    for (layer, diff_id) in image.manifest.layers.iter().zip(&image.diff_ids) {
        let source = Compression::from_media_type(&layer.media_type).ok_or_else(|| {
            ProducerError::UnsupportedLayer {
                media_type: layer.media_type.clone(),
            }
        })?;
        let target = target_compression(
            plan.format,
            plan.compress,
            plan.accept_uncompressed_layers,
            source,
        );
        let source_path = ImageStore::blob_path(&image.layout, &layer.digest)?;
        let prepared = match (source, target) {
            (Compression::None, Compression::Gzip) => {
                verify_file(&source_path, &layer.digest)?;
                compress_layer(&source_path, staging)?
            }
            (Compression::Gzip, Compression::None) => {
                verify_file(&source_path, &layer.digest)?;
                decompress_layer(&source_path, diff_id, staging)?
            }
            _ => {
                let size = verify_file(&source_path, &layer.digest)?;
                PreparedBlob {
                    digest: layer.digest.clone(),
                    size,
                    path: source_path,
                    compression: source,
                    staged: false,
                }
            }
        };
        tracing::trace!(
            image = %image.reference,
            source = %layer.digest,
            target = %prepared.digest,
            "prepared layer"
        );
        layers.push(prepared);
    }
    Ok(PreparedImage {
        reference: image.reference.clone(),
        config_digest: image.manifest.config.digest.clone(),
        config_bytes: image.config_bytes.clone(),
        layers,
    })
}

fn compress_layer(source: &Path, staging: &Path) -> Result<PreparedBlob, ProducerError> {
    let name = format!("{}.tar.gz", file_label(source));
    let staged = staging.join(name);
    let input = File::open(source).map_err(|err| ProducerError::io("open layer", source, err))?;
    let output =
        File::create(&staged).map_err(|err| ProducerError::io("create layer", &staged, err))?;
    let mut encoder = GzEncoder::new(
        HashingWriter::new(BufWriter::new(output)),
        flate2::Compression::default(),
    );
    io::copy(&mut BufReader::new(input), &mut encoder)
        .map_err(|err| ProducerError::io("compress layer", source, err))?;
    let hashing = encoder
        .finish()
        .map_err(|err| ProducerError::io("compress layer", source, err))?;
    let (_, digest, size) = hashing
        .finish()
        .map_err(|err| ProducerError::io("write layer", &staged, err))?;
    Ok(PreparedBlob {
        digest,
        size,
        path: staged,
        compression: Compression::Gzip,
        staged: true,
    })
}

fn decompress_layer(
    source: &Path,
    diff_id: &str,
    staging: &Path,
) -> Result<PreparedBlob, ProducerError> {
    let staged = staging.join(format!("{}.tar", digest_hex(diff_id)?));
    let input = File::open(source).map_err(|err| ProducerError::io("open layer", source, err))?;
    let output =
        File::create(&staged).map_err(|err| ProducerError::io("create layer", &staged, err))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut writer = HashingWriter::new(BufWriter::new(output));
    io::copy(&mut decoder, &mut writer)
        .map_err(|err| ProducerError::io("decompress layer", source, err))?;
    let (_, digest, size) = writer
        .finish()
        .map_err(|err| ProducerError::io("write layer", &staged, err))?;
    if digest != diff_id {
        return Err(ProducerError::DigestMismatch {
            expected: diff_id.to_string(),
            computed: digest,
        });
    }
    Ok(PreparedBlob {
        digest,
        size,
        path: staged,
        compression: Compression::None,
        staged: true,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "layer".to_string(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_archive_always_writes_plain_layers() {
        for source in [Compression::None, Compression::Gzip] {
            assert_eq!(
                target_compression(ArchiveFormat::DockerArchive, false, false, source),
                Compression::None
            );
        }
    }

    #[test]
    fn docker_dir_keeps_encoding_unless_compressing() {
        assert_eq!(
            target_compression(ArchiveFormat::DockerDir, false, false, Compression::None),
            Compression::None
        );
        assert_eq!(
            target_compression(ArchiveFormat::DockerDir, true, false, Compression::None),
            Compression::Gzip
        );
    }

    #[test]
    fn oci_formats_compress_plain_layers_by_default() {
        assert_eq!(
            target_compression(ArchiveFormat::OciArchive, false, false, Compression::None),
            Compression::Gzip
        );
        assert_eq!(
            target_compression(ArchiveFormat::OciDir, false, true, Compression::None),
            Compression::None
        );
        assert_eq!(
            target_compression(ArchiveFormat::OciDir, false, true, Compression::Gzip),
            Compression::Gzip
        );
    }
}
