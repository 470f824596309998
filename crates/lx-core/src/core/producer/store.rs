use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

use lx_domain::ImageReference;

use super::blobs::{digest_hex, sha256_digest};
use super::types::{
    Descriptor, ImageIndex, ImageManifest, DOCKER_MANIFEST, OCI_INDEX, OCI_INDEX_FILE,
    OCI_MANIFEST, OCI_REF_NAME,
};
use super::ProducerError;

/// Local image store: one OCI image layout per `<repository>/<tag>`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

/// An image loaded from the store with its manifest and config verified.
#[derive(Debug, Clone)]
pub(crate) struct StoredImage {
    pub(crate) reference: ImageReference,
    pub(crate) layout: PathBuf,
    pub(crate) manifest: ImageManifest,
    pub(crate) config_bytes: Vec<u8>,
    pub(crate) diff_ids: Vec<String>,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the layout for `reference`, whether or not it exists.
    pub fn layout_path(&self, reference: &ImageReference) -> PathBuf {
        self.root.join(reference.store_path())
    }

    pub(crate) fn load(&self, reference: &ImageReference) -> Result<StoredImage, ProducerError> {
        let layout = self.layout_path(reference);
        let index_path = layout.join(OCI_INDEX_FILE);
        if !index_path.is_file() {
            return Err(ProducerError::ImageNotFound {
                reference: reference.to_string(),
                store: self.root.clone(),
            });
        }
        let index: ImageIndex = read_json(&index_path)?;
        let descriptor = select_manifest(&index, reference, &layout)?;
        let manifest_bytes = read_blob(&layout, descriptor)?;
        let manifest: ImageManifest = parse_json(&manifest_bytes, &layout, "manifest")?;
        let config_bytes = read_blob(&layout, &manifest.config)?;
        let config: Value = parse_json(&config_bytes, &layout, "image config")?;
        let diff_ids = diff_ids(&config, &layout)?;
        if diff_ids.len() != manifest.layers.len() {
            return Err(ProducerError::invalid(
                &layout,
                format!(
                    "manifest lists {} layers but config has {} diff ids",
                    manifest.layers.len(),
                    diff_ids.len()
                ),
            ));
        }
        tracing::debug!(
            image = %reference,
            layout = %layout.display(),
            layers = manifest.layers.len(),
            "loaded image from store"
        );
        Ok(StoredImage {
            reference: reference.clone(),
            layout,
            manifest,
            config_bytes,
            diff_ids,
        })
    }

    pub(crate) fn blob_path(layout: &Path, digest: &str) -> Result<PathBuf, ProducerError> {
        Ok(layout.join("blobs").join("sha256").join(digest_hex(digest)?))
    }
}

/// Picks the manifest whose `ref.name` matches the tag, or the only manifest
/// when none is annotated.
fn select_manifest<'a>(
    index: &'a ImageIndex,
    reference: &ImageReference,
    layout: &Path,
) -> Result<&'a Descriptor, ProducerError> {
    let candidates: Vec<&Descriptor> = index
        .manifests
        .iter()
        .filter(|descriptor| {
            descriptor.media_type == OCI_MANIFEST || descriptor.media_type == DOCKER_MANIFEST
        })
        .collect();
    if let Some(tagged) = candidates
        .iter()
        .copied()
        .find(|descriptor| descriptor.annotation(OCI_REF_NAME) == Some(reference.tag()))
    {
        return Ok(tagged);
    }
    match candidates.as_slice() {
        [single] => Ok(*single),
        [] if index
            .manifests
            .iter()
            .any(|descriptor| descriptor.media_type == OCI_INDEX) =>
        {
            Err(ProducerError::invalid(
                layout,
                "nested image indexes are not supported",
            ))
        }
        [] => Err(ProducerError::invalid(layout, "index lists no image manifest")),
        _ => Err(ProducerError::invalid(
            layout,
            format!("index lists several manifests and none is named {}", reference.tag()),
        )),
    }
}

fn read_blob(layout: &Path, descriptor: &Descriptor) -> Result<Vec<u8>, ProducerError> {
    let path = ImageStore::blob_path(layout, &descriptor.digest)?;
    let bytes = fs::read(&path).map_err(|err| ProducerError::io("read blob", &path, err))?;
    if bytes.len() as u64 != descriptor.size {
        return Err(ProducerError::invalid(
            &path,
            format!("expected {} bytes, found {}", descriptor.size, bytes.len()),
        ));
    }
    let computed = sha256_digest(&bytes);
    if computed != descriptor.digest {
        return Err(ProducerError::DigestMismatch {
            expected: descriptor.digest.clone(),
            computed,
        });
    }
    Ok(bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProducerError> {
    let bytes = fs::read(path).map_err(|err| ProducerError::io("read", path, err))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ProducerError::invalid(path, format!("malformed JSON: {err}")))
}

fn parse_json<T: DeserializeOwned>(
    bytes: &[u8],
    layout: &Path,
    what: &str,
) -> Result<T, ProducerError> {
    serde_json::from_slice(bytes)
        .map_err(|err| ProducerError::invalid(layout, format!("malformed {what}: {err}")))
}

fn diff_ids(config: &Value, layout: &Path) -> Result<Vec<String>, ProducerError> {
    let Some(entries) = config.pointer("/rootfs/diff_ids").and_then(Value::as_array) else {
        return Err(ProducerError::invalid(layout, "image config has no rootfs.diff_ids"));
    };
    entries
        .iter()
        .map(|entry| {
            let digest = entry
                .as_str()
                .ok_or_else(|| ProducerError::invalid(layout, "diff id is not a string"))?;
            digest_hex(digest)?;
            Ok(digest.to_string())
        })
        .collect()
}
