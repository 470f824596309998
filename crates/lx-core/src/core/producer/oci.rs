use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::Path;

use tar::Builder;

use super::blobs::digest_hex;
use super::layers::PreparedImage;
use super::sink::{append_bytes, append_dir, append_file, write_single_file};
use super::types::{
    Descriptor, ImageIndex, MediaFamily, CONTAINERD_IMAGE_NAME, OCI_INDEX, OCI_INDEX_FILE,
    OCI_LAYOUT_CONTENT, OCI_LAYOUT_FILE, OCI_MANIFEST, OCI_REF_NAME,
};
use super::ProducerError;

/// Writes `image` as a tarred OCI image layout.
pub(crate) fn write_oci_archive(
    destination: &Path,
    image: &PreparedImage,
) -> Result<u64, ProducerError> {
    let (manifest_bytes, manifest_digest) = image.manifest(MediaFamily::Oci)?;
    let index_bytes = index_json(image, &manifest_digest, manifest_bytes.len() as u64)?;

    let config_name = blob_name(&image.config_digest)?;
    let manifest_name = blob_name(&manifest_digest)?;
    let mut layer_names = Vec::with_capacity(image.layers.len());
    for layer in &image.layers {
        layer_names.push((blob_name(&layer.digest)?, layer.path.as_path()));
    }

    write_single_file(destination, |out| {
        let mut builder = Builder::new(out);
        append_bytes(&mut builder, OCI_LAYOUT_FILE, OCI_LAYOUT_CONTENT)?;
        append_bytes(&mut builder, OCI_INDEX_FILE, &index_bytes)?;
        append_dir(&mut builder, "blobs/")?;
        append_dir(&mut builder, "blobs/sha256/")?;
        append_bytes(&mut builder, &config_name, &image.config_bytes)?;
        append_bytes(&mut builder, &manifest_name, &manifest_bytes)?;
        let mut seen = BTreeSet::new();
        for (name, path) in &layer_names {
            if seen.insert(name.as_str()) {
                append_file(&mut builder, name, path)?;
            }
        }
        finish(builder)
    })
}

fn index_json(
    image: &PreparedImage,
    manifest_digest: &str,
    manifest_size: u64,
) -> Result<Vec<u8>, ProducerError> {
    let mut descriptor = Descriptor::new(OCI_MANIFEST, manifest_digest, manifest_size);
    descriptor.annotations = Some(BTreeMap::from([
        (OCI_REF_NAME.to_string(), image.reference.tag().to_string()),
        (CONTAINERD_IMAGE_NAME.to_string(), image.reference.to_string()),
    ]));
    let index = ImageIndex {
        schema_version: 2,
        media_type: Some(OCI_INDEX.to_string()),
        manifests: vec![descriptor],
    };
    serde_json::to_vec(&index)
        .map_err(|err| ProducerError::Failed(format!("failed to encode image index: {err}")))
}

fn blob_name(digest: &str) -> Result<String, ProducerError> {
    Ok(format!("blobs/sha256/{}", digest_hex(digest)?))
}

pub(super) fn finish<W: Write>(builder: Builder<W>) -> io::Result<()> {
    builder.into_inner()?.flush()
}
