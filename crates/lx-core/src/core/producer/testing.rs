//! Store fixtures shared by the producer and export tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use serde_json::json;

use lx_domain::ImageReference;

use super::blobs::sha256_digest;
use super::types::{
    Descriptor, ImageIndex, ImageManifest, OCI_CONFIG, OCI_INDEX, OCI_INDEX_FILE,
    OCI_LAYER_GZIP, OCI_LAYER_TAR, OCI_LAYOUT_CONTENT, OCI_LAYOUT_FILE, OCI_MANIFEST,
    OCI_REF_NAME,
};
use super::ImageStore;

pub(crate) struct SeededImage {
    pub(crate) config_digest: String,
    pub(crate) diff_ids: Vec<String>,
    pub(crate) layer_digests: Vec<String>,
}

/// Tar with a single file at `name`.
pub(crate) fn layer_tar(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, name, contents).unwrap();
    builder.into_inner().unwrap()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn write_blob(layout: &Path, bytes: &[u8]) -> String {
    let digest = sha256_digest(bytes);
    let path = layout.join("blobs/sha256").join(&digest[7..]);
    fs::write(path, bytes).unwrap();
    digest
}

/// Writes an OCI layout for `reference` under `store`, one layer per entry of
/// `layers` given as `(tar bytes, gzip)`.
pub(crate) fn seed_image(
    store: &Path,
    reference: &str,
    layers: &[(Vec<u8>, bool)],
) -> SeededImage {
    let reference = ImageReference::parse(reference).unwrap();
    let layout = ImageStore::new(store).layout_path(&reference);
    fs::create_dir_all(layout.join("blobs/sha256")).unwrap();
    fs::write(layout.join(OCI_LAYOUT_FILE), OCI_LAYOUT_CONTENT).unwrap();

    let mut diff_ids = Vec::new();
    let mut layer_digests = Vec::new();
    let mut descriptors = Vec::new();
    for (tar_bytes, compressed) in layers {
        diff_ids.push(sha256_digest(tar_bytes));
        let blob = if *compressed { gzip(tar_bytes) } else { tar_bytes.clone() };
        let digest = write_blob(&layout, &blob);
        let media_type = if *compressed { OCI_LAYER_GZIP } else { OCI_LAYER_TAR };
        descriptors.push(Descriptor::new(media_type, &digest, blob.len() as u64));
        layer_digests.push(digest);
    }

    let config = serde_json::to_vec(&json!({
        "architecture": "amd64",
        "os": "linux",
        "rootfs": { "type": "layers", "diff_ids": diff_ids },
    }))
    .unwrap();
    let config_digest = write_blob(&layout, &config);

    let manifest = ImageManifest {
        schema_version: 2,
        media_type: Some(OCI_MANIFEST.to_string()),
        config: Descriptor::new(OCI_CONFIG, &config_digest, config.len() as u64),
        layers: descriptors,
    };
    let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
    let manifest_digest = write_blob(&layout, &manifest_bytes);

    let mut descriptor = Descriptor::new(
        OCI_MANIFEST,
        &manifest_digest,
        manifest_bytes.len() as u64,
    );
    descriptor.annotations = Some(BTreeMap::from([(
        OCI_REF_NAME.to_string(),
        reference.tag().to_string(),
    )]));
    let index = ImageIndex {
        schema_version: 2,
        media_type: Some(OCI_INDEX.to_string()),
        manifests: vec![descriptor],
    };
    fs::write(
        layout.join(OCI_INDEX_FILE),
        serde_json::to_vec(&index).unwrap(),
    )
    .unwrap();

    SeededImage {
        config_digest,
        diff_ids,
        layer_digests,
    }
}
