#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// A throwaway image store plus a scratch directory for outputs.
pub struct Fixture {
    pub temp: TempDir,
    pub store: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("lx-cli-")
            .tempdir()
            .expect("tempdir");
        let store = temp.path().join("store");
        fs::create_dir_all(&store).expect("store dir");
        Self { temp, store }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    pub fn lx(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("lx");
        cmd.current_dir(self.temp.path())
            .env("LX_STORE", &self.store)
            .env("LX_TMPDIR", self.temp.path())
            .env_remove("LX_MULTI_IMAGE_ARCHIVE")
            .env_remove("LX_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    /// Seeds `repository/tag` with one gzip layer holding `file`.
    pub fn seed(&self, repository: &str, tag: &str, file: &str, contents: &[u8]) -> Seeded {
        let layout = repository
            .split('/')
            .fold(self.store.clone(), |path, part| path.join(part))
            .join(tag);
        let blobs = layout.join("blobs").join("sha256");
        fs::create_dir_all(&blobs).expect("blob dir");
        fs::write(
            layout.join("oci-layout"),
            br#"{"imageLayoutVersion":"1.0.0"}"#,
        )
        .expect("oci-layout");

        let tar = layer_tar(file, contents);
        let diff_id = digest(&tar);
        let gz = gzip(&tar);
        let layer_digest = write_blob(&blobs, &gz);

        let config = serde_json::to_vec(&json!({
            "architecture": "amd64",
            "os": "linux",
            "rootfs": { "type": "layers", "diff_ids": [diff_id] },
        }))
        .expect("config");
        let config_digest = write_blob(&blobs, &config);

        let manifest = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": config_digest,
                "size": config.len(),
            },
            "layers": [{
                "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                "digest": layer_digest,
                "size": gz.len(),
            }],
        }))
        .expect("manifest");
        let manifest_digest = write_blob(&blobs, &manifest);

        let index = json!({
            "schemaVersion": 2,
            "manifests": [{
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": manifest_digest,
                "size": manifest.len(),
                "annotations": { "org.opencontainers.image.ref.name": tag },
            }],
        });
        fs::write(
            layout.join("index.json"),
            serde_json::to_vec(&index).expect("index"),
        )
        .expect("index.json");

        Seeded { tar, diff_id }
    }
}

pub struct Seeded {
    pub tar: Vec<u8>,
    pub diff_id: String,
}

pub fn digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn write_blob(blobs: &Path, bytes: &[u8]) -> String {
    let digest = digest(bytes);
    fs::write(blobs.join(&digest[7..]), bytes).expect("blob");
    digest
}

fn layer_tar(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder
        .append_data(&mut header, name, contents)
        .expect("layer entry");
    builder.into_inner().expect("layer tar")
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(bytes).expect("gzip");
    encoder.finish().expect("gzip finish")
}

/// Every regular entry of a tar stream keyed by path.
pub fn tar_entries(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(bytes);
    let mut entries = BTreeMap::new();
    for entry in archive.entries().expect("tar entries") {
        let mut entry = entry.expect("tar entry");
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().expect("entry path").display().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).expect("entry contents");
        entries.insert(name, contents);
    }
    entries
}

pub fn json_entry(entries: &BTreeMap<String, Vec<u8>>, name: &str) -> Value {
    serde_json::from_slice(&entries[name]).expect("json entry")
}
