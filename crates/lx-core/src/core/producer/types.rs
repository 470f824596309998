use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub(crate) const OCI_LAYOUT_FILE: &str = "oci-layout";
pub(crate) const OCI_LAYOUT_CONTENT: &[u8] = b"{\"imageLayoutVersion\":\"1.0.0\"}";
pub(crate) const OCI_INDEX_FILE: &str = "index.json";
pub(crate) const OCI_REF_NAME: &str = "org.opencontainers.image.ref.name";
pub(crate) const CONTAINERD_IMAGE_NAME: &str = "io.containerd.image.name";

pub(crate) const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub(crate) const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub(crate) const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub(crate) const OCI_LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
pub(crate) const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

pub(crate) const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub(crate) const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub(crate) const DOCKER_LAYER_TAR: &str = "application/vnd.docker.image.rootfs.diff.tar";
pub(crate) const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Descriptor {
    pub(crate) media_type: String,
    pub(crate) digest: String,
    pub(crate) size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) annotations: Option<BTreeMap<String, String>>,
}

impl Descriptor {
    pub(crate) fn new(media_type: &str, digest: &str, size: u64) -> Self {
        Self {
            media_type: media_type.to_string(),
            digest: digest.to_string(),
            size,
            annotations: None,
        }
    }

    pub(crate) fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|map| map.get(key))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageIndex {
    pub(crate) schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) media_type: Option<String>,
    pub(crate) manifests: Vec<Descriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageManifest {
    pub(crate) schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) media_type: Option<String>,
    pub(crate) config: Descriptor,
    pub(crate) layers: Vec<Descriptor>,
}

/// One entry of a `docker save` style `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DockerArchiveEntry {
    pub(crate) config: String,
    pub(crate) repo_tags: Vec<String>,
    pub(crate) layers: Vec<String>,
}

/// Media type family a manifest is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaFamily {
    Oci,
    Docker,
}

impl MediaFamily {
    pub(crate) fn manifest(self) -> &'static str {
        match self {
            MediaFamily::Oci => OCI_MANIFEST,
            MediaFamily::Docker => DOCKER_MANIFEST,
        }
    }

    pub(crate) fn config(self) -> &'static str {
        match self {
            MediaFamily::Oci => OCI_CONFIG,
            MediaFamily::Docker => DOCKER_CONFIG,
        }
    }

    pub(crate) fn layer(self, compression: Compression) -> &'static str {
        match (self, compression) {
            (MediaFamily::Oci, Compression::None) => OCI_LAYER_TAR,
            (MediaFamily::Oci, Compression::Gzip) => OCI_LAYER_GZIP,
            (MediaFamily::Docker, Compression::None) => DOCKER_LAYER_TAR,
            (MediaFamily::Docker, Compression::Gzip) => DOCKER_LAYER_GZIP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compression {
    None,
    Gzip,
}

impl Compression {
    /// Classifies a layer media type; `None` for encodings this tool cannot
    /// transcode.
    pub(crate) fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            OCI_LAYER_TAR | DOCKER_LAYER_TAR => Some(Compression::None),
            OCI_LAYER_GZIP | DOCKER_LAYER_GZIP => Some(Compression::Gzip),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_uses_camel_case() {
        let descriptor = Descriptor::new(OCI_CONFIG, "sha256:abc", 12);
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["mediaType"], OCI_CONFIG);
        assert!(value.get("annotations").is_none());
    }

    #[test]
    fn docker_entries_use_pascal_case() {
        let entry = DockerArchiveEntry {
            config: "abc.json".into(),
            repo_tags: vec!["alpine:latest".into()],
            layers: vec!["def.tar".into()],
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["Config"], "abc.json");
        assert_eq!(value["RepoTags"][0], "alpine:latest");
        assert_eq!(value["Layers"][0], "def.tar");
    }

    #[test]
    fn classifies_layer_media_types() {
        assert_eq!(
            Compression::from_media_type(DOCKER_LAYER_GZIP),
            Some(Compression::Gzip)
        );
        assert_eq!(
            Compression::from_media_type(OCI_LAYER_TAR),
            Some(Compression::None)
        );
        assert_eq!(
            Compression::from_media_type("application/vnd.oci.image.layer.v1.tar+zstd"),
            None
        );
        assert_eq!(
            MediaFamily::Docker.layer(Compression::Gzip),
            DOCKER_LAYER_GZIP
        );
    }
}
