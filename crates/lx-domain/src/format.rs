use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Archive layouts an image can be exported to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ArchiveFormat {
    /// Tarball holding an OCI image layout.
    OciArchive,
    /// `dir` transport directory with an OCI manifest.
    OciDir,
    /// `docker save` compatible tarball.
    #[default]
    DockerArchive,
    /// `dir` transport directory with a Docker v2s2 manifest.
    DockerDir,
}

impl ArchiveFormat {
    /// Directory layouts are written as a tree and support per-layer compression.
    pub fn is_directory_layout(self) -> bool {
        matches!(self, ArchiveFormat::OciDir | ArchiveFormat::DockerDir)
    }

    pub fn supports_multi_image(self) -> bool {
        matches!(self, ArchiveFormat::DockerArchive)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names_are_kebab_case() {
        assert_eq!(ArchiveFormat::OciArchive.to_string(), "oci-archive");
        assert_eq!(ArchiveFormat::DockerDir.as_ref(), "docker-dir");
        assert_eq!(
            ArchiveFormat::from_str("docker-archive").unwrap(),
            ArchiveFormat::DockerArchive
        );
        assert!(ArchiveFormat::from_str("tarball").is_err());
    }

    #[test]
    fn only_dir_formats_are_directory_layouts() {
        let dirs: Vec<_> = ArchiveFormat::iter()
            .filter(|format| format.is_directory_layout())
            .collect();
        assert_eq!(dirs, vec![ArchiveFormat::OciDir, ArchiveFormat::DockerDir]);
    }

    #[test]
    fn default_is_docker_archive() {
        assert_eq!(ArchiveFormat::default(), ArchiveFormat::DockerArchive);
        assert!(ArchiveFormat::default().supports_multi_image());
    }

    #[test]
    fn serializes_as_kebab_case() {
        let value = serde_json::to_value(ArchiveFormat::OciDir).unwrap();
        assert_eq!(value, "oci-dir");
        let parsed: ArchiveFormat = serde_json::from_str("\"docker-dir\"").unwrap();
        assert_eq!(parsed, ArchiveFormat::DockerDir);
    }
}
