use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tar::Builder;

use lx_domain::ImageReference;

use super::blobs::digest_hex;
use super::layers::PreparedImage;
use super::oci::finish;
use super::sink::{append_bytes, append_file, write_single_file};
use super::types::DockerArchiveEntry;
use super::{ExportPlan, ProducerError};

const MANIFEST_FILE: &str = "manifest.json";
const REPOSITORIES_FILE: &str = "repositories";

struct ArchiveContents {
    configs: Vec<(String, Vec<u8>)>,
    layers: Vec<(String, PathBuf)>,
    manifest: Vec<u8>,
    repositories: Vec<u8>,
}

/// Writes a `docker save` style archive holding every image in `images`.
pub(crate) fn write_docker_archive(
    destination: &Path,
    images: &[PreparedImage],
    plan: &ExportPlan,
) -> Result<u64, ProducerError> {
    let contents = collect(images, plan)?;
    write_single_file(destination, |out| {
        let mut builder = Builder::new(out);
        for (name, bytes) in &contents.configs {
            append_bytes(&mut builder, name, bytes)?;
        }
        for (name, path) in &contents.layers {
            append_file(&mut builder, name, path)?;
        }
        append_bytes(&mut builder, MANIFEST_FILE, &contents.manifest)?;
        append_bytes(&mut builder, REPOSITORIES_FILE, &contents.repositories)?;
        finish(builder)
    })
}

fn collect(images: &[PreparedImage], plan: &ExportPlan) -> Result<ArchiveContents, ProducerError> {
    let mut seen = BTreeSet::new();
    let mut configs = Vec::new();
    let mut layers = Vec::new();
    let mut entries = Vec::with_capacity(images.len());
    let mut repositories: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for (index, image) in images.iter().enumerate() {
        let config_name = format!("{}.json", digest_hex(&image.config_digest)?);
        if seen.insert(config_name.clone()) {
            configs.push((config_name.clone(), image.config_bytes.clone()));
        }
        let mut layer_names = Vec::with_capacity(image.layers.len());
        for layer in &image.layers {
            let name = format!("{}.tar", digest_hex(&layer.digest)?);
            if seen.insert(name.clone()) {
                layers.push((name.clone(), layer.path.clone()));
            }
            layer_names.push(name);
        }

        let repo_tags = plan.repo_tags(index);
        if let Some(top) = image.layers.last() {
            let top = digest_hex(&top.digest)?.to_string();
            let extra: &[ImageReference] = if index == 0 { &plan.tags } else { &[] };
            for tagged in std::iter::once(&image.reference).chain(extra) {
                repositories
                    .entry(tagged.repository().to_string())
                    .or_default()
                    .insert(tagged.tag().to_string(), top.clone());
            }
        }
        entries.push(DockerArchiveEntry {
            config: config_name,
            repo_tags,
            layers: layer_names,
        });
    }

    let encode = |what: &str, err: serde_json::Error| {
        ProducerError::Failed(format!("failed to encode {what}: {err}"))
    };
    Ok(ArchiveContents {
        configs,
        layers,
        manifest: serde_json::to_vec(&entries).map_err(|err| encode(MANIFEST_FILE, err))?,
        repositories: serde_json::to_vec(&repositories)
            .map_err(|err| encode(REPOSITORIES_FILE, err))?,
    })
}
