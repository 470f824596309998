use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use super::blobs::digest_hex;
use super::layers::PreparedImage;
use super::sink::link_or_copy;
use super::types::MediaFamily;
use super::ProducerError;

const VERSION_FILE: &str = "version";
const VERSION_CONTENT: &[u8] = b"Directory Transport Version: 1.1\n";
const MANIFEST_FILE: &str = "manifest.json";

/// Whether a layout may be written at `path`: nothing there yet, a plain
/// file, an empty directory, or a directory an earlier export wrote.
pub(crate) fn may_write_layout(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(err),
    };
    if !meta.is_dir() || fs::read_dir(path)?.next().is_none() {
        return Ok(true);
    }
    match fs::read(path.join(VERSION_FILE)) {
        Ok(content) => Ok(content == VERSION_CONTENT),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Writes `image` as a directory of blobs named by digest plus a manifest.
///
/// A fresh layout is staged next to `destination` and renamed into place. An
/// existing layout directory is staged inside itself and refilled, so the
/// directory is never removed.
pub(crate) fn write_dir_layout(
    destination: &Path,
    image: &PreparedImage,
    family: MediaFamily,
) -> Result<u64, ProducerError> {
    let writable =
        may_write_layout(destination).map_err(|err| ProducerError::io("inspect", destination, err))?;
    if !writable {
        return Err(ProducerError::OutputInUse {
            path: destination.to_path_buf(),
        });
    }
    let in_place = fs::symlink_metadata(destination).is_ok_and(|meta| meta.is_dir());
    let parent = if in_place {
        destination
    } else {
        destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    };
    let staged = tempfile::Builder::new()
        .prefix(".lx-")
        .tempdir_in(parent)
        .map_err(|err| ProducerError::io("create staging directory in", parent, err))?;
    let root = staged.path();

    let (manifest_bytes, _) = image.manifest(family)?;
    let mut written = 0u64;
    let mut write = |name: &str, bytes: &[u8]| -> Result<(), ProducerError> {
        let path = root.join(name);
        fs::write(&path, bytes).map_err(|err| ProducerError::io("write", &path, err))?;
        written += bytes.len() as u64;
        Ok(())
    };
    write(VERSION_FILE, VERSION_CONTENT)?;
    write(digest_hex(&image.config_digest)?, &image.config_bytes)?;
    write(MANIFEST_FILE, &manifest_bytes)?;

    for layer in &image.layers {
        let target = root.join(digest_hex(&layer.digest)?);
        if target.exists() {
            continue;
        }
        let placed = if layer.staged {
            link_or_copy(&layer.path, &target)
        } else {
            fs::copy(&layer.path, &target).map(|_| ())
        };
        placed.map_err(|err| ProducerError::io("copy layer to", &target, err))?;
        written += layer.size;
    }

    if in_place {
        refill_destination(root, destination)?;
    } else {
        fs::set_permissions(root, Permissions::from_mode(0o755))
            .map_err(|err| ProducerError::io("set permissions on", root, err))?;
        replace_destination(root, destination)?;
    }
    Ok(written)
}

/// Empties `destination` apart from the staging directory inside it, then
/// moves the staged entries up.
fn refill_destination(staged: &Path, destination: &Path) -> Result<(), ProducerError> {
    let entries =
        fs::read_dir(destination).map_err(|err| ProducerError::io("read", destination, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| ProducerError::io("read", destination, err))?;
        let path = entry.path();
        if path.file_name() == staged.file_name() {
            continue;
        }
        let removed = match entry.file_type() {
            Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(err) => Err(err),
        };
        removed.map_err(|err| ProducerError::io("remove", &path, err))?;
    }
    let staged_entries =
        fs::read_dir(staged).map_err(|err| ProducerError::io("read", staged, err))?;
    for entry in staged_entries {
        let entry = entry.map_err(|err| ProducerError::io("read", staged, err))?;
        let target = destination.join(entry.file_name());
        fs::rename(entry.path(), &target)
            .map_err(|err| ProducerError::io("move layout entry to", &target, err))?;
    }
    Ok(())
}

fn replace_destination(staged: &Path, destination: &Path) -> Result<(), ProducerError> {
    match fs::remove_file(destination) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            return Err(ProducerError::io("replace", destination, err));
        }
        _ => {}
    }
    fs::rename(staged, destination)
        .map_err(|err| ProducerError::io("move layout into", destination, err))
}
