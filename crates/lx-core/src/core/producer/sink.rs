use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tar::{Builder, EntryType, Header};

use super::blobs::CountingWriter;
use super::ProducerError;

const WRITE_BUFFER: usize = 64 * 1024;

/// Whether `path` already exists as something other than a regular file or
/// directory, such as a pipe or a terminal.
pub(crate) fn is_stream(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| {
        let kind = meta.file_type();
        !kind.is_file() && !kind.is_dir()
    })
}

/// Writes a single-file archive at `destination` and returns its size.
///
/// Streams are written in place. Regular paths go through a temporary sibling
/// that only replaces `destination` once `write` succeeded.
pub(crate) fn write_single_file<F>(destination: &Path, write: F) -> Result<u64, ProducerError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let fail = |err| ProducerError::io("write archive to", destination, err);
    if is_stream(destination) {
        let file = OpenOptions::new()
            .write(true)
            .open(destination)
            .map_err(|err| ProducerError::io("open", destination, err))?;
        let mut writer = CountingWriter::new(BufWriter::with_capacity(WRITE_BUFFER, file));
        write(&mut writer).map_err(fail)?;
        writer.flush().map_err(fail)?;
        return Ok(writer.written());
    }

    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix(".lx-")
        .suffix(".partial")
        .tempfile_in(parent)
        .map_err(|err| ProducerError::io("create temporary file in", parent, err))?;
    let mut writer = CountingWriter::new(BufWriter::with_capacity(WRITE_BUFFER, temp));
    write(&mut writer).map_err(fail)?;
    writer.flush().map_err(fail)?;
    let written = writer.written();
    let temp = writer
        .into_inner()
        .into_inner()
        .map_err(|err| fail(err.into_error()))?;
    temp.as_file()
        .set_permissions(Permissions::from_mode(0o644))
        .map_err(fail)?;
    temp.persist(destination)
        .map_err(|err| ProducerError::io("rename archive to", destination, err.error))?;
    Ok(written)
}

fn header(kind: EntryType, size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

pub(crate) fn append_dir<W: Write>(builder: &mut Builder<W>, name: &str) -> io::Result<()> {
    let mut header = header(EntryType::Directory, 0, 0o755);
    builder.append_data(&mut header, name, io::empty())
}

pub(crate) fn append_bytes<W: Write>(
    builder: &mut Builder<W>,
    name: &str,
    data: &[u8],
) -> io::Result<()> {
    let mut header = header(EntryType::Regular, data.len() as u64, 0o644);
    builder.append_data(&mut header, name, data)
}

pub(crate) fn append_file<W: Write>(
    builder: &mut Builder<W>,
    name: &str,
    path: &Path,
) -> io::Result<()> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut header = header(EntryType::Regular, size, 0o644);
    builder.append_data(&mut header, name, file)
}

pub(crate) fn link_or_copy(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(_) => fs::copy(from, to).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_destination_is_replaced_on_success() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.tar");
        fs::write(&target, b"old").unwrap();
        let written = write_single_file(&target, |out| out.write_all(b"new archive")).unwrap();
        assert_eq!(written, 11);
        assert_eq!(fs::read(&target).unwrap(), b"new archive");
    }

    #[test]
    fn failed_write_leaves_destination_alone() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.tar");
        fs::write(&target, b"old").unwrap();
        let err = write_single_file(&target, |out| {
            out.write_all(b"partial")?;
            Err(io::Error::other("boom"))
        })
        .unwrap_err();
        assert!(matches!(err, ProducerError::Io { .. }));
        assert_eq!(fs::read(&target).unwrap(), b"old");
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn tar_entries_are_deterministic() {
        let mut first = Builder::new(Vec::new());
        append_bytes(&mut first, "index.json", b"{}").unwrap();
        let mut second = Builder::new(Vec::new());
        append_bytes(&mut second, "index.json", b"{}").unwrap();
        assert_eq!(first.into_inner().unwrap(), second.into_inner().unwrap());
    }
}
