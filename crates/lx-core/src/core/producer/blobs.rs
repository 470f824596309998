use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::ProducerError;

const SHA256_PREFIX: &str = "sha256:";

pub(crate) fn sha256_digest(bytes: &[u8]) -> String {
    format!("{SHA256_PREFIX}{}", hex::encode(Sha256::digest(bytes)))
}

/// Hex part of a `sha256:<hex>` digest, rejecting anything that could escape a
/// blob directory.
pub(crate) fn digest_hex(digest: &str) -> Result<&str, ProducerError> {
    let hex_part = digest
        .strip_prefix(SHA256_PREFIX)
        .ok_or_else(|| ProducerError::UnsupportedDigest {
            digest: digest.to_string(),
        })?;
    let valid = hex_part.len() == 64
        && hex_part
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
    if valid {
        Ok(hex_part)
    } else {
        Err(ProducerError::UnsupportedDigest {
            digest: digest.to_string(),
        })
    }
}

/// Streams a file through SHA-256 and checks it against `expected`.
pub(crate) fn verify_file(path: &Path, expected: &str) -> Result<u64, ProducerError> {
    let mut file = File::open(path).map_err(|err| ProducerError::io("open blob", path, err))?;
    let mut hasher = Sha256::new();
    let mut size = 0u64;
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| ProducerError::io("read blob", path, err))?;
        if read == 0 {
            break;
        }
        size = size.saturating_add(read as u64);
        hasher.update(&buffer[..read]);
    }
    let computed = format!("{SHA256_PREFIX}{}", hex::encode(hasher.finalize()));
    if computed != expected {
        return Err(ProducerError::DigestMismatch {
            expected: expected.to_string(),
            computed,
        });
    }
    Ok(size)
}

/// Writer that hashes and counts everything passing through it.
pub(crate) struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    pub(crate) fn finish(mut self) -> io::Result<(W, String, u64)> {
        self.inner.flush()?;
        let digest = format!("{SHA256_PREFIX}{}", hex::encode(self.hasher.finalize()));
        Ok((self.inner, digest, self.written))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writer that only counts bytes.
pub(crate) struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
