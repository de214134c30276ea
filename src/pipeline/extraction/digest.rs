use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Files are hashed in chunks of this size, never loaded whole.
const CHUNK_SIZE: usize = 64 * 1024;

/// I/O failure on one side of a byte comparison.
#[derive(Error, Debug)]
#[error("Cannot read {path}: {source}")]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ReadError {
    fn at(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of the byte-level identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryCheck {
    Identical { digest: String },
    SizeDiffers { size_a: u64, size_b: u64 },
    ContentDiffers { digest_a: String, digest_b: String },
}

impl BinaryCheck {
    pub fn is_identical(&self) -> bool {
        matches!(self, Self::Identical { .. })
    }
}

/// Compute a streaming SHA-256 content hash, base64 encoded.
pub fn content_digest(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Size first, then content hash.
pub fn compare_bytes(path_a: &Path, path_b: &Path) -> Result<BinaryCheck, ReadError> {
    let size_a = std::fs::metadata(path_a).map_err(ReadError::at(path_a))?.len();
    let size_b = std::fs::metadata(path_b).map_err(ReadError::at(path_b))?.len();
    if size_a != size_b {
        return Ok(BinaryCheck::SizeDiffers { size_a, size_b });
    }

    let digest_a = content_digest(path_a).map_err(ReadError::at(path_a))?;
    let digest_b = content_digest(path_b).map_err(ReadError::at(path_b))?;
    if digest_a == digest_b {
        Ok(BinaryCheck::Identical { digest: digest_a })
    } else {
        Ok(BinaryCheck::ContentDiffers { digest_a, digest_b })
    }
}
