//! Vocabulary acquisition: HTTPS download, digest verification, disk cache.
//!
//! The tokenizer core only ever sees parsed merge tables; this module owns
//! getting the `.tiktoken` files onto disk. Cached files are trusted as-is;
//! freshly downloaded bytes are checked against the encoding's pinned
//! SHA-256 digest (when one is known) before anything is written.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use super::pretrained::Encoding;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },
    #[error("digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        file: &'static str,
        expected: String,
        actual: String,
    },
}

/// On-disk cache of vocabulary files, one `<encoding>.tiktoken` per entry.
///
/// The directory is injected at construction; the default resolves the
/// platform cache directory and falls back to the system temp directory.
#[derive(Debug, Clone)]
pub struct VocabCache {
    cache_dir: PathBuf,
}

impl Default for VocabCache {
    fn default() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            cache_dir: base.join("ranktok"),
        }
    }
}

impl VocabCache {
    /// A cache rooted at an explicit directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// The directory this cache reads and writes.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Return the raw vocabulary bytes for `encoding`, downloading and
    /// caching them on first use.
    pub fn load(&self, encoding: Encoding) -> Result<Vec<u8>, RegistryError> {
        let path = self.cache_dir.join(encoding.vocab_file());
        if path.exists() {
            debug!(file = encoding.vocab_file(), "vocabulary cache hit");
            return Ok(fs::read(&path)?);
        }

        let url = encoding.vocab_url();
        info!(file = encoding.vocab_file(), %url, "downloading vocabulary");
        let bytes = download(&url)?;

        if let Some(expected) = encoding.vocab_sha256() {
            let actual = sha256_hex(&bytes);
            if actual != expected {
                return Err(RegistryError::DigestMismatch {
                    file: encoding.vocab_file(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        self.store(encoding.vocab_file(), &bytes)?;
        Ok(bytes)
    }

    /// Write verified bytes into the cache via a temp file and rename, so a
    /// crash never leaves a truncated vocabulary behind.
    fn store(&self, file: &str, bytes: &[u8]) -> Result<(), RegistryError> {
        fs::create_dir_all(&self.cache_dir)?;
        let temp_path = self.cache_dir.join(format!(".{}.{}", file, std::process::id()));
        fs::write(&temp_path, bytes)?;
        let final_path = self.cache_dir.join(file);
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!(file, bytes = bytes.len(), "vocabulary cached");
        Ok(())
    }
}

fn download(url: &str) -> Result<Vec<u8>, RegistryError> {
    let response = ureq::get(url).call().map_err(|e| RegistryError::Download {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let expected_len = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = response.into_body().into_reader();
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| RegistryError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if let Some(expected) = expected_len {
        if bytes.len() as u64 != expected {
            return Err(RegistryError::Download {
                url: url.to_string(),
                message: format!("expected {} bytes, got {}", expected, bytes.len()),
            });
        }
    }

    Ok(bytes)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
