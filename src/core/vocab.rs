//! Vocabulary loading for the tiktoken BPE format.
//!
//! Each line of a vocabulary file holds a base64-encoded token byte string,
//! one ASCII space, and a decimal rank:
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! Lower ranks merge first. Empty and unparseable lines are skipped, which
//! matches tiktoken's loader.

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::bpe::Rank;

/// Errors that can occur when loading vocabulary files.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("vocabulary data is not valid UTF-8")]
    InvalidUtf8,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a tiktoken vocabulary from raw bytes into a merge table.
///
/// The buffer itself must be valid UTF-8; individual lines that fail to
/// parse are silently dropped.
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<FxHashMap<Vec<u8>, Rank>, VocabError> {
    let text = std::str::from_utf8(data).map_err(|_| VocabError::InvalidUtf8)?;

    let mut encoder = FxHashMap::default();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let Some((token_b64, rank_str)) = line.split_once(' ') else {
            continue;
        };
        let Ok(token) = STANDARD.decode(token_b64) else {
            continue;
        };
        let Ok(rank) = rank_str.trim_end().parse::<Rank>() else {
            continue;
        };
        encoder.insert(token, rank);
    }

    Ok(encoder)
}

/// Load a tiktoken vocabulary from a file path.
pub fn load_tiktoken_bpe_file(path: &str) -> Result<FxHashMap<Vec<u8>, Rank>, VocabError> {
    let data = std::fs::read(path)?;
    load_tiktoken_bpe(&data)
}

/// Build the inverse map (rank → bytes) from a merge table.
pub fn build_decoder(encoder: &FxHashMap<Vec<u8>, Rank>) -> FxHashMap<Rank, Vec<u8>> {
    encoder.iter().map(|(k, v)| (*v, k.clone())).collect()
}
