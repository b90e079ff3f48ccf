//! ranktok - fast tiktoken-compatible BPE tokenizer.
//!
//! Encodes text to the exact token sequences produced by OpenAI's tiktoken
//! vocabularies (cl100k_base, o200k_base, o200k_harmony, r50k_base,
//! p50k_base, p50k_edit, gpt2) and decodes them back, featuring:
//!
//! - Linked-list byte-pair merge loop with cached pair ranks (no O(N²)
//!   blowup on pathological inputs)
//! - fancy-regex pre-tokenization with full Unicode property support
//! - Aho-Corasick special-token matching with allowed/disallowed policies
//! - FxHashMap vocabulary tables shared read-only across threads
//! - Rayon parallelism for batch encode/decode
//! - Vocabulary download with SHA-256 verification and on-disk caching
//!
//! # Example
//!
//! ```no_run
//! let tokenizer = ranktok::from_pretrained("cl100k_base")?;
//! let tokens = tokenizer.encode_ordinary("hello world")?;
//! assert_eq!(tokenizer.decode(&tokens)?, "hello world");
//! # Ok::<(), ranktok::TokenizerError>(())
//! ```

pub mod core;

pub use crate::core::{
    byte_pair_encode, byte_pair_split, build_decoder, cl100k_base_special_tokens,
    encoding_for_model, from_encoding, from_pretrained, load_tiktoken_bpe, load_tiktoken_bpe_file,
    o200k_base_special_tokens, o200k_harmony_special_tokens, p50k_edit_special_tokens,
    r50k_base_special_tokens, tokenizer_for_model, DisallowedSpecial, Encoding, Rank,
    RegistryError, Tokenizer, TokenizerError, VocabCache, VocabError, CL100K_BASE_PATTERN,
    MAX_ENCODE_INPUT, O200K_BASE_PATTERN, R50K_BASE_PATTERN,
};
