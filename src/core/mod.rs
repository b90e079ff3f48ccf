//! Core tokenization engine.
//!
//! The pipeline is organized into small, composable pieces:
//!
//! - [`Tokenizer`]: the public encode/decode surface, combining the
//!   special-token splitter, the pre-tokenizer regex, and the merge engine
//! - [`bpe`]: the byte-pair merge loop over a linked-list segment structure
//! - [`vocab`]: tiktoken vocabulary file parsing
//! - [`unstable`]: completion candidates for prompts that end on an
//!   unstable regex boundary
//! - [`pretrained`]: the OpenAI encoding definitions and model-name lookup
//! - [`registry`]: vocabulary download, digest verification, and caching
//!
//! The [`Tokenizer`] is immutable once built. Batch operations parallelize
//! over rayon; per-call encoding is pure CPU with no shared mutable state.

mod bpe;
mod pretrained;
mod registry;
mod tokenizer;
mod unstable;
mod vocab;

pub use bpe::{byte_pair_encode, byte_pair_split, Rank};
pub use pretrained::{
    cl100k_base_special_tokens, encoding_for_model, from_encoding, from_pretrained,
    o200k_base_special_tokens, o200k_harmony_special_tokens, p50k_edit_special_tokens,
    r50k_base_special_tokens, tokenizer_for_model, Encoding, CL100K_BASE_PATTERN,
    O200K_BASE_PATTERN, R50K_BASE_PATTERN,
};
pub use registry::{RegistryError, VocabCache};
pub use tokenizer::{DisallowedSpecial, Tokenizer, TokenizerError, MAX_ENCODE_INPUT};
pub use vocab::{build_decoder, load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError};
