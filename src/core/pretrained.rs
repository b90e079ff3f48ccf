//! Pretrained encoding definitions for the OpenAI tiktoken vocabularies.
//!
//! Each [`Encoding`] bundles everything needed to stand up a [`Tokenizer`]:
//! the pre-tokenizer pattern, the special-token table, and where to fetch
//! the vocabulary file. Model names resolve to encodings through an
//! exact-match table followed by a prefix table, mirroring tiktoken's
//! lookup order.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use super::bpe::Rank;
use super::registry::VocabCache;
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::load_tiktoken_bpe;

/// Pre-tokenizer pattern for cl100k_base (GPT-4, GPT-3.5-turbo).
///
/// The upstream pattern uses possessive quantifiers (`?+`, `++`); those are
/// rewritten to their greedy forms here, which produces identical match
/// sequences for this pattern.
pub const CL100K_BASE_PATTERN: &str = r"'(?i:[sdmt]|ll|ve|re)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]|\s+(?!\S)|\s+";

/// Pre-tokenizer pattern for o200k_base (GPT-4o) and o200k_harmony.
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Pre-tokenizer pattern for r50k_base, p50k_base, p50k_edit, and gpt2.
pub const R50K_BASE_PATTERN: &str =
    r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+$|\s+(?!\S)|\s+";

const VOCAB_BASE_URL: &str = "https://openaipublic.blob.core.windows.net/encodings";

const ENDOFTEXT: &str = "<|endoftext|>";
const FIM_PREFIX: &str = "<|fim_prefix|>";
const FIM_MIDDLE: &str = "<|fim_middle|>";
const FIM_SUFFIX: &str = "<|fim_suffix|>";
const ENDOFPROMPT: &str = "<|endofprompt|>";

/// The supported tiktoken encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// GPT-4, GPT-3.5-turbo (~100k tokens).
    Cl100kBase,
    /// GPT-4o and the o-series reasoning models (~200k tokens).
    O200kBase,
    /// gpt-oss chat models: o200k_base merges with the harmony marker set.
    O200kHarmony,
    /// GPT-3 era completion models.
    R50kBase,
    /// Codex and text-davinci-002/003.
    P50kBase,
    /// The edit models; p50k_base merges plus FIM markers.
    P50kEdit,
    /// Original GPT-2.
    Gpt2,
}

impl Encoding {
    /// Parse a canonical encoding name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cl100k_base" => Some(Self::Cl100kBase),
            "o200k_base" => Some(Self::O200kBase),
            "o200k_harmony" => Some(Self::O200kHarmony),
            "r50k_base" => Some(Self::R50kBase),
            "p50k_base" => Some(Self::P50kBase),
            "p50k_edit" => Some(Self::P50kEdit),
            "gpt2" | "gpt-2" => Some(Self::Gpt2),
            _ => None,
        }
    }

    /// The canonical encoding name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
            Self::O200kHarmony => "o200k_harmony",
            Self::R50kBase => "r50k_base",
            Self::P50kBase => "p50k_base",
            Self::P50kEdit => "p50k_edit",
            Self::Gpt2 => "gpt2",
        }
    }

    /// The pre-tokenizer pattern for this encoding.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Cl100kBase => CL100K_BASE_PATTERN,
            Self::O200kBase | Self::O200kHarmony => O200K_BASE_PATTERN,
            Self::R50kBase | Self::P50kBase | Self::P50kEdit | Self::Gpt2 => R50K_BASE_PATTERN,
        }
    }

    /// The vocabulary file this encoding is built from. Several encodings
    /// share a file: they differ only in special tokens.
    pub fn vocab_file(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base.tiktoken",
            Self::O200kBase | Self::O200kHarmony => "o200k_base.tiktoken",
            Self::R50kBase => "r50k_base.tiktoken",
            Self::P50kBase | Self::P50kEdit => "p50k_base.tiktoken",
            Self::Gpt2 => "gpt2.tiktoken",
        }
    }

    /// Download URL for the vocabulary file.
    pub fn vocab_url(self) -> String {
        format!("{VOCAB_BASE_URL}/{}", self.vocab_file())
    }

    /// Pinned SHA-256 digest of the vocabulary file, when one is known.
    /// Verified after download, before the file enters the cache.
    pub fn vocab_sha256(self) -> Option<&'static str> {
        match self {
            Self::Cl100kBase => {
                Some("223921b76ee99bde995b7ff738513eef7bcf91d3d52a605354a8dcdfb67f2b08")
            }
            Self::O200kBase | Self::O200kHarmony => {
                Some("446a9538cb6c348e3516120d7c08b09f57c36f2bf05ead4f041c5532e9be82ba")
            }
            Self::R50kBase => {
                Some("306cd27f03c1a714eca7108e03d66b7dc042abe8c258b44c199a7ed9838dd930")
            }
            Self::P50kBase | Self::P50kEdit => {
                Some("94b5ca7dff4d00767bc256fdd1b27e5b17361d7b8a5f968547f9f23eb70d2069")
            }
            Self::Gpt2 => None,
        }
    }

    /// The special-token table for this encoding.
    pub fn special_tokens(self) -> FxHashMap<String, Rank> {
        match self {
            Self::Cl100kBase => cl100k_base_special_tokens(),
            Self::O200kBase => o200k_base_special_tokens(),
            Self::O200kHarmony => o200k_harmony_special_tokens(),
            Self::R50kBase | Self::P50kBase | Self::Gpt2 => r50k_base_special_tokens(),
            Self::P50kEdit => p50k_edit_special_tokens(),
        }
    }
}

/// Special tokens for cl100k_base.
pub fn cl100k_base_special_tokens() -> FxHashMap<String, Rank> {
    let mut special = FxHashMap::default();
    special.insert(ENDOFTEXT.to_string(), 100257);
    special.insert(FIM_PREFIX.to_string(), 100258);
    special.insert(FIM_MIDDLE.to_string(), 100259);
    special.insert(FIM_SUFFIX.to_string(), 100260);
    special.insert(ENDOFPROMPT.to_string(), 100276);
    special
}

/// Special tokens for o200k_base.
pub fn o200k_base_special_tokens() -> FxHashMap<String, Rank> {
    let mut special = FxHashMap::default();
    special.insert(ENDOFTEXT.to_string(), 199999);
    special.insert(ENDOFPROMPT.to_string(), 200018);
    special
}

/// Special tokens for o200k_harmony: the named chat-format markers plus a
/// run of `<|reserved_N|>` placeholders filling 200013..=201087.
pub fn o200k_harmony_special_tokens() -> FxHashMap<String, Rank> {
    let mut special = FxHashMap::default();
    special.insert("<|startoftext|>".to_string(), 199998);
    special.insert(ENDOFTEXT.to_string(), 199999);
    special.insert("<|reserved_200000|>".to_string(), 200000);
    special.insert("<|reserved_200001|>".to_string(), 200001);
    special.insert("<|return|>".to_string(), 200002);
    special.insert("<|constrain|>".to_string(), 200003);
    special.insert("<|reserved_200004|>".to_string(), 200004);
    special.insert("<|channel|>".to_string(), 200005);
    special.insert("<|start|>".to_string(), 200006);
    special.insert("<|end|>".to_string(), 200007);
    special.insert("<|message|>".to_string(), 200008);
    special.insert("<|reserved_200009|>".to_string(), 200009);
    special.insert("<|reserved_200010|>".to_string(), 200010);
    special.insert("<|reserved_200011|>".to_string(), 200011);
    special.insert("<|call|>".to_string(), 200012);
    special.insert(ENDOFPROMPT.to_string(), 200018);

    let named: FxHashSet<Rank> = special.values().copied().collect();
    for rank in 200013..=201087 {
        if !named.contains(&rank) {
            special.insert(format!("<|reserved_{rank}|>"), rank);
        }
    }
    special
}

/// Special tokens for r50k_base, p50k_base, and gpt2.
pub fn r50k_base_special_tokens() -> FxHashMap<String, Rank> {
    let mut special = FxHashMap::default();
    special.insert(ENDOFTEXT.to_string(), 50256);
    special
}

/// Special tokens for p50k_edit.
pub fn p50k_edit_special_tokens() -> FxHashMap<String, Rank> {
    let mut special = r50k_base_special_tokens();
    special.insert(FIM_PREFIX.to_string(), 50281);
    special.insert(FIM_MIDDLE.to_string(), 50282);
    special.insert(FIM_SUFFIX.to_string(), 50283);
    special
}

/// Exact model name → encoding.
const MODEL_TO_ENCODING: &[(&str, Encoding)] = &[
    ("gpt-oss-120b", Encoding::O200kHarmony),
    ("gpt-oss-20b", Encoding::O200kHarmony),
    ("o1", Encoding::O200kBase),
    ("o3", Encoding::O200kBase),
    ("o4-mini", Encoding::O200kBase),
    ("gpt-4.1", Encoding::O200kBase),
    ("chatgpt-4o-latest", Encoding::O200kBase),
    ("gpt-4o", Encoding::O200kBase),
    ("gpt-4", Encoding::Cl100kBase),
    ("gpt-3.5-turbo", Encoding::Cl100kBase),
    ("gpt-3.5", Encoding::Cl100kBase),
    ("gpt-35-turbo", Encoding::Cl100kBase),
    ("davinci-002", Encoding::Cl100kBase),
    ("babbage-002", Encoding::Cl100kBase),
    ("text-embedding-ada-002", Encoding::Cl100kBase),
    ("text-embedding-3-small", Encoding::Cl100kBase),
    ("text-embedding-3-large", Encoding::Cl100kBase),
    ("text-davinci-003", Encoding::P50kBase),
    ("text-davinci-002", Encoding::P50kBase),
    ("code-davinci-002", Encoding::P50kBase),
    ("code-davinci-001", Encoding::P50kBase),
    ("code-cushman-002", Encoding::P50kBase),
    ("code-cushman-001", Encoding::P50kBase),
    ("text-davinci-edit-001", Encoding::P50kEdit),
    ("code-davinci-edit-001", Encoding::P50kEdit),
    ("text-davinci-001", Encoding::R50kBase),
    ("text-curie-001", Encoding::R50kBase),
    ("text-babbage-001", Encoding::R50kBase),
    ("text-ada-001", Encoding::R50kBase),
    ("davinci", Encoding::R50kBase),
    ("curie", Encoding::R50kBase),
    ("babbage", Encoding::R50kBase),
    ("ada", Encoding::R50kBase),
    ("text-similarity-davinci-001", Encoding::R50kBase),
    ("text-similarity-curie-001", Encoding::R50kBase),
    ("text-similarity-babbage-001", Encoding::R50kBase),
    ("text-similarity-ada-001", Encoding::R50kBase),
    ("text-search-davinci-doc-001", Encoding::R50kBase),
    ("text-search-curie-doc-001", Encoding::R50kBase),
    ("text-search-babbage-doc-001", Encoding::R50kBase),
    ("text-search-ada-doc-001", Encoding::R50kBase),
    ("code-search-babbage-code-001", Encoding::R50kBase),
    ("code-search-ada-code-001", Encoding::R50kBase),
    ("gpt2", Encoding::Gpt2),
    ("gpt-2", Encoding::Gpt2),
];

/// Model name prefix → encoding, consulted after the exact table. Covers
/// dated snapshots ("gpt-4-0314") and fine-tune identifiers.
const MODEL_PREFIX_TO_ENCODING: &[(&str, Encoding)] = &[
    ("gpt-oss-", Encoding::O200kHarmony),
    ("o1-", Encoding::O200kBase),
    ("o3-", Encoding::O200kBase),
    ("o4-mini-", Encoding::O200kBase),
    ("gpt-4.1-", Encoding::O200kBase),
    ("chatgpt-4o-", Encoding::O200kBase),
    ("gpt-4o-", Encoding::O200kBase),
    ("ft:gpt-4o", Encoding::O200kBase),
    ("gpt-4-", Encoding::Cl100kBase),
    ("gpt-3.5-turbo-", Encoding::Cl100kBase),
    ("gpt-35-turbo-", Encoding::Cl100kBase),
    ("ft:gpt-4", Encoding::Cl100kBase),
    ("ft:gpt-3.5-turbo", Encoding::Cl100kBase),
    ("ft:davinci-002", Encoding::Cl100kBase),
    ("ft:babbage-002", Encoding::Cl100kBase),
];

/// Resolve a model name to its encoding: exact match first, then prefix.
pub fn encoding_for_model(model: &str) -> Option<Encoding> {
    if let Some((_, encoding)) = MODEL_TO_ENCODING.iter().find(|(name, _)| *name == model) {
        return Some(*encoding);
    }
    MODEL_PREFIX_TO_ENCODING
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, encoding)| *encoding)
}

/// Build a tokenizer for an encoding, fetching the vocabulary through the
/// given cache.
pub fn from_encoding(encoding: Encoding, cache: &VocabCache) -> Result<Tokenizer, TokenizerError> {
    let data = cache.load(encoding)?;
    let encoder = load_tiktoken_bpe(&data)?;
    Tokenizer::new(encoder, encoding.special_tokens(), encoding.pattern())
}

/// Build a tokenizer by encoding name, using the default vocabulary cache.
pub fn from_pretrained(name: &str) -> Result<Tokenizer, TokenizerError> {
    let encoding = Encoding::from_name(name)
        .ok_or_else(|| TokenizerError::UnsupportedEncoding(name.to_string()))?;
    from_encoding(encoding, &VocabCache::default())
}

/// Build a tokenizer for a model name, using the default vocabulary cache.
pub fn tokenizer_for_model(model: &str) -> Result<Tokenizer, TokenizerError> {
    let encoding = encoding_for_model(model)
        .ok_or_else(|| TokenizerError::UnsupportedEncoding(model.to_string()))?;
    from_encoding(encoding, &VocabCache::default())
}
