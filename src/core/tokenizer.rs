//! Main tokenizer interface.
//!
//! [`Tokenizer`] composes the three stages of the encode pipeline:
//!
//! 1. The special-token splitter walks the input and carves out reserved
//!    markers (`<|endoftext|>` and friends) according to the caller's
//!    allowed/disallowed policy, using an Aho-Corasick automaton.
//! 2. The pre-tokenizer regex splits each ordinary stretch into pieces.
//! 3. Each piece is either a direct vocabulary hit or goes through the
//!    byte-pair merge loop in [`super::bpe`].
//!
//! Decoding is the reverse: inverse table lookups concatenated into a byte
//! buffer. The tokenizer is immutable after construction and `Send + Sync`,
//! so batch operations fan out over rayon without any locking.

use std::collections::HashSet;

use aho_corasick::{AhoCorasick, MatchKind};
use fancy_regex::Regex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::bpe::{byte_pair_encode, Rank};
use super::registry::RegistryError;
use super::vocab::{build_decoder, VocabError};

/// Hard cap on the length of a single encode input, in Unicode scalar
/// values. Different tiktoken ports measure this in their host string's
/// native units; this implementation fixes on scalar values for portability.
pub const MAX_ENCODE_INPUT: usize = 1_000_000;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("regex error: {0}")]
    Regex(#[from] fancy_regex::Error),
    #[error("special token matcher build error: {0}")]
    SpecialMatcher(#[from] aho_corasick::BuildError),
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("vocabulary registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("invalid token for decoding: {0}")]
    DecodeKey(Rank),
    #[error("could not decode tokens: {0}")]
    Decode(String),
    #[error("could not encode: {0}")]
    Encode(String),
    #[error("text contains disallowed special token {0:?}")]
    DisallowedSpecialToken(String),
    #[error("input length {len} exceeds maximum encodable length {max}")]
    InputTooLarge { len: usize, max: usize },
    #[error("unknown model or encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Which special tokens cause [`Tokenizer::encode`] to fail when they appear
/// in the input text.
///
/// Markers that are neither allowed nor disallowed are treated as ordinary
/// text and tokenized right through.
#[derive(Debug, Clone, Default)]
pub enum DisallowedSpecial<'a> {
    /// Every special token that is not in the allowed set. This is the safe
    /// default: reserved markers showing up in user-supplied text are almost
    /// always a bug on the caller's side.
    #[default]
    All,
    /// Only the listed markers.
    Set(HashSet<&'a str>),
}

impl DisallowedSpecial<'_> {
    fn forbids(&self, marker: &str) -> bool {
        match self {
            // The allowed set was already consulted; anything reaching this
            // check is not allowed.
            DisallowedSpecial::All => true,
            DisallowedSpecial::Set(set) => set.contains(marker),
        }
    }
}

/// BPE tokenizer over a tiktoken-style vocabulary.
///
/// Construction compiles the pre-tokenizer regex and the special-token
/// automaton and sorts the vocabulary keys; everything afterwards is
/// read-only. Clones share nothing but are cheap enough for tests.
#[derive(Clone)]
pub struct Tokenizer {
    pub(crate) encoder: FxHashMap<Vec<u8>, Rank>,
    pub(crate) decoder: FxHashMap<Rank, Vec<u8>>,
    special_tokens: FxHashMap<String, Rank>,
    special_tokens_decoder: FxHashMap<Rank, Vec<u8>>,
    special_token_strings: Vec<String>,
    regex: Regex,
    special_matcher: Option<AhoCorasick>,
    pub(crate) sorted_token_bytes: Vec<Vec<u8>>,
}

impl Tokenizer {
    /// Create a tokenizer from a merge table, special-token table, and
    /// pre-tokenizer pattern.
    pub fn new(
        encoder: FxHashMap<Vec<u8>, Rank>,
        special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
    ) -> Result<Self, TokenizerError> {
        let regex = Regex::new(pattern)?;

        let decoder = build_decoder(&encoder);
        assert_eq!(
            encoder.len(),
            decoder.len(),
            "merge table contains duplicate ranks"
        );

        let special_tokens_decoder: FxHashMap<Rank, Vec<u8>> = special_tokens
            .iter()
            .map(|(k, v)| (*v, k.as_bytes().to_vec()))
            .collect();

        let mut special_token_strings: Vec<String> = special_tokens.keys().cloned().collect();
        special_token_strings.sort();
        // Which marker wins for overlapping occurrences depends on automaton
        // match semantics, so prefix-free markers are a construction
        // invariant rather than a per-call concern.
        for (i, a) in special_token_strings.iter().enumerate() {
            for b in &special_token_strings[i + 1..] {
                assert!(
                    !b.starts_with(a.as_str()),
                    "special token {a:?} is a prefix of {b:?}"
                );
            }
        }
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&special_token_strings)?,
            )
        };

        let mut sorted_token_bytes: Vec<Vec<u8>> = encoder.keys().cloned().collect();
        sorted_token_bytes.sort();

        debug!(
            tokens = encoder.len(),
            special = special_tokens.len(),
            "constructed tokenizer"
        );

        Ok(Self {
            encoder,
            decoder,
            special_tokens,
            special_tokens_decoder,
            special_token_strings,
            regex,
            special_matcher,
            sorted_token_bytes,
        })
    }

    // ------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------

    /// Encode text without any special-token handling. Reserved markers in
    /// the input are tokenized as ordinary text.
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        self.check_input_len(text)?;
        self.encode_ordinary_inner(text)
    }

    /// Encode text, emitting dedicated ranks for markers in `allowed` and
    /// failing on markers matched by `disallowed`.
    pub fn encode(
        &self,
        text: &str,
        allowed: &HashSet<&str>,
        disallowed: &DisallowedSpecial,
    ) -> Result<Vec<Rank>, TokenizerError> {
        self.check_input_len(text)?;
        Ok(self.encode_inner(text, allowed, disallowed)?.0)
    }

    /// Encode text with every special token allowed.
    pub fn encode_with_all_specials(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        let allowed = self.special_tokens();
        self.check_input_len(text)?;
        Ok(self
            .encode_inner(text, &allowed, &DisallowedSpecial::All)?
            .0)
    }

    /// Encode a byte buffer that may not be valid UTF-8.
    ///
    /// Valid buffers behave exactly like [`Self::encode_ordinary`]. For an
    /// invalid buffer, the longest valid prefix is encoded with the regex
    /// pipeline, the tokens spanning the unstable boundary are peeled back,
    /// and their bytes plus the invalid tail go through one raw merge pass.
    pub fn encode_bytes(&self, bytes: &[u8]) -> Result<Vec<Rank>, TokenizerError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.encode_ordinary_inner(text),
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                let text = std::str::from_utf8(&bytes[..valid_up_to])
                    .map_err(|_| TokenizerError::Decode("invalid utf-8".to_string()))?;
                let none_allowed = HashSet::new();
                let none_disallowed = DisallowedSpecial::Set(HashSet::new());
                let (tokens, last_piece_token_len) =
                    self.encode_inner(text, &none_allowed, &none_disallowed)?;
                let (mut tokens, last_piece_token_len) =
                    self.increase_last_piece_token_len(tokens, last_piece_token_len);

                if !tokens.is_empty() && last_piece_token_len > 0 {
                    // The boundary tokens may merge differently once the
                    // invalid tail is appended, so re-run BPE over their
                    // bytes plus the tail.
                    let mut unstable_bytes =
                        self.decode_bytes(&tokens[tokens.len() - last_piece_token_len..])?;
                    unstable_bytes.extend_from_slice(&bytes[valid_up_to..]);
                    tokens.truncate(tokens.len() - last_piece_token_len);
                    if !unstable_bytes.is_empty() {
                        tokens.extend(byte_pair_encode(&unstable_bytes, &self.encoder));
                    }
                } else {
                    let tail = &bytes[valid_up_to..];
                    if !tail.is_empty() {
                        tokens.extend(byte_pair_encode(tail, &self.encoder));
                    }
                }
                Ok(tokens)
            }
        }
    }

    /// Encode a single piece directly, bypassing the pre-tokenizer.
    pub fn encode_single_piece(&self, piece: &[u8]) -> Vec<Rank> {
        if let Some(&rank) = self.encoder.get(piece) {
            return vec![rank];
        }
        byte_pair_encode(piece, &self.encoder)
    }

    /// Look up the rank of a byte string that is exactly one token, either
    /// in the merge table or the special-token table.
    pub fn encode_single_token(&self, piece: &[u8]) -> Result<Rank, TokenizerError> {
        if let Some(&rank) = self.encoder.get(piece) {
            return Ok(rank);
        }
        if let Ok(text) = std::str::from_utf8(piece) {
            if let Some(&rank) = self.special_tokens.get(text) {
                return Ok(rank);
            }
        }
        Err(TokenizerError::Encode(format!(
            "bytes {piece:?} do not form a single token"
        )))
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Decode tokens into their concatenated bytes.
    ///
    /// The result is not guaranteed to be valid UTF-8.
    pub fn decode_bytes(&self, tokens: &[Rank]) -> Result<Vec<u8>, TokenizerError> {
        let mut ret = Vec::with_capacity(tokens.len() * 2);
        for &token in tokens {
            if let Some(bytes) = self.decoder.get(&token) {
                ret.extend_from_slice(bytes);
            } else if let Some(bytes) = self.special_tokens_decoder.get(&token) {
                ret.extend_from_slice(bytes);
            } else {
                return Err(TokenizerError::DecodeKey(token));
            }
        }
        Ok(ret)
    }

    /// Decode tokens into a string, failing if the bytes are not UTF-8.
    pub fn decode(&self, tokens: &[Rank]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(tokens)?;
        String::from_utf8(bytes).map_err(|_| TokenizerError::Decode("invalid utf-8".to_string()))
    }

    /// Decode the bytes of a single token.
    pub fn decode_single_token_bytes(&self, token: Rank) -> Result<Vec<u8>, TokenizerError> {
        if let Some(bytes) = self.decoder.get(&token) {
            return Ok(bytes.clone());
        }
        if let Some(bytes) = self.special_tokens_decoder.get(&token) {
            return Ok(bytes.clone());
        }
        Err(TokenizerError::DecodeKey(token))
    }

    /// Decode tokens into text together with, for each token, the character
    /// (Unicode scalar) index where its byte run begins.
    ///
    /// A token that starts inside a multibyte scalar reports that scalar's
    /// index, so such tokens share an offset with their neighbour.
    pub fn decode_with_offsets(
        &self,
        tokens: &[Rank],
    ) -> Result<(String, Vec<usize>), TokenizerError> {
        let text = self.decode(tokens)?;

        let mut byte_to_char = vec![0usize; text.len() + 1];
        let mut char_count = 0;
        for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
            for offset in 0..ch.len_utf8() {
                byte_to_char[byte_idx + offset] = char_idx;
            }
            char_count = char_idx + 1;
        }
        byte_to_char[text.len()] = char_count;

        let mut offsets = Vec::with_capacity(tokens.len());
        let mut byte_pos = 0usize;
        for &token in tokens {
            offsets.push(byte_to_char[byte_pos]);
            byte_pos += self.token_byte_len(token)?;
        }
        Ok((text, offsets))
    }

    // ------------------------------------------------------------------
    // Batch operations
    // ------------------------------------------------------------------

    /// Encode many texts in parallel, preserving input order. The first
    /// failing element aborts the batch.
    pub fn encode_batch(
        &self,
        texts: &[String],
        allowed: &HashSet<&str>,
    ) -> Result<Vec<Vec<Rank>>, TokenizerError> {
        texts
            .par_iter()
            .map(|text| self.encode(text, allowed, &DisallowedSpecial::All))
            .collect()
    }

    /// Encode many texts in parallel without special-token handling.
    pub fn encode_ordinary_batch(&self, texts: &[String]) -> Result<Vec<Vec<Rank>>, TokenizerError> {
        texts
            .par_iter()
            .map(|text| self.encode_ordinary(text))
            .collect()
    }

    /// Decode many token sequences in parallel, preserving input order.
    pub fn decode_batch(&self, token_lists: &[Vec<Rank>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The set of special-token markers this tokenizer knows.
    pub fn special_tokens(&self) -> HashSet<&str> {
        self.special_token_strings.iter().map(|s| s.as_str()).collect()
    }

    /// Whether `token` is a special-token rank.
    pub fn is_special(&self, token: Rank) -> bool {
        self.special_tokens_decoder.contains_key(&token)
    }

    /// Rank of `<|endoftext|>`, if this vocabulary has one.
    pub fn eot_token(&self) -> Option<Rank> {
        self.special_tokens.get("<|endoftext|>").copied()
    }

    /// The largest rank in either table.
    pub fn max_token_value(&self) -> Rank {
        let max_merge = self.decoder.keys().max().copied().unwrap_or(0);
        let max_special = self.special_tokens.values().max().copied().unwrap_or(0);
        max_merge.max(max_special)
    }

    /// Total vocabulary size, counting every rank slot up to the largest.
    pub fn n_vocab(&self) -> usize {
        self.max_token_value() as usize + 1
    }

    /// All merge-table keys in lexicographic order.
    pub fn token_byte_values(&self) -> &[Vec<u8>] {
        &self.sorted_token_bytes
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn check_input_len(&self, text: &str) -> Result<(), TokenizerError> {
        let len = text.chars().count();
        if len > MAX_ENCODE_INPUT {
            return Err(TokenizerError::InputTooLarge {
                len,
                max: MAX_ENCODE_INPUT,
            });
        }
        Ok(())
    }

    fn token_byte_len(&self, token: Rank) -> Result<usize, TokenizerError> {
        if let Some(bytes) = self.decoder.get(&token) {
            return Ok(bytes.len());
        }
        if let Some(bytes) = self.special_tokens_decoder.get(&token) {
            return Ok(bytes.len());
        }
        Err(TokenizerError::DecodeKey(token))
    }

    /// Encode one pre-tokenized piece, returning how many tokens it added.
    fn encode_piece_into(&self, piece: &[u8], out: &mut Vec<Rank>) -> usize {
        if let Some(&rank) = self.encoder.get(piece) {
            out.push(rank);
            return 1;
        }
        let tokens = byte_pair_encode(piece, &self.encoder);
        let n = tokens.len();
        out.extend(tokens);
        n
    }

    pub(crate) fn encode_ordinary_inner(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        let mut ret = Vec::new();
        for mat in self.regex.find_iter(text) {
            self.encode_piece_into(mat?.as_str().as_bytes(), &mut ret);
        }
        Ok(ret)
    }

    /// Full pipeline: special-token splitting plus ordinary encoding.
    ///
    /// Returns the tokens and `last_piece_token_len`, the number of tokens
    /// produced by the final BPE call (0 when the input ended on a special
    /// token). Merges cannot cross pre-tokenizer splits, so this marks how
    /// far the tail of the output could change if more text were appended.
    pub(crate) fn encode_inner(
        &self,
        text: &str,
        allowed: &HashSet<&str>,
        disallowed: &DisallowedSpecial,
    ) -> Result<(Vec<Rank>, usize), TokenizerError> {
        let mut ret = Vec::new();
        let mut last_piece_token_len = 0;
        let mut start = 0;

        loop {
            // Find the next allowed marker at or after the cursor. A marker
            // that is neither allowed nor disallowed is stepped over by one
            // scalar so it re-surfaces as ordinary text below.
            let mut next_special: Option<(usize, usize)> = None;
            if let Some(matcher) = &self.special_matcher {
                let mut start_find = start;
                while let Some(m) = matcher.find(&text[start_find..]) {
                    let match_start = start_find + m.start();
                    let match_end = start_find + m.end();
                    let marker = &text[match_start..match_end];
                    if allowed.contains(marker) {
                        next_special = Some((match_start, match_end));
                        break;
                    }
                    if disallowed.forbids(marker) {
                        return Err(TokenizerError::DisallowedSpecialToken(marker.to_string()));
                    }
                    let first_char_len = marker.chars().next().map_or(1, char::len_utf8);
                    start_find = match_start + first_char_len;
                }
            }
            let end = next_special.map_or(text.len(), |(s, _)| s);

            for mat in self.regex.find_iter(&text[start..end]) {
                last_piece_token_len =
                    self.encode_piece_into(mat?.as_str().as_bytes(), &mut ret);
            }

            match next_special {
                Some((match_start, match_end)) => {
                    let marker = &text[match_start..match_end];
                    ret.push(self.special_tokens[marker]);
                    start = match_end;
                    last_piece_token_len = 0;
                }
                None => break,
            }
        }

        Ok((ret, last_piece_token_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Byte-complete vocabulary with a few merges and two special tokens.
    fn make_test_tokenizer() -> Tokenizer {
        let mut encoder = FxHashMap::default();
        for b in 0u32..=255 {
            encoder.insert(vec![b as u8], b);
        }
        encoder.insert(b"He".to_vec(), 300);
        encoder.insert(b"ll".to_vec(), 301);
        encoder.insert(b"llo".to_vec(), 302);
        encoder.insert(b"Hello".to_vec(), 303);
        encoder.insert(b" World".to_vec(), 304);

        let mut special_tokens = FxHashMap::default();
        special_tokens.insert("<|endoftext|>".to_string(), 50256);
        special_tokens.insert("<|pad|>".to_string(), 50257);

        Tokenizer::new(encoder, special_tokens, r"\S+|\s+").unwrap()
    }

    #[test]
    fn encode_decode_roundtrip() {
        let tokenizer = make_test_tokenizer();
        for text in ["Hello World", "  spaced  out  ", "mixed 123 !?", ""] {
            let tokens = tokenizer.encode_ordinary(text).unwrap();
            assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
        }
    }

    #[test]
    fn whole_piece_vocabulary_hit() {
        let tokenizer = make_test_tokenizer();
        let tokens = tokenizer.encode_ordinary("Hello World").unwrap();
        assert_eq!(tokens, vec![303, 304]);
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        let tokenizer = make_test_tokenizer();
        assert!(tokenizer.encode_ordinary("").unwrap().is_empty());
        assert_eq!(tokenizer.decode(&[]).unwrap(), "");
    }

    #[test]
    fn ordinary_encoding_never_emits_special_ranks() {
        let tokenizer = make_test_tokenizer();
        let tokens = tokenizer.encode_ordinary("<|endoftext|>").unwrap();
        assert!(!tokens.contains(&50256));
        assert_eq!(tokenizer.decode(&tokens).unwrap(), "<|endoftext|>");
    }

    #[test]
    fn disallowed_special_is_an_error() {
        let tokenizer = make_test_tokenizer();
        let err = tokenizer
            .encode("hi <|endoftext|>", &HashSet::new(), &DisallowedSpecial::All)
            .unwrap_err();
        match err {
            TokenizerError::DisallowedSpecialToken(marker) => {
                assert_eq!(marker, "<|endoftext|>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn allowed_special_becomes_its_rank() {
        let tokenizer = make_test_tokenizer();
        let allowed = HashSet::from(["<|endoftext|>"]);
        let tokens = tokenizer
            .encode("<|endoftext|>", &allowed, &DisallowedSpecial::All)
            .unwrap();
        assert_eq!(tokens, vec![50256]);
    }

    #[test]
    fn unlisted_special_is_plain_text() {
        let tokenizer = make_test_tokenizer();
        let tokens = tokenizer
            .encode(
                "<|endoftext|>",
                &HashSet::new(),
                &DisallowedSpecial::Set(HashSet::new()),
            )
            .unwrap();
        assert_ne!(tokens, vec![50256]);
        assert!(!tokens.is_empty());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), "<|endoftext|>");
    }

    #[test]
    fn mixed_text_and_allowed_special() {
        let tokenizer = make_test_tokenizer();
        let allowed = HashSet::from(["<|endoftext|>", "<|pad|>"]);
        let tokens = tokenizer
            .encode("Hello<|endoftext|>Hello", &allowed, &DisallowedSpecial::All)
            .unwrap();
        assert_eq!(tokens, vec![303, 50256, 303]);
    }

    #[test]
    fn encode_with_all_specials_allows_everything() {
        let tokenizer = make_test_tokenizer();
        let tokens = tokenizer
            .encode_with_all_specials("<|pad|>Hello<|endoftext|>")
            .unwrap();
        assert_eq!(tokens, vec![50257, 303, 50256]);
    }

    #[test]
    fn encode_bytes_valid_utf8_matches_ordinary() {
        let tokenizer = make_test_tokenizer();
        let text = "Hello World";
        assert_eq!(
            tokenizer.encode_bytes(text.as_bytes()).unwrap(),
            tokenizer.encode_ordinary(text).unwrap()
        );
    }

    #[test]
    fn encode_bytes_roundtrips_invalid_utf8() {
        let tokenizer = make_test_tokenizer();
        for k in 0..=10 {
            let bytes = vec![0x80u8; k];
            let tokens = tokenizer.encode_bytes(&bytes).unwrap();
            assert_eq!(tokenizer.decode_bytes(&tokens).unwrap(), bytes);
        }
        // A multibyte scalar cut in half.
        let bytes = [b'a', 0xC3];
        let tokens = tokenizer.encode_bytes(&bytes).unwrap();
        assert_eq!(tokenizer.decode_bytes(&tokens).unwrap(), bytes);
    }

    #[test]
    fn single_token_lookups_roundtrip() {
        let tokenizer = make_test_tokenizer();
        assert_eq!(tokenizer.encode_single_token(b"Hello").unwrap(), 303);
        assert_eq!(
            tokenizer.encode_single_token(b"<|endoftext|>").unwrap(),
            50256
        );
        assert!(tokenizer.encode_single_token(b"zz").is_err());

        assert_eq!(tokenizer.decode_single_token_bytes(303).unwrap(), b"Hello");
        assert_eq!(
            tokenizer.decode_single_token_bytes(50256).unwrap(),
            b"<|endoftext|>"
        );
        assert!(matches!(
            tokenizer.decode_single_token_bytes(999_999),
            Err(TokenizerError::DecodeKey(999_999))
        ));
    }

    #[test]
    fn decode_unknown_rank_fails() {
        let tokenizer = make_test_tokenizer();
        assert!(matches!(
            tokenizer.decode_bytes(&[303, 999_999]),
            Err(TokenizerError::DecodeKey(999_999))
        ));
    }

    #[test]
    fn decode_invalid_utf8_is_a_distinct_error() {
        let tokenizer = make_test_tokenizer();
        // 0xC3 alone is a dangling continuation start.
        let err = tokenizer.decode(&[0xC3]).unwrap_err();
        assert!(matches!(err, TokenizerError::Decode(_)));
    }

    #[test]
    fn offsets_for_ascii_tokens() {
        let tokenizer = make_test_tokenizer();
        let (text, offsets) = tokenizer.decode_with_offsets(&[303, 304]).unwrap();
        assert_eq!(text, "Hello World");
        assert_eq!(offsets, vec![0, 5]);
    }

    #[test]
    fn offsets_inside_multibyte_scalar_repeat() {
        let tokenizer = make_test_tokenizer();
        // "é" is 0xC3 0xA9; each byte is its own token here, and the second
        // token starts inside the scalar.
        let (text, offsets) = tokenizer.decode_with_offsets(&[0xC3, 0xA9, b'x' as Rank]).unwrap();
        assert_eq!(text, "éx");
        assert_eq!(offsets, vec![0, 0, 1]);
    }

    #[test]
    fn offsets_cover_special_tokens() {
        let tokenizer = make_test_tokenizer();
        let (text, offsets) = tokenizer
            .decode_with_offsets(&[303, 50256, 303])
            .unwrap();
        assert_eq!(text, "Hello<|endoftext|>Hello");
        assert_eq!(offsets, vec![0, 5, 18]);
    }

    #[test]
    fn input_limit_is_enforced() {
        let tokenizer = make_test_tokenizer();
        let text = "a".repeat(MAX_ENCODE_INPUT + 1);
        assert!(matches!(
            tokenizer.encode_ordinary(&text),
            Err(TokenizerError::InputTooLarge { len, max })
                if len == MAX_ENCODE_INPUT + 1 && max == MAX_ENCODE_INPUT
        ));
        assert!(matches!(
            tokenizer.encode(&text, &HashSet::new(), &DisallowedSpecial::All),
            Err(TokenizerError::InputTooLarge { .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic_across_threads() {
        let tokenizer = make_test_tokenizer();
        let text = "Hello World Hello World 123";
        let expected = tokenizer.encode_ordinary(text).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| tokenizer.encode_ordinary(text).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn batch_matches_individual_calls() {
        let tokenizer = make_test_tokenizer();
        let texts = vec![
            "Hello World".to_string(),
            "".to_string(),
            "  two  words ".to_string(),
        ];
        let batch = tokenizer.encode_ordinary_batch(&texts).unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, tokens) in texts.iter().zip(&batch) {
            assert_eq!(tokens, &tokenizer.encode_ordinary(text).unwrap());
        }

        let decoded = tokenizer.decode_batch(&batch).unwrap();
        assert_eq!(decoded, texts);
    }

    #[test]
    fn batch_with_specials() {
        let tokenizer = make_test_tokenizer();
        let texts = vec!["Hello<|endoftext|>".to_string(), "Hello".to_string()];
        let allowed = HashSet::from(["<|endoftext|>"]);
        let batch = tokenizer.encode_batch(&texts, &allowed).unwrap();
        assert_eq!(batch[0], vec![303, 50256]);
        assert_eq!(batch[1], vec![303]);
    }

    #[test]
    fn vocab_introspection() {
        let tokenizer = make_test_tokenizer();
        assert_eq!(tokenizer.max_token_value(), 50257);
        assert_eq!(tokenizer.n_vocab(), 50258);
        assert_eq!(tokenizer.eot_token(), Some(50256));
        assert!(tokenizer.is_special(50256));
        assert!(!tokenizer.is_special(303));

        let keys = tokenizer.token_byte_values();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(keys.len(), 261);
    }

    #[test]
    fn repeated_single_scalar_inputs_roundtrip() {
        let tokenizer = make_test_tokenizer();
        for c in ["^", "0", "a", " ", "\n"] {
            let text = c.repeat(10_000);
            let tokens = tokenizer.encode_ordinary(&text).unwrap();
            assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
        }
    }

    #[test]
    #[should_panic(expected = "is a prefix of")]
    fn prefix_overlapping_specials_panic_at_construction() {
        let mut encoder = FxHashMap::default();
        for b in 0u32..=255 {
            encoder.insert(vec![b as u8], b);
        }
        let mut special_tokens = FxHashMap::default();
        special_tokens.insert("<|a|>".to_string(), 300);
        special_tokens.insert("<|a|><|b|>".to_string(), 301);
        let _ = Tokenizer::new(encoder, special_tokens, r"\S+|\s+");
    }
}
