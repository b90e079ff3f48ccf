//! Completion support for text that ends on an unstable regex boundary.
//!
//! When a prompt stops mid-word (or mid-whitespace-run), the tokens covering
//! the final piece are not trustworthy: appending more text could merge them
//! differently. [`Tokenizer::encode_with_unstable`] peels those tokens off
//! and enumerates the token sequences a continuation could plausibly start
//! with, so completion engines can constrain sampling without re-tokenizing
//! the whole prompt.

use std::collections::HashSet;

use super::bpe::{byte_pair_encode, Rank};
use super::tokenizer::{DisallowedSpecial, Tokenizer, TokenizerError};

impl Tokenizer {
    /// Widen `last_piece_token_len` leftward across all-whitespace tokens.
    ///
    /// Regex splits are not fully stable under appending: cl100k's
    /// `\s*[\r\n]` alternative can turn "\n" + " " into a single "\n \n"
    /// piece once more text arrives. A whitespace run at the tail therefore
    /// has to be treated as part of the unstable region.
    pub(crate) fn increase_last_piece_token_len(
        &self,
        tokens: Vec<Rank>,
        mut last_piece_token_len: usize,
    ) -> (Vec<Rank>, usize) {
        let token_is_all_space = |token: &Rank| {
            self.decoder
                .get(token)
                .map(|bytes| bytes.iter().all(|&b| matches!(b, b' ' | b'\n' | b'\t')))
                .unwrap_or(false)
        };

        if last_piece_token_len > 0
            && token_is_all_space(&tokens[tokens.len() - last_piece_token_len])
        {
            while last_piece_token_len < tokens.len()
                && token_is_all_space(&tokens[tokens.len() - last_piece_token_len - 1])
            {
                last_piece_token_len += 1;
            }
        }
        debug_assert!(last_piece_token_len <= tokens.len());

        (tokens, last_piece_token_len)
    }

    /// Encode `text` and split the result into a stable prefix plus the set
    /// of token sequences that could complete the unstable tail.
    pub fn encode_with_unstable(
        &self,
        text: &str,
        allowed: &HashSet<&str>,
        disallowed: &DisallowedSpecial,
    ) -> Result<(Vec<Rank>, HashSet<Vec<Rank>>), TokenizerError> {
        self.check_input_len(text)?;

        let (tokens, last_piece_token_len) = self.encode_inner(text, allowed, disallowed)?;
        if last_piece_token_len == 0 {
            // The input ended on a special token; nothing is unstable.
            return Ok((tokens, HashSet::new()));
        }

        let (mut tokens, last_piece_token_len) =
            self.increase_last_piece_token_len(tokens, last_piece_token_len);
        let unstable_bytes =
            self.decode_bytes(&tokens[tokens.len() - last_piece_token_len..])?;
        tokens.truncate(tokens.len() - last_piece_token_len);

        let mut completions = HashSet::new();
        if unstable_bytes.is_empty() {
            return Ok((tokens, completions));
        }

        // Single tokens that extend (or equal) the unstable bytes.
        let sorted = &self.sorted_token_bytes;
        let mut point =
            sorted.partition_point(|key| key.as_slice() < unstable_bytes.as_slice());
        while point < sorted.len() && sorted[point].starts_with(&unstable_bytes) {
            completions.insert(vec![self.encoder[sorted[point].as_slice()]]);
            point += 1;
        }

        // For every split of the unstable bytes, extend the suffix with each
        // token that starts with it and re-tokenize the combination. Where
        // the combination is valid UTF-8 it goes through the regex pipeline,
        // since the extension may have introduced a pre-tokenizer split that
        // plain byte-pair merging would miss.
        for i in 1..unstable_bytes.len() {
            let prefix = &unstable_bytes[..i];
            let suffix = &unstable_bytes[i..];
            let mut point = sorted.partition_point(|key| key.as_slice() < suffix);
            while point < sorted.len() && sorted[point].starts_with(suffix) {
                let possibility = [prefix, sorted[point].as_slice()].concat();
                let encoded = match std::str::from_utf8(&possibility) {
                    Ok(s) => self.encode_ordinary_inner(s)?,
                    Err(_) => byte_pair_encode(&possibility, &self.encoder),
                };
                let mut seq = Vec::new();
                let mut seq_len = 0;
                for token in encoded {
                    seq.push(token);
                    seq_len += self.decoder[&token].len();
                    if seq_len >= unstable_bytes.len() {
                        break;
                    }
                }
                completions.insert(seq);
                point += 1;
            }
        }

        // A trailing whitespace scalar can gain a split once text follows it
        // (`\s+(?!\S)` stops matching at the new boundary), so the version
        // where the final scalar is merged separately is also possible.
        if unstable_bytes.len() > 1 {
            let (last_char, last_len) = bstr::decode_last_utf8(unstable_bytes.as_slice());
            if unstable_bytes.len() - last_len > 0
                && last_char.is_some_and(|c| c.is_whitespace())
            {
                let mut reencoded = byte_pair_encode(
                    &unstable_bytes[..unstable_bytes.len() - last_len],
                    &self.encoder,
                );
                reencoded.extend(byte_pair_encode(
                    &unstable_bytes[unstable_bytes.len() - last_len..],
                    &self.encoder,
                ));
                completions.insert(reencoded);
            }
        }

        Ok((tokens, completions))
    }
}
