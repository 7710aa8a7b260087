//! Keyword hashing for query route tables.
//!
//! Maps keywords (or in-place substrings of a query) to bit positions in a
//! route table. The hash is locale-neutral and platform-independent so that
//! heterogeneous peers agree on every bit position, and it satisfies an
//! interpolation law that makes tables of different sizes comparable:
//!
//! - `2^k * hash(x, n) <= hash(x, n + k) < 2^(k+1) * hash(x, n)`
//! - `hash(x, n - r) == hash(x, n) >> r`
//!
//! The second identity is what the resampling algorithm in [`crate::bits`]
//! relies on: dropping low-order hash bits is the same as shrinking the
//! table, so a bit-run in a large table lands on the interpolated run in a
//! small one.

/// Multiplier applied to the folded keyword before taking the top bits.
///
/// Odd 32-bit constant; only the low 32 bits of the product are kept.
pub const HASH_MULTIPLIER: u32 = 0x4F1B_BCDC;

/// Characters that separate keywords in file paths and query strings.
pub const DEFAULT_DELIMITERS: &str = " -._+/*()\\,";

/// Hash a keyword to a value in `[0, 2^bits)`.
///
/// Folds the keyword's UTF-16 code units into a 32-bit accumulator,
/// XOR-ing the low 8 bits of each (1:1 lower-cased) unit at byte position
/// `i % 4`, then multiplies by [`HASH_MULTIPLIER`] and keeps the top
/// `bits` bits of the low 32-bit product.
///
/// `bits` must be at most 32; `bits == 0` always yields 0 (a one-slot
/// table). Case folding is per code unit and never expands a character,
/// so the same input hashes identically on every platform.
pub fn hash(keyword: &str, bits: u8) -> u32 {
    debug_assert!(bits <= 32, "hash bit count out of range: {}", bits);
    let mut acc: u32 = 0;
    for (i, unit) in keyword.encode_utf16().enumerate() {
        let byte = (fold_code_unit(unit) & 0xFF) as u32;
        acc ^= byte << (8 * (i % 4));
    }
    scramble(acc, bits)
}

/// Final mixing step: multiply and keep the top `bits` bits.
fn scramble(acc: u32, bits: u8) -> u32 {
    if bits == 0 {
        return 0;
    }
    acc.wrapping_mul(HASH_MULTIPLIER) >> (32 - u32::from(bits))
}

/// Lower-case a single UTF-16 code unit with a 1:1, locale-neutral mapping.
///
/// Surrogate halves and characters whose lower-case form would expand to
/// more than one character (or leave the BMP) pass through unchanged, so
/// folding can never shift code-unit positions.
fn fold_code_unit(unit: u16) -> u16 {
    match char::from_u32(u32::from(unit)) {
        Some(c) => {
            let folded = simple_lowercase(c);
            let code = folded as u32;
            if code <= 0xFFFF {
                code as u16
            } else {
                unit
            }
        }
        // Lone surrogate half: not a character, keep as-is.
        None => unit,
    }
}

/// 1:1 lower-case mapping: the Unicode lowering when it is a single
/// character, otherwise the character itself.
pub(crate) fn simple_lowercase(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Find the byte index of the next keyword character at or after `from`.
///
/// Returns `s.len()` if only delimiters remain. `from` must lie on a char
/// boundary (0 and indices returned by these scanners always do).
pub fn keyword_start(s: &str, from: usize, delims: &str) -> usize {
    for (i, c) in s[from..].char_indices() {
        if !delims.contains(c) {
            return from + i;
        }
    }
    s.len()
}

/// Find the byte index of the next delimiter at or after `from`.
///
/// Returns `s.len()` if the keyword runs to the end of the string.
pub fn keyword_end(s: &str, from: usize, delims: &str) -> usize {
    for (i, c) in s[from..].char_indices() {
        if delims.contains(c) {
            return from + i;
        }
    }
    s.len()
}

/// Split a file path into lower-cased keyword tokens on [`DEFAULT_DELIMITERS`].
pub fn keywords(path: &str) -> Vec<String> {
    keywords_with_delimiters(path, DEFAULT_DELIMITERS)
}

/// Split `path` into lower-cased keyword tokens on a caller-supplied
/// delimiter set.
///
/// Lower-casing uses the same 1:1 mapping as [`hash`], so hashing a token
/// from this list equals hashing the matching substring of the original
/// text in place.
pub fn keywords_with_delimiters(path: &str, delims: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut pos = 0;
    while pos < path.len() {
        let start = keyword_start(path, pos, delims);
        if start >= path.len() {
            break;
        }
        let end = keyword_end(path, start, delims);
        let token: String = path[start..end].chars().map(simple_lowercase).collect();
        words.push(token);
        pos = end;
    }
    words
}

/// Expand keywords with truncated prefixes for partial matching.
///
/// Every word longer than four characters is replaced by itself plus its
/// length-1 and length-2 prefixes; shorter words are kept as-is. If no
/// word qualifies the input vector is returned unchanged, without
/// reallocating.
pub fn prefixes(words: Vec<String>) -> Vec<String> {
    if !words.iter().any(|w| w.chars().count() > 4) {
        return words;
    }
    let mut out = Vec::with_capacity(words.len() * 3);
    for word in words {
        let n = word.chars().count();
        if n > 4 {
            let bounds: Vec<usize> = word.char_indices().map(|(i, _)| i).collect();
            out.push(word[..bounds[n - 1]].to_string());
            out.push(word[..bounds[n - 2]].to_string());
        }
        out.push(word);
    }
    out
}
