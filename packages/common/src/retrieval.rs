//! Short public codes that let a submitter amend their record without logging in.

use rand::Rng;

/// Uppercase letters and digits without the easily confused `0 O 1 I L`.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const CODE_LEN: usize = 8;

/// Generate a fresh retrieval code.
pub fn generate<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of user-typed input: trimmed, uppercase, inner dashes and
/// spaces dropped. Returns `None` if the result cannot be a code.
pub fn normalize(input: &str) -> Option<String> {
    let code: String = input
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid = code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b));
    valid.then_some(code)
}
