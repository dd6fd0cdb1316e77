//! Shareable room codes.

use std::collections::HashSet;

use rand::Rng;

use crate::RoomError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates room codes over `[A-Z0-9]`.
///
/// Codes are drawn from the thread-local CSPRNG. The generator does not
/// know which codes are taken; uniqueness among live rooms is enforced
/// by the store, and `RoomManager::create_room` retries on collision.
pub struct CodeGenerator;

impl CodeGenerator {
    /// A fresh code of exactly `length` characters.
    ///
    /// # Errors
    /// [`RoomError::Validation`] when `length` is 0.
    pub fn generate(length: usize) -> Result<String, RoomError> {
        if length == 0 {
            return Err(RoomError::Validation("code length must be positive".into()));
        }
        let mut rng = rand::rng();
        Ok((0..length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect())
    }

    /// Canonical form of a user-typed code: trimmed and uppercased.
    pub fn normalize(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    /// Returns `true` if `code` could have come from [`Self::generate`].
    pub fn is_well_formed(code: &str) -> bool {
        !code.is_empty() && code.bytes().all(|b| ALPHABET.contains(&b))
    }
}

/// Count of repeated codes among `n` draws. Used to sanity-check the
/// generator's spread.
pub fn collisions(n: usize, length: usize) -> Result<usize, RoomError> {
    let mut seen = HashSet::with_capacity(n);
    let mut repeats = 0;
    for _ in 0..n {
        if !seen.insert(CodeGenerator::generate(length)?) {
            repeats += 1;
        }
    }
    Ok(repeats)
}
