//! Short code generation strategies.

use rand::Rng;

use crate::{CodeGenerator, ShortCode};

/// The 62 characters random codes are drawn from.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated codes unless configured otherwise.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Draws each character independently and uniformly from [`ALPHABET`].
///
/// Not cryptographically secure; uniqueness comes from the existence check in
/// the service, not from entropy.
#[derive(Clone, Copy, Debug)]
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> ShortCode {
        let mut rng = rand::thread_rng();
        let code: String = (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn alphabet_is_62_distinct_alphanumerics() {
        let unique: HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(unique.len(), 62);
        assert!(ALPHABET.iter().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn default_codes_are_six_alphanumerics() {
        let g = RandomCodeGenerator::default();
        for _ in 0..200 {
            let code = g.next_code();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn honors_configured_length() {
        let g = RandomCodeGenerator::new(10);
        assert_eq!(g.length(), 10);
        assert_eq!(g.next_code().as_str().len(), g.length());
        assert_eq!(RandomCodeGenerator::default().length(), DEFAULT_CODE_LENGTH);
    }

    #[test]
    fn codes_vary() {
        let g = RandomCodeGenerator::default();
        let seen: HashSet<_> = (0..100).map(|_| g.next_code()).collect();
        // 62^6 space; 100 draws colliding down to a handful would mean a broken RNG
        assert!(seen.len() > 95);
    }
}
