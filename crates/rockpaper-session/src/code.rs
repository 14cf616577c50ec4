//! Room and friend code generation.

use rand::Rng;
use rockpaper_protocol::CODE_ALPHABET;

/// Draws `len` symbols independently and uniformly from [`CODE_ALPHABET`].
///
/// No uniqueness guarantee: two calls can return the same code. Callers
/// that need a free code check it against the store and retry.
pub fn generate(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
