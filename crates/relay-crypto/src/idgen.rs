//! Random hex identifier generation (Section 4.2).

use rand::RngCore;

/// Generates a lowercase hex string of length `n_bytes * 2`, drawn from a
/// cryptographically secure random source. Collisions on insert are the
/// repository's problem (`Conflict`), not this function's.
pub fn generate_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_the_requested_length() {
        let id = generate_hex(20);
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn is_not_constant() {
        let a = generate_hex(20);
        let b = generate_hex(20);
        assert_ne!(a, b);
    }
}
