//! State Hashing for Verification
//!
//! Deterministic digests of replicated state, so the server and every client
//! can confirm they hold the same placement graph after replaying the same
//! accepted records.

use sha2::{Sha256, Digest};
use super::grid::GridPos;
use super::vec2::Vec2;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for replicated state.
///
/// Wraps SHA-256 with helpers for grid and vector types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for the placement graph.
    pub fn for_placement_graph() -> Self {
        Self::new(b"GIZMO_PARTY_PLACEMENT_V1")
    }

    /// Create hasher for body states.
    pub fn for_bodies() -> Self {
        Self::new(b"GIZMO_PARTY_BODIES_V1")
    }

    /// Update with a length-prefixed string.
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a grid cell.
    #[inline]
    pub fn update_grid(&mut self, pos: GridPos) {
        self.update_i32(pos.x);
        self.update_i32(pos.y);
    }

    /// Update with a float vector (bit pattern, so -0.0 and 0.0 differ).
    #[inline]
    pub fn update_vec2(&mut self, value: Vec2) {
        self.update_u32(value.x.to_bits());
        self.update_u32(value.y.to_bits());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Short hex prefix of a hash for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_placement_graph();
            hasher.update_u32(100);
            hasher.update_grid(GridPos::new(3, -2));
            hasher.update_vec2(Vec2::new(1.0, 2.0));
            hasher.update_str("glue");
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_grid(GridPos::new(1, 2));
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_grid(GridPos::new(2, 1));
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let hash = |domain: &[u8]| {
            let mut h = StateHasher::new(domain);
            h.update_str("block");
            h.finalize()
        };

        assert_ne!(hash(b"DOMAIN_A"), hash(b"DOMAIN_B"));
        assert_ne!(StateHasher::for_bodies().finalize(), StateHasher::for_placement_graph().finalize());
    }

    #[test]
    fn test_strings_are_length_prefixed() {
        let hash = |parts: &[&str]| {
            let mut h = StateHasher::new(b"test");
            for part in parts {
                h.update_str(part);
            }
            h.finalize()
        };

        assert_ne!(hash(&["ab", "c"]), hash(&["a", "bc"]));
    }

    #[test]
    fn test_short_hex() {
        let hash = StateHasher::new(b"x").finalize();
        assert_eq!(short_hex(&hash).len(), 12);
    }
}
