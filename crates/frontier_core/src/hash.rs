//! Tick hash: a splitmix64-style mix folded over every field of the world.
//!
//! The fold order is part of the determinism contract. Adding, removing or
//! reordering a field changes every hash and requires regenerating golden
//! values.

/// Starting value of every tick hash.
pub const HASH_SEED: u64 = 0xCAFE_BABE_DEAD_BEEF;

/// Entries kept in the recent-hash ring.
pub const HASH_RING_SIZE: usize = 512;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// The splitmix64 finalizer.
#[must_use]
pub const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Streaming hasher over 32-bit words.
///
/// # Example
///
/// ```
/// use frontier_core::hash::TickHasher;
///
/// let mut a = TickHasher::new();
/// a.add_i32(7);
/// let mut b = TickHasher::new();
/// b.add_i32(7);
/// assert_eq!(a.finish(), b.finish());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHasher {
    state: u64,
}

impl Default for TickHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TickHasher {
    /// Hasher at the seed value.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: HASH_SEED }
    }

    /// Fold one 32-bit word.
    pub fn add_u32(&mut self, value: u32) {
        self.state ^= mix64(u64::from(value).wrapping_add(GOLDEN_GAMMA));
        self.state = self.state.rotate_left(13);
    }

    /// Fold a signed 32-bit word.
    pub fn add_i32(&mut self, value: i32) {
        self.add_u32(value as u32);
    }

    /// Fold a 64-bit value as two words, low first.
    pub fn add_u64(&mut self, value: u64) {
        self.add_u32(value as u32);
        self.add_u32((value >> 32) as u32);
    }

    /// Fold a flag as 0 or 1.
    pub fn add_bool(&mut self, value: bool) {
        self.add_u32(u32::from(value));
    }

    /// Fold an optional id, using `u32::MAX` for `None`.
    pub fn add_opt_u32(&mut self, value: Option<u32>) {
        self.add_u32(value.unwrap_or(u32::MAX));
    }

    /// Current hash value.
    #[must_use]
    pub const fn finish(&self) -> u64 {
        self.state
    }
}

/// Fixed-size ring of `(tick, hash)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRing {
    entries: Vec<(u64, u64)>,
    head: usize,
    len: usize,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HashRing {
    /// Empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![(0, 0); HASH_RING_SIZE],
            head: 0,
            len: 0,
        }
    }

    /// Record the hash of a tick, overwriting the oldest entry when full.
    pub fn push(&mut self, tick: u64, hash: u64) {
        self.entries[self.head] = (tick, hash);
        self.head = (self.head + 1) % HASH_RING_SIZE;
        self.len = (self.len + 1).min(HASH_RING_SIZE);
    }

    /// Up to `max` entries, newest first.
    #[must_use]
    pub fn recent(&self, max: usize) -> Vec<(u64, u64)> {
        let count = max.min(self.len);
        (0..count)
            .map(|i| {
                let idx = (self.head + HASH_RING_SIZE - 1 - i) % HASH_RING_SIZE;
                self.entries[idx]
            })
            .collect()
    }

    /// Hash recorded for `tick`, if still in the ring.
    #[must_use]
    pub fn at_tick(&self, tick: u64) -> Option<u64> {
        self.recent(self.len)
            .into_iter()
            .find(|(t, _)| *t == tick)
            .map(|(_, h)| h)
    }

    /// Forget every entry newer than `tick`.
    pub fn truncate_after(&mut self, tick: u64) {
        while self.len > 0 {
            let newest = (self.head + HASH_RING_SIZE - 1) % HASH_RING_SIZE;
            if self.entries[newest].0 <= tick {
                break;
            }
            self.head = newest;
            self.len -= 1;
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix64_reference_values() {
        assert_eq!(mix64(0), 0);
        assert_eq!(mix64(GOLDEN_GAMMA), 0xE220_A839_7B1D_CDAF);
    }

    #[test]
    fn test_order_sensitivity() {
        let mut a = TickHasher::new();
        a.add_i32(1);
        a.add_i32(2);
        let mut b = TickHasher::new();
        b.add_i32(2);
        b.add_i32(1);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_ring_recent_newest_first() {
        let mut ring = HashRing::new();
        for tick in 1..=5 {
            ring.push(tick, tick * 10);
        }
        assert_eq!(ring.recent(2), vec![(5, 50), (4, 40)]);
        assert_eq!(ring.at_tick(3), Some(30));
        assert_eq!(ring.at_tick(9), None);
    }

    #[test]
    fn test_ring_wraps() {
        let mut ring = HashRing::new();
        for tick in 0..(HASH_RING_SIZE as u64 + 10) {
            ring.push(tick, tick);
        }
        assert_eq!(ring.len(), HASH_RING_SIZE);
        assert_eq!(ring.at_tick(5), None);
        assert_eq!(ring.at_tick(HASH_RING_SIZE as u64 + 9), Some(HASH_RING_SIZE as u64 + 9));
    }

    #[test]
    fn test_truncate_after() {
        let mut ring = HashRing::new();
        for tick in 1..=10 {
            ring.push(tick, tick);
        }
        ring.truncate_after(6);
        assert_eq!(ring.recent(1), vec![(6, 6)]);
        assert_eq!(ring.len(), 6);
    }
}
