//! Deterministic RNG streams segregated by simulation domain.
//!
//! Each stream is seeded from the user-visible session seed through
//! HMAC-SHA256 domain separation, so nightly scheduling, zone rolls, and
//! reaction sequences advance independently: drawing from one stream never
//! perturbs another, and replays with the same seed reproduce the same night.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;
use std::cell::{RefCell, RefMut};

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Deterministic bundle of RNG streams segregated by simulation domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    nightly: RefCell<CountingRng<SmallRng>>,
    zone: RefCell<CountingRng<SmallRng>>,
    reaction: RefCell<CountingRng<SmallRng>>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            nightly: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"nightly"))),
            zone: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"zone"))),
            reaction: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"reaction"))),
        }
    }

    /// Stream driving the nightly shuffle and variant picks.
    #[must_use]
    pub fn nightly(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.nightly.borrow_mut()
    }

    /// Stream driving zone probability rolls and zone-spawned picks.
    #[must_use]
    pub fn zone(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.zone.borrow_mut()
    }

    /// Stream driving reaction-sequence generation.
    #[must_use]
    pub fn reaction(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.reaction.borrow_mut()
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    #[test]
    fn streams_are_domain_separated() {
        let bundle = RngBundle::from_user_seed(0xBEEF);
        let a: u64 = bundle.nightly().next_u64();
        let b: u64 = bundle.zone().next_u64();
        let c: u64 = bundle.reaction().next_u64();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn same_seed_replays_identical_draws() {
        let first = RngBundle::from_user_seed(99);
        let second = RngBundle::from_user_seed(99);
        for _ in 0..16 {
            assert_eq!(first.nightly().next_u64(), second.nightly().next_u64());
            assert_eq!(first.zone().next_u64(), second.zone().next_u64());
        }
    }

    #[test]
    fn draws_are_counted_per_stream() {
        let bundle = RngBundle::from_user_seed(1);
        {
            let mut nightly = bundle.nightly();
            let _ = nightly.gen_range(0..10);
            let _ = nightly.gen_range(0..10);
        }
        assert!(bundle.nightly().draws() >= 2);
        assert_eq!(bundle.zone().draws(), 0);
    }
}
