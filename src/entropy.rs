//! Seedable randomness for user-agent and proxy picks.
//!
//! Jobs receive an [`Entropy`] instead of reaching for a thread-local
//! generator so that a fixed seed reproduces the same sequence of picks.
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct Entropy {
    rng: Mutex<StdRng>,
}

impl Entropy {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    #[must_use]
    pub fn from_os() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates an independent generator seeded from this one.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::from_seed(self.with_rng(|rng| rng.r#gen()))
    }

    /// Uniformly picks one element, `None` when `items` is empty.
    pub fn choose<'items, T>(&self, items: &'items [T]) -> Option<&'items T> {
        self.with_rng(|rng| items.choose(rng))
    }

    #[must_use]
    pub fn uuid(&self) -> String {
        uuid_from_bytes(self.with_rng(|rng| rng.r#gen()))
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::from_os()
    }
}

/// Formats 16 random bytes as a version 4 UUID.
pub(crate) fn uuid_from_bytes(mut bytes: [u8; 16]) -> String {
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let mut out = String::with_capacity(36);
    for (idx, byte) in bytes.iter().enumerate() {
        if matches!(idx, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        for nibble in [byte >> 4, byte & 0x0f] {
            out.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
        }
    }
    out
}
