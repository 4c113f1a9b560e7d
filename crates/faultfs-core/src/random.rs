//! Random sources for trigger decisions.
//!
//! The engine takes its randomness through the [`RandomSource`] trait so
//! that hosts share one thread-safe generator across all in-flight calls,
//! and tests can substitute a seeded or fully scripted source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A thread-safe source of uniform draws.
///
/// Each call to [`below`](RandomSource::below) is one atomic draw: concurrent
/// callers never observe the same generator state twice.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..bound`.  `bound` is never zero.
    fn below(&self, bound: u32) -> u32;
}

/// ChaCha20 generator behind a mutex.
pub struct SeededRng {
    seed: u64,
    rng: Mutex<ChaCha20Rng>,
}

impl SeededRng {
    /// Deterministic generator: same seed, same draw sequence.
    pub fn from_seed(seed: u64) -> Self {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&seed.to_le_bytes());
        Self {
            seed,
            rng: Mutex::new(ChaCha20Rng::from_seed(key)),
        }
    }

    /// Generator seeded from the wall clock.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::from_seed(nanos)
    }

    /// Seed this generator was built from, for reproducing a run.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRng {
    fn below(&self, bound: u32) -> u32 {
        // A panic while holding the lock cannot leave ChaCha state torn.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..bound)
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRng").field("seed", &self.seed).finish()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
///
/// Values are reduced modulo the requested bound.
#[derive(Debug)]
pub struct ScriptedSource {
    draws: Vec<u32>,
    cursor: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(draws: impl Into<Vec<u32>>) -> Self {
        let mut draws = draws.into();
        if draws.is_empty() {
            draws.push(0);
        }
        Self {
            draws,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of draws taken so far.
    pub fn taken(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for ScriptedSource {
    fn below(&self, bound: u32) -> u32 {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.draws[idx % self.draws.len()] % bound
    }
}
