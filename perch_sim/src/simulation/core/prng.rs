// perch_sim/src/simulation/core/prng.rs

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// A newtype wrapper around `ChaCha8Rng`.
/// This is the central, deterministic pseudo-random number generator for the simulation.
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    /// Seeded runs are reproducible; `None` draws a seed from the OS.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => {
                info!("Simulation RNG seeded with {}", seed);
                Self(ChaCha8Rng::seed_from_u64(seed))
            }
            None => {
                info!("Simulation RNG seeded from OS entropy");
                Self(ChaCha8Rng::from_entropy())
            }
        }
    }
}
