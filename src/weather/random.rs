use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Randomness consumed by the weather transition algorithm.
pub trait WeatherRng: Send {
    /// Uniform integer in [0, 99].
    fn roll_percent(&mut self) -> u32;

    /// Uniform integer in [1, 100].
    fn roll_chance(&mut self) -> u32;

    /// Standard normal draw (mean 0, unit variance).
    fn normal(&mut self) -> f32;
}

/// Production random source backed by a seeded ChaCha stream.
#[derive(Debug, Clone)]
pub struct SeededRng {
    rng: ChaCha8Rng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        SeededRng {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Deterministic per-zone seed so zones of one world never share a stream.
    pub fn for_zone(world_seed: u64, zone_id: u32) -> Self {
        let seed = world_seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(zone_id as u64)
            .wrapping_mul(1442695040888963407);
        SeededRng::new(seed)
    }
}

impl WeatherRng for SeededRng {
    fn roll_percent(&mut self) -> u32 {
        self.rng.gen_range(0..100)
    }

    fn roll_chance(&mut self) -> u32 {
        self.rng.gen_range(1..=100)
    }

    fn normal(&mut self) -> f32 {
        self.rng.sample(StandardNormal)
    }
}
