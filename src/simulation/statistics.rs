use std::collections::HashMap;

use crate::weather::WeatherState;

/// Intensity band of a broadcast state, for states that have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Light,
    Medium,
    Heavy,
}

impl Band {
    pub fn of(state: WeatherState) -> Option<Band> {
        match state {
            WeatherState::LightRain | WeatherState::LightSnow | WeatherState::LightSandstorm => {
                Some(Band::Light)
            }
            WeatherState::MediumRain | WeatherState::MediumSnow | WeatherState::MediumSandstorm => {
                Some(Band::Medium)
            }
            WeatherState::HeavyRain | WeatherState::HeavySnow | WeatherState::HeavySandstorm => {
                Some(Band::Heavy)
            }
            _ => None,
        }
    }
}

/// Aggregate of an offline run, for checking the long-run weather mix.
#[derive(Debug, Clone, Default)]
pub struct CycleStatistics {
    pub cycles: u32,
    pub changes: u32,
    pub state_counts: HashMap<WeatherState, u32>,
    pub band_counts: HashMap<Band, u32>,
}

impl CycleStatistics {
    pub fn record_cycle(&mut self) {
        self.cycles += 1;
    }

    /// Record a broadcast change.
    pub fn record_change(&mut self, state: WeatherState) {
        self.changes += 1;
        *self.state_counts.entry(state).or_insert(0) += 1;
        if let Some(band) = Band::of(state) {
            *self.band_counts.entry(band).or_insert(0) += 1;
        }
    }

    /// Share of a band among banded changes, 0.0 when there were none.
    pub fn band_share(&self, band: Band) -> f32 {
        let total: u32 = self.band_counts.values().sum();
        if total == 0 {
            return 0.0;
        }
        *self.band_counts.get(&band).unwrap_or(&0) as f32 / total as f32
    }

    /// Fraction of cycles that produced a change.
    pub fn change_rate(&self) -> f32 {
        if self.cycles == 0 {
            return 0.0;
        }
        self.changes as f32 / self.cycles as f32
    }

    /// States sorted by count, most frequent first.
    pub fn sorted_states(&self) -> Vec<(WeatherState, u32)> {
        let mut sorted: Vec<_> = self.state_counts.iter().map(|(s, c)| (*s, *c)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id().cmp(&b.0.id())));
        sorted
    }
}
