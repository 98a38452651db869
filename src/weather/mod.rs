pub mod calendar;
pub mod cycle;
pub mod observer;
pub mod random;
pub mod state;
pub mod timer;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use calendar::{GameClock, ManualClock, SystemClock};
pub use cycle::{WeatherContext, ZoneWeather};
pub use observer::{NoopObserver, WeatherObserver};
pub use random::{SeededRng, WeatherRng};
pub use state::{classify, WeatherState};
pub use timer::IntervalTimer;

/// Identifier of a client that can receive weather messages.
pub type ObserverId = Uuid;

// === Enums ===

/// Category of active precipitation or effect in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherType {
    Fine,
    Rain,
    Snow,
    Storm,
    Thunders,
    BlackRain,
}

impl WeatherType {
    /// Numeric id used by clients.
    pub fn id(self) -> u32 {
        match self {
            WeatherType::Fine => 0,
            WeatherType::Rain => 1,
            WeatherType::Snow => 2,
            WeatherType::Storm => 3,
            WeatherType::Thunders => 86,
            WeatherType::BlackRain => 90,
        }
    }

    pub fn from_id(id: u32) -> Option<WeatherType> {
        match id {
            0 => Some(WeatherType::Fine),
            1 => Some(WeatherType::Rain),
            2 => Some(WeatherType::Snow),
            3 => Some(WeatherType::Storm),
            86 => Some(WeatherType::Thunders),
            90 => Some(WeatherType::BlackRain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Season for a zero-based day of the year.
    ///
    /// Spring starts 78 days after January 1st and every season lasts 91 days.
    pub fn from_day_of_year(day_of_year: u32) -> Season {
        let bucket = ((day_of_year as i64 - 78 + 365) / 91) % 4;
        Season::ALL[bucket as usize]
    }

    pub fn index(self) -> usize {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Fall => 2,
            Season::Winter => 3,
        }
    }

    pub fn next(self) -> Season {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Fall,
            Season::Fall => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }
}

// === Delivery ===

/// Payload sent to clients: the classified state plus the raw intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherMessage {
    pub state: WeatherState,
    pub intensity: f32,
}

impl WeatherMessage {
    pub fn new(state: WeatherState, intensity: f32) -> Self {
        WeatherMessage { state, intensity }
    }

    /// The canonical "no weather" message.
    pub fn fine() -> Self {
        WeatherMessage {
            state: WeatherState::Fine,
            intensity: 0.0,
        }
    }
}

/// Transport that delivers weather messages to clients.
pub trait WeatherDelivery: Send + Sync {
    /// Send to every observer currently in the zone. Returns the number of recipients.
    fn send_to_zone(&self, zone_id: u32, message: &WeatherMessage) -> usize;

    fn send_to_one(&self, observer: ObserverId, message: &WeatherMessage);
}

#[cfg(test)]
pub mod testing {
    //! Scripted collaborators shared by tests across the crate.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays fixed draws. Panics when a queue runs dry so tests notice extra draws.
    #[derive(Debug, Default)]
    pub struct ScriptedRng {
        pub percents: VecDeque<u32>,
        pub chances: VecDeque<u32>,
        pub normals: VecDeque<f32>,
    }

    impl ScriptedRng {
        pub fn new(percents: &[u32], chances: &[u32], normals: &[f32]) -> Self {
            ScriptedRng {
                percents: percents.iter().copied().collect(),
                chances: chances.iter().copied().collect(),
                normals: normals.iter().copied().collect(),
            }
        }
    }

    impl WeatherRng for ScriptedRng {
        fn roll_percent(&mut self) -> u32 {
            self.percents.pop_front().expect("scripted percent roll exhausted")
        }

        fn roll_chance(&mut self) -> u32 {
            self.chances.pop_front().expect("scripted chance roll exhausted")
        }

        fn normal(&mut self) -> f32 {
            self.normals.pop_front().expect("scripted normal draw exhausted")
        }
    }

    /// Records every message and reports a fixed recipient count for zone sends.
    #[derive(Debug)]
    pub struct RecordingDelivery {
        pub recipients: usize,
        pub zone_messages: Mutex<Vec<(u32, WeatherMessage)>>,
        pub direct_messages: Mutex<Vec<(ObserverId, WeatherMessage)>>,
    }

    impl RecordingDelivery {
        pub fn with_recipients(recipients: usize) -> Self {
            RecordingDelivery {
                recipients,
                zone_messages: Mutex::new(Vec::new()),
                direct_messages: Mutex::new(Vec::new()),
            }
        }

        pub fn zone_messages(&self) -> Vec<(u32, WeatherMessage)> {
            self.zone_messages.lock().unwrap().clone()
        }

        pub fn direct_messages(&self) -> Vec<(ObserverId, WeatherMessage)> {
            self.direct_messages.lock().unwrap().clone()
        }
    }

    impl WeatherDelivery for RecordingDelivery {
        fn send_to_zone(&self, zone_id: u32, message: &WeatherMessage) -> usize {
            self.zone_messages.lock().unwrap().push((zone_id, *message));
            self.recipients
        }

        fn send_to_one(&self, observer: ObserverId, message: &WeatherMessage) {
            self.direct_messages.lock().unwrap().push((observer, *message));
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub ticks: Mutex<Vec<(u32, u32)>>,
        pub changes: Mutex<Vec<(u32, WeatherState, f32)>>,
    }

    impl RecordingObserver {
        pub fn tick_count(&self) -> usize {
            self.ticks.lock().unwrap().len()
        }

        pub fn changes(&self) -> Vec<(u32, WeatherState, f32)> {
            self.changes.lock().unwrap().clone()
        }
    }

    impl WeatherObserver for RecordingObserver {
        fn on_weather_tick(&self, zone: &ZoneWeather, elapsed_ms: u32) {
            self.ticks.lock().unwrap().push((zone.zone_id(), elapsed_ms));
        }

        fn on_weather_change(&self, zone: &ZoneWeather, state: WeatherState, intensity: f32) {
            self.changes
                .lock()
                .unwrap()
                .push((zone.zone_id(), state, intensity));
        }
    }
}
