use serde::{Deserialize, Serialize};

use super::WeatherType;

/// Below this intensity every weather type presents as fine.
pub const VISIBLE_THRESHOLD: f32 = 0.27;
pub const MEDIUM_THRESHOLD: f32 = 0.40;
pub const HEAVY_THRESHOLD: f32 = 0.70;

/// Client-facing presentation of a zone's weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherState {
    Fine,
    Fog,
    LightRain,
    MediumRain,
    HeavyRain,
    LightSnow,
    MediumSnow,
    HeavySnow,
    LightSandstorm,
    MediumSandstorm,
    HeavySandstorm,
    Thunders,
    BlackRain,
}

impl WeatherState {
    /// Numeric id understood by clients.
    pub fn id(self) -> u32 {
        match self {
            WeatherState::Fine => 0,
            WeatherState::Fog => 1,
            WeatherState::LightRain => 3,
            WeatherState::MediumRain => 4,
            WeatherState::HeavyRain => 5,
            WeatherState::LightSnow => 6,
            WeatherState::MediumSnow => 7,
            WeatherState::HeavySnow => 8,
            WeatherState::LightSandstorm => 22,
            WeatherState::MediumSandstorm => 41,
            WeatherState::HeavySandstorm => 42,
            WeatherState::Thunders => 86,
            WeatherState::BlackRain => 90,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WeatherState::Fine => "fine",
            WeatherState::Fog => "fog",
            WeatherState::LightRain => "light rain",
            WeatherState::MediumRain => "medium rain",
            WeatherState::HeavyRain => "heavy rain",
            WeatherState::LightSnow => "light snow",
            WeatherState::MediumSnow => "medium snow",
            WeatherState::HeavySnow => "heavy snow",
            WeatherState::LightSandstorm => "light sandstorm",
            WeatherState::MediumSandstorm => "medium sandstorm",
            WeatherState::HeavySandstorm => "heavy sandstorm",
            WeatherState::Thunders => "thunders",
            WeatherState::BlackRain => "blackrain",
        }
    }
}

/// Map a weather type and intensity to the state shown to clients.
pub fn classify(weather: WeatherType, intensity: f32) -> WeatherState {
    if intensity < VISIBLE_THRESHOLD {
        return WeatherState::Fine;
    }

    let banded = |light, medium, heavy| {
        if intensity < MEDIUM_THRESHOLD {
            light
        } else if intensity < HEAVY_THRESHOLD {
            medium
        } else {
            heavy
        }
    };

    match weather {
        WeatherType::Rain => banded(
            WeatherState::LightRain,
            WeatherState::MediumRain,
            WeatherState::HeavyRain,
        ),
        WeatherType::Snow => banded(
            WeatherState::LightSnow,
            WeatherState::MediumSnow,
            WeatherState::HeavySnow,
        ),
        WeatherType::Storm => banded(
            WeatherState::LightSandstorm,
            WeatherState::MediumSandstorm,
            WeatherState::HeavySandstorm,
        ),
        WeatherType::BlackRain => WeatherState::BlackRain,
        WeatherType::Thunders => WeatherState::Thunders,
        WeatherType::Fine => WeatherState::Fine,
    }
}
