use super::{WeatherState, ZoneWeather};

/// Hooks invoked by a zone's weather cycle. Purely advisory.
pub trait WeatherObserver: Send + Sync {
    /// Called after every tick of a zone that is still active.
    fn on_weather_tick(&self, _zone: &ZoneWeather, _elapsed_ms: u32) {}

    /// Called after a change was delivered to the zone.
    fn on_weather_change(&self, _zone: &ZoneWeather, _state: WeatherState, _intensity: f32) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WeatherObserver for NoopObserver {}
