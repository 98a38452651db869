use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{
    classify, GameClock, IntervalTimer, ObserverId, Season, WeatherDelivery, WeatherMessage,
    WeatherObserver, WeatherRng, WeatherState, WeatherType,
};
use crate::config::weather_data::SeasonalChanceTable;

const THIRD: f32 = 1.0 / 3.0;
const TWO_THIRDS: f32 = 2.0 / 3.0;

// Bands for freshly picked weather
const NEW_BAND_WIDTH: f32 = 0.3333;
const MEDIUM_BAND_BASE: f32 = 0.3334;
const HEAVY_BAND_BASE: f32 = 0.6667;

const MAX_INTENSITY: f32 = 0.9999;
const MIN_ACTIVE_INTENSITY: f32 = 0.0001;

/// Collaborators shared by every zone of a map.
#[derive(Clone)]
pub struct WeatherContext {
    pub delivery: Arc<dyn WeatherDelivery>,
    pub observer: Arc<dyn WeatherObserver>,
    pub clock: Arc<dyn GameClock>,
}

/// Weather of one zone: current type and intensity, evolved on a fixed interval.
///
/// Not meant for concurrent mutation; the owning map loop drives `tick`,
/// `force_weather` and the sync calls.
pub struct ZoneWeather {
    zone_id: u32,
    weather: WeatherType,
    intensity: f32,
    timer: IntervalTimer,
    chances: Option<Arc<SeasonalChanceTable>>,
    rng: Box<dyn WeatherRng>,
    ctx: WeatherContext,
}

impl fmt::Debug for ZoneWeather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneWeather")
            .field("zone_id", &self.zone_id)
            .field("weather", &self.weather)
            .field("intensity", &self.intensity)
            .field("timer", &self.timer)
            .field("has_chances", &self.chances.is_some())
            .finish()
    }
}

impl ZoneWeather {
    pub fn new(
        zone_id: u32,
        chances: Option<Arc<SeasonalChanceTable>>,
        interval_ms: i64,
        rng: Box<dyn WeatherRng>,
        ctx: WeatherContext,
    ) -> Self {
        info!(
            zone_id,
            interval_minutes = interval_ms / 60_000,
            "Starting weather system"
        );
        ZoneWeather {
            zone_id,
            weather: WeatherType::Fine,
            intensity: 0.0,
            timer: IntervalTimer::new(interval_ms),
            chances,
            rng,
            ctx,
        }
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn weather_type(&self) -> WeatherType {
        self.weather
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn state(&self) -> WeatherState {
        classify(self.weather, self.intensity)
    }

    pub fn timer(&self) -> &IntervalTimer {
        &self.timer
    }

    pub fn set_interval(&mut self, interval_ms: i64) {
        self.timer.set_interval(interval_ms);
    }

    /// Advance the change timer. Returns false once nobody is left in the zone
    /// to receive a change; the caller should then drop this object.
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        if self.timer.current() >= 0 {
            self.timer.update(elapsed_ms as i64);
        } else {
            self.timer.set_current(0);
        }

        if self.timer.passed() {
            self.timer.reset();
            if self.regenerate() && !self.update_weather(true) {
                return false;
            }
        }

        let observer = Arc::clone(&self.ctx.observer);
        observer.on_weather_tick(self, elapsed_ms);
        true
    }

    /// Run one step of the transition algorithm. Returns true if type or intensity changed.
    ///
    /// Outcome by percent roll:
    /// - 0-29: nothing happens
    /// - 30-59: active weather gets better, or a new type may be picked
    /// - 60-89: active weather gets worse
    /// - 90-99: radical change
    pub fn regenerate(&mut self) -> bool {
        let Some(chances) = self.chances.clone() else {
            self.weather = WeatherType::Fine;
            self.intensity = 0.0;
            return false;
        };

        let u = self.rng.roll_percent();
        if u < 30 {
            return false;
        }

        let old_weather = self.weather;
        let old_intensity = self.intensity;

        let season = Season::from_day_of_year(self.ctx.clock.day_of_year());
        info!(
            zone_id = self.zone_id,
            season = season.name(),
            "Generating a change in weather"
        );

        // Get fair. Falls through to the checks below.
        if u < 60 && self.intensity < THIRD {
            self.weather = WeatherType::Fine;
            self.intensity = 0.0;
        }

        // Get better
        if u < 60 && self.weather != WeatherType::Fine {
            self.intensity -= THIRD;
            return true;
        }

        // Get worse
        if u < 90 && self.weather != WeatherType::Fine {
            self.intensity += THIRD;
            return true;
        }

        if self.weather != WeatherType::Fine {
            // Radical change: light goes heavy, heavy may drop to light, the rest clears up
            if self.intensity < THIRD {
                self.intensity = MAX_INTENSITY;
                return true;
            }
            if self.intensity > TWO_THIRDS && self.rng.roll_percent() < 50 {
                self.intensity -= TWO_THIRDS;
                return true;
            }
            self.weather = WeatherType::Fine;
            self.intensity = 0.0;
        }

        // Only zones without an active effect reach this point
        let row = chances.season(season);
        let chance1 = row.rain;
        let chance2 = chance1 + row.snow;
        let chance3 = chance2 + row.storm;

        let rnd = self.rng.roll_chance();
        self.weather = if rnd <= chance1 {
            WeatherType::Rain
        } else if rnd <= chance2 {
            WeatherType::Snow
        } else if rnd <= chance3 {
            WeatherType::Storm
        } else {
            WeatherType::Fine
        };

        self.intensity = if self.weather == WeatherType::Fine {
            0.0
        } else if u < 90 {
            self.rng.normal().abs() * NEW_BAND_WIDTH
        } else if self.rng.roll_percent() < 50 {
            self.rng.normal().abs() * NEW_BAND_WIDTH + MEDIUM_BAND_BASE
        } else {
            self.rng.normal().abs() * NEW_BAND_WIDTH + HEAVY_BAND_BASE
        };

        self.weather != old_weather || self.intensity != old_intensity
    }

    /// Send the current weather to everyone in the zone.
    /// Returns false when nobody received it.
    pub fn update_weather(&mut self, trigger_observers: bool) -> bool {
        if self.intensity >= 1.0 {
            self.intensity = MAX_INTENSITY;
        } else if self.intensity < 0.0
            || (self.intensity == 0.0 && self.weather != WeatherType::Fine)
        {
            self.intensity = MIN_ACTIVE_INTENSITY;
        }

        let state = self.state();
        let message = WeatherMessage::new(state, self.intensity);
        if self.ctx.delivery.send_to_zone(self.zone_id, &message) == 0 {
            return false;
        }

        info!(
            zone_id = self.zone_id,
            state = state.name(),
            intensity = self.intensity,
            "Change the weather of zone"
        );

        if trigger_observers {
            let observer = Arc::clone(&self.ctx.observer);
            observer.on_weather_change(self, state, self.intensity);
        }
        true
    }

    /// Set the weather directly, bypassing the transition algorithm, and broadcast it.
    /// Does nothing if the weather is already exactly this. Returns whether a broadcast
    /// reached anyone.
    pub fn force_weather(
        &mut self,
        weather: WeatherType,
        intensity: f32,
        trigger_observers: bool,
    ) -> bool {
        if self.weather == weather && self.intensity == intensity {
            return false;
        }

        self.weather = weather;
        self.intensity = intensity;
        self.update_weather(trigger_observers)
    }

    /// Tell one observer the current weather, outside the zone broadcast.
    pub fn send_weather_update_to(&self, observer: ObserverId) {
        let message = WeatherMessage::new(self.state(), self.intensity);
        self.ctx.delivery.send_to_one(observer, &message);
    }

    /// Tell one observer there is no weather, whatever the zone is doing.
    pub fn send_fine_weather_update_to(&self, observer: ObserverId) {
        self.ctx.delivery.send_to_one(observer, &WeatherMessage::fine());
    }
}
