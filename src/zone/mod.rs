use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::server::ServerConfig;
use crate::config::weather_data::WeatherDataSet;
use crate::weather::{
    ObserverId, SeededRng, WeatherContext, WeatherMessage, WeatherRng, WeatherType, ZoneWeather,
};

/// Builds the random source for a newly activated zone.
pub type RngFactory = Box<dyn Fn(u32) -> Box<dyn WeatherRng> + Send + Sync>;

/// Timing and seeding shared by every zone of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherSettings {
    pub interval_ms: i64,
    pub seed: u64,
}

impl WeatherSettings {
    /// If the configured seed is 0, a random one is chosen.
    pub fn from_config(config: &ServerConfig) -> Self {
        let seed = if config.seed == 0 {
            rand::thread_rng().r#gen()
        } else {
            config.seed
        };
        WeatherSettings {
            interval_ms: config.weather_change_interval_minutes as i64 * 60_000,
            seed,
        }
    }
}

/// Active weather objects of one map, keyed by zone id.
///
/// A zone's weather is created the first time it is needed and dropped once a
/// change finds nobody left in the zone.
pub struct ZoneWeatherManager {
    data: WeatherDataSet,
    settings: WeatherSettings,
    ctx: WeatherContext,
    rng_factory: RngFactory,
    zones: HashMap<u32, ZoneWeather>,
}

impl fmt::Debug for ZoneWeatherManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneWeatherManager")
            .field("settings", &self.settings)
            .field("configured_zones", &self.data.len())
            .field("zones", &self.zones)
            .finish()
    }
}

impl ZoneWeatherManager {
    pub fn new(data: WeatherDataSet, settings: WeatherSettings, ctx: WeatherContext) -> Self {
        let seed = settings.seed;
        info!(
            configured_zones = data.len(),
            interval_ms = settings.interval_ms,
            seed,
            "Zone weather manager ready"
        );
        ZoneWeatherManager {
            data,
            settings,
            ctx,
            rng_factory: Box::new(move |zone_id| Box::new(SeededRng::for_zone(seed, zone_id))),
            zones: HashMap::new(),
        }
    }

    /// Replace how random sources are built for zones activated from now on.
    pub fn with_rng_factory(mut self, factory: RngFactory) -> Self {
        self.rng_factory = factory;
        self
    }

    pub fn settings(&self) -> WeatherSettings {
        self.settings
    }

    pub fn data(&self) -> &WeatherDataSet {
        &self.data
    }

    pub fn zone(&self, zone_id: u32) -> Option<&ZoneWeather> {
        self.zones.get(&zone_id)
    }

    pub fn active_zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Active weather for the zone, created on demand. None if the zone has no weather data.
    pub fn get_or_create(&mut self, zone_id: u32) -> Option<&mut ZoneWeather> {
        if !self.zones.contains_key(&zone_id) {
            let chances = self.data.chances(zone_id)?;
            let weather = ZoneWeather::new(
                zone_id,
                Some(chances),
                self.settings.interval_ms,
                (self.rng_factory)(zone_id),
                self.ctx.clone(),
            );
            self.zones.insert(zone_id, weather);
        }
        self.zones.get_mut(&zone_id)
    }

    /// Send the zone's current weather to an observer that just arrived there.
    pub fn observer_entered_zone(&mut self, zone_id: u32, observer: ObserverId) {
        if let Some(weather) = self.get_or_create(zone_id) {
            weather.send_weather_update_to(observer);
            return;
        }
        self.ctx
            .delivery
            .send_to_one(observer, &WeatherMessage::fine());
    }

    /// Override a zone's weather. Returns false if the zone has no weather data.
    pub fn force_weather(
        &mut self,
        zone_id: u32,
        weather: WeatherType,
        intensity: f32,
        trigger_observers: bool,
    ) -> bool {
        match self.get_or_create(zone_id) {
            Some(zone) => {
                zone.force_weather(weather, intensity, trigger_observers);
                true
            }
            None => false,
        }
    }

    /// Tick every active zone. Zones are independent, so they run in parallel.
    /// Returns the ids of zones dropped because nobody received their last change.
    pub fn tick(&mut self, elapsed_ms: u32) -> Vec<u32> {
        let mut expired: Vec<u32> = self
            .zones
            .par_iter_mut()
            .filter_map(|(zone_id, weather)| (!weather.tick(elapsed_ms)).then_some(*zone_id))
            .collect();
        expired.sort_unstable();

        for zone_id in &expired {
            self.zones.remove(zone_id);
            debug!(zone_id, "Weather removed, zone is empty");
        }
        expired
    }
}
