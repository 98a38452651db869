use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::weather::Season;

/// Percentage chances of each weather type for one season. The remainder is fine weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeasonChances {
    #[serde(default)]
    pub rain: u32,
    #[serde(default)]
    pub snow: u32,
    #[serde(default)]
    pub storm: u32,
}

impl SeasonChances {
    pub fn new(rain: u32, snow: u32, storm: u32) -> Self {
        SeasonChances { rain, snow, storm }
    }

    fn validate(&self, zone_id: u32, season: Season, errors: &mut Vec<String>) {
        for (name, value) in [("rain", self.rain), ("snow", self.snow), ("storm", self.storm)] {
            if value > 100 {
                errors.push(format!(
                    "zone {}: {}.{} must be 0-100, got {}",
                    zone_id,
                    season.name(),
                    name,
                    value
                ));
            }
        }
        let total = self.rain as u64 + self.snow as u64 + self.storm as u64;
        if total > 100 {
            errors.push(format!(
                "zone {}: {} chances sum to {}, must not exceed 100",
                zone_id,
                season.name(),
                total
            ));
        }
    }
}

/// Immutable per-season chance table shared by every weather object of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeasonalChanceTable {
    seasons: [SeasonChances; 4],
}

impl SeasonalChanceTable {
    pub fn new(
        spring: SeasonChances,
        summer: SeasonChances,
        fall: SeasonChances,
        winter: SeasonChances,
    ) -> Self {
        SeasonalChanceTable {
            seasons: [spring, summer, fall, winter],
        }
    }

    /// Same chances all year round.
    pub fn uniform(chances: SeasonChances) -> Self {
        SeasonalChanceTable {
            seasons: [chances; 4],
        }
    }

    pub fn season(&self, season: Season) -> &SeasonChances {
        &self.seasons[season.index()]
    }

    pub fn validate(&self, zone_id: u32) -> Result<(), String> {
        let mut errors = Vec::new();
        for season in Season::ALL {
            self.season(season).validate(zone_id, season, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    zone_id: u32,
    #[serde(default)]
    spring: SeasonChances,
    #[serde(default)]
    summer: SeasonChances,
    #[serde(default)]
    fall: SeasonChances,
    #[serde(default)]
    winter: SeasonChances,
}

#[derive(Debug, Deserialize)]
struct WeatherDataFile {
    #[serde(default, rename = "zone")]
    zones: Vec<ZoneEntry>,
}

/// Every zone that has weather configured, keyed by zone id.
#[derive(Debug, Clone, Default)]
pub struct WeatherDataSet {
    zones: HashMap<u32, Arc<SeasonalChanceTable>>,
}

impl WeatherDataSet {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    /// Parse and validate. All violations are reported together.
    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let file: WeatherDataFile =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;

        let mut errors = Vec::new();
        let mut zones = HashMap::new();
        for entry in file.zones {
            let table =
                SeasonalChanceTable::new(entry.spring, entry.summer, entry.fall, entry.winter);
            if let Err(e) = table.validate(entry.zone_id) {
                errors.push(e);
                continue;
            }
            if zones.insert(entry.zone_id, Arc::new(table)).is_some() {
                errors.push(format!("zone {} is defined more than once", entry.zone_id));
            }
        }

        if errors.is_empty() {
            Ok(WeatherDataSet { zones })
        } else {
            Err(format!("{}:\n{}", source_path.display(), errors.join("\n")))
        }
    }

    /// Add a zone after validating its table.
    pub fn insert(&mut self, zone_id: u32, table: SeasonalChanceTable) -> Result<(), String> {
        table.validate(zone_id)?;
        self.zones.insert(zone_id, Arc::new(table));
        Ok(())
    }

    pub fn chances(&self, zone_id: u32) -> Option<Arc<SeasonalChanceTable>> {
        self.zones.get(&zone_id).cloned()
    }

    /// Zone ids in ascending order.
    pub fn zone_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.zones.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
