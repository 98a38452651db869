pub mod statistics;

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::weather_data::WeatherDataSet;
use crate::weather::{
    GameClock, ManualClock, NoopObserver, ObserverId, Season, SeededRng, WeatherContext,
    WeatherDelivery, WeatherMessage, WeatherState, WeatherType, ZoneWeather,
};
use statistics::CycleStatistics;

/// Parameters of an offline run for a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    pub zone_id: u32,
    pub cycles: u32,
    /// Zero-based day of the year the run starts on.
    pub start_day: u32,
    /// Calendar days that pass between two weather changes.
    pub days_per_cycle: u32,
    pub seed: u64,
}

/// Outcome of one regenerate interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    pub cycle: u32,
    pub day_of_year: u32,
    pub season: Season,
    pub weather: WeatherType,
    pub intensity: f32,
    pub state: WeatherState,
    /// Set when the cycle broadcast a change.
    pub broadcast: Option<WeatherMessage>,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub options: SimulationOptions,
    pub records: Vec<CycleRecord>,
    pub statistics: CycleStatistics,
}

/// A single virtual observer standing in the zone, keeping the last message it saw.
#[derive(Debug, Default)]
struct VirtualObserver {
    last: Mutex<Option<WeatherMessage>>,
}

impl VirtualObserver {
    fn take(&self) -> Option<WeatherMessage> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl WeatherDelivery for VirtualObserver {
    fn send_to_zone(&self, _zone_id: u32, message: &WeatherMessage) -> usize {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(*message);
        1
    }

    fn send_to_one(&self, _observer: ObserverId, message: &WeatherMessage) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(*message);
    }
}

const MAX_PREALLOCATED_RECORDS: u32 = 4096;

// Cycle counts come from the command line; larger runs grow the Vec as they go
fn record_capacity(cycles: u32) -> usize {
    cycles.min(MAX_PREALLOCATED_RECORDS) as usize
}

/// Run a zone's weather cycle offline with a manual calendar.
pub fn run_cycles(
    data: &WeatherDataSet,
    options: SimulationOptions,
) -> Result<SimulationReport, String> {
    let chances = data
        .chances(options.zone_id)
        .ok_or_else(|| format!("Zone {} has no weather data", options.zone_id))?;

    let delivery = Arc::new(VirtualObserver::default());
    let clock = Arc::new(ManualClock::new(options.start_day));
    let ctx = WeatherContext {
        delivery: delivery.clone(),
        observer: Arc::new(NoopObserver),
        clock: clock.clone(),
    };
    // One millisecond interval: every tick is a regenerate
    let mut zone = ZoneWeather::new(
        options.zone_id,
        Some(chances),
        1,
        Box::new(SeededRng::for_zone(options.seed, options.zone_id)),
        ctx,
    );

    let mut records = Vec::with_capacity(record_capacity(options.cycles));
    let mut statistics = CycleStatistics::default();

    for cycle in 0..options.cycles {
        if cycle > 0 {
            clock.advance_days(options.days_per_cycle);
        }
        zone.tick(1);
        statistics.record_cycle();

        let broadcast = delivery.take();
        if let Some(message) = broadcast {
            statistics.record_change(message.state);
        }

        records.push(CycleRecord {
            cycle,
            day_of_year: clock.day_of_year(),
            season: clock.season(),
            weather: zone.weather_type(),
            intensity: zone.intensity(),
            state: zone.state(),
            broadcast,
        });
    }

    Ok(SimulationReport {
        options,
        records,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::weather_data::{SeasonChances, SeasonalChanceTable};
    use statistics::Band;

    fn make_data() -> WeatherDataSet {
        let mut data = WeatherDataSet::default();
        data.insert(
            1,
            SeasonalChanceTable::new(
                SeasonChances::new(40, 0, 0),
                SeasonChances::new(10, 0, 30),
                SeasonChances::new(50, 10, 0),
                SeasonChances::new(10, 60, 0),
            ),
        )
        .unwrap();
        data.insert(2, SeasonalChanceTable::default()).unwrap();
        data
    }

    fn options(zone_id: u32, cycles: u32) -> SimulationOptions {
        SimulationOptions {
            zone_id,
            cycles,
            start_day: 78,
            days_per_cycle: 1,
            seed: 7,
        }
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let err = run_cycles(&make_data(), options(99, 10)).unwrap_err();
        assert!(err.contains("Zone 99"));
    }

    #[test]
    fn one_record_per_cycle_with_advancing_calendar() {
        let report = run_cycles(&make_data(), options(1, 30)).unwrap();
        assert_eq!(report.records.len(), 30);
        assert_eq!(report.statistics.cycles, 30);
        assert_eq!(report.records[0].day_of_year, 78);
        assert_eq!(report.records[0].season, Season::Spring);
        assert_eq!(report.records[29].day_of_year, 107);
    }

    #[test]
    fn zone_with_all_zero_chances_stays_fine() {
        let report = run_cycles(&make_data(), options(2, 200)).unwrap();
        assert!(report.records.iter().all(|r| r.weather == WeatherType::Fine));
        assert_eq!(report.statistics.changes, 0);
    }

    #[test]
    fn broadcasts_are_clamped_and_match_records() {
        let report = run_cycles(&make_data(), options(1, 2000)).unwrap();
        for record in &report.records {
            if let Some(msg) = record.broadcast {
                assert_eq!(msg.state, record.state);
                if record.weather != WeatherType::Fine {
                    assert!(msg.intensity > 0.0 && msg.intensity < 1.0);
                }
            }
        }
        let counted = report.records.iter().filter(|r| r.broadcast.is_some()).count();
        assert_eq!(counted as u32, report.statistics.changes);
    }

    #[test]
    fn low_rolls_leave_about_a_third_of_cycles_unchanged() {
        // Percent rolls below 30 never change anything; fine re-rolls add more
        let report = run_cycles(&make_data(), options(1, 5000)).unwrap();
        let stats = &report.statistics;
        assert!(stats.changes > 0);
        let unchanged = 1.0 - stats.change_rate();
        assert!(unchanged > 0.27, "unchanged share {}", unchanged);
        let banded: u32 = stats.band_counts.values().sum();
        let shares: f32 = [Band::Light, Band::Medium, Band::Heavy]
            .iter()
            .map(|b| stats.band_share(*b))
            .sum();
        if banded > 0 {
            assert!((shares - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn record_preallocation_is_capped() {
        assert_eq!(record_capacity(30), 30);
        assert_eq!(record_capacity(u32::MAX), MAX_PREALLOCATED_RECORDS as usize);
    }

    #[test]
    fn runs_past_the_preallocated_records() {
        let report = run_cycles(&make_data(), options(1, MAX_PREALLOCATED_RECORDS + 10)).unwrap();
        assert_eq!(report.records.len(), MAX_PREALLOCATED_RECORDS as usize + 10);
    }

    #[test]
    fn same_seed_same_run() {
        let a = run_cycles(&make_data(), options(1, 300)).unwrap();
        let b = run_cycles(&make_data(), options(1, 300)).unwrap();
        assert_eq!(a.records, b.records);
    }
}
