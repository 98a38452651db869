use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::{ServerConfig, WeatherDataSet};
use crate::server::{self, ChangeCounter, ServerState, ZoneCommand, ZoneHub};
use crate::simulation::statistics::Band;
use crate::simulation::{self, SimulationOptions};
use crate::weather::{GameClock, Season, SystemClock, WeatherContext};
use crate::zone::{WeatherSettings, ZoneWeatherManager};

fn load_weather_data(config: &ServerConfig) -> Result<WeatherDataSet, String> {
    let data = WeatherDataSet::from_file(Path::new(&config.weather_data_path))?;
    info!(
        zones = data.len(),
        path = %config.weather_data_path,
        "Weather data loaded"
    );
    Ok(data)
}

/// Run the server: load weather data, start the WebSocket server, drive the zone loop.
pub async fn run_server(config: &ServerConfig) -> Result<(), String> {
    // 1. Load weather data
    let data = load_weather_data(config)?;

    // 2. Shared collaborators
    let hub = Arc::new(ZoneHub::new());
    let counter = Arc::new(ChangeCounter::default());
    let clock = Arc::new(SystemClock);
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let state = Arc::new(ServerState::new(Arc::clone(&hub), command_tx));

    let ctx = WeatherContext {
        delivery: hub.clone(),
        observer: counter.clone(),
        clock: clock.clone(),
    };
    let mut manager = ZoneWeatherManager::new(data, WeatherSettings::from_config(config), ctx);

    // 3. Start WebSocket server in background
    let addr: SocketAddr = format!("{}:{}", config.websocket_bind, config.websocket_port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state, addr).await {
            tracing::error!("Server error: {}", e);
        }
    });

    // 4. Set up shutdown signal
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // 5. Run the zone loop; it is the only owner of the zone weather
    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_interval_ms as u64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();
    let mut tick: u64 = 0;

    info!(
        tick_interval_ms = config.tick_interval_ms,
        change_interval_minutes = config.weather_change_interval_minutes,
        "Zone loop running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }

        let tick_start = Instant::now();
        let elapsed_ms = tick_start
            .duration_since(last_tick)
            .as_millis()
            .min(u32::MAX as u128) as u32;
        last_tick = tick_start;

        while let Ok(command) = command_rx.try_recv() {
            apply_command(&mut manager, command);
        }

        let expired = manager.tick(elapsed_ms);
        if !expired.is_empty() {
            info!(zones = ?expired, "Weather stopped in empty zones");
        }

        tick += 1;
        state
            .on_tick(
                tick,
                clock.season(),
                manager.active_zone_count(),
                counter.changes(),
                tick_start.elapsed().as_secs_f32() * 1000.0,
            )
            .await;
    }

    info!(tick, "Zone loop stopped");
    Ok(())
}

/// Apply one client request to the zones.
pub fn apply_command(manager: &mut ZoneWeatherManager, command: ZoneCommand) {
    match command {
        ZoneCommand::EnterZone { observer, zone_id } => {
            manager.observer_entered_zone(zone_id, observer);
        }
        ZoneCommand::ForceWeather {
            zone_id,
            weather,
            intensity,
        } => {
            if !manager.force_weather(zone_id, weather, intensity, true) {
                warn!(zone_id, ?weather, "Zone has no weather data, force ignored");
            }
        }
    }
}

/// Validate config and weather data and print the zone table.
pub fn check(config: &ServerConfig) -> Result<(), String> {
    let data = WeatherDataSet::from_file(Path::new(&config.weather_data_path))?;

    println!("Config OK");
    println!(
        "  Weather changes every {} minute(s), tick every {}ms",
        config.weather_change_interval_minutes, config.tick_interval_ms
    );
    println!(
        "  Listening on {}:{}",
        config.websocket_bind, config.websocket_port
    );
    println!();
    println!(
        "{:<8} {:<8} {:>6} {:>6} {:>6} {:>6}",
        "Zone", "Season", "Rain", "Snow", "Storm", "Fine"
    );
    println!("{}", "-".repeat(46));
    for zone_id in data.zone_ids() {
        let Some(table) = data.chances(zone_id) else {
            continue;
        };
        for season in Season::ALL {
            let row = table.season(season);
            let fine = 100 - (row.rain + row.snow + row.storm);
            println!(
                "{:<8} {:<8} {:>5}% {:>5}% {:>5}% {:>5}%",
                zone_id,
                season.name(),
                row.rain,
                row.snow,
                row.storm,
                fine
            );
        }
    }
    println!("\n{} zone(s) in {}", data.len(), config.weather_data_path);
    Ok(())
}

/// Run one zone offline and print every change plus a summary.
pub fn simulate(
    config: &ServerConfig,
    zone_id: u32,
    cycles: u32,
    start_day: u32,
    days_per_cycle: u32,
) -> Result<(), String> {
    let data = load_weather_data(config)?;
    let options = SimulationOptions {
        zone_id,
        cycles,
        start_day,
        days_per_cycle,
        seed: WeatherSettings::from_config(config).seed,
    };
    let report = simulation::run_cycles(&data, options)?;

    println!("=== Zone {} (seed {}) ===", zone_id, options.seed);
    println!(
        "{:>6} {:>4} {:<8} {:<18} {:>9}",
        "Cycle", "Day", "Season", "State", "Intensity"
    );
    println!("{}", "-".repeat(49));
    for record in report.records.iter() {
        if let Some(message) = record.broadcast {
            println!(
                "{:>6} {:>4} {:<8} {:<18} {:>9.4}",
                record.cycle,
                record.day_of_year,
                record.season.name(),
                message.state.name(),
                message.intensity
            );
        }
    }

    let stats = &report.statistics;
    println!();
    println!("--- Summary ---");
    println!(
        "  Cycles: {}  Changes: {} ({:.1}%)",
        stats.cycles,
        stats.changes,
        stats.change_rate() * 100.0
    );
    println!(
        "  Light: {:.1}%  Medium: {:.1}%  Heavy: {:.1}%",
        stats.band_share(Band::Light) * 100.0,
        stats.band_share(Band::Medium) * 100.0,
        stats.band_share(Band::Heavy) * 100.0
    );
    for (state, count) in stats.sorted_states() {
        println!("  {:<18} {}", state.name(), count);
    }
    Ok(())
}
