use clap::{Parser, Subcommand};
use std::path::Path;

use zoneweather::cli::{commands, logging};
use zoneweather::config::ServerConfig;

#[derive(Parser)]
#[command(name = "zoneweather")]
#[command(about = "Per-zone weather cycles for persistent multiplayer worlds")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the weather server
    Run,

    /// Run one zone's weather cycles offline and print the changes
    Simulate {
        /// Zone to simulate
        #[arg(short, long)]
        zone: u32,

        /// Number of weather cycles to run
        #[arg(short = 'n', long, default_value_t = 100)]
        cycles: u32,

        /// Day of year (0-365) of the first cycle
        #[arg(short, long, default_value_t = 78)]
        day: u32,

        /// Calendar days that pass between cycles
        #[arg(long, default_value_t = 1)]
        days_per_cycle: u32,
    },

    /// Validate the configuration and weather data
    Check,
}

fn load_config(path: &str) -> ServerConfig {
    match ServerConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    match cli.command {
        Commands::Run => {
            logging::init_logging(&config);
            if let Err(e) = commands::run_server(&config).await {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Simulate {
            zone,
            cycles,
            day,
            days_per_cycle,
        } => {
            if let Err(e) = commands::simulate(&config, zone, cycles, day, days_per_cycle) {
                eprintln!("Simulation error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Check => {
            if let Err(e) = commands::check(&config) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
