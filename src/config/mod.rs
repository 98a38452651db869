pub mod server;
pub mod weather_data;

pub use server::ServerConfig;
pub use weather_data::{SeasonChances, SeasonalChanceTable, WeatherDataSet};
