use serde::{Deserialize, Serialize};

use crate::weather::{ObserverId, Season, WeatherMessage, WeatherState, WeatherType};

/// First message on every connection: the id this client is known by.
#[derive(Debug, Clone, Serialize)]
pub struct Welcome {
    pub message_type: &'static str,
    pub observer_id: ObserverId,
}

/// Weather of the client's zone.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherUpdate {
    pub message_type: &'static str,
    pub state: WeatherState,
    pub state_id: u32,
    pub state_name: &'static str,
    pub intensity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub message_type: &'static str,
    pub reason: String,
}

/// Requests a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    EnterZone { zone_id: u32 },
    ForceWeather { weather: WeatherType, intensity: f32 },
}

/// Health endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub tick: u64,
    pub tick_rate: f32,
    pub active_zones: usize,
    pub connected_clients: usize,
    pub weather_changes: u64,
    pub season: Season,
}

impl Welcome {
    pub fn new(observer_id: ObserverId) -> Self {
        Welcome {
            message_type: "Welcome",
            observer_id,
        }
    }
}

impl WeatherUpdate {
    pub fn from_message(message: &WeatherMessage) -> Self {
        WeatherUpdate {
            message_type: "WeatherUpdate",
            state: message.state,
            state_id: message.state.id(),
            state_name: message.state.name(),
            intensity: message.intensity,
        }
    }
}

impl ErrorMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        ErrorMessage {
            message_type: "Error",
            reason: reason.into(),
        }
    }
}

/// Serialize any outbound message, falling back to an empty object.
pub fn to_json<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
}
