pub mod hub;
pub mod protocol;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::weather::{
    ObserverId, Season, WeatherObserver, WeatherState, WeatherType, ZoneWeather,
};
pub use hub::ZoneHub;
use protocol::{to_json, ClientCommand, ErrorMessage, HealthStatus, Welcome};

/// Requests forwarded from client connections to the loop that owns the zones.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneCommand {
    EnterZone {
        observer: ObserverId,
        zone_id: u32,
    },
    ForceWeather {
        zone_id: u32,
        weather: WeatherType,
        intensity: f32,
    },
}

/// Counts delivered weather changes across all zones.
#[derive(Debug, Default)]
pub struct ChangeCounter {
    changes: AtomicU64,
}

impl ChangeCounter {
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }
}

impl WeatherObserver for ChangeCounter {
    fn on_weather_change(&self, _zone: &ZoneWeather, _state: WeatherState, _intensity: f32) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shared server state accessible from all connection handlers and the tick loop.
pub struct ServerState {
    pub hub: Arc<ZoneHub>,
    /// Client requests for the tick loop.
    pub commands: mpsc::UnboundedSender<ZoneCommand>,
    /// Health data updated each tick.
    pub health: RwLock<HealthData>,
}

/// Data needed for the health endpoint.
pub struct HealthData {
    pub tick: u64,
    pub season: Season,
    pub active_zones: usize,
    pub weather_changes: u64,
    pub recent_tick_durations_ms: Vec<f32>,
}

impl HealthData {
    pub fn tick_rate(&self) -> f32 {
        if self.recent_tick_durations_ms.is_empty() {
            return 0.0;
        }
        let avg_ms: f32 = self.recent_tick_durations_ms.iter().sum::<f32>()
            / self.recent_tick_durations_ms.len() as f32;
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }
}

impl ServerState {
    pub fn new(hub: Arc<ZoneHub>, commands: mpsc::UnboundedSender<ZoneCommand>) -> Self {
        ServerState {
            hub,
            commands,
            health: RwLock::new(HealthData {
                tick: 0,
                season: Season::Spring,
                active_zones: 0,
                weather_changes: 0,
                recent_tick_durations_ms: Vec::new(),
            }),
        }
    }

    /// Record the outcome of one tick of the zone loop.
    pub async fn on_tick(
        &self,
        tick: u64,
        season: Season,
        active_zones: usize,
        weather_changes: u64,
        tick_duration_ms: f32,
    ) {
        let mut health = self.health.write().await;
        health.tick = tick;
        health.season = season;
        health.active_zones = active_zones;
        health.weather_changes = weather_changes;
        health.recent_tick_durations_ms.push(tick_duration_ms);
        // Keep only the last 100 tick durations for rate calculation
        if health.recent_tick_durations_ms.len() > 100 {
            health.recent_tick_durations_ms.remove(0);
        }
    }
}

/// Start the WebSocket + HTTP server on the given address.
pub async fn start_server(
    state: Arc<ServerState>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, state).await {
                error!(%peer, "Connection error: {}", e);
            }
        });
    }
}

/// Handle an incoming TCP connection, routing to WebSocket or HTTP.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Peek at the first bytes to determine if this is a WebSocket upgrade or HTTP request
    let mut buf = [0u8; 512];
    let n = stream.peek(&mut buf).await?;
    let request_line = String::from_utf8_lossy(&buf[..n]).to_lowercase();

    if request_line.contains("upgrade: websocket") {
        handle_websocket(stream, peer, state).await
    } else if request_line.contains("get /health") {
        handle_health_request(stream, state).await
    } else {
        handle_not_found(stream).await
    }
}

async fn recv_zone(
    rx: &mut Option<broadcast::Receiver<String>>,
) -> Result<String, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Handle a WebSocket client: greet it, then relay its zone's weather until it leaves.
async fn handle_websocket(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let observer = Uuid::new_v4();
    info!(%peer, %observer, "WebSocket connected");

    let (mut write, mut read) = ws_stream.split();
    write
        .send(Message::Text(to_json(&Welcome::new(observer)).into()))
        .await?;

    let mut direct = state.hub.register(observer);
    let mut zone_rx: Option<broadcast::Receiver<String>> = None;
    let mut current_zone: Option<u32> = None;

    loop {
        tokio::select! {
            Some(json) = direct.recv() => {
                if write.send(Message::Text(json.into())).await.is_err() {
                    break; // Client disconnected
                }
            }
            update = recv_zone(&mut zone_rx) => {
                match update {
                    Ok(json) => {
                        if write.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%peer, lagged = n, "Client lagged behind on weather updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break; // Server shutting down
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientCommand>(text.as_str()) {
                            Ok(ClientCommand::EnterZone { zone_id }) => {
                                // Subscribe before the sync request so no broadcast slips between
                                zone_rx = Some(state.hub.subscribe(zone_id));
                                if let Some(previous) = current_zone.replace(zone_id) {
                                    if previous != zone_id {
                                        state.hub.release_zone(previous);
                                    }
                                }
                                let _ = state.commands.send(ZoneCommand::EnterZone { observer, zone_id });
                                None
                            }
                            Ok(ClientCommand::ForceWeather { weather, intensity }) => match current_zone {
                                Some(zone_id) => {
                                    let _ = state.commands.send(ZoneCommand::ForceWeather {
                                        zone_id,
                                        weather,
                                        intensity,
                                    });
                                    None
                                }
                                None => Some(ErrorMessage::new("enter a zone first")),
                            },
                            Err(e) => Some(ErrorMessage::new(format!("invalid command: {}", e))),
                        };
                        if let Some(reply) = reply {
                            if write.send(Message::Text(to_json(&reply).into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // Ignore other frames
                }
            }
        }
    }

    drop(zone_rx);
    if let Some(zone_id) = current_zone {
        state.hub.release_zone(zone_id);
    }
    state.hub.unregister(observer);
    info!(%peer, %observer, "WebSocket disconnected");
    Ok(())
}

/// Handle an HTTP health request.
async fn handle_health_request(
    mut stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;

    // Read and discard the full HTTP request
    let mut buf = vec![0u8; 4096];
    let _ = stream.read(&mut buf).await?;

    let health = state.health.read().await;
    let status = HealthStatus {
        tick: health.tick,
        tick_rate: health.tick_rate(),
        active_zones: health.active_zones,
        connected_clients: state.hub.connected_clients(),
        weather_changes: health.weather_changes,
        season: health.season,
    };

    let body = serde_json::to_string(&status)?;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(())
}

async fn handle_not_found(
    mut stream: TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;

    let mut buf = vec![0u8; 4096];
    let _ = stream.read(&mut buf).await?;

    stream
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .await?;
    stream.shutdown().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{WeatherDelivery, WeatherMessage};
    use std::time::Duration;

    fn make_state() -> (Arc<ServerState>, mpsc::UnboundedReceiver<ZoneCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ServerState::new(Arc::new(ZoneHub::new()), tx)), rx)
    }

    async fn next_text<S>(ws: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("message error");
        let text = msg.into_text().unwrap();
        serde_json::from_str(text.as_str()).unwrap()
    }

    #[tokio::test]
    async fn on_tick_updates_health() {
        let (state, _rx) = make_state();
        state.on_tick(5, Season::Summer, 3, 9, 100.0).await;

        let health = state.health.read().await;
        assert_eq!(health.tick, 5);
        assert_eq!(health.season, Season::Summer);
        assert_eq!(health.active_zones, 3);
        assert_eq!(health.weather_changes, 9);
        assert_eq!(health.recent_tick_durations_ms.len(), 1);
    }

    #[tokio::test]
    async fn tick_rate_calculation() {
        let (state, _rx) = make_state();
        // 5 ticks at 200ms each -> 5 ticks/sec
        for i in 0..5 {
            state.on_tick(i, Season::Spring, 0, 0, 200.0).await;
        }
        let health = state.health.read().await;
        assert!((health.tick_rate() - 5.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn health_recent_durations_capped_at_100() {
        let (state, _rx) = make_state();
        for i in 0..150 {
            state.on_tick(i, Season::Spring, 0, 0, 10.0).await;
        }
        let health = state.health.read().await;
        assert_eq!(health.recent_tick_durations_ms.len(), 100);
    }

    #[test]
    fn change_counter_counts_only_changes() {
        let counter = ChangeCounter::default();
        assert_eq!(counter.changes(), 0);
        counter.changes.fetch_add(2, Ordering::Relaxed);
        assert_eq!(counter.changes(), 2);
    }

    #[tokio::test]
    async fn websocket_client_enters_zone_and_receives_weather() {
        let (state, mut commands) = make_state();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server_handle = tokio::spawn(async move {
            if let Ok((stream, peer)) = listener.accept().await {
                let _ = handle_websocket(stream, peer, server_state).await;
            }
        });

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

        let welcome = next_text(&mut ws).await;
        assert_eq!(welcome["message_type"], "Welcome");
        let observer: Uuid = welcome["observer_id"].as_str().unwrap().parse().unwrap();

        ws.send(Message::Text(r#"{"type":"enter_zone","zone_id":12}"#.to_string().into()))
            .await
            .unwrap();
        let command = tokio::time::timeout(Duration::from_secs(5), commands.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(command, ZoneCommand::EnterZone { observer, zone_id: 12 });

        // Direct sync, as the tick loop does on entry
        state.hub.send_to_one(observer, &WeatherMessage::fine());
        let sync = next_text(&mut ws).await;
        assert_eq!(sync["state"], "Fine");

        // Zone broadcast
        let recipients = state
            .hub
            .send_to_zone(12, &WeatherMessage::new(WeatherState::HeavySnow, 0.8));
        assert_eq!(recipients, 1);
        let update = next_text(&mut ws).await;
        assert_eq!(update["message_type"], "WeatherUpdate");
        assert_eq!(update["state_name"], "heavy snow");

        ws.send(Message::Text(
            r#"{"type":"force_weather","weather":"Rain","intensity":0.5}"#.to_string().into(),
        ))
        .await
        .unwrap();
        let command = tokio::time::timeout(Duration::from_secs(5), commands.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            ZoneCommand::ForceWeather {
                zone_id: 12,
                weather: WeatherType::Rain,
                intensity: 0.5
            }
        );

        ws.close(None).await.unwrap();
        let _ = server_handle.await;
        assert_eq!(state.hub.connected_clients(), 0);
        assert_eq!(state.hub.observers_in_zone(12), 0);
    }

    #[tokio::test]
    async fn force_weather_outside_zone_is_refused() {
        let (state, mut commands) = make_state();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server_handle = tokio::spawn(async move {
            if let Ok((stream, peer)) = listener.accept().await {
                let _ = handle_websocket(stream, peer, server_state).await;
            }
        });

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let _welcome = next_text(&mut ws).await;

        ws.send(Message::Text(
            r#"{"type":"force_weather","weather":"Snow","intensity":0.5}"#.to_string().into(),
        ))
        .await
        .unwrap();
        let reply = next_text(&mut ws).await;
        assert_eq!(reply["message_type"], "Error");

        ws.send(Message::Text("not json".to_string().into())).await.unwrap();
        let reply = next_text(&mut ws).await;
        assert!(reply["reason"].as_str().unwrap().contains("invalid command"));

        ws.close(None).await.unwrap();
        let _ = server_handle.await;
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn health_endpoint_returns_json() {
        let (state, _rx) = make_state();
        state.on_tick(42, Season::Fall, 4, 17, 10.0).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server_handle = tokio::spawn(async move {
            if let Ok((stream, _peer)) = listener.accept().await {
                let _ = handle_health_request(stream, server_state).await;
            }
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response_str = String::from_utf8_lossy(&response);

        assert!(response_str.contains("200 OK"));
        assert!(response_str.contains("application/json"));

        let body_start = response_str.find('{').unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response_str[body_start..]).unwrap();
        assert_eq!(parsed["tick"], 42);
        assert_eq!(parsed["active_zones"], 4);
        assert_eq!(parsed["weather_changes"], 17);
        assert_eq!(parsed["connected_clients"], 0);
        assert_eq!(parsed["season"], "Fall");

        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn client_disconnect_does_not_crash_server() {
        let (state, _rx) = make_state();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server_handle = tokio::spawn(async move {
            if let Ok((stream, peer)) = listener.accept().await {
                let _ = handle_websocket(stream, peer, server_state).await;
            }
        });

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        drop(ws); // Abrupt disconnect

        let result = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
        assert!(result.is_ok(), "Server should handle disconnect within 5s");
        assert_eq!(state.hub.connected_clients(), 0);
    }

    #[tokio::test]
    async fn zone_channels_released_on_zone_change_and_disconnect() {
        let (state, mut commands) = make_state();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = Arc::clone(&state);
        let server_handle = tokio::spawn(async move {
            if let Ok((stream, peer)) = listener.accept().await {
                let _ = handle_websocket(stream, peer, server_state).await;
            }
        });

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let _welcome = next_text(&mut ws).await;

        for zone_id in [12, 13, 14] {
            let command = format!(r#"{{"type":"enter_zone","zone_id":{}}}"#, zone_id);
            ws.send(Message::Text(command.into())).await.unwrap();
            tokio::time::timeout(Duration::from_secs(5), commands.recv())
                .await
                .unwrap()
                .unwrap();
            // Only the zone the client is in keeps a channel
            assert_eq!(state.hub.zone_channels(), 1);
            assert_eq!(state.hub.observers_in_zone(zone_id), 1);
        }

        ws.close(None).await.unwrap();
        let _ = server_handle.await;
        assert_eq!(state.hub.zone_channels(), 0);
    }
}
