use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::{broadcast, mpsc};

use super::protocol::{to_json, WeatherUpdate};
use crate::weather::{ObserverId, WeatherDelivery, WeatherMessage};

const ZONE_CHANNEL_CAPACITY: usize = 16;

/// Routes weather messages to connected clients.
///
/// Each zone has a broadcast channel; a client in the zone holds one receiver,
/// so the receiver count is the number of observers in the zone. Each client
/// also has a private channel for direct syncs.
#[derive(Debug, Default)]
pub struct ZoneHub {
    zones: RwLock<HashMap<u32, broadcast::Sender<String>>>,
    clients: RwLock<HashMap<ObserverId, mpsc::UnboundedSender<String>>>,
}

impl ZoneHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return its direct-message stream.
    pub fn register(&self, observer: ObserverId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(observer, tx);
        rx
    }

    pub fn unregister(&self, observer: ObserverId) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&observer);
    }

    /// Receive every broadcast for a zone. Dropping the receiver leaves the zone.
    pub fn subscribe(&self, zone_id: u32) -> broadcast::Receiver<String> {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        zones
            .entry(zone_id)
            .or_insert_with(|| broadcast::channel(ZONE_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop a zone's channel once nobody is subscribed to it.
    pub fn release_zone(&self, zone_id: u32) {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        if zones.get(&zone_id).is_some_and(|tx| tx.receiver_count() == 0) {
            zones.remove(&zone_id);
        }
    }

    /// Number of zones that currently hold a channel.
    pub fn zone_channels(&self) -> usize {
        self.zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn connected_clients(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn observers_in_zone(&self, zone_id: u32) -> usize {
        self.zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&zone_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl WeatherDelivery for ZoneHub {
    fn send_to_zone(&self, zone_id: u32, message: &WeatherMessage) -> usize {
        let sent = {
            let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
            match zones.get(&zone_id) {
                // No receivers is an error from send(); here it just means an empty zone
                Some(tx) => tx
                    .send(to_json(&WeatherUpdate::from_message(message)))
                    .unwrap_or(0),
                None => return 0,
            }
        };
        if sent == 0 {
            self.release_zone(zone_id);
        }
        sent
    }

    fn send_to_one(&self, observer: ObserverId, message: &WeatherMessage) {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = clients.get(&observer) {
            let _ = tx.send(to_json(&WeatherUpdate::from_message(message)));
        }
    }
}
