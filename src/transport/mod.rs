//! Wireless link collaborators.
//!
//! The core never talks to a radio directly. A [`Transport`] discovers
//! peers, connects, and turns the link's notification callbacks into a
//! channel of [`Notification`]s that the connection lifecycle drains.

pub mod mqtt;
pub mod simulated;

use std::time::Duration;

use crossbeam_channel::Receiver;
use serde::Deserialize;

use crate::error::TransportError;
use crate::types::CancelToken;

pub use mqtt::MqttTransport;
pub use simulated::{SimulatedTransport, SimulatorHandle};

/// A discovered peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Peer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rssi: Option<i16>,
}

impl Peer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            rssi: None,
        }
    }

    pub fn matches_name(&self, filter: &str) -> bool {
        self.name.as_deref().is_some_and(|name| name.contains(filter))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Delivered by a running scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Discovered(Peer),
    Failed(String),
}

/// One characteristic notification, already stripped of transport encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Value(Vec<u8>),
    /// The notification fired without a value.
    Empty,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Requested ATT MTU; 27 fits one 24-byte frame.
    pub mtu: u16,
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            mtu: 27,
            timeout: Duration::from_secs(10),
        }
    }
}

pub trait Transport: Send {
    /// Start discovery. Events arrive on the returned channel until
    /// [`Transport::stop_scan`].
    fn start_scan(&mut self) -> Result<Receiver<ScanEvent>, TransportError>;

    fn stop_scan(&mut self);

    /// Blocking connect; must return [`TransportError::Cancelled`] promptly
    /// once `cancel` fires.
    fn connect(
        &mut self,
        peer: &Peer,
        options: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<(), TransportError>;

    fn subscribe(
        &mut self,
        peer: &Peer,
        service: &str,
        characteristic: &str,
    ) -> Result<Receiver<Notification>, TransportError>;

    fn disconnect(&mut self, peer: &Peer) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_filter_is_substring_match() {
        assert!(Peer::new("aa", "ESP32_MPU6050 #2").matches_name("ESP32_MPU6050"));
        assert!(!Peer::new("bb", "Headphones").matches_name("ESP32_MPU6050"));
        let unnamed = Peer {
            id: "cc".to_string(),
            name: None,
            rssi: Some(-70),
        };
        assert!(!unnamed.matches_name("ESP32_MPU6050"));
        assert_eq!(unnamed.display_name(), "<unnamed>");
    }

    #[test]
    fn advertisement_json_parses() {
        let peer: Peer = serde_json::from_str(r#"{"id":"24:6F:28:AA:BB:CC","name":"ESP32_MPU6050","rssi":-58}"#).unwrap();
        assert_eq!(peer.id, "24:6F:28:AA:BB:CC");
        assert_eq!(peer.rssi, Some(-58));
    }
}
