//! BLE gateway bridged over MQTT.
//!
//! A gateway next to the sensor relays the radio traffic:
//!
//! - `{prefix}/advertise`: JSON advertisement `{"id", "name", "rssi"}`
//! - `{prefix}/{id}/connect`: we publish `{"mtu": N}` to request a link
//! - `{prefix}/{id}/status`: gateway answers `connected`, `failed: ...` or `disconnected`
//! - `{prefix}/{id}/{service}/{characteristic}`: base64 characteristic values
//! - `{prefix}/{id}/disconnect`: we publish to drop the link

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use super::{ConnectOptions, Notification, Peer, ScanEvent, Transport};
use crate::config::{ChannelConfig, MqttConfig};
use crate::error::TransportError;
use crate::types::CancelToken;

#[derive(Default)]
struct Routes {
    scan: Option<(String, Sender<ScanEvent>)>,
    status: Option<(String, Sender<String>)>,
    notify: Option<(String, Sender<Notification>)>,
}

fn lock(routes: &Mutex<Routes>) -> MutexGuard<'_, Routes> {
    routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MqttTransport {
    client: Client,
    prefix: String,
    routes: Arc<Mutex<Routes>>,
    shutdown_signal: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
    channels: ChannelConfig,
}

impl MqttTransport {
    pub fn connect_broker(config: &MqttConfig, channels: &ChannelConfig) -> Result<Self, TransportError> {
        let mut mqtt_options = MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive as u64));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(user.clone(), pass.clone());
        }

        let (client, connection) = Client::new(mqtt_options, 10);
        let routes = Arc::new(Mutex::new(Routes::default()));
        let shutdown_signal = Arc::new(AtomicBool::new(false));

        let event_thread = {
            let routes = Arc::clone(&routes);
            let shutdown = Arc::clone(&shutdown_signal);
            thread::spawn(move || run_event_loop(connection, routes, shutdown))
        };

        info!("MQTT gateway transport using {}:{}", config.broker, config.port);
        Ok(Self {
            client,
            prefix: config.topic_prefix.trim_end_matches('/').to_string(),
            routes,
            shutdown_signal,
            event_thread: Some(event_thread),
            channels: channels.clone(),
        })
    }

    fn topic(&self, parts: &[&str]) -> String {
        std::iter::once(self.prefix.as_str())
            .chain(parts.iter().copied())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn wait_for_status(
        &self,
        status: &Receiver<String>,
        peer: &Peer,
        options: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<(), TransportError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            if started.elapsed() >= options.timeout {
                return Err(TransportError::Timeout(format!("gateway status for {}", peer.id)));
            }
            match status.recv_timeout(Duration::from_millis(50)) {
                Ok(text) if text == "connected" => return Ok(()),
                Ok(text) if text.starts_with("failed") => {
                    return Err(TransportError::ConnectFailed(text));
                }
                Ok(text) => debug!("Ignoring gateway status '{}' for {}", text, peer.id),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Disconnected),
            }
        }
    }
}

impl Transport for MqttTransport {
    fn start_scan(&mut self) -> Result<Receiver<ScanEvent>, TransportError> {
        let topic = self.topic(&["advertise"]);
        let (sender, receiver) = bounded(self.channels.scan_channel_capacity);
        lock(&self.routes).scan = Some((topic.clone(), sender));
        self.client.subscribe(topic, QoS::AtMostOnce)?;
        Ok(receiver)
    }

    fn stop_scan(&mut self) {
        let route = lock(&self.routes).scan.take();
        if let Some((topic, _)) = route {
            if let Err(e) = self.client.unsubscribe(topic) {
                warn!("Failed to unsubscribe from advertisements: {}", e);
            }
        }
    }

    fn connect(
        &mut self,
        peer: &Peer,
        options: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<(), TransportError> {
        let status_topic = self.topic(&[peer.id.as_str(), "status"]);
        let (sender, receiver) = bounded(8);
        lock(&self.routes).status = Some((status_topic.clone(), sender));
        self.client.subscribe(status_topic, QoS::AtLeastOnce)?;

        let request = serde_json::json!({ "mtu": options.mtu }).to_string();
        self.client
            .publish(self.topic(&[peer.id.as_str(), "connect"]), QoS::AtLeastOnce, false, request)?;

        let outcome = self.wait_for_status(&receiver, peer, options, cancel);
        if outcome.is_err() {
            // 让网关放弃未完成的连接
            if let Err(e) = self.client.publish(
                self.topic(&[peer.id.as_str(), "disconnect"]),
                QoS::AtLeastOnce,
                false,
                "",
            ) {
                warn!("Failed to abort gateway connect to {}: {}", peer.id, e);
            }
            lock(&self.routes).status = None;
        }
        outcome
    }

    fn subscribe(
        &mut self,
        peer: &Peer,
        service: &str,
        characteristic: &str,
    ) -> Result<Receiver<Notification>, TransportError> {
        let topic = self.topic(&[peer.id.as_str(), service, characteristic]);
        let (sender, receiver) = bounded(self.channels.notification_channel_capacity);
        lock(&self.routes).notify = Some((topic.clone(), sender));
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;
        Ok(receiver)
    }

    fn disconnect(&mut self, peer: &Peer) -> Result<(), TransportError> {
        let topics: Vec<String> = {
            let mut routes = lock(&self.routes);
            let notify = routes.notify.take().map(|(topic, _)| topic);
            let status = routes.status.take().map(|(topic, _)| topic);
            notify.into_iter().chain(status).collect()
        };
        for topic in topics {
            if let Err(e) = self.client.unsubscribe(topic) {
                warn!("Failed to unsubscribe: {}", e);
            }
        }
        self.client
            .publish(self.topic(&[peer.id.as_str(), "disconnect"]), QoS::AtLeastOnce, false, "")?;
        Ok(())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        if let Err(e) = self.client.disconnect() {
            debug!("MQTT disconnect on drop failed: {}", e);
        }
        // event loop exits on the next event; don't block shutdown on it
        drop(self.event_thread.take());
    }
}

fn run_event_loop(mut connection: Connection, routes: Arc<Mutex<Routes>>, shutdown_signal: Arc<AtomicBool>) {
    for event in connection.iter() {
        // 检查关闭信号
        if shutdown_signal.load(Ordering::Relaxed) {
            info!("MQTT thread received shutdown signal, exiting gracefully");
            break;
        }

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                route_publish(&routes, &publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                if let Some((_, sender)) = &lock(&routes).scan {
                    if let Err(send_err) = sender.try_send(ScanEvent::Failed(e.to_string())) {
                        warn!("Scan channel full or closed, dropping scan error: {}", send_err);
                    }
                }
                // rumqttc reconnects on the next poll
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

fn route_publish(routes: &Mutex<Routes>, topic: &str, payload: &[u8]) {
    let routes = lock(routes);

    if let Some((scan_topic, sender)) = &routes.scan {
        if scan_topic == topic {
            match serde_json::from_slice::<Peer>(payload) {
                Ok(peer) => {
                    if sender.try_send(ScanEvent::Discovered(peer)).is_err() {
                        warn!("Scan channel full or closed, dropping advertisement");
                    }
                }
                Err(e) => warn!("Invalid advertisement: {}", e),
            }
            return;
        }
    }

    if let Some((status_topic, sender)) = &routes.status {
        if status_topic == topic {
            if sender
                .try_send(String::from_utf8_lossy(payload).trim().to_string())
                .is_err()
            {
                warn!("Status channel full or closed, dropping gateway status on {}", topic);
            }
            return;
        }
    }

    if let Some((notify_topic, sender)) = &routes.notify {
        if notify_topic == topic {
            if sender.try_send(parse_notification(payload)).is_err() {
                warn!("Notification channel full or closed, dropping frame");
            }
        }
    }
}

/// Gateway payloads are the characteristic value as base64 text, or
/// `error: ...` when the radio reported a failure.
fn parse_notification(payload: &[u8]) -> Notification {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text.trim(),
        Err(e) => return Notification::Error(format!("Invalid UTF-8: {}", e)),
    };

    if let Some(message) = text.strip_prefix("error:") {
        return Notification::Error(message.trim().to_string());
    }
    if text.is_empty() {
        return Notification::Empty;
    }

    match general_purpose::STANDARD.decode(text) {
        Ok(bytes) => Notification::Value(bytes),
        Err(e) => Notification::Error(format!("Invalid base64: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::encode_raw_frame;

    #[test]
    fn notification_payload_is_base64() {
        let frame = encode_raw_frame([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let text = general_purpose::STANDARD.encode(frame);
        assert_eq!(parse_notification(text.as_bytes()), Notification::Value(frame.to_vec()));
    }

    #[test]
    fn empty_and_error_payloads() {
        assert_eq!(parse_notification(b""), Notification::Empty);
        assert_eq!(
            parse_notification(b"error: GATT 133"),
            Notification::Error("GATT 133".to_string())
        );
        assert!(matches!(parse_notification(b"!!!"), Notification::Error(_)));
    }

    #[test]
    fn publishes_are_routed_by_topic() {
        let routes = Mutex::new(Routes::default());
        let (scan_sender, scan_receiver) = bounded(4);
        let (notify_sender, notify_receiver) = bounded(4);
        {
            let mut r = lock(&routes);
            r.scan = Some(("ble/advertise".to_string(), scan_sender));
            r.notify = Some(("ble/aa/svc/chr".to_string(), notify_sender));
        }

        route_publish(&routes, "ble/advertise", br#"{"id":"aa","name":"ESP32_MPU6050"}"#);
        route_publish(&routes, "ble/aa/svc/chr", b"");
        route_publish(&routes, "ble/other", b"ignored");

        assert_eq!(
            scan_receiver.try_recv().unwrap(),
            ScanEvent::Discovered(Peer::new("aa", "ESP32_MPU6050"))
        );
        assert_eq!(notify_receiver.try_recv().unwrap(), Notification::Empty);
        assert!(notify_receiver.try_recv().is_err());
    }

    #[test]
    fn full_or_closed_channels_drop_publishes_without_panicking() {
        let routes = Mutex::new(Routes::default());
        let (scan_sender, scan_receiver) = bounded(1);
        let (status_sender, status_receiver) = bounded(1);
        {
            let mut r = lock(&routes);
            r.scan = Some(("ble/advertise".to_string(), scan_sender));
            r.status = Some(("ble/aa/status".to_string(), status_sender));
        }
        drop(status_receiver);

        route_publish(&routes, "ble/advertise", br#"{"id":"aa","name":"ESP32_MPU6050"}"#);
        route_publish(&routes, "ble/advertise", br#"{"id":"bb","name":"ESP32_MPU6050"}"#);
        route_publish(&routes, "ble/aa/status", b"connected");

        assert_eq!(
            scan_receiver.try_recv().unwrap(),
            ScanEvent::Discovered(Peer::new("aa", "ESP32_MPU6050"))
        );
        assert!(scan_receiver.try_recv().is_err());
    }
}
