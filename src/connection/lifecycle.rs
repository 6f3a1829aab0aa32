use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;
use log::{error, info, warn};

use super::pump::{NotificationPump, StreamStats};
use crate::config::SensorConfig;
use crate::error::TransportError;
use crate::sensor::{FrameDecoder, SessionBuffer};
use crate::transport::{ConnectOptions, Peer, ScanEvent, Transport};
use crate::types::{CancelToken, Sample};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// `session_YYYYmmdd_HHMMSS_N`; the counter keeps ids unique within a second.
pub fn generate_session_id() -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("session_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), seq)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting(Peer),
    Streaming(Peer),
    Stopping(Peer),
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting(_) => "connecting",
            ConnectionState::Streaming(_) => "streaming",
            ConnectionState::Stopping(_) => "stopping",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting(peer)
            | ConnectionState::Streaming(peer)
            | ConnectionState::Stopping(peer) => write!(f, "{} {}", self.name(), peer.display_name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Link parameters the lifecycle needs from the sensor configuration.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub name_filter: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub connect: ConnectOptions,
    pub decoder: FrameDecoder,
}

impl From<&SensorConfig> for LifecycleSettings {
    fn from(config: &SensorConfig) -> Self {
        Self {
            name_filter: config.name_filter.clone(),
            service_uuid: config.service_uuid.clone(),
            characteristic_uuid: config.characteristic_uuid.clone(),
            connect: ConnectOptions {
                mtu: config.mtu,
                timeout: Duration::from_millis(config.connect_timeout_ms),
            },
            decoder: FrameDecoder::new(config.accel_scale, config.gyro_scale),
        }
    }
}

/// Samples taken out of the session buffer in one step.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub samples: Vec<Sample>,
    pub dropped_frames: u64,
}

/// Owns the single device connection and the session buffer it feeds.
///
/// `Idle -> Scanning -> Connecting -> Streaming -> Stopping -> Idle`.
pub struct ConnectionLifecycle {
    transport: Box<dyn Transport>,
    settings: LifecycleSettings,
    state: ConnectionState,
    discovered: Vec<Peer>,
    scan_receiver: Option<Receiver<ScanEvent>>,
    buffer: SessionBuffer,
    stats: Arc<StreamStats>,
    pump: Option<NotificationPump>,
    session_id: String,
}

impl ConnectionLifecycle {
    pub fn new(transport: Box<dyn Transport>, settings: LifecycleSettings) -> Self {
        Self {
            transport,
            settings,
            state: ConnectionState::Idle,
            discovered: Vec::new(),
            scan_receiver: None,
            buffer: SessionBuffer::with_capacity(1024),
            stats: Arc::new(StreamStats::default()),
            pump: None,
            session_id: generate_session_id(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, ConnectionState::Streaming(_))
    }

    pub fn start_scan(&mut self) -> Result<(), TransportError> {
        match self.state {
            ConnectionState::Idle => {}
            ConnectionState::Scanning => return Ok(()),
            _ => return Err(TransportError::InvalidState(self.state.name())),
        }

        self.discovered.clear();
        self.scan_receiver = Some(self.transport.start_scan()?);
        self.state = ConnectionState::Scanning;
        info!("Scanning for peers matching '{}'", self.settings.name_filter);
        Ok(())
    }

    /// Drain pending scan results and return every matching peer seen so far.
    pub fn poll_discovered(&mut self) -> &[Peer] {
        if let Some(receiver) = &self.scan_receiver {
            for event in receiver.try_iter() {
                match event {
                    ScanEvent::Discovered(peer) => {
                        if !peer.matches_name(&self.settings.name_filter) {
                            continue;
                        }
                        if self.discovered.iter().any(|p| p.id == peer.id) {
                            continue;
                        }
                        info!("Discovered {} ({})", peer.display_name(), peer.id);
                        self.discovered.push(peer);
                    }
                    ScanEvent::Failed(e) => warn!("Scan error: {}", e),
                }
            }
        }
        &self.discovered
    }

    pub fn cancel_scan(&mut self) {
        if self.state == ConnectionState::Scanning {
            self.stop_scanning();
            self.state = ConnectionState::Idle;
            info!("Scan cancelled");
        }
    }

    fn stop_scanning(&mut self) {
        if self.scan_receiver.take().is_some() {
            self.transport.stop_scan();
        }
    }

    /// Connect to a discovered peer and start streaming into a fresh session.
    ///
    /// Blocks until the link is up, fails, or `cancel` fires. Any failure
    /// leaves the lifecycle `Idle`.
    pub fn connect(&mut self, peer_id: &str, cancel: &CancelToken) -> Result<(), TransportError> {
        match &self.state {
            ConnectionState::Connecting(peer) | ConnectionState::Streaming(peer) => {
                return Err(TransportError::Busy(peer.id.clone()));
            }
            ConnectionState::Stopping(_) => return Err(TransportError::InvalidState(self.state.name())),
            ConnectionState::Idle | ConnectionState::Scanning => {}
        }

        self.poll_discovered();
        let peer = self
            .discovered
            .iter()
            .find(|p| p.id == peer_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(peer_id.to_string()))?;

        self.state = ConnectionState::Connecting(peer.clone());
        info!("Connecting to {} ({})", peer.display_name(), peer.id);

        match self.establish(&peer, cancel) {
            Ok(notifications) => {
                self.buffer.reset();
                self.stats.reset();
                self.session_id = generate_session_id();
                self.pump = Some(NotificationPump::spawn(
                    notifications,
                    self.settings.decoder,
                    self.buffer.clone(),
                    Arc::clone(&self.stats),
                ));
                self.state = ConnectionState::Streaming(peer);
                info!("Streaming session {}", self.session_id);
                Ok(())
            }
            Err(e) => {
                error!("Connection to {} failed: {}", peer.id, e);
                self.stop_scanning();
                self.state = ConnectionState::Idle;
                Err(e)
            }
        }
    }

    fn establish(
        &mut self,
        peer: &Peer,
        cancel: &CancelToken,
    ) -> Result<Receiver<crate::transport::Notification>, TransportError> {
        self.transport.connect(peer, &self.settings.connect, cancel)?;
        self.stop_scanning();

        if cancel.is_cancelled() {
            if let Err(e) = self.transport.disconnect(peer) {
                warn!("Disconnect after cancelled connect failed: {}", e);
            }
            return Err(TransportError::Cancelled);
        }

        match self.transport.subscribe(
            peer,
            &self.settings.service_uuid,
            &self.settings.characteristic_uuid,
        ) {
            Ok(receiver) => Ok(receiver),
            Err(e) => {
                if let Err(de) = self.transport.disconnect(peer) {
                    warn!("Disconnect after failed subscribe also failed: {}", de);
                }
                Err(e)
            }
        }
    }

    /// Stop-and-classify while streaming: take the current session and start
    /// a new one on the same link.
    pub fn snapshot(&mut self) -> Result<SessionSnapshot, TransportError> {
        if !self.is_streaming() {
            return Err(TransportError::InvalidState(self.state.name()));
        }
        let samples = self.buffer.snapshot_and_reset();
        let dropped_frames = self.stats.take_dropped();
        let session_id = std::mem::replace(&mut self.session_id, generate_session_id());
        Ok(SessionSnapshot {
            session_id,
            samples,
            dropped_frames,
        })
    }

    /// Drop the link. Returns the final session, collected up to the
    /// disconnect; the buffer is left empty for the next connection.
    pub fn disconnect(&mut self) -> Result<SessionSnapshot, TransportError> {
        let peer = match &self.state {
            ConnectionState::Streaming(peer) => peer.clone(),
            _ => return Err(TransportError::InvalidState(self.state.name())),
        };
        self.state = ConnectionState::Stopping(peer.clone());

        if let Some(pump) = self.pump.take() {
            pump.stop();
        }
        if let Err(e) = self.transport.disconnect(&peer) {
            warn!("Transport disconnect from {} failed: {}", peer.id, e);
        }

        let snapshot = SessionSnapshot {
            session_id: std::mem::replace(&mut self.session_id, generate_session_id()),
            samples: self.buffer.snapshot_and_reset(),
            dropped_frames: self.stats.take_dropped(),
        };
        self.buffer.reset();
        self.state = ConnectionState::Idle;
        info!(
            "Disconnected from {} with {} samples",
            peer.display_name(),
            snapshot.samples.len()
        );
        Ok(snapshot)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn latest_sample(&self) -> Option<Sample> {
        self.buffer.latest()
    }

    pub fn frames_received(&self) -> u64 {
        self.stats.received()
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        if self.is_streaming() {
            if let Err(e) = self.disconnect() {
                warn!("Disconnect on drop failed: {}", e);
            }
        }
    }
}
