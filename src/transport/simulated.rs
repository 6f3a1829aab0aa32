//! In-process transport with scripted peers.
//!
//! Used by tests and by `--simulate`, where a background thread streams
//! random wrist motion from a fake `ESP32_MPU6050`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};
use rand::Rng;

use super::{ConnectOptions, Notification, Peer, ScanEvent, Transport};
use crate::error::TransportError;
use crate::sensor::encode_raw_frame;
use crate::types::CancelToken;

#[derive(Default)]
struct SimState {
    notify: Option<Sender<Notification>>,
    connected: Option<String>,
    last_mtu: Option<u16>,
    subscriptions: Vec<(String, String)>,
}

/// Test-side handle for feeding notifications into a [`SimulatedTransport`].
#[derive(Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<SimState>>,
}

pub struct SimulatedTransport {
    peers: Vec<Peer>,
    failing: HashSet<String>,
    connect_delay: Duration,
    capacity: usize,
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedTransport {
    pub fn new(capacity: usize) -> (Self, SimulatorHandle) {
        let state = Arc::new(Mutex::new(SimState::default()));
        let transport = Self {
            peers: Vec::new(),
            failing: HashSet::new(),
            connect_delay: Duration::ZERO,
            capacity,
            state: Arc::clone(&state),
        };
        (transport, SimulatorHandle { state })
    }

    /// Peer advertised by every scan, in insertion order.
    pub fn with_peer(mut self, peer: Peer) -> Self {
        self.peers.push(peer);
        self
    }

    /// Connect attempts to this peer fail.
    pub fn failing_connect(mut self, peer_id: &str) -> Self {
        self.failing.insert(peer_id.to_string());
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

impl Transport for SimulatedTransport {
    fn start_scan(&mut self) -> Result<Receiver<ScanEvent>, TransportError> {
        // every peer twice: real radios repeat advertisements
        let (sender, receiver) = bounded(self.peers.len() * 2 + 1);
        for peer in self.peers.iter().chain(self.peers.iter()) {
            let _ = sender.try_send(ScanEvent::Discovered(peer.clone()));
        }
        Ok(receiver)
    }

    fn stop_scan(&mut self) {
        debug!("Simulated scan stopped");
    }

    fn connect(
        &mut self,
        peer: &Peer,
        options: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<(), TransportError> {
        let started = Instant::now();
        while started.elapsed() < self.connect_delay {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            if started.elapsed() > options.timeout {
                return Err(TransportError::Timeout(format!("connect to {}", peer.id)));
            }
            thread::sleep(Duration::from_millis(5));
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.failing.contains(&peer.id) {
            return Err(TransportError::ConnectFailed(format!("{} refused connection", peer.id)));
        }

        let mut state = lock(&self.state);
        state.connected = Some(peer.id.clone());
        state.last_mtu = Some(options.mtu);
        Ok(())
    }

    fn subscribe(
        &mut self,
        peer: &Peer,
        service: &str,
        characteristic: &str,
    ) -> Result<Receiver<Notification>, TransportError> {
        let mut state = lock(&self.state);
        if state.connected.as_deref() != Some(peer.id.as_str()) {
            return Err(TransportError::SubscribeFailed(format!("{} is not connected", peer.id)));
        }
        let (sender, receiver) = bounded(self.capacity);
        state.notify = Some(sender);
        state
            .subscriptions
            .push((service.to_string(), characteristic.to_string()));
        Ok(receiver)
    }

    fn disconnect(&mut self, _peer: &Peer) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.notify = None;
        state.connected = None;
        Ok(())
    }
}

impl SimulatorHandle {
    /// Deliver one notification. Returns `false` when nothing is subscribed.
    pub fn push(&self, notification: Notification) -> bool {
        let sender = lock(&self.state).notify.clone();
        match sender {
            Some(sender) => sender.send(notification).is_ok(),
            None => false,
        }
    }

    /// Deliver raw (uncalibrated) channel values as a 24-byte frame.
    pub fn push_raw(&self, raw: [f32; 6]) -> bool {
        self.push(Notification::Value(encode_raw_frame(raw).to_vec()))
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected.is_some()
    }

    pub fn last_mtu(&self) -> Option<u16> {
        lock(&self.state).last_mtu
    }

    pub fn subscriptions(&self) -> Vec<(String, String)> {
        lock(&self.state).subscriptions.clone()
    }

    /// Stream random wrist motion at `rate_hz` until `shutdown` is set.
    ///
    /// Frames are only delivered while a subscription is active.
    pub fn spawn_motion(&self, rate_hz: u32, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
        let handle = self.clone();
        let period = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);
        thread::spawn(move || {
            info!("Simulated sensor streaming at {} Hz", rate_hz);
            let mut rng = rand::rng();
            let mut phase = 0f32;
            while !shutdown.load(Ordering::Relaxed) {
                phase += 0.1;
                let mut noise = |amp: f32| rng.random_range(-amp..amp);
                // g and deg/s, like the MPU6050 firmware sends
                let raw = [
                    phase.sin() * 0.8 + noise(0.05),
                    phase.cos() * 0.4 + noise(0.05),
                    1.0 + noise(0.05),
                    phase.cos() * 120.0 + noise(3.0),
                    noise(3.0),
                    phase.sin() * 45.0 + noise(3.0),
                ];
                // occasional truncated frame, as over a lossy link
                if rng.random_bool(0.01) {
                    handle.push(Notification::Value(encode_raw_frame(raw)[..20].to_vec()));
                } else {
                    handle.push_raw(raw);
                }
                thread::sleep(period);
            }
        })
    }
}
