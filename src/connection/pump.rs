use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, info, trace, warn};

use crate::sensor::{FrameDecoder, SessionBuffer};
use crate::transport::Notification;

/// Per-session frame counters, shared with the pump thread.
#[derive(Debug, Default)]
pub struct StreamStats {
    received: AtomicU64,
    dropped: AtomicU64,
}

impl StreamStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Dropped-frame count since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

/// Single consumer of a subscription: decodes every notification and
/// appends the sample to the session buffer.
pub struct NotificationPump {
    stop_sender: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationPump {
    pub fn spawn(
        notifications: Receiver<Notification>,
        decoder: FrameDecoder,
        buffer: SessionBuffer,
        stats: Arc<StreamStats>,
    ) -> Self {
        let (stop_sender, stop_receiver) = bounded(1);
        let handle = thread::spawn(move || {
            run_pump(notifications, stop_receiver, decoder, buffer, stats);
        });
        Self {
            stop_sender,
            handle: Some(handle),
        }
    }

    /// Stop after draining whatever the transport has already delivered.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // 已停止的 pump 不再接收信号
        if let Err(e) = self.stop_sender.try_send(()) {
            debug!("Pump stop signal not delivered: {}", e);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Notification pump panicked");
            }
        }
    }
}

impl Drop for NotificationPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_pump(
    notifications: Receiver<Notification>,
    stop: Receiver<()>,
    decoder: FrameDecoder,
    buffer: SessionBuffer,
    stats: Arc<StreamStats>,
) {
    info!("Notification pump started");
    loop {
        select! {
            recv(notifications) -> msg => match msg {
                Ok(notification) => handle_notification(notification, &decoder, &buffer, &stats),
                Err(_) => {
                    info!("Notification channel closed");
                    break;
                }
            },
            recv(stop) -> _ => {
                for notification in notifications.try_iter() {
                    handle_notification(notification, &decoder, &buffer, &stats);
                }
                break;
            }
        }
    }
    info!(
        "Notification pump exiting: {} frames received, {} dropped",
        stats.received(),
        stats.dropped()
    );
}

fn handle_notification(
    notification: Notification,
    decoder: &FrameDecoder,
    buffer: &SessionBuffer,
    stats: &StreamStats,
) {
    let decoded = match notification {
        Notification::Value(bytes) => decoder.decode(Some(&bytes)),
        Notification::Empty => decoder.decode(None),
        Notification::Error(e) => {
            warn!("Notification error: {}", e);
            return;
        }
    };

    match decoded {
        Ok(sample) => {
            trace!("Sample {:?}", sample);
            stats.received.fetch_add(1, Ordering::Relaxed);
            buffer.append(sample);
        }
        Err(e) => {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped frame: {}", e);
        }
    }
}
