use log::{info, warn};

use crate::app::app_core::GestureApp;
use crate::transport::Peer;

pub struct ConnectionHandler;

impl ConnectionHandler {
    pub fn start_scan(app: &mut GestureApp) {
        match app.lifecycle.start_scan() {
            Ok(()) => {
                app.state.peers_reported = 0;
                let filter = app.config.get_config().sensor.name_filter.clone();
                app.state.notify(format!("Scanning for '{}'...", filter));
            }
            Err(e) => app.state.notify(format!("Cannot scan: {}", e)),
        }
    }

    /// Announce peers found since the last poll.
    pub fn poll_scan(app: &mut GestureApp) {
        let fresh: Vec<(usize, Peer)> = app
            .lifecycle
            .poll_discovered()
            .iter()
            .cloned()
            .enumerate()
            .skip(app.state.peers_reported)
            .collect();
        for (index, peer) in fresh {
            app.state.notify(format!("[{}] {} ({})", index, peer.display_name(), peer.id));
            app.state.peers_reported = index + 1;
        }
    }

    pub fn list_devices(app: &mut GestureApp) {
        let peers = app.lifecycle.poll_discovered().to_vec();
        app.state.peers_reported = peers.len();
        if peers.is_empty() {
            app.state.notify("No sensors discovered yet, run 'scan' first");
            return;
        }
        for (index, peer) in peers.iter().enumerate() {
            let rssi = peer.rssi.map(|r| format!(" {} dBm", r)).unwrap_or_default();
            app.state.notify(format!("[{}] {} ({}){}", index, peer.display_name(), peer.id, rssi));
        }
    }

    /// Accepts a list index or a peer id.
    fn resolve_target(app: &mut GestureApp, target: &str) -> String {
        let peers = app.lifecycle.poll_discovered();
        match target.parse::<usize>() {
            Ok(index) if index < peers.len() => peers[index].id.clone(),
            _ => target.to_string(),
        }
    }

    /// Blocks until connected, failed, or cancelled through `app.active`.
    pub fn connect(app: &mut GestureApp, target: &str) {
        let peer_id = Self::resolve_target(app, target);
        let cancel = app.active.begin();
        let outcome = app.lifecycle.connect(&peer_id, &cancel);
        app.active.finish();

        match outcome {
            Ok(()) => {
                info!("Session started on {}", peer_id);
                app.state
                    .notify(format!("Connected to {}, recording. 'classify' when done.", peer_id));
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", peer_id, e);
                app.state.notify(format!("Connect failed: {}", e));
            }
        }
    }

    pub fn disconnect(app: &mut GestureApp) {
        match app.lifecycle.disconnect() {
            Ok(snapshot) => {
                app.state.notify(format!(
                    "Disconnected. Session {} kept with {} samples, 'classify' to classify it.",
                    snapshot.session_id,
                    snapshot.samples.len()
                ));
                if let Some(old) = app.state.session.finished_session.replace(snapshot) {
                    info!("Discarding unclassified session {}", old.session_id);
                }
            }
            Err(e) => app.state.notify(format!("Cannot disconnect: {}", e)),
        }
    }

    pub fn cancel_scan(app: &mut GestureApp) -> bool {
        if app.lifecycle.state() == &crate::connection::ConnectionState::Scanning {
            app.lifecycle.cancel_scan();
            app.state.notify("Scan cancelled");
            return true;
        }
        false
    }
}
