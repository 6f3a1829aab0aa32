use crossbeam_channel::Sender;
use log::{info, warn};

use super::commands::{Command, HELP};
use super::handlers::{ClassificationHandler, ConnectionHandler};
use super::state::AppState;
use crate::config::ConfigManager;
use crate::connection::{ConnectionLifecycle, LifecycleSettings};
use crate::transport::Transport;
use crate::types::{ActiveRequest, InferenceTask};

pub struct GestureApp {
    // 统一的状态管理
    pub state: AppState,

    // 配置管理
    pub config: ConfigManager,

    pub lifecycle: ConnectionLifecycle,

    /// Blocking request the console thread may cancel.
    pub active: ActiveRequest,
}

impl GestureApp {
    pub fn new(
        config: ConfigManager,
        transport: Box<dyn Transport>,
        task_sender: Sender<InferenceTask>,
        active: ActiveRequest,
    ) -> Self {
        let settings = LifecycleSettings::from(&config.get_config().sensor);
        let app = GestureApp {
            state: AppState::new(task_sender),
            config,
            lifecycle: ConnectionLifecycle::new(transport, settings),
            active,
        };

        info!("应用启动，等待扫描传感器...");
        app
    }

    /// Run one command. Returns `false` when the user asked to quit.
    pub fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Scan => ConnectionHandler::start_scan(self),
            Command::Devices => ConnectionHandler::list_devices(self),
            Command::Connect(target) => ConnectionHandler::connect(self, &target),
            Command::Classify => ClassificationHandler::classify(self),
            Command::Disconnect => ConnectionHandler::disconnect(self),
            Command::Cancel => self.cancel(),
            Command::Status => self.report_status(),
            Command::LoadModel => ClassificationHandler::load_model(self),
            Command::Help => self.state.notify(HELP),
            Command::Quit => return false,
        }
        true
    }

    /// Poll background results; call regularly from the control loop.
    pub fn update(&mut self) {
        ConnectionHandler::poll_scan(self);
        ClassificationHandler::handle_load_results(self);
        ClassificationHandler::handle_classification_results(self);
    }

    fn cancel(&mut self) {
        let mut cancelled = self.active.cancel();
        cancelled |= ConnectionHandler::cancel_scan(self);
        cancelled |= ClassificationHandler::cancel_model_load(self);
        if !cancelled {
            self.state.notify("Nothing to cancel");
        }
    }

    fn report_status(&mut self) {
        let mut lines = vec![format!("connection: {}", self.lifecycle.state())];
        if self.lifecycle.is_streaming() {
            lines.push(format!(
                "session: {} samples buffered, {} frames received",
                self.lifecycle.buffered_len(),
                self.lifecycle.frames_received()
            ));
            if let Some(s) = self.lifecycle.latest_sample() {
                lines.push(format!(
                    "latest: a=({:.2}, {:.2}, {:.2}) m/s² g=({:.2}, {:.2}, {:.2}) rad/s",
                    s.ax, s.ay, s.az, s.gx, s.gy, s.gz
                ));
            }
        }
        if let Some(finished) = &self.state.session.finished_session {
            lines.push(format!(
                "finished session {}: {} samples",
                finished.session_id,
                finished.samples.len()
            ));
        }
        lines.push(self.state.model_summary());
        let pending = self.state.inference.pending_classifications();
        if pending > 0 {
            lines.push(format!("{} classification(s) pending", pending));
        }
        if let Some(report) = &self.state.session.last_report {
            lines.push(format!("last result: {}", report.summary()));
        }
        self.state.notify(lines.join("\n"));
    }

    /// Tear down: drop the link and stop the worker.
    pub fn shutdown(&mut self) {
        if self.lifecycle.is_streaming() {
            ConnectionHandler::disconnect(self);
        }
        if let Some(cancel) = self.state.inference.load_cancel.take() {
            cancel.cancel();
        }
        if let Err(e) = self.state.inference.task_sender.try_send(InferenceTask::Shutdown) {
            warn!("Failed to send shutdown to inference worker: {}", e);
        }
    }
}
