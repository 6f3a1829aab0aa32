use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

use crate::connection::SessionSnapshot;
use crate::error::{ModelLoadError, PipelineError};
use crate::types::{CancelToken, ClassificationReport, InferenceTask};

/// 模型加载状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

/// Inference worker side of the application.
#[derive(Debug)]
pub struct InferenceState {
    pub task_sender: Sender<InferenceTask>,
    pub model_status: ModelStatus,
    /// The worker holds a model from an earlier successful load.
    pub model_loaded: bool,
    pub load_result_receiver: Option<Receiver<Result<(), ModelLoadError>>>,
    pub load_cancel: Option<CancelToken>,
    pub classify_result_receivers: Vec<Receiver<Result<ClassificationReport, PipelineError>>>,
}

impl InferenceState {
    pub fn new(task_sender: Sender<InferenceTask>) -> Self {
        Self {
            task_sender,
            model_status: ModelStatus::NotLoaded,
            model_loaded: false,
            load_result_receiver: None,
            load_cancel: None,
            classify_result_receivers: Vec::new(),
        }
    }

    pub fn pending_classifications(&self) -> usize {
        self.classify_result_receivers.len()
    }
}

/// Session data waiting for the user.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Final session of the last connection, kept until classified or
    /// replaced by the next disconnect.
    pub finished_session: Option<SessionSnapshot>,
    pub last_report: Option<ClassificationReport>,
    pub reports: usize,
}

/// 统一的应用状态管理
#[derive(Debug)]
pub struct AppState {
    pub inference: InferenceState,
    pub session: SessionState,
    /// Discovered peers already announced to the user.
    pub peers_reported: usize,
    /// Messages for the front end, oldest first.
    pub messages: VecDeque<String>,
}

impl AppState {
    pub fn new(task_sender: Sender<InferenceTask>) -> Self {
        Self {
            inference: InferenceState::new(task_sender),
            session: SessionState::default(),
            peers_reported: 0,
            messages: VecDeque::new(),
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.messages.push_back(message.into());
    }

    pub fn drain_messages(&mut self) -> Vec<String> {
        self.messages.drain(..).collect()
    }

    pub fn model_summary(&self) -> String {
        match &self.inference.model_status {
            ModelStatus::NotLoaded => "model not loaded".to_string(),
            ModelStatus::Loading => "model loading".to_string(),
            ModelStatus::Ready => "model ready".to_string(),
            ModelStatus::Failed(e) => format!("model failed: {}", e),
        }
    }
}
