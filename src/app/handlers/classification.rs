use crossbeam_channel::{bounded, TryRecvError, TrySendError};
use log::{error, info, warn};

use crate::app::app_core::GestureApp;
use crate::app::state::ModelStatus;
use crate::connection::SessionSnapshot;
use crate::types::{CancelToken, InferenceTask};

pub struct ClassificationHandler;

impl ClassificationHandler {
    /// Ask the worker to (re)load the model from the configured paths.
    pub fn load_model(app: &mut GestureApp) {
        if let Some(previous) = app.state.inference.load_cancel.take() {
            previous.cancel();
        }

        let config = app.config.get_config();
        let graph_path = config.graph_path();
        let weights_path = config.weights_path();
        let cancel = CancelToken::new();
        let (response_sender, response_receiver) = bounded(1);
        let task = InferenceTask::LoadModel {
            graph_path: graph_path.clone(),
            weights_path,
            cancel: cancel.clone(),
            response_sender,
        };

        match app.state.inference.task_sender.try_send(task) {
            Ok(()) => {
                info!("Model load requested: {}", graph_path.display());
                app.state.inference.model_status = ModelStatus::Loading;
                app.state.inference.load_result_receiver = Some(response_receiver);
                app.state.inference.load_cancel = Some(cancel);
                app.state.notify(format!("Loading model {}...", graph_path.display()));
            }
            Err(e) => {
                error!("Failed to send model load task: {}", e);
                app.state.notify(format!("Failed to request model load: {}", e));
            }
        }
    }

    pub fn cancel_model_load(app: &mut GestureApp) -> bool {
        match app.state.inference.load_cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                app.state.notify("Model load cancelled");
                true
            }
            None => false,
        }
    }

    /// Stop-and-classify: the live session while streaming, otherwise the
    /// session kept from the last disconnect.
    pub fn classify(app: &mut GestureApp) {
        let snapshot = if app.lifecycle.is_streaming() {
            match app.lifecycle.snapshot() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    app.state.notify(format!("Cannot take session snapshot: {}", e));
                    return;
                }
            }
        } else if let Some(snapshot) = app.state.session.finished_session.take() {
            snapshot
        } else {
            app.state.notify("Nothing to classify: connect and record a gesture first");
            return;
        };

        Self::submit(app, snapshot);
    }

    fn submit(app: &mut GestureApp, snapshot: SessionSnapshot) {
        let (response_sender, response_receiver) = bounded(1);
        let session_id = snapshot.session_id.clone();
        let samples = snapshot.samples.len();
        let task = InferenceTask::Classify {
            session_id: snapshot.session_id,
            session: snapshot.samples,
            dropped_frames: snapshot.dropped_frames,
            response_sender,
        };

        match app.state.inference.task_sender.try_send(task) {
            Ok(()) => {
                app.state.inference.classify_result_receivers.push(response_receiver);
                app.state
                    .notify(format!("Classifying {} ({} samples)...", session_id, samples));
            }
            Err(TrySendError::Full(_)) => {
                warn!("Inference task queue is full, {} not classified", session_id);
                app.state.notify("Inference queue is full, try again later");
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Inference task channel disconnected - worker thread may have crashed");
                app.state
                    .notify("Inference worker lost! Please restart the application.");
            }
        }
    }

    pub fn handle_load_results(app: &mut GestureApp) {
        let Some(receiver) = &app.state.inference.load_result_receiver else {
            return;
        };
        let outcome = match receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                warn!("Inference worker exited before answering the model load");
                app.state.inference.load_result_receiver = None;
                app.state.inference.model_loaded = false;
                app.state.inference.model_status = ModelStatus::Failed("worker exited".to_string());
                return;
            }
        };

        app.state.inference.load_result_receiver = None;
        app.state.inference.load_cancel = None;
        match outcome {
            Ok(()) => {
                app.state.inference.model_loaded = true;
                app.state.inference.model_status = ModelStatus::Ready;
                app.state.notify("Model ready");
            }
            // 重新加载失败时 worker 仍保留旧模型
            Err(e) if app.state.inference.model_loaded => {
                warn!("Model reload failed, keeping previous model: {}", e);
                app.state.inference.model_status = ModelStatus::Ready;
                app.state
                    .notify(format!("Model reload failed: {}; previous model still in use", e));
            }
            Err(e) => {
                app.state.inference.model_status = ModelStatus::Failed(e.to_string());
                app.state.notify(format!("Model load failed: {}", e));
            }
        }
    }

    pub fn handle_classification_results(app: &mut GestureApp) {
        let receivers = std::mem::take(&mut app.state.inference.classify_result_receivers);
        for receiver in receivers {
            match receiver.try_recv() {
                Ok(Ok(report)) => {
                    info!("Classification completed: {}", report.summary());
                    app.state.notify(report.summary());
                    app.state.session.reports += 1;
                    app.state.session.last_report = Some(report);
                }
                Ok(Err(e)) => app.state.notify(format!("Classification failed: {}", e)),
                Err(TryRecvError::Empty) => app.state.inference.classify_result_receivers.push(receiver),
                Err(TryRecvError::Disconnected) => {
                    app.state.notify("Classification request lost: worker exited");
                }
            }
        }
    }
}
