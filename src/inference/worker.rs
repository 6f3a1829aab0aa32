use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};

use super::labels::LabelSet;
use super::model::{Model, SequentialModel};
use super::pipeline::classify;
use crate::config::AppConfig;
use crate::error::{ModelLoadError, PipelineError};
use crate::sensor::ResampledSequence;
use crate::types::{ClassificationReport, InferenceTask, Sample};

/// Settings the worker needs for every classify request.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub labels: LabelSet,
    pub target_length: usize,
    pub confidence_threshold: f32,
}

impl From<&AppConfig> for WorkerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            labels: LabelSet::from_config(&config.model),
            target_length: config.pipeline.target_length,
            confidence_threshold: config.pipeline.confidence_threshold,
        }
    }
}

/// Owns the loaded model and runs resampling + inference off the control
/// thread.
pub struct InferenceWorker {
    settings: WorkerSettings,
    model: Option<Box<dyn Model>>,
}

impl InferenceWorker {
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            settings,
            model: None,
        }
    }

    pub fn with_model(settings: WorkerSettings, model: Box<dyn Model>) -> Self {
        Self {
            settings,
            model: Some(model),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn set_model(&mut self, model: Box<dyn Model>) {
        self.model = Some(model);
    }

    /// Resample a session snapshot and classify it.
    pub fn classify_session(
        &self,
        session_id: String,
        session: &[Sample],
        dropped_frames: u64,
    ) -> Result<ClassificationReport, PipelineError> {
        let model = self.model.as_deref().ok_or(ModelLoadError::NotLoaded)?;
        let sequence = ResampledSequence::from_session(session, self.settings.target_length)?;
        let result = classify(
            &sequence,
            model,
            &self.settings.labels,
            self.settings.confidence_threshold,
        )?;

        Ok(ClassificationReport {
            session_id,
            raw_samples: session.len(),
            dropped_frames,
            result,
        })
    }
}

pub fn run_inference_worker(
    mut worker: InferenceWorker,
    task_receiver: Receiver<InferenceTask>,
    shutdown_signal: Arc<AtomicBool>,
) {
    info!("Inference worker thread started");

    while !shutdown_signal.load(Ordering::Relaxed) {
        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(InferenceTask::LoadModel {
                graph_path,
                weights_path,
                cancel,
                response_sender,
            }) => {
                let outcome = SequentialModel::load(&graph_path, &weights_path, &cancel).map(|model| {
                    worker.set_model(Box::new(model));
                });
                if let Err(e) = &outcome {
                    error!("Inference worker: Failed to load model: {}", e);
                }
                reply(&response_sender, outcome, "model load result");
            }
            Ok(InferenceTask::Classify {
                session_id,
                session,
                dropped_frames,
                response_sender,
            }) => {
                let outcome = worker.classify_session(session_id, &session, dropped_frames);
                match &outcome {
                    Ok(report) => info!("Inference worker: {}", report.summary()),
                    Err(e) => error!("Inference worker: Classification failed: {}", e),
                }
                reply(&response_sender, outcome, "classification result");
            }
            Ok(InferenceTask::Shutdown) => {
                info!("Inference worker: Shutdown requested");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                // 超时，继续循环检查关闭信号
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("Inference worker: Task channel disconnected, exiting");
                break;
            }
        }
    }

    info!("Inference worker thread exiting gracefully");
}

fn reply<T>(sender: &Sender<T>, value: T, what: &str) {
    if let Err(e) = sender.try_send(value) {
        warn!("Inference worker: Failed to send {}: {}", what, e);
    }
}
