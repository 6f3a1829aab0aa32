use std::path::PathBuf;

use crossbeam_channel::Sender;

use super::{CancelToken, ClassificationReport, Sample};
use crate::error::{ModelLoadError, PipelineError};

/// Requests processed by the inference worker thread
pub enum InferenceTask {
    LoadModel {
        graph_path: PathBuf,
        weights_path: PathBuf,
        cancel: CancelToken,
        response_sender: Sender<Result<(), ModelLoadError>>,
    },
    Classify {
        session_id: String,
        session: Vec<Sample>,
        dropped_frames: u64,
        response_sender: Sender<Result<ClassificationReport, PipelineError>>,
    },
    Shutdown,
}
