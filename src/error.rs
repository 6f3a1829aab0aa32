use std::path::PathBuf;

/// A single notification payload could not be turned into a sample.
///
/// Never fatal: the notification pump logs it and keeps streaming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("notification carried no value")]
    Empty,
    #[error("expected 24-byte frame, got {len} bytes")]
    WrongLength { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResampleError {
    #[error("target length must be at least 2, got {target}")]
    TargetTooShort { target: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {0} was not discovered")]
    NotFound(String),
    #[error("already connected to {0}")]
    Busy(String),
    #[error("operation not allowed while {0}")]
    InvalidState(&'static str),
    #[error("request cancelled")]
    Cancelled,
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("transport disconnected")]
    Disconnected,
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model graph: {0}")]
    Graph(#[from] serde_json::Error),
    #[error("unsupported model graph: {0}")]
    UnsupportedFormat(String),
    #[error("weights blob holds {actual} floats, graph needs {expected}")]
    WeightsMismatch { expected: usize, actual: usize },
    #[error("no model loaded")]
    NotLoaded,
    #[error("model load cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("input shape {actual:?} does not match model input {expected:?}")]
    InputShape {
        expected: [usize; 3],
        actual: [usize; 3],
    },
    #[error("model returned {actual} scores for {expected} labels")]
    OutputShape { expected: usize, actual: usize },
    #[error("model output contains non-finite values")]
    NonFinite,
    #[error("model invocation failed: {0}")]
    Model(String),
}

/// Everything a stop-and-classify request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resample(#[from] ResampleError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
