pub mod labels;
pub mod model;
pub mod pipeline;
pub mod worker;

pub use labels::LabelSet;
pub use model::{InputTensor, Model, ModelGraph, SequentialModel};
pub use pipeline::{classify, softmax, CONFIDENCE_THRESHOLD};
pub use worker::{run_inference_worker, InferenceWorker, WorkerSettings};
