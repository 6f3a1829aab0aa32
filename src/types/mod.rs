pub mod cancel;
pub mod results;
pub mod sample;
pub mod tasks;

pub use cancel::{ActiveRequest, CancelToken};
pub use results::{ClassificationReport, ClassificationResult};
pub use sample::{Sample, CHANNELS, FRAME_LEN};
pub use tasks::InferenceTask;
