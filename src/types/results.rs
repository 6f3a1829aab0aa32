use serde::Serialize;

/// Outcome of one confidence-gated classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Gesture name, or the "no recognized motion" sentinel when gated out.
    pub label: String,
    /// Softmax-normalised probability of the argmax class.
    pub confidence: f32,
    /// Index of the argmax class in the label set.
    pub predicted_index: usize,
    pub recognized: bool,
}

impl ClassificationResult {
    pub fn recognized(label: String, confidence: f32, predicted_index: usize) -> Self {
        Self {
            label,
            confidence,
            predicted_index,
            recognized: true,
        }
    }

    pub fn no_motion(sentinel: String, confidence: f32, predicted_index: usize) -> Self {
        Self {
            label: sentinel,
            confidence,
            predicted_index,
            recognized: false,
        }
    }
}

/// Result of a full stop-and-classify cycle, as reported to the front end.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub session_id: String,
    pub raw_samples: usize,
    pub dropped_frames: u64,
    pub result: ClassificationResult,
}

impl ClassificationReport {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({:.1}%) from {} samples, {} dropped",
            self.session_id,
            self.result.label,
            self.result.confidence * 100.0,
            self.raw_samples,
            self.dropped_frames
        )
    }
}
