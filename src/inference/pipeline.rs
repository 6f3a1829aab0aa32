use log::debug;

use crate::error::InferenceError;
use crate::inference::labels::LabelSet;
use crate::inference::model::{InputTensor, Model};
use crate::types::{ClassificationResult, Sample};

/// Minimum softmax confidence (exclusive) for a gesture to be reported.
pub const CONFIDENCE_THRESHOLD: f32 = 0.08;

/// Tolerance when deciding whether scores already form a distribution.
const NORMALIZED_EPSILON: f32 = 1e-3;

/// Classify one resampled gesture.
///
/// `sequence` must already hold exactly the model's input length; the tensor
/// is built as `[1, sequence.len(), 6]`.
pub fn classify(
    sequence: &[Sample],
    model: &dyn Model,
    labels: &LabelSet,
    threshold: f32,
) -> Result<ClassificationResult, InferenceError> {
    let tensor = InputTensor::from_sequence(sequence);
    let scores = model.predict(&tensor)?;

    if scores.len() != labels.len() {
        return Err(InferenceError::OutputShape {
            expected: labels.len(),
            actual: scores.len(),
        });
    }
    if scores.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite);
    }

    let probabilities = if is_distribution(&scores) {
        scores
    } else {
        softmax(&scores)
    };
    // scores.len() == labels.len() and the label set is never empty
    let (predicted_index, confidence) = argmax(&probabilities).ok_or(InferenceError::OutputShape {
        expected: labels.len(),
        actual: 0,
    })?;

    debug!(
        "Top class {} with p={:.4} (threshold {:.3})",
        predicted_index, confidence, threshold
    );

    match labels.get(predicted_index) {
        Some(name) if confidence > threshold && !labels.is_no_move(predicted_index) => Ok(
            ClassificationResult::recognized(name.to_string(), confidence, predicted_index),
        ),
        _ => Ok(ClassificationResult::no_motion(
            labels.sentinel().to_string(),
            confidence,
            predicted_index,
        )),
    }
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

fn is_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() <= NORMALIZED_EPSILON
}

/// First index of the maximum value.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
