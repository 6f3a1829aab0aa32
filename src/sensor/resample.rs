//! Linear-interpolation resampling of a variable-length session to the
//! fixed length the classifier expects.
//!
//! The same formula serves both directions: sessions shorter than the target
//! are stretched, longer ones are decimated by interpolating between the two
//! nearest source samples.

use std::ops::Deref;

use crate::error::ResampleError;
use crate::types::sample::{Sample, CHANNELS};

/// Model input length used by the reference classifier.
pub const TARGET_LENGTH: usize = 180;

/// Resample `input` to exactly `target_length` samples.
///
/// Empty input yields zero-valued samples; a single sample is repeated.
pub fn resample(input: &[Sample], target_length: usize) -> Result<Vec<Sample>, ResampleError> {
    if target_length < 2 {
        return Err(ResampleError::TargetTooShort {
            target: target_length,
        });
    }

    let n = input.len();
    match n {
        0 => return Ok(vec![Sample::zero(); target_length]),
        1 => return Ok(vec![input[0]; target_length]),
        _ => {}
    }

    let scale = (n - 1) as f64 / (target_length - 1) as f64;
    let output = (0..target_length)
        .map(|i| {
            let pos = i as f64 * scale;
            let left = (pos.floor() as usize).min(n - 1);
            let right = (left + 1).min(n - 1);
            let weight = pos - left as f64;

            let l = input[left].channels();
            let r = input[right].channels();
            let mut out = [0f32; CHANNELS];
            for c in 0..CHANNELS {
                out[c] = (l[c] as f64 * (1.0 - weight) + r[c] as f64 * weight) as f32;
            }
            Sample::from_channels(out)
        })
        .collect();

    Ok(output)
}

/// A session snapshot normalised to the classifier's input length.
///
/// Length is fixed at construction and the contents are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSequence {
    samples: Vec<Sample>,
}

impl ResampledSequence {
    pub fn from_session(session: &[Sample], target_length: usize) -> Result<Self, ResampleError> {
        if session.is_empty() {
            log::warn!(
                "No samples collected, classifying {} zero-valued samples",
                target_length
            );
        }
        Ok(Self {
            samples: resample(session, target_length)?,
        })
    }

    pub fn into_inner(self) -> Vec<Sample> {
        self.samples
    }
}

impl Deref for ResampledSequence {
    type Target = [Sample];

    fn deref(&self) -> &[Sample] {
        &self.samples
    }
}
