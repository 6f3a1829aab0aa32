use std::f32::consts::PI;

use crate::error::DecodeError;
use crate::types::sample::{Sample, CHANNELS, FRAME_LEN};

/// Reference sensor calibration: raw g to m/s².
pub const DEFAULT_ACCEL_SCALE: f32 = 9.81;
/// Raw deg/s to rad/s.
pub const DEFAULT_GYRO_SCALE: f32 = PI / 180.0;

/// Turns one raw notification payload into a calibrated [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDecoder {
    accel_scale: f32,
    gyro_scale: f32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEL_SCALE, DEFAULT_GYRO_SCALE)
    }
}

impl FrameDecoder {
    pub fn new(accel_scale: f32, gyro_scale: f32) -> Self {
        Self {
            accel_scale,
            gyro_scale,
        }
    }

    /// Decode a notification value. `None` means the notification fired
    /// without a value.
    pub fn decode(&self, payload: Option<&[u8]>) -> Result<Sample, DecodeError> {
        let raw = payload.ok_or(DecodeError::Empty)?;
        if raw.len() != FRAME_LEN {
            return Err(DecodeError::WrongLength { len: raw.len() });
        }

        let mut values = [0f32; CHANNELS];
        for (value, chunk) in values.iter_mut().zip(raw.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Ok(Sample::new(
            values[0] * self.accel_scale,
            values[1] * self.accel_scale,
            values[2] * self.accel_scale,
            values[3] * self.gyro_scale,
            values[4] * self.gyro_scale,
            values[5] * self.gyro_scale,
        ))
    }
}

/// Encode raw (uncalibrated) channel values the way the sensor firmware does.
pub fn encode_raw_frame(raw: [f32; CHANNELS]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    for (chunk, value) in frame.chunks_exact_mut(4).zip(raw.iter()) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn decodes_reference_fixture() {
        let frame = encode_raw_frame([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let s = FrameDecoder::default().decode(Some(&frame)).unwrap();

        assert!(close(s.ax, 9.81));
        assert!(close(s.ay, 19.62));
        assert!(close(s.az, 29.43));
        assert!(close(s.gx, 4.0 * PI / 180.0));
        assert!(close(s.gy, 5.0 * PI / 180.0));
        assert!(close(s.gz, 6.0 * PI / 180.0));
    }

    #[test]
    fn decode_is_deterministic() {
        let frame = encode_raw_frame([-0.5, 0.25, 1.0, 90.0, -45.0, 0.0]);
        let decoder = FrameDecoder::default();
        assert_eq!(decoder.decode(Some(&frame)), decoder.decode(Some(&frame)));
    }

    #[test]
    fn rejects_wrong_lengths() {
        let decoder = FrameDecoder::default();
        for len in [0usize, 1, 20, 23, 25, 48] {
            let payload = vec![0u8; len];
            assert_eq!(
                decoder.decode(Some(&payload)),
                Err(DecodeError::WrongLength { len })
            );
        }
    }

    #[test]
    fn missing_value_is_empty() {
        assert_eq!(FrameDecoder::default().decode(None), Err(DecodeError::Empty));
    }

    #[test]
    fn custom_scale_factors_apply() {
        let frame = encode_raw_frame([1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let s = FrameDecoder::new(9.80665, 1.0).decode(Some(&frame)).unwrap();
        assert!(close(s.ax, 9.80665));
        assert!(close(s.gz, 1.0));
    }
}
