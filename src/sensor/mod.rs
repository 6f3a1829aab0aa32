pub mod buffer;
pub mod decoder;
pub mod resample;

pub use buffer::SessionBuffer;
pub use decoder::{encode_raw_frame, FrameDecoder, DEFAULT_ACCEL_SCALE, DEFAULT_GYRO_SCALE};
pub use resample::{resample, ResampledSequence, TARGET_LENGTH};
