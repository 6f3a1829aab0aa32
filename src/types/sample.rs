/// Wire size of one notification payload: six little-endian f32 values.
pub const FRAME_LEN: usize = 24;

/// Number of channels per sample, in `(ax, ay, az, gx, gy, gz)` order.
pub const CHANNELS: usize = 6;

/// One calibrated inertial reading.
///
/// Acceleration is in m/s², angular rate in rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl Sample {
    pub fn new(ax: f32, ay: f32, az: f32, gx: f32, gy: f32, gz: f32) -> Self {
        Self { ax, ay, az, gx, gy, gz }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_channels(c: [f32; CHANNELS]) -> Self {
        Self::new(c[0], c[1], c[2], c[3], c[4], c[5])
    }

    /// Channel values in model input order.
    pub fn channels(&self) -> [f32; CHANNELS] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }
}
