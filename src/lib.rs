//! Wrist-worn IMU gesture recognition.
//!
//! A sensor streams 24-byte frames over a wireless link; frames are
//! decoded into calibrated [`types::Sample`]s and accumulated in a
//! [`sensor::SessionBuffer`]. On stop the session is resampled to a fixed
//! length and classified by a pre-trained model behind a confidence gate.

pub mod app;
pub mod config;
pub mod connection;
pub mod error;
pub mod inference;
pub mod logger;
pub mod sensor;
pub mod transport;
pub mod types;
