//! Single-device connection state machine and the thread that feeds the
//! session buffer from link notifications.

pub mod lifecycle;
pub mod pump;

pub use lifecycle::{
    generate_session_id, ConnectionLifecycle, ConnectionState, LifecycleSettings, SessionSnapshot,
};
pub use pump::{NotificationPump, StreamStats};
