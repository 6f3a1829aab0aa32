pub mod classification;
pub mod connection;

pub use classification::ClassificationHandler;
pub use connection::ConnectionHandler;
