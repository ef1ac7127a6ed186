//! Concrete accessory transports.

mod tcp;

pub use tcp::{TcpAccessory, TcpAccessoryConfig};
