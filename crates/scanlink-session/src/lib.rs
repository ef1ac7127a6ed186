//! Host-side sessions with scanner accessories.
//!
//! This crate sits between an application and the wire protocol of
//! `scanlink-protocol`:
//!
//! - [`Accessory`] is the transport seam. [`MockAccessory`] backs tests and
//!   [`TcpAccessory`] reaches devices behind a network bridge.
//! - [`DeviceSession`] claims one accessory, serializes synchronous
//!   requests, and dispatches unsolicited events to registered listeners.
//! - [`SessionRegistry`] reports accessories that connect inside an accept
//!   window.
//!
//! # Examples
//!
//! ```no_run
//! use scanlink_core::BuzzerType;
//! use scanlink_protocol::{ConfigScope, ResponseFormat};
//! use scanlink_session::listener::{OnRfid, SessionInfo};
//! use scanlink_session::{DeviceSession, TcpAccessory, TcpAccessoryConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> scanlink_core::Result<()> {
//! let session = DeviceSession::builder(TcpAccessory::new(TcpAccessoryConfig::default())).build()?;
//! session.register_data_listener(Arc::new(OnRfid(
//!     |_: &SessionInfo, tags: &[scanlink_protocol::RfidRecord]| -> anyhow::Result<()> {
//!         for tag in tags {
//!             println!("{} rssi={:?}", tag.uii_hex(), tag.rssi);
//!         }
//!         Ok(())
//!     },
//! )));
//!
//! session.claim().await?;
//! let mut format = ResponseFormat::binary();
//! format.rssi = true;
//! session.set_response_format(format).await?;
//! let _rfid = session.get_configuration(ConfigScope::Rfid).await?;
//! session.open_inventory(None).await?;
//! session.buzzer(BuzzerType::B1).await?;
//! # Ok(())
//! # }
//! ```

pub mod accessory;
pub mod claim;
pub mod config;
pub mod listener;
pub mod mock;
pub mod registry;
pub mod session;
pub mod state;
mod sync;
pub mod transport;

pub use accessory::Accessory;
pub use claim::ClaimTable;
pub use config::SessionConfig;
pub use listener::{
    DataListener, ErrorSink, KeyListener, ListenerFailure, ListenerId, SessionInfo,
    StatusListener, TracingErrorSink,
};
pub use mock::{MockAccessory, MockAccessoryHandle};
pub use registry::{AcceptListener, SessionRegistry};
pub use session::{DeviceSession, SessionBuilder};
pub use state::{SessionStateMachine, StateTransition};
pub use transport::{TcpAccessory, TcpAccessoryConfig};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
