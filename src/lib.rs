//! TCP Forwarder
//!
//! Listens on a fixed local endpoint, admits connections whose source address
//! falls within a configured CIDR range, and relays each one byte-for-byte to
//! a fixed destination.

pub mod admission;
pub mod config;
pub mod dialer;
pub mod endpoint;
pub mod error;
pub mod relay;
pub mod service;

// Re-export commonly used types and functions
pub use admission::AdmissionFilter;
pub use config::{ForwarderConfig, load_config};
pub use dialer::{Dialer, TcpDialer};
pub use endpoint::Endpoint;
pub use error::{ConfigError, DialError, ServiceError};
pub use relay::{BUFFER_SIZE, CloseSignal, RelayStats};
pub use service::ForwardingService;
