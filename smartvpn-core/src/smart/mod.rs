//! Smart protocol negotiation
//!
//! Per-protocol availability checkers, the port selector and the
//! orchestrator that picks the best protocol for a server.

pub mod checker;
pub mod hmac;
pub mod ikev2;
pub mod openvpn;
pub mod port_selector;
pub mod resolver;
pub mod smart_protocol;
pub mod transport;
pub mod wireguard;

// Public re-exports
pub use checker::{AvailabilityChecker, AvailabilityResult};
pub use port_selector::SmartPortSelector;
pub use resolver::{AvailabilityCheckerResolver, DefaultCheckerResolver};
pub use smart_protocol::SmartProtocol;
