//! Non-authoritative relay: username registry and event fan-out

pub mod hub;
pub mod registry;

pub use hub::{
    HubCommand, Outbound, RelayHandle, RelayHub, RelaySettings, RelayStats, TransportError,
    PEER_BUFFER,
};
pub use registry::{ConnId, RegistrationError, SessionRegistry};
