//! MPC coordination utilities
//!
//! [`PartyEndpoint`] wraps one party's provider handle; [`MessageRouter`] is
//! the in-process network between endpoints. Providers only ever see the
//! [`SendFn`](crate::provider::SendFn) the router hands them, so a real
//! transport can replace the router without touching key generation.

pub mod endpoint;
pub mod router;

pub use endpoint::PartyEndpoint;
pub use router::MessageRouter;
