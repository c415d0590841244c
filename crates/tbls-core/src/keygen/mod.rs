//! Distributed Key Generation (DKG) module
//!
//! Drives `n` parties concurrently through the provider's key generation
//! over the in-process [`MessageRouter`](crate::mpc::MessageRouter).

mod coordinator;

pub use coordinator::{DkgCoordinator, DkgOutcome, DkgState, PartyFailure, DEFAULT_DKG_TIMEOUT};
