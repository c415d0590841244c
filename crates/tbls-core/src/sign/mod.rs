//! Signature share generation
//!
//! A [`Signer`] owns one party reconstructed from persisted key material and
//! answers signing requests; no messaging is involved.

mod signer;

pub use signer::{collect_signatures, Signer};
