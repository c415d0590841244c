//! # TBLS Core
//!
//! Orchestration core for (n, t)-threshold BLS signatures.
//!
//! This crate provides:
//! - An in-process simulated network driving distributed key generation
//!   (DKG) across `n` concurrently running parties
//! - Persistence of the threshold public key and per-party shares
//! - Independent share signing from persisted key material
//! - Threshold aggregation and verification
//!
//! Curve arithmetic stays behind the [`provider`] traits; a BN254
//! implementation is bundled.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tbls_core::{keygen::DkgCoordinator, provider::Bn254Provider, sign::Signer};
//! use tbls_core::{store::ShareStore, verify::Aggregator, ThresholdConfig};
//!
//! // Run distributed key generation
//! let config = ThresholdConfig::new(4, 3)?;
//! let record = DkgCoordinator::new(config, &Bn254Provider)?.run().await?.into_record()?;
//! let path = ShareStore::new("./data").save(&record)?;
//!
//! // Each party signs later and independently from the saved record
//! let record = tbls_core::store::load(&path)?;
//! let shares = (0..3)
//!     .map(|i| Signer::from_record(&record, i, &Bn254Provider)?.sign(b"message"))
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! // Aggregate any threshold-sized subset
//! let aggregator = Aggregator::from_record(&Bn254Provider, &record)?;
//! let ok = aggregator.verify(b"message", &shares, &[0, 1, 2]);
//! ```

pub mod error;
pub mod keygen;
pub mod mpc;
pub mod provider;
pub mod sign;
pub mod store;
pub mod types;
pub mod verify;

pub use error::{Error, Result};
pub use types::{
    message_digest, KeyShareEntry, KeyShareRecord, PartyId, ShareBytes, SigShareBytes,
    SigShareEntry, SignatureShareRecord, ThresholdConfig, MAX_PARTIES,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of parties
pub const DEFAULT_PARTIES: usize = 3;
