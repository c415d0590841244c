//! Threshold-crypto provider capability
//!
//! The orchestration layer drives parties and verifiers only through these
//! traits. Curve arithmetic, polynomial commitments and pairing checks stay
//! behind them, so the router, coordinator, store, signer and aggregator can
//! run against any provider (including test fakes).

use crate::{PartyId, Result, ShareBytes, SigShareBytes};
use std::sync::Arc;
use tracing::Span;

pub use ::async_trait::async_trait;

pub mod bn254;
mod messages;

pub use bn254::{Bn254Party, Bn254Provider, Bn254Verifier};
pub use messages::DkgMessage;

/// Outbound-message callback handed to a provider at init.
///
/// Arguments are `(payload, is_broadcast, recipient)`; `recipient` is
/// ignored for broadcasts. Returns once every target has processed the
/// message.
pub type SendFn = Arc<dyn Fn(&[u8], bool, PartyId) -> Result<()> + Send + Sync>;

/// One party's handle to the threshold scheme
#[async_trait]
pub trait ThresholdCryptoProvider: Send + Sync + 'static {
    /// This party's identifier
    fn party_id(&self) -> PartyId;

    /// Prepare for key generation among `ids` with the given threshold.
    /// No messages are sent from here.
    fn init(&self, ids: &[PartyId], threshold: usize, send: SendFn) -> Result<()>;

    /// Handle a protocol message from `from`
    fn on_msg(&self, payload: &[u8], from: PartyId, broadcast: bool) -> Result<()>;

    /// Run key generation to completion and return this party's share
    async fn keygen(&self) -> Result<ShareBytes>;

    /// Encoded threshold public key, available after keygen or
    /// [`set_share_data`](Self::set_share_data)
    fn threshold_pk(&self) -> Result<Vec<u8>>;

    /// Load a share produced by an earlier keygen, without any messaging
    fn set_share_data(&self, share: &[u8]) -> Result<()>;

    /// Signature share over `message`
    fn sign(&self, message: &[u8]) -> Result<SigShareBytes>;
}

/// Aggregation and verification under one threshold public key
pub trait ThresholdVerifier: Send + Sync {
    /// Combine signature shares; `ids[i]` produced `sigs[i]`
    fn aggregate_signatures(&self, sigs: &[SigShareBytes], ids: &[PartyId]) -> Result<Vec<u8>>;

    /// Check an aggregated signature over `message`
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Constructs party handles and verifiers for one scheme
pub trait ProviderFactory: Send + Sync {
    type Party: ThresholdCryptoProvider;
    type Verifier: ThresholdVerifier;

    /// New, uninitialized party handle logging under `span`
    fn new_party(&self, id: PartyId, span: Span) -> Self::Party;

    /// Verifier for an encoded threshold public key
    fn new_verifier(&self, threshold_pk: &[u8]) -> Result<Self::Verifier>;
}
