//! One party's attachment point to the simulated network

use crate::provider::{SendFn, ThresholdCryptoProvider};
use crate::{Error, PartyId, Result, ShareBytes, SigShareBytes};
use parking_lot::Mutex;
use tracing::{debug, Instrument, Span};

/// A party identity bound to its provider handle and logging context.
///
/// Inbound deliveries are serialized per endpoint: concurrent senders may
/// call [`deliver`](Self::deliver) at the same time, the provider sees one
/// message at a time.
pub struct PartyEndpoint<P> {
    id: PartyId,
    span: Span,
    provider: P,
    inbound: Mutex<()>,
}

impl<P: ThresholdCryptoProvider> PartyEndpoint<P> {
    /// Bind `provider` to `id`. The provider must have been created for the
    /// same id.
    pub fn new(id: PartyId, span: Span, provider: P) -> Result<Self> {
        if provider.party_id() != id {
            return Err(Error::InvalidPartyId(provider.party_id()));
        }
        Ok(Self {
            id,
            span,
            provider,
            inbound: Mutex::new(()),
        })
    }

    /// This endpoint's party id
    pub fn id(&self) -> PartyId {
        self.id
    }

    /// Logging context of this party
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Underlying provider handle
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Initialize the provider for key generation with the router's
    /// callback for this party
    pub fn init(&self, ids: &[PartyId], threshold: usize, send: SendFn) -> Result<()> {
        self.provider.init(ids, threshold, send)
    }

    /// Hand an inbound protocol message to the provider
    pub fn deliver(&self, payload: &[u8], from: PartyId, broadcast: bool) -> Result<()> {
        let _inbound = self.inbound.lock();
        self.provider.on_msg(payload, from, broadcast)
    }

    /// Run this party's side of key generation to completion
    pub async fn generate_share(&self) -> Result<ShareBytes> {
        let share = self
            .provider
            .keygen()
            .instrument(self.span.clone())
            .await?;
        debug!(parent: &self.span, share_len = share.len(), "Share generated");
        Ok(share)
    }

    /// Threshold public key as this party computed it
    pub fn threshold_pk(&self) -> Result<Vec<u8>> {
        self.provider.threshold_pk()
    }

    /// Load a persisted share without running key generation
    pub fn set_share_data(&self, share: &[u8]) -> Result<()> {
        self.provider.set_share_data(share)
    }

    /// Signature share over `message`
    pub fn sign(&self, message: &[u8]) -> Result<SigShareBytes> {
        self.provider.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::testing::RecordingProvider;

    #[test]
    fn test_endpoint_requires_matching_id() {
        let result = PartyEndpoint::new(1, Span::none(), RecordingProvider::new(2));
        assert!(matches!(result, Err(Error::InvalidPartyId(2))));
    }

    #[test]
    fn test_deliver_forwards_to_provider() {
        let endpoint = PartyEndpoint::new(0, Span::none(), RecordingProvider::new(0)).unwrap();
        endpoint.deliver(b"hello", 3, true).unwrap();
        endpoint.deliver(b"world", 2, false).unwrap();

        let received = endpoint.provider().received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], (b"hello".to_vec(), 3, true));
        assert_eq!(received[1], (b"world".to_vec(), 2, false));
    }

    #[tokio::test]
    async fn test_generate_share() {
        let endpoint = PartyEndpoint::new(4, Span::none(), RecordingProvider::new(4)).unwrap();
        assert_eq!(endpoint.generate_share().await.unwrap(), vec![5]);
    }
}
