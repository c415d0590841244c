//! In-process message router for key generation

use super::PartyEndpoint;
use crate::provider::{SendFn, ThresholdCryptoProvider};
use crate::{Error, PartyId, Result};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Read-only table of endpoints, indexed by party id
type PartyTable<P> = Vec<Arc<PartyEndpoint<P>>>;

/// Synchronous router between [`PartyEndpoint`]s.
///
/// Each party gets a send callback bound to its own id. A broadcast reaches
/// every other endpoint exactly once, never the sender; a point-to-point
/// message reaches only its recipient. The callback returns after every
/// target has processed the message, so messages from one sender arrive in
/// the order they were sent.
pub struct MessageRouter<P> {
    parties: Arc<PartyTable<P>>,
}

impl<P: ThresholdCryptoProvider> MessageRouter<P> {
    /// Create a router over endpoints whose ids are exactly `0..n`, in order
    pub fn new(parties: Vec<Arc<PartyEndpoint<P>>>) -> Result<Self> {
        if parties.is_empty() {
            return Err(Error::InvalidConfig("router needs at least one party".into()));
        }
        for (index, party) in parties.iter().enumerate() {
            if party.id() as usize != index {
                return Err(Error::InvalidConfig(format!(
                    "party at position {} has id {}",
                    index,
                    party.id()
                )));
            }
        }
        Ok(Self {
            parties: Arc::new(parties),
        })
    }

    /// Endpoints known to the router
    pub fn parties(&self) -> &[Arc<PartyEndpoint<P>>] {
        &self.parties
    }

    /// Ids of all endpoints
    pub fn party_ids(&self) -> Vec<PartyId> {
        self.parties.iter().map(|p| p.id()).collect()
    }

    /// Send callback for `from`.
    ///
    /// The callback holds the party table weakly: providers keep their
    /// callback, and the table keeps the providers.
    pub fn sender_for(&self, from: PartyId) -> Result<SendFn> {
        if from as usize >= self.parties.len() {
            return Err(Error::InvalidPartyId(from));
        }
        let table: Weak<PartyTable<P>> = Arc::downgrade(&self.parties);
        Ok(Arc::new(move |payload: &[u8], broadcast: bool, to: PartyId| {
            let parties = table
                .upgrade()
                .ok_or_else(|| Error::Addressing("router has been dropped".into()))?;
            route(&parties, from, payload, broadcast, to)
        }))
    }
}

fn route<P: ThresholdCryptoProvider>(
    parties: &[Arc<PartyEndpoint<P>>],
    from: PartyId,
    payload: &[u8],
    broadcast: bool,
    to: PartyId,
) -> Result<()> {
    if broadcast {
        for party in parties.iter().filter(|p| p.id() != from) {
            deliver(party, from, payload, true);
        }
        trace!(from, recipients = parties.len() - 1, "Broadcast routed");
        return Ok(());
    }

    if to == from {
        return Err(Error::Addressing(format!("party {} addressed itself", from)));
    }
    let target = parties
        .get(to as usize)
        .ok_or_else(|| Error::Addressing(format!("party {} sent to unknown party {}", from, to)))?;
    deliver(target, from, payload, false);
    trace!(from, to, "Direct message routed");
    Ok(())
}

/// A recipient that fails to process a message records the failure in its
/// own run; the sender is not affected.
fn deliver<P: ThresholdCryptoProvider>(
    target: &PartyEndpoint<P>,
    from: PartyId,
    payload: &[u8],
    broadcast: bool,
) {
    if let Err(e) = target.deliver(payload, from, broadcast) {
        warn!(from, to = target.id(), broadcast, error = %e, "Delivery rejected by recipient");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::testing::RecordingProvider;
    use tracing::Span;

    fn endpoints(n: u16) -> Vec<Arc<PartyEndpoint<RecordingProvider>>> {
        (0..n)
            .map(|id| Arc::new(PartyEndpoint::new(id, Span::none(), RecordingProvider::new(id)).unwrap()))
            .collect()
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let router = MessageRouter::new(endpoints(4)).unwrap();
        let send = router.sender_for(2).unwrap();

        send(b"round1", true, 0).unwrap();

        for party in router.parties() {
            let received = party.provider().received();
            if party.id() == 2 {
                assert!(received.is_empty());
            } else {
                assert_eq!(received, vec![(b"round1".to_vec(), 2, true)]);
            }
        }
    }

    #[test]
    fn test_direct_reaches_only_recipient() {
        let router = MessageRouter::new(endpoints(3)).unwrap();
        let send = router.sender_for(0).unwrap();

        send(b"share", false, 2).unwrap();

        assert!(router.parties()[0].provider().received().is_empty());
        assert!(router.parties()[1].provider().received().is_empty());
        assert_eq!(
            router.parties()[2].provider().received(),
            vec![(b"share".to_vec(), 0, false)]
        );
    }

    #[test]
    fn test_addressing_errors() {
        let router = MessageRouter::new(endpoints(3)).unwrap();
        let send = router.sender_for(1).unwrap();

        assert!(matches!(send(b"x", false, 1), Err(Error::Addressing(_))));
        assert!(matches!(send(b"x", false, 7), Err(Error::Addressing(_))));
        assert!(matches!(router.sender_for(3), Err(Error::InvalidPartyId(3))));
        for party in router.parties() {
            assert!(party.provider().received().is_empty());
        }
    }

    #[test]
    fn test_per_sender_order_preserved() {
        let router = MessageRouter::new(endpoints(2)).unwrap();
        let send = router.sender_for(0).unwrap();

        for i in 0u8..10 {
            send(&[i], i % 2 == 0, 1).unwrap();
        }

        let payloads: Vec<u8> = router.parties()[1]
            .provider()
            .received()
            .into_iter()
            .map(|(payload, _, _)| payload[0])
            .collect();
        assert_eq!(payloads, (0u8..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_recipient_failure_not_reported_to_sender() {
        let mut parties = endpoints(2);
        let mut rejecting = RecordingProvider::new(2);
        rejecting.reject_from = Some(0);
        parties.push(Arc::new(PartyEndpoint::new(2, Span::none(), rejecting).unwrap()));
        let router = MessageRouter::new(parties).unwrap();

        let send = router.sender_for(0).unwrap();
        send(b"hi", true, 0).unwrap();

        assert_eq!(router.parties()[1].provider().received().len(), 1);
        assert!(router.parties()[2].provider().received().is_empty());
    }

    #[test]
    fn test_ids_must_be_dense() {
        let mut parties = endpoints(3);
        parties.swap(0, 1);
        assert!(MessageRouter::new(parties).is_err());
        assert!(MessageRouter::<RecordingProvider>::new(Vec::new()).is_err());
    }

    #[test]
    fn test_callback_after_router_dropped() {
        let router = MessageRouter::new(endpoints(2)).unwrap();
        let send = router.sender_for(0).unwrap();
        drop(router);

        assert!(matches!(send(b"late", true, 0), Err(Error::Addressing(_))));
    }

    #[test]
    fn test_concurrent_broadcasts() {
        let router = Arc::new(MessageRouter::new(endpoints(6)).unwrap());

        std::thread::scope(|scope| {
            for id in 0..6u16 {
                let send = router.sender_for(id).unwrap();
                scope.spawn(move || {
                    for round in 0u8..20 {
                        send(&[id as u8, round], true, 0).unwrap();
                    }
                });
            }
        });

        for party in router.parties() {
            let received = party.provider().received();
            assert_eq!(received.len(), 5 * 20);
            assert!(received.iter().all(|(_, from, _)| *from != party.id()));
            for sender in (0..6u16).filter(|s| *s != party.id()) {
                let rounds: Vec<u8> = received
                    .iter()
                    .filter(|(_, from, _)| *from == sender)
                    .map(|(payload, _, _)| payload[1])
                    .collect();
                assert_eq!(rounds, (0u8..20).collect::<Vec<_>>());
            }
        }
    }
}
