//! Threshold aggregation and verification
//!
//! [`Aggregator`] combines signature shares into a group signature and checks
//! it against the threshold public key. A subset is accepted only when it
//! holds at least `threshold` distinct parties, each contributing a genuine
//! share over the same message. Verification answers with a `bool`; the
//! reason for a rejection is only logged.

use crate::provider::{ProviderFactory, ThresholdVerifier};
use crate::{Error, KeyShareRecord, PartyId, Result, SigShareBytes, SignatureShareRecord};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Verifier bound to one threshold public key, reusable across messages
pub struct Aggregator<V> {
    verifier: V,
    threshold: Option<usize>,
}

impl<V: ThresholdVerifier> Aggregator<V> {
    /// Load a verifier for `threshold_pk`
    pub fn load_verifier<F>(factory: &F, threshold_pk: &[u8]) -> Result<Self>
    where
        F: ProviderFactory<Verifier = V>,
    {
        if threshold_pk.is_empty() {
            return Err(Error::EmptyInput("threshold public key is empty".into()));
        }
        Ok(Self {
            verifier: factory.new_verifier(threshold_pk)?,
            threshold: None,
        })
    }

    /// Verifier for the key of a key-share record, enforcing its threshold
    pub fn from_record<F>(factory: &F, record: &KeyShareRecord) -> Result<Self>
    where
        F: ProviderFactory<Verifier = V>,
    {
        Ok(Self::load_verifier(factory, &record.threshold_public_key_bytes()?)?
            .with_threshold(record.threshold))
    }

    /// Verifier for the key embedded in a signature-share record
    pub fn from_signatures<F>(factory: &F, record: &SignatureShareRecord) -> Result<Self>
    where
        F: ProviderFactory<Verifier = V>,
    {
        let threshold_pk = record
            .threshold_public_key_bytes()?
            .ok_or_else(|| Error::Format("signature record carries no threshold_public_key".into()))?;
        Ok(Self::load_verifier(factory, &threshold_pk)?.with_threshold(record.threshold))
    }

    /// Reject subsets smaller than `threshold` before any curve work
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Combine `sigs`, where `ids[i]` produced `sigs[i]`
    #[instrument(skip_all, fields(shares = sigs.len()))]
    pub fn aggregate(&self, sigs: &[SigShareBytes], ids: &[PartyId]) -> Result<Vec<u8>> {
        if sigs.is_empty() || ids.is_empty() {
            return Err(Error::EmptyInput(format!(
                "{} signature shares, {} party ids",
                sigs.len(),
                ids.len()
            )));
        }
        if sigs.len() != ids.len() {
            return Err(Error::LengthMismatch {
                sigs: sigs.len(),
                ids: ids.len(),
            });
        }

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::DuplicatePartyId(*duplicate));
        }

        if let Some(required) = self.threshold {
            if ids.len() < required {
                return Err(Error::ThresholdNotMet {
                    required,
                    actual: ids.len(),
                });
            }
        }

        let aggregated = self.verifier.aggregate_signatures(sigs, ids)?;
        debug!(parties = ?ids, "Signature shares aggregated");
        Ok(aggregated)
    }

    /// Check an aggregated signature over `message`
    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> bool {
        match self.verifier.verify(message, signature) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Signature rejected");
                false
            }
        }
    }

    /// Aggregate `sigs` and check the result over `message`
    #[instrument(skip_all, fields(parties = ?ids))]
    pub fn verify(&self, message: &[u8], sigs: &[SigShareBytes], ids: &[PartyId]) -> bool {
        match self.aggregate(sigs, ids) {
            Ok(signature) => self.verify_signature(message, &signature),
            Err(e) => {
                warn!(error = %e, "Aggregation rejected");
                false
            }
        }
    }

    /// Verify the shares of `record` from the listed parties, or from every
    /// party in the record when `ids` is empty
    pub fn verify_record(
        &self,
        message: &[u8],
        record: &SignatureShareRecord,
        ids: &[PartyId],
    ) -> bool {
        let selected = if ids.is_empty() {
            record.decode()
        } else {
            record.select(ids)
        };
        match selected {
            Ok((sigs, ids)) => self.verify(message, &sigs, &ids),
            Err(e) => {
                warn!(error = %e, "Signature record unusable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::DkgCoordinator;
    use crate::provider::{Bn254Provider, Bn254Verifier};
    use crate::sign::{collect_signatures, Signer};
    use crate::{message_digest, ThresholdConfig};

    struct Fixture {
        record: KeyShareRecord,
        signers: Vec<Signer<crate::provider::Bn254Party>>,
    }

    async fn fixture(n: usize, t: usize) -> Fixture {
        let record = DkgCoordinator::new(ThresholdConfig::new(n, t).unwrap(), &Bn254Provider)
            .unwrap()
            .run()
            .await
            .unwrap()
            .into_record()
            .unwrap();
        let signers = (0..n)
            .map(|i| Signer::from_record(&record, i, &Bn254Provider).unwrap())
            .collect();
        Fixture { record, signers }
    }

    fn plain(fixture: &Fixture) -> Aggregator<Bn254Verifier> {
        let pk = fixture.record.threshold_public_key_bytes().unwrap();
        Aggregator::load_verifier(&Bn254Provider, &pk).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_input_errors() {
        let fixture = fixture(3, 2).await;
        let aggregator = plain(&fixture);
        let sig = fixture.signers[0].sign(b"m").unwrap();

        assert!(matches!(aggregator.aggregate(&[], &[]), Err(Error::EmptyInput(_))));
        assert!(matches!(
            aggregator.aggregate(&[sig.clone()], &[]),
            Err(Error::EmptyInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate(&[sig.clone()], &[0, 1]),
            Err(Error::LengthMismatch { sigs: 1, ids: 2 })
        ));
        assert!(matches!(
            aggregator.aggregate(&[sig.clone(), sig.clone()], &[0, 0]),
            Err(Error::DuplicatePartyId(0))
        ));
        assert!(aggregator.aggregate(&[sig.clone(), sig], &[0, 0]).unwrap_err().is_input_error());

        assert!(Aggregator::load_verifier(&Bn254Provider, &[]).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_threshold_semantics() {
        let fixture = fixture(4, 3).await;
        let aggregator = plain(&fixture);
        let message = message_digest(b"msg1");
        let sigs: Vec<_> = fixture
            .signers
            .iter()
            .map(|s| s.sign(&message).unwrap())
            .collect();

        let pick = |ids: &[PartyId]| -> Vec<SigShareBytes> {
            ids.iter().map(|id| sigs[*id as usize].clone()).collect()
        };

        assert!(aggregator.verify(&message, &pick(&[0, 1, 2]), &[0, 1, 2]));
        assert!(aggregator.verify(&message, &pick(&[3, 1, 0]), &[3, 1, 0]));
        assert!(aggregator.verify(&message, &pick(&[0, 1, 2, 3]), &[0, 1, 2, 3]));
        assert!(!aggregator.verify(&message, &pick(&[0, 1]), &[0, 1]));
        assert!(!aggregator.verify(&message, &pick(&[0, 0, 1]), &[0, 0, 1]));
        assert!(!aggregator.verify(b"msg2", &pick(&[0, 1, 2]), &[0, 1, 2]));
        // Shares attributed to the wrong parties
        assert!(!aggregator.verify(&message, &pick(&[0, 1, 2]), &[1, 0, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_with_threshold_rejects_early() {
        let fixture = fixture(3, 2).await;
        let aggregator = Aggregator::from_record(&Bn254Provider, &fixture.record).unwrap();
        assert_eq!(aggregator.threshold(), Some(2));

        let sig = fixture.signers[1].sign(b"m").unwrap();
        assert!(matches!(
            aggregator.aggregate(&[sig], &[1]),
            Err(Error::ThresholdNotMet { required: 2, actual: 1 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_verify_record() {
        let fixture = fixture(3, 2).await;
        let record = collect_signatures(&fixture.signers, b"payload").unwrap();
        let aggregator = Aggregator::from_signatures(&Bn254Provider, &record).unwrap();

        assert!(aggregator.verify_record(b"payload", &record, &[]));
        assert!(aggregator.verify_record(b"payload", &record, &[2, 0]));
        assert!(!aggregator.verify_record(b"payload", &record, &[1]));
        assert!(!aggregator.verify_record(b"payload", &record, &[1, 7]));
        assert!(!aggregator.verify_record(b"other", &record, &[0, 1]));

        let signature = aggregator
            .aggregate(&record.select(&[0, 1]).unwrap().0, &[0, 1])
            .unwrap();
        assert_eq!(signature.len(), 64);
        assert!(aggregator.verify_signature(b"payload", &signature));
        assert!(!aggregator.verify_signature(b"payload", &signature[..32]));

        let mut bare = record.clone();
        bare.threshold_public_key = None;
        assert!(matches!(
            Aggregator::from_signatures(&Bn254Provider, &bare),
            Err(Error::Format(_))
        ));
    }
}
