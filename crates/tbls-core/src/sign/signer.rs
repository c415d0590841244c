//! Signer holding one reconstituted party

use crate::mpc::PartyEndpoint;
use crate::provider::{ProviderFactory, ThresholdCryptoProvider};
use crate::store;
use crate::{Error, KeyShareRecord, PartyId, Result, SigShareBytes, SignatureShareRecord};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Produces signature shares for one party
pub struct Signer<P> {
    endpoint: PartyEndpoint<P>,
    threshold: usize,
    total_parties: usize,
    threshold_pk: Vec<u8>,
}

impl<P: ThresholdCryptoProvider> Signer<P> {
    /// Signer for the party at `record.shares[index]`
    pub fn from_record<F>(record: &KeyShareRecord, index: usize, factory: &F) -> Result<Self>
    where
        F: ProviderFactory<Party = P>,
    {
        let endpoint = store::reconstruct_party(record, index, factory)?;
        Ok(Self {
            endpoint,
            threshold: record.threshold,
            total_parties: record.total_parties,
            threshold_pk: record.threshold_public_key_bytes()?,
        })
    }

    /// Signer for the first share of a key-share file.
    ///
    /// Per-party files carry exactly one share, so this is the party the
    /// file was written for.
    pub fn load<F>(path: impl AsRef<Path>, factory: &F) -> Result<Self>
    where
        F: ProviderFactory<Party = P>,
    {
        let record = store::load(path)?;
        let signer = Self::from_record(&record, 0, factory)?;
        info!(party_id = signer.party_id(), "Signer loaded");
        Ok(signer)
    }

    /// Signature share over `message`
    #[instrument(skip_all, fields(party_id = self.party_id(), message_len = message.len()))]
    pub fn sign(&self, message: &[u8]) -> Result<SigShareBytes> {
        let share = self.endpoint.sign(message)?;
        debug!(share = hex::encode(&share), "Signature share produced");
        Ok(share)
    }

    pub fn party_id(&self) -> PartyId {
        self.endpoint.id()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn total_parties(&self) -> usize {
        self.total_parties
    }

    /// Encoded threshold public key of the signer's key
    pub fn threshold_pk(&self) -> &[u8] {
        &self.threshold_pk
    }
}

/// Sign `message` with every signer and gather the shares into one record.
///
/// All signers must hold shares of the same key.
pub fn collect_signatures<P: ThresholdCryptoProvider>(
    signers: &[Signer<P>],
    message: &[u8],
) -> Result<SignatureShareRecord> {
    let first = signers
        .first()
        .ok_or_else(|| Error::EmptyInput("no signers".into()))?;

    let mut record = SignatureShareRecord::new(first.total_parties, first.threshold)
        .with_threshold_public_key(&first.threshold_pk);
    for signer in signers {
        if signer.threshold_pk != first.threshold_pk {
            return Err(Error::PublicKeyMismatch {
                party: signer.party_id(),
                reference: first.party_id(),
            });
        }
        if signer.threshold != first.threshold || signer.total_parties != first.total_parties {
            return Err(Error::InvalidConfig(format!(
                "party {} holds a {}-of-{} share, party {} a {}-of-{} share",
                signer.party_id(),
                signer.threshold,
                signer.total_parties,
                first.party_id(),
                first.threshold,
                first.total_parties
            )));
        }
        record.push(signer.party_id(), &signer.sign(message)?);
    }
    Ok(record)
}
