//! Core types for threshold BLS orchestration

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use zeroize::Zeroizing;

/// Identifier of a party, dense from 0. Doubles as the provider's party
/// handle on the wire.
pub type PartyId = u16;

/// Opaque provider-encoded secret share of one party
pub type ShareBytes = Vec<u8>;

/// Opaque provider-encoded signature share of one party
pub type SigShareBytes = Vec<u8>;

/// Largest party count whose ids all fit in a [`PartyId`]
pub const MAX_PARTIES: usize = PartyId::MAX as usize + 1;

/// SHA-256 digest of a message, the form in which messages are signed
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

/// Party count and threshold shared by key generation and aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    n: usize,
    threshold: usize,
}

impl ThresholdConfig {
    /// Create a validated configuration (`1 <= threshold <= n`)
    pub fn new(n: usize, threshold: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidConfig("At least one party is required".into()));
        }
        if n > MAX_PARTIES {
            return Err(Error::InvalidConfig(format!(
                "At most {} parties are supported, got {}",
                MAX_PARTIES, n
            )));
        }
        if threshold == 0 {
            return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
        }
        if threshold > n {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of parties".into(),
            ));
        }
        Ok(Self { n, threshold })
    }

    /// Number of parties
    pub fn n(&self) -> usize {
        self.n
    }

    /// Minimum number of signature shares that verify
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// All party ids, `0..n`
    pub fn party_ids(&self) -> Vec<PartyId> {
        (0..self.n).map(|i| i as PartyId).collect()
    }
}

/// One party's entry in a [`KeyShareRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShareEntry {
    pub party_id: PartyId,
    /// Base64 of the provider share
    pub share: String,
}

/// Persisted output of a successful key generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShareRecord {
    pub total_parties: usize,
    pub threshold: usize,
    /// Base64 of the threshold public key
    pub threshold_public_key: String,
    pub shares: Vec<KeyShareEntry>,
}

impl KeyShareRecord {
    /// Encode a complete key generation result.
    ///
    /// `shares[i]` is the share of party `i`. Refuses an empty share list
    /// and any missing or empty slot, so an unsuccessful run can never be
    /// turned into a record.
    pub fn new(
        threshold: usize,
        total_parties: usize,
        threshold_pk: &[u8],
        shares: &[Option<ShareBytes>],
    ) -> Result<Self> {
        ThresholdConfig::new(total_parties, threshold)?;

        if threshold_pk.is_empty() {
            return Err(Error::EmptyInput("threshold public key is empty".into()));
        }
        if shares.is_empty() {
            return Err(Error::EmptyInput("no shares provided".into()));
        }
        if shares.len() != total_parties {
            return Err(Error::InvalidConfig(format!(
                "expected {} shares, got {}",
                total_parties,
                shares.len()
            )));
        }

        let entries = shares
            .iter()
            .enumerate()
            .map(|(i, share)| match share {
                Some(bytes) if !bytes.is_empty() => Ok(KeyShareEntry {
                    party_id: i as PartyId,
                    share: STANDARD.encode(bytes),
                }),
                _ => Err(Error::EmptyInput(format!("share of party {} is missing", i))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            total_parties,
            threshold,
            threshold_public_key: STANDARD.encode(threshold_pk),
            shares: entries,
        })
    }

    /// Threshold configuration carried by the record
    pub fn config(&self) -> Result<ThresholdConfig> {
        ThresholdConfig::new(self.total_parties, self.threshold)
    }

    /// Decoded threshold public key
    pub fn threshold_public_key_bytes(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.threshold_public_key)?)
    }

    /// Party id and decoded share at `index`
    pub fn share(&self, index: usize) -> Result<(PartyId, Zeroizing<ShareBytes>)> {
        let entry = self.shares.get(index).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "share index {} out of range ({} shares)",
                index,
                self.shares.len()
            ))
        })?;
        let bytes = Zeroizing::new(STANDARD.decode(&entry.share)?);
        Ok((entry.party_id, bytes))
    }

    /// Record restricted to a single party's share
    pub fn for_party(&self, party_id: PartyId) -> Result<Self> {
        let entry = self
            .shares
            .iter()
            .find(|e| e.party_id == party_id)
            .ok_or(Error::InvalidPartyId(party_id))?;
        Ok(Self {
            total_parties: self.total_parties,
            threshold: self.threshold,
            threshold_public_key: self.threshold_public_key.clone(),
            shares: vec![entry.clone()],
        })
    }

    /// Structural checks applied to every loaded record
    pub fn validate(&self) -> Result<()> {
        if self.shares.is_empty() {
            return Err(Error::EmptyRecord("shares".into()));
        }
        let config = self
            .config()
            .map_err(|e| Error::Format(e.to_string()))?;
        // Either the full key generation output or a single party's file
        if self.shares.len() != config.n() && self.shares.len() != 1 {
            return Err(Error::Format(format!(
                "{} shares for {} parties",
                self.shares.len(),
                config.n()
            )));
        }
        if self.threshold_public_key_bytes()?.is_empty() {
            return Err(Error::Format("threshold_public_key is empty".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.shares {
            if entry.party_id as usize >= config.n() {
                return Err(Error::Format(format!(
                    "party_id {} outside 0..{}",
                    entry.party_id,
                    config.n()
                )));
            }
            if !seen.insert(entry.party_id) {
                return Err(Error::Format(format!("party_id {} repeated", entry.party_id)));
            }
            if STANDARD.decode(&entry.share)?.is_empty() {
                return Err(Error::Format(format!(
                    "share of party {} is empty",
                    entry.party_id
                )));
            }
        }
        Ok(())
    }
}

/// One party's entry in a [`SignatureShareRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigShareEntry {
    pub party_id: PartyId,
    /// Base64 of the signature share
    pub sig: String,
}

/// Signature shares collected after independent signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShareRecord {
    pub total_parties: usize,
    pub threshold: usize,
    /// Base64 of the threshold public key, when the producer knew it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_public_key: Option<String>,
    pub sigs: Vec<SigShareEntry>,
}

impl SignatureShareRecord {
    /// Start an empty record for a key with the given parameters
    pub fn new(total_parties: usize, threshold: usize) -> Self {
        Self {
            total_parties,
            threshold,
            threshold_public_key: None,
            sigs: Vec::new(),
        }
    }

    /// Attach the threshold public key the shares verify under
    pub fn with_threshold_public_key(mut self, threshold_pk: &[u8]) -> Self {
        self.threshold_public_key = Some(STANDARD.encode(threshold_pk));
        self
    }

    /// Append a party's signature share
    pub fn push(&mut self, party_id: PartyId, sig: &[u8]) {
        self.sigs.push(SigShareEntry {
            party_id,
            sig: STANDARD.encode(sig),
        });
    }

    /// Decoded threshold public key, if present
    pub fn threshold_public_key_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.threshold_public_key
            .as_ref()
            .map(|pk| STANDARD.decode(pk).map_err(Error::from))
            .transpose()
    }

    /// Decoded signature shares and their party ids, positionally paired
    pub fn decode(&self) -> Result<(Vec<SigShareBytes>, Vec<PartyId>)> {
        let mut sigs = Vec::with_capacity(self.sigs.len());
        let mut ids = Vec::with_capacity(self.sigs.len());
        for entry in &self.sigs {
            sigs.push(STANDARD.decode(&entry.sig)?);
            ids.push(entry.party_id);
        }
        Ok((sigs, ids))
    }

    /// Decoded shares of the listed parties, in the order given
    pub fn select(&self, party_ids: &[PartyId]) -> Result<(Vec<SigShareBytes>, Vec<PartyId>)> {
        let mut sigs = Vec::with_capacity(party_ids.len());
        for id in party_ids {
            let entry = self
                .sigs
                .iter()
                .find(|e| e.party_id == *id)
                .ok_or(Error::InvalidPartyId(*id))?;
            sigs.push(STANDARD.decode(&entry.sig)?);
        }
        Ok((sigs, party_ids.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_config_bounds() {
        assert!(ThresholdConfig::new(4, 3).is_ok());
        assert!(ThresholdConfig::new(1, 1).is_ok());
        assert!(matches!(ThresholdConfig::new(0, 0), Err(Error::InvalidConfig(_))));
        assert!(matches!(ThresholdConfig::new(3, 0), Err(Error::InvalidConfig(_))));
        assert!(matches!(ThresholdConfig::new(3, 4), Err(Error::InvalidConfig(_))));
        assert!(ThresholdConfig::new(MAX_PARTIES + 1, 2).is_err());
    }

    #[test]
    fn test_party_ids_are_dense() {
        let config = ThresholdConfig::new(5, 2).unwrap();
        assert_eq!(config.party_ids(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_record_refuses_missing_share() {
        let shares = vec![Some(vec![1u8; 4]), None, Some(vec![3u8; 4])];
        let result = KeyShareRecord::new(2, 3, &[9u8; 8], &shares);
        assert!(matches!(result, Err(Error::EmptyInput(_))));

        let shares = vec![Some(vec![1u8; 4]), Some(Vec::new()), Some(vec![3u8; 4])];
        let result = KeyShareRecord::new(2, 3, &[9u8; 8], &shares);
        assert!(matches!(result, Err(Error::EmptyInput(_))));

        let result = KeyShareRecord::new(2, 3, &[9u8; 8], &[]);
        assert!(matches!(result, Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_record_decodes_what_it_encodes() {
        let shares = vec![Some(vec![1u8, 2, 3]), Some(vec![4u8, 5, 6])];
        let record = KeyShareRecord::new(2, 2, &[7u8; 64], &shares).unwrap();
        record.validate().unwrap();

        assert_eq!(record.threshold_public_key_bytes().unwrap(), vec![7u8; 64]);
        let (id, share) = record.share(1).unwrap();
        assert_eq!(id, 1);
        assert_eq!(share.as_slice(), &[4u8, 5, 6]);
        assert!(record.share(2).is_err());
    }

    #[test]
    fn test_for_party_keeps_one_share() {
        let shares = vec![Some(vec![1u8]), Some(vec![2u8]), Some(vec![3u8])];
        let record = KeyShareRecord::new(2, 3, &[7u8; 4], &shares).unwrap();

        let single = record.for_party(2).unwrap();
        assert_eq!(single.shares.len(), 1);
        assert_eq!(single.shares[0].party_id, 2);
        single.validate().unwrap();
        assert!(matches!(record.for_party(9), Err(Error::InvalidPartyId(9))));
    }

    #[test]
    fn test_validate_requires_all_or_one_share() {
        let shares: Vec<_> = (1u8..=4).map(|b| Some(vec![b])).collect();
        let record = KeyShareRecord::new(3, 4, &[7u8; 4], &shares).unwrap();
        record.validate().unwrap();
        record.for_party(3).unwrap().validate().unwrap();

        let mut truncated = record.clone();
        truncated.shares.truncate(2);
        assert!(matches!(truncated.validate(), Err(Error::Format(_))));

        let mut truncated = record;
        truncated.shares.truncate(3);
        assert!(matches!(truncated.validate(), Err(Error::Format(_))));
    }

    #[test]
    fn test_validate_rejects_repeated_party() {
        let mut record =
            KeyShareRecord::new(2, 3, &[7u8; 4], &[Some(vec![1]), Some(vec![2]), Some(vec![3])])
                .unwrap();
        record.shares[1].party_id = 0;
        assert!(matches!(record.validate(), Err(Error::Format(_))));
    }

    #[test]
    fn test_signature_record_select() {
        let mut record = SignatureShareRecord::new(3, 2);
        record.push(0, &[10u8; 64]);
        record.push(1, &[11u8; 64]);
        record.push(2, &[12u8; 64]);

        let (sigs, ids) = record.select(&[2, 0]).unwrap();
        assert_eq!(ids, vec![2, 0]);
        assert_eq!(sigs[0], vec![12u8; 64]);
        assert_eq!(sigs[1], vec![10u8; 64]);
        assert!(matches!(record.select(&[5]), Err(Error::InvalidPartyId(5))));
        assert!(record.threshold_public_key_bytes().unwrap().is_none());
    }

    #[test]
    fn test_message_digest_is_sha256() {
        assert_eq!(
            hex::encode(message_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
