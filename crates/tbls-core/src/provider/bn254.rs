//! Threshold BLS over BN254
//!
//! Key generation is a joint Feldman VSS: every party deals a random
//! polynomial of degree `t - 1`, broadcasts commitments to its coefficients
//! in G2 and sends each peer its evaluation point-to-point. A party's final
//! secret is the sum of the evaluations it received plus its own; the
//! threshold public key is the sum of all constant-term commitments.
//!
//! Signature shares are `sk_i * H(m)` in G1, combined with Lagrange
//! coefficients at zero and checked with `e(sig, g2) == e(H(m), pk)`.
//!
//! Encodings: signatures and signature shares are uncompressed G1 (64
//! bytes), the threshold public key is compressed G2 (64 bytes).

use super::{async_trait, DkgMessage, ProviderFactory, SendFn, ThresholdCryptoProvider, ThresholdVerifier};
use crate::{Error, PartyId, Result, ShareBytes, SigShareBytes, MAX_PARTIES};
use ark_bn254::{g1, Bn254, Fq, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, short_weierstrass::SWCurveConfig, AffineRepr, CurveGroup};
use ark_ff::{Field, One, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tokio::sync::Notify;
use tracing::{debug, info, warn, Instrument, Span};
use zeroize::{Zeroize, Zeroizing};

/// Size of an encoded signature or signature share
pub const SIGNATURE_SIZE: usize = 64;

/// Size of an encoded threshold public key
pub const PUBLIC_KEY_SIZE: usize = 64;

/// Domain separation tag for hashing messages onto G1
const HASH_TO_G1_DST: &[u8] = b"TBLS_BN254_G1_SHA256_TAI_";

/// Factory for BN254 parties and verifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct Bn254Provider;

impl ProviderFactory for Bn254Provider {
    type Party = Bn254Party;
    type Verifier = Bn254Verifier;

    fn new_party(&self, id: PartyId, span: Span) -> Bn254Party {
        Bn254Party::new(id, span)
    }

    fn new_verifier(&self, threshold_pk: &[u8]) -> Result<Bn254Verifier> {
        Bn254Verifier::new(threshold_pk)
    }
}

mod share {
    //! Must not import the crate's `Result` alias: the arkworks derives
    //! expand to the two-parameter `Result`.

    use crate::{Error, PartyId, ShareBytes};
    use ark_bn254::{Fr, G2Affine};
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use zeroize::Zeroize;

    /// Key material of one party, also its persisted share encoding
    #[derive(CanonicalSerialize, CanonicalDeserialize)]
    pub(super) struct ShareData {
        pub(super) party_id: PartyId,
        pub(super) threshold: u32,
        pub(super) secret: Fr,
        pub(super) threshold_pk: G2Affine,
    }

    impl ShareData {
        pub(super) fn to_bytes(&self) -> crate::Result<ShareBytes> {
            let mut bytes = Vec::with_capacity(self.compressed_size());
            self.serialize_compressed(&mut bytes)?;
            Ok(bytes)
        }

        pub(super) fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
            let mut reader = bytes;
            let data = Self::deserialize_compressed(&mut reader)?;
            if !reader.is_empty() {
                return Err(Error::Crypto(format!(
                    "{} trailing bytes after share data",
                    reader.len()
                )));
            }
            if data.threshold == 0 {
                return Err(Error::Crypto("share data has zero threshold".into()));
            }
            Ok(data)
        }
    }

    impl Drop for ShareData {
        fn drop(&mut self) {
            self.secret.zeroize();
        }
    }
}

use share::ShareData;

struct Outbound {
    payload: Zeroizing<Vec<u8>>,
    broadcast: bool,
    to: PartyId,
}

/// In-flight key generation of one party
struct DkgState {
    ids: Vec<PartyId>,
    threshold: usize,
    send: SendFn,
    coefficients: Vec<Fr>,
    commitments: HashMap<PartyId, Vec<G2Affine>>,
    received: HashMap<PartyId, Fr>,
    failure: Option<String>,
    started: bool,
}

impl DkgState {
    fn new(me: PartyId, ids: &[PartyId], threshold: usize, send: SendFn) -> Self {
        let mut rng = OsRng;
        let coefficients: Vec<Fr> = (0..threshold).map(|_| Fr::rand(&mut rng)).collect();
        let own_commitments = G2Projective::normalize_batch(
            &coefficients
                .iter()
                .map(|c| G2Affine::generator() * c)
                .collect::<Vec<_>>(),
        );

        let mut commitments = HashMap::with_capacity(ids.len());
        commitments.insert(me, own_commitments);

        Self {
            ids: ids.to_vec(),
            threshold,
            send,
            coefficients,
            commitments,
            received: HashMap::with_capacity(ids.len()),
            failure: None,
            started: false,
        }
    }

    /// Commitment broadcast followed by one share per peer
    fn outbound(&self, me: PartyId) -> Result<Vec<Outbound>> {
        let own = self
            .commitments
            .get(&me)
            .ok_or_else(|| Error::Internal("own commitments missing".into()))?;
        let coefficients = own
            .iter()
            .map(|point| {
                let mut bytes = Vec::with_capacity(PUBLIC_KEY_SIZE);
                point.serialize_compressed(&mut bytes)?;
                Ok(bytes)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut messages = Vec::with_capacity(self.ids.len());
        messages.push(Outbound {
            payload: Zeroizing::new(serde_json::to_vec(&DkgMessage::Commitment { coefficients })?),
            broadcast: true,
            to: me,
        });

        for &id in &self.ids {
            if id == me {
                continue;
            }
            let mut value = Vec::with_capacity(32);
            evaluate_polynomial(&self.coefficients, party_x(id)).serialize_compressed(&mut value)?;
            let payload = serde_json::to_vec(&DkgMessage::Share { value: value.clone() })?;
            value.zeroize();
            messages.push(Outbound {
                payload: Zeroizing::new(payload),
                broadcast: false,
                to: id,
            });
        }

        Ok(messages)
    }

    fn accept(&mut self, message: DkgMessage, from: PartyId, broadcast: bool) -> Result<()> {
        if !self.ids.contains(&from) {
            return Err(Error::InvalidPartyId(from));
        }

        match message {
            DkgMessage::Commitment { coefficients } => {
                if !broadcast {
                    return Err(Error::Crypto(format!(
                        "commitment from party {} was not broadcast",
                        from
                    )));
                }
                if self.commitments.contains_key(&from) {
                    return Err(Error::Crypto(format!("second commitment from party {}", from)));
                }
                if coefficients.len() != self.threshold {
                    return Err(Error::Crypto(format!(
                        "party {} committed to {} coefficients, expected {}",
                        from,
                        coefficients.len(),
                        self.threshold
                    )));
                }
                let points = coefficients
                    .iter()
                    .map(|bytes| decode_g2(bytes))
                    .collect::<Result<Vec<_>>>()?;
                self.commitments.insert(from, points);
            }
            DkgMessage::Share { mut value } => {
                if broadcast {
                    value.zeroize();
                    return Err(Error::Crypto(format!("share from party {} was broadcast", from)));
                }
                if self.received.contains_key(&from) {
                    value.zeroize();
                    return Err(Error::Crypto(format!("second share from party {}", from)));
                }
                let share = Fr::deserialize_compressed(value.as_slice());
                value.zeroize();
                self.received.insert(from, share?);
            }
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.commitments.len() == self.ids.len() && self.received.len() + 1 == self.ids.len()
    }

    /// Verify every received share and derive this party's key material
    fn finish(&self, me: PartyId) -> Result<ShareData> {
        for (&from, share) in &self.received {
            let commitments = self
                .commitments
                .get(&from)
                .ok_or_else(|| Error::Crypto(format!("no commitments from party {}", from)))?;
            if !verify_share(share, me, commitments) {
                return Err(Error::Crypto(format!(
                    "share from party {} does not match its commitments",
                    from
                )));
            }
        }

        let mut secret = evaluate_polynomial(&self.coefficients, party_x(me));
        for share in self.received.values() {
            secret += share;
        }

        let mut threshold_pk = G2Projective::zero();
        for id in &self.ids {
            let constant = self
                .commitments
                .get(id)
                .and_then(|c| c.first())
                .ok_or_else(|| Error::Crypto(format!("no commitments from party {}", id)))?;
            threshold_pk += constant.into_group();
        }

        Ok(ShareData {
            party_id: me,
            threshold: self.threshold as u32,
            secret,
            threshold_pk: threshold_pk.into_affine(),
        })
    }
}

impl Drop for DkgState {
    fn drop(&mut self) {
        self.coefficients.zeroize();
        for share in self.received.values_mut() {
            share.zeroize();
        }
    }
}

#[derive(Default)]
struct PartyState {
    dkg: Option<DkgState>,
    key: Option<ShareData>,
}

/// One party of the BN254 threshold scheme
pub struct Bn254Party {
    id: PartyId,
    span: Span,
    state: Mutex<PartyState>,
    inbound: Notify,
}

impl Bn254Party {
    /// Create an uninitialized party logging under `span`
    pub fn new(id: PartyId, span: Span) -> Self {
        Self {
            id,
            span,
            state: Mutex::new(PartyState::default()),
            inbound: Notify::new(),
        }
    }

    fn protocol_error(&self, reason: impl Into<String>) -> Error {
        Error::Protocol {
            party: self.id,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ThresholdCryptoProvider for Bn254Party {
    fn party_id(&self) -> PartyId {
        self.id
    }

    fn init(&self, ids: &[PartyId], threshold: usize, send: SendFn) -> Result<()> {
        let _enter = self.span.enter();

        if ids.len() > MAX_PARTIES {
            return Err(Error::InvalidConfig(format!("{} parties", ids.len())));
        }
        let unique: HashSet<_> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(Error::InvalidConfig("party ids must be unique".into()));
        }
        if !unique.contains(&self.id) {
            return Err(Error::InvalidPartyId(self.id));
        }
        if threshold == 0 || threshold > ids.len() {
            return Err(Error::InvalidConfig(format!(
                "threshold {} out of range for {} parties",
                threshold,
                ids.len()
            )));
        }

        let mut state = self.state.lock();
        if state.dkg.is_some() {
            return Err(self.protocol_error("already initialized"));
        }
        state.dkg = Some(DkgState::new(self.id, ids, threshold, send));
        debug!(parties = ids.len(), threshold, "Party initialized");
        Ok(())
    }

    fn on_msg(&self, payload: &[u8], from: PartyId, broadcast: bool) -> Result<()> {
        let _enter = self.span.enter();

        if from == self.id {
            return Err(self.protocol_error("message from self"));
        }

        let result = {
            let mut state = self.state.lock();
            match state.dkg.as_mut() {
                None => Err(self.protocol_error("no key generation in progress")),
                Some(dkg) => {
                    let result = serde_json::from_slice::<DkgMessage>(payload)
                        .map_err(|e| Error::Deserialization(e.to_string()))
                        .and_then(|message| dkg.accept(message, from, broadcast));
                    if let Err(e) = &result {
                        dkg.failure.get_or_insert_with(|| e.to_string());
                    }
                    result
                }
            }
        };

        match &result {
            Ok(()) => debug!(from, broadcast, "Message accepted"),
            Err(e) => warn!(from, broadcast, error = %e, "Message rejected"),
        }
        self.inbound.notify_one();
        result
    }

    async fn keygen(&self) -> Result<ShareBytes> {
        let span = self.span.clone();
        async move {
            info!("Starting key generation");

            let (send, outbound) = {
                let mut state = self.state.lock();
                let dkg = state
                    .dkg
                    .as_mut()
                    .ok_or_else(|| self.protocol_error("keygen called before init"))?;
                if dkg.started {
                    return Err(self.protocol_error("keygen already started"));
                }
                dkg.started = true;
                (dkg.send.clone(), dkg.outbound(self.id)?)
            };

            // Lock is released: delivery re-enters peers synchronously
            for message in &outbound {
                send(&message.payload, message.broadcast, message.to)?;
            }
            drop(outbound);
            debug!("Commitment and shares sent");

            loop {
                let notified = self.inbound.notified();
                {
                    let mut state = self.state.lock();
                    let dkg = state
                        .dkg
                        .as_ref()
                        .ok_or_else(|| self.protocol_error("key generation state lost"))?;
                    if let Some(reason) = &dkg.failure {
                        return Err(self.protocol_error(reason.clone()));
                    }
                    if dkg.is_ready() {
                        let key = dkg
                            .finish(self.id)
                            .map_err(|e| self.protocol_error(e.to_string()))?;
                        let bytes = key.to_bytes()?;
                        info!(
                            threshold_pk = hex::encode(encode_g2(&key.threshold_pk)?),
                            "Key generation completed"
                        );
                        state.dkg = None;
                        state.key = Some(key);
                        return Ok(bytes);
                    }
                }
                notified.await;
            }
        }
        .instrument(span)
        .await
    }

    fn threshold_pk(&self) -> Result<Vec<u8>> {
        let state = self.state.lock();
        let key = state
            .key
            .as_ref()
            .ok_or_else(|| self.protocol_error("no key material"))?;
        encode_g2(&key.threshold_pk)
    }

    fn set_share_data(&self, share: &[u8]) -> Result<()> {
        let _enter = self.span.enter();

        let data = ShareData::from_bytes(share)?;
        if data.party_id != self.id {
            return Err(self.protocol_error(format!(
                "share belongs to party {}",
                data.party_id
            )));
        }

        let mut state = self.state.lock();
        state.dkg = None;
        state.key = Some(data);
        debug!("Share data loaded");
        Ok(())
    }

    fn sign(&self, message: &[u8]) -> Result<SigShareBytes> {
        let state = self.state.lock();
        let key = state
            .key
            .as_ref()
            .ok_or_else(|| self.protocol_error("no key material"))?;
        let share = (hash_to_g1(message) * key.secret).into_affine();
        encode_g1(&share)
    }
}

/// Aggregates and verifies under one BN254 threshold public key
#[derive(Debug, Clone)]
pub struct Bn254Verifier {
    threshold_pk: G2Affine,
}

impl Bn254Verifier {
    /// Verifier for a compressed G2 threshold public key
    pub fn new(threshold_pk: &[u8]) -> Result<Self> {
        let threshold_pk = decode_g2(threshold_pk)?;
        if threshold_pk.is_zero() {
            return Err(Error::Crypto("threshold public key is the identity".into()));
        }
        Ok(Self { threshold_pk })
    }
}

impl ThresholdVerifier for Bn254Verifier {
    fn aggregate_signatures(&self, sigs: &[SigShareBytes], ids: &[PartyId]) -> Result<Vec<u8>> {
        if sigs.len() != ids.len() {
            return Err(Error::LengthMismatch {
                sigs: sigs.len(),
                ids: ids.len(),
            });
        }
        if sigs.is_empty() {
            return Err(Error::EmptyInput("no signature shares".into()));
        }

        let xs: Vec<Fr> = ids.iter().map(|id| party_x(*id)).collect();
        let mut aggregated = G1Projective::zero();
        for (i, (sig, id)) in sigs.iter().zip(ids).enumerate() {
            let point = decode_g1(sig)?;
            let lambda = lagrange_at_zero(i, &xs).ok_or(Error::DuplicatePartyId(*id))?;
            aggregated += point * lambda;
        }

        encode_g1(&aggregated.into_affine())
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = decode_g1(signature)?;
        if signature.is_zero() {
            return Err(Error::Crypto("signature is the identity".into()));
        }

        let lhs = Bn254::pairing(signature, G2Affine::generator());
        let rhs = Bn254::pairing(hash_to_g1(message), self.threshold_pk);
        if lhs != rhs {
            return Err(Error::Crypto("pairing check failed".into()));
        }
        Ok(())
    }
}

/// Evaluation point of a party: ids start at 0, x starts at 1
fn party_x(id: PartyId) -> Fr {
    Fr::from(u64::from(id) + 1)
}

/// Horner evaluation of `a_0 + a_1 x + ... + a_{t-1} x^{t-1}`
fn evaluate_polynomial(coefficients: &[Fr], x: Fr) -> Fr {
    coefficients
        .iter()
        .rev()
        .fold(Fr::zero(), |acc, coefficient| acc * x + coefficient)
}

/// Checks `g2 * share == sum_k C_k * x^k` for the recipient's x
fn verify_share(share: &Fr, recipient: PartyId, commitments: &[G2Affine]) -> bool {
    let x = party_x(recipient);
    let mut x_power = Fr::one();
    let mut expected = G2Projective::zero();
    for commitment in commitments {
        expected += *commitment * x_power;
        x_power *= x;
    }
    G2Affine::generator() * share == expected
}

/// Lagrange coefficient of `xs[i]` at zero; `None` when an x repeats
fn lagrange_at_zero(i: usize, xs: &[Fr]) -> Option<Fr> {
    let xi = xs[i];
    let mut numerator = Fr::one();
    let mut denominator = Fr::one();
    for (j, xj) in xs.iter().enumerate() {
        if j == i {
            continue;
        }
        numerator *= xj;
        denominator *= *xj - xi;
    }
    denominator.inverse().map(|inv| numerator * inv)
}

/// Try-and-increment hash onto G1 (BN254 G1 has cofactor 1)
fn hash_to_g1(message: &[u8]) -> G1Affine {
    let mut counter: u32 = 0;
    loop {
        let digest = Sha256::new()
            .chain_update(HASH_TO_G1_DST)
            .chain_update(counter.to_be_bytes())
            .chain_update(message)
            .finalize();
        let x = Fq::from_be_bytes_mod_order(&digest);
        let y_squared = x.square() * x + g1::Config::COEFF_B;
        if let Some(y) = y_squared.sqrt() {
            let point = G1Affine::new_unchecked(x, y);
            if point.is_on_curve() && !point.is_zero() {
                return point;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

fn encode_g1(point: &G1Affine) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(SIGNATURE_SIZE);
    point.serialize_uncompressed(&mut bytes)?;
    Ok(bytes)
}

fn decode_g1(bytes: &[u8]) -> Result<G1Affine> {
    if bytes.len() != SIGNATURE_SIZE {
        return Err(Error::Crypto(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_SIZE,
            bytes.len()
        )));
    }
    Ok(G1Affine::deserialize_uncompressed(bytes)?)
}

fn encode_g2(point: &G2Affine) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(PUBLIC_KEY_SIZE);
    point.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

fn decode_g2(bytes: &[u8]) -> Result<G2Affine> {
    if bytes.len() != PUBLIC_KEY_SIZE {
        return Err(Error::Crypto(format!(
            "G2 point must be {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            bytes.len()
        )));
    }
    Ok(G2Affine::deserialize_compressed(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shamir shares of one random secret, as a trusted dealer would
    /// produce them
    fn dealer_parties(n: u16, threshold: usize) -> (Vec<Bn254Party>, Vec<u8>) {
        let mut rng = OsRng;
        let coefficients: Vec<Fr> = (0..threshold).map(|_| Fr::rand(&mut rng)).collect();
        let threshold_pk = (G2Affine::generator() * coefficients[0]).into_affine();

        let parties = (0..n)
            .map(|id| {
                let data = ShareData {
                    party_id: id,
                    threshold: threshold as u32,
                    secret: evaluate_polynomial(&coefficients, party_x(id)),
                    threshold_pk,
                };
                let party = Bn254Party::new(id, Span::none());
                party.set_share_data(&data.to_bytes().unwrap()).unwrap();
                party
            })
            .collect();

        (parties, encode_g2(&threshold_pk).unwrap())
    }

    fn sign_all(parties: &[Bn254Party], message: &[u8]) -> Vec<Vec<u8>> {
        parties.iter().map(|p| p.sign(message).unwrap()).collect()
    }

    #[test]
    fn test_hash_to_g1_is_deterministic() {
        let a = hash_to_g1(b"msg1");
        let b = hash_to_g1(b"msg1");
        let c = hash_to_g1(b"msg2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_on_curve());
        assert!(a.is_in_correct_subgroup_assuming_on_curve());
    }

    #[test]
    fn test_lagrange_coefficients_sum_to_one() {
        let xs = vec![party_x(0), party_x(1), party_x(2)];
        let sum = (0..3)
            .map(|i| lagrange_at_zero(i, &xs).unwrap())
            .fold(Fr::zero(), |acc, l| acc + l);
        assert_eq!(sum, Fr::one());

        let repeated = vec![party_x(0), party_x(0)];
        assert!(lagrange_at_zero(0, &repeated).is_none());
    }

    #[test]
    fn test_share_verifies_against_commitments() {
        let mut rng = OsRng;
        let coefficients: Vec<Fr> = (0..3).map(|_| Fr::rand(&mut rng)).collect();
        let commitments: Vec<G2Affine> = coefficients
            .iter()
            .map(|c| (G2Affine::generator() * c).into_affine())
            .collect();

        let share = evaluate_polynomial(&coefficients, party_x(4));
        assert!(verify_share(&share, 4, &commitments));
        assert!(!verify_share(&share, 5, &commitments));
        assert!(!verify_share(&(share + Fr::one()), 4, &commitments));
    }

    #[test]
    fn test_sizes() {
        let (parties, threshold_pk) = dealer_parties(3, 2);
        assert_eq!(threshold_pk.len(), PUBLIC_KEY_SIZE);
        assert_eq!(parties[0].threshold_pk().unwrap(), threshold_pk);
        assert_eq!(parties[0].sign(b"m").unwrap().len(), SIGNATURE_SIZE);
    }

    #[test]
    fn test_threshold_aggregation() {
        let (parties, threshold_pk) = dealer_parties(4, 3);
        let verifier = Bn254Verifier::new(&threshold_pk).unwrap();
        let sigs = sign_all(&parties, b"payload");

        let aggregated = verifier
            .aggregate_signatures(&sigs[..3], &[0, 1, 2])
            .unwrap();
        assert_eq!(aggregated.len(), SIGNATURE_SIZE);
        assert!(verifier.verify(b"payload", &aggregated).is_ok());
        assert!(verifier.verify(b"other", &aggregated).is_err());

        // Any qualified subset reconstructs the same signature
        let other = verifier
            .aggregate_signatures(&[sigs[3].clone(), sigs[1].clone(), sigs[2].clone()], &[3, 1, 2])
            .unwrap();
        assert_eq!(aggregated, other);

        let below = verifier.aggregate_signatures(&sigs[..2], &[0, 1]).unwrap();
        assert!(verifier.verify(b"payload", &below).is_err());
    }

    #[test]
    fn test_mislabelled_share_fails() {
        let (parties, threshold_pk) = dealer_parties(3, 2);
        let verifier = Bn254Verifier::new(&threshold_pk).unwrap();
        let sigs = sign_all(&parties, b"payload");

        let swapped = verifier.aggregate_signatures(&sigs[..2], &[1, 0]).unwrap();
        assert!(verifier.verify(b"payload", &swapped).is_err());
    }

    #[test]
    fn test_aggregate_rejects_repeated_id() {
        let (parties, threshold_pk) = dealer_parties(3, 2);
        let verifier = Bn254Verifier::new(&threshold_pk).unwrap();
        let sigs = sign_all(&parties, b"payload");

        let result = verifier.aggregate_signatures(&[sigs[0].clone(), sigs[0].clone()], &[0, 0]);
        assert!(matches!(result, Err(Error::DuplicatePartyId(0))));
    }

    #[test]
    fn test_malformed_inputs() {
        let (_, threshold_pk) = dealer_parties(2, 1);
        let verifier = Bn254Verifier::new(&threshold_pk).unwrap();

        assert!(verifier.verify(b"m", &[0u8; 10]).is_err());
        assert!(matches!(
            verifier.aggregate_signatures(&[vec![0u8; 64]], &[0, 1]),
            Err(Error::LengthMismatch { sigs: 1, ids: 2 })
        ));
        assert!(Bn254Verifier::new(&[1u8; 12]).is_err());
    }

    #[test]
    fn test_share_data_encoding() {
        let data = ShareData {
            party_id: 7,
            threshold: 3,
            secret: Fr::from(42u64),
            threshold_pk: (G2Affine::generator() * Fr::from(5u64)).into_affine(),
        };
        let bytes = data.to_bytes().unwrap();

        let decoded = ShareData::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.party_id, 7);
        assert_eq!(decoded.threshold, 3);
        assert_eq!(decoded.secret, Fr::from(42u64));
        assert_eq!(decoded.threshold_pk, data.threshold_pk);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(ShareData::from_bytes(&trailing), Err(Error::Crypto(_))));

        let zero = ShareData {
            party_id: 0,
            threshold: 0,
            secret: Fr::one(),
            threshold_pk: data.threshold_pk,
        };
        assert!(ShareData::from_bytes(&zero.to_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_share_data_bound_to_party() {
        let (parties, _) = dealer_parties(2, 1);
        let share = {
            let state = parties[0].state.lock();
            state.key.as_ref().unwrap().to_bytes().unwrap()
        };

        let wrong = Bn254Party::new(1, Span::none());
        assert!(matches!(wrong.set_share_data(&share), Err(Error::Protocol { party: 1, .. })));

        let mut truncated = share.clone();
        truncated.pop();
        let right = Bn254Party::new(0, Span::none());
        assert!(right.set_share_data(&truncated).is_err());
        assert!(right.sign(b"m").is_err());
        right.set_share_data(&share).unwrap();
        assert!(right.sign(b"m").is_ok());
    }

    #[test]
    fn test_init_validation() {
        let noop: SendFn = std::sync::Arc::new(|_: &[u8], _: bool, _: PartyId| Ok(()));
        let party = Bn254Party::new(0, Span::none());

        assert!(party.init(&[1, 2], 1, noop.clone()).is_err());
        assert!(party.init(&[0, 0, 1], 1, noop.clone()).is_err());
        assert!(party.init(&[0, 1], 3, noop.clone()).is_err());
        assert!(party.init(&[0, 1], 2, noop.clone()).is_ok());
        assert!(party.init(&[0, 1], 2, noop).is_err());
        assert!(party.threshold_pk().is_err());
    }
}
