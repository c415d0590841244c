//! DKG coordinator

use crate::mpc::{MessageRouter, PartyEndpoint};
use crate::provider::{ProviderFactory, ThresholdCryptoProvider};
use crate::{Error, KeyShareRecord, PartyId, Result, ShareBytes, ThresholdConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, info_span, instrument, warn};
use zeroize::Zeroize;

/// Time a key generation run may take before every party is aborted
pub const DEFAULT_DKG_TIMEOUT: Duration = Duration::from_secs(30);

/// Final state of a key generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkgState {
    /// Every party produced a share and all agree on the threshold public key
    Completed,
    /// At least one party failed, or the parties disagree
    Failed,
}

/// Why one party has no usable share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyFailure {
    pub party: PartyId,
    pub reason: String,
}

/// Result of a key generation run that was not cancelled.
///
/// Only a [`Completed`](DkgState::Completed) outcome converts into a
/// [`KeyShareRecord`].
pub struct DkgOutcome {
    config: ThresholdConfig,
    state: DkgState,
    threshold_pk: Option<Vec<u8>>,
    shares: Vec<Option<ShareBytes>>,
    failures: Vec<PartyFailure>,
    mismatch: Option<(PartyId, PartyId)>,
}

impl DkgOutcome {
    pub fn config(&self) -> ThresholdConfig {
        self.config
    }

    pub fn state(&self) -> DkgState {
        self.state
    }

    pub fn is_successful(&self) -> bool {
        self.state == DkgState::Completed
    }

    /// Threshold public key the successful parties agree on
    pub fn threshold_pk(&self) -> Option<&[u8]> {
        self.threshold_pk.as_deref()
    }

    /// Share slots indexed by party id; `None` for parties that failed
    pub fn shares(&self) -> &[Option<ShareBytes>] {
        &self.shares
    }

    pub fn failures(&self) -> &[PartyFailure] {
        &self.failures
    }

    /// Parties without a share
    pub fn missing(&self) -> Vec<PartyId> {
        self.shares
            .iter()
            .enumerate()
            .filter(|(_, share)| share.is_none())
            .map(|(id, _)| id as PartyId)
            .collect()
    }

    /// Encode the run as a persistable record
    pub fn into_record(self) -> Result<KeyShareRecord> {
        if let Some((party, reference)) = self.mismatch {
            return Err(Error::PublicKeyMismatch { party, reference });
        }
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(Error::DkgIncomplete { missing });
        }
        let threshold_pk = self
            .threshold_pk
            .as_deref()
            .ok_or_else(|| Error::Internal("completed run without threshold public key".into()))?;

        KeyShareRecord::new(
            self.config.threshold(),
            self.config.n(),
            threshold_pk,
            &self.shares,
        )
    }
}

impl Drop for DkgOutcome {
    fn drop(&mut self) {
        for share in self.shares.iter_mut().flatten() {
            share.zeroize();
        }
    }
}

/// Runs one key generation among `n` in-process parties.
///
/// A coordinator is created in the initialized state: endpoints exist, are
/// wired to the router and every provider has been initialized. No protocol
/// message is sent before [`run`](Self::run).
pub struct DkgCoordinator<P> {
    config: ThresholdConfig,
    router: MessageRouter<P>,
    timeout: Duration,
}

impl<P: ThresholdCryptoProvider> DkgCoordinator<P> {
    /// Create endpoints `0..n`, wire them to a router and initialize every
    /// provider
    #[instrument(skip(factory))]
    pub fn new<F>(config: ThresholdConfig, factory: &F) -> Result<Self>
    where
        F: ProviderFactory<Party = P>,
    {
        let ids = config.party_ids();

        let endpoints = ids
            .iter()
            .map(|&id| {
                let span = info_span!("party", id);
                let provider = factory.new_party(id, span.clone());
                PartyEndpoint::new(id, span, provider).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        let router = MessageRouter::new(endpoints)?;

        for endpoint in router.parties() {
            let send = router.sender_for(endpoint.id())?;
            endpoint.init(&ids, config.threshold(), send)?;
        }
        info!("Parties initialized");

        Ok(Self {
            config,
            router,
            timeout: DEFAULT_DKG_TIMEOUT,
        })
    }

    /// Set the run timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> ThresholdConfig {
        self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoints taking part in the run
    pub fn parties(&self) -> &[Arc<PartyEndpoint<P>>] {
        self.router.parties()
    }

    /// Run key generation until every party returns or the timeout expires
    pub async fn run(self) -> Result<DkgOutcome> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Run key generation; resolving `shutdown` aborts every party and the
    /// run returns [`Error::Cancelled`]
    #[instrument(skip_all, fields(n = self.config.n(), threshold = self.config.threshold()))]
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<DkgOutcome>
    where
        S: Future<Output = ()> + Send,
    {
        let n = self.config.n();
        info!("Starting DKG");

        let mut tasks = JoinSet::new();
        for endpoint in self.router.parties() {
            let endpoint = Arc::clone(endpoint);
            tasks.spawn(async move {
                let result = endpoint.generate_share().await;
                (endpoint.id(), result)
            });
        }

        let collected = tokio::select! {
            collected = collect_shares(&mut tasks, n) => Ok(collected),
            _ = tokio::time::sleep(self.timeout) => Err(Error::Timeout(format!(
                "key generation among {} parties",
                n
            ))),
            _ = shutdown => Err(Error::Cancelled("key generation".into())),
        };
        let (mut shares, mut failures) = match collected {
            Ok(collected) => collected,
            Err(e) => {
                tasks.shutdown().await;
                warn!(error = %e, "DKG aborted");
                return Err(e);
            }
        };

        let mut reference: Option<(PartyId, Vec<u8>)> = None;
        let mut mismatch = None;
        for endpoint in self.router.parties() {
            let id = endpoint.id();
            if shares[id as usize].is_none() {
                continue;
            }
            match endpoint.threshold_pk() {
                Ok(pk) => match &reference {
                    None => reference = Some((id, pk)),
                    Some((reference_id, reference_pk)) if *reference_pk != pk => {
                        warn!(party = id, reference = reference_id, "Threshold public keys disagree");
                        mismatch.get_or_insert((id, *reference_id));
                        failures.push(PartyFailure {
                            party: id,
                            reason: format!("threshold public key differs from party {}", reference_id),
                        });
                    }
                    Some(_) => {}
                },
                Err(e) => {
                    warn!(party = id, error = %e, "No threshold public key after keygen");
                    if let Some(mut share) = shares[id as usize].take() {
                        share.zeroize();
                    }
                    failures.push(PartyFailure {
                        party: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let complete = mismatch.is_none() && shares.iter().all(Option::is_some);
        let state = if complete {
            DkgState::Completed
        } else {
            DkgState::Failed
        };
        let threshold_pk = reference.map(|(_, pk)| pk);

        match state {
            DkgState::Completed => info!(
                threshold_pk = threshold_pk.as_deref().map(hex::encode).unwrap_or_default(),
                "DKG completed"
            ),
            DkgState::Failed => warn!(failures = failures.len(), "DKG failed"),
        }

        Ok(DkgOutcome {
            config: self.config,
            state,
            threshold_pk,
            shares,
            failures,
            mismatch,
        })
    }
}

/// Fan-in: every slot is written from its own task's result only
async fn collect_shares(
    tasks: &mut JoinSet<(PartyId, Result<ShareBytes>)>,
    n: usize,
) -> (Vec<Option<ShareBytes>>, Vec<PartyFailure>) {
    let mut shares: Vec<Option<ShareBytes>> = vec![None; n];
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(share))) => shares[id as usize] = Some(share),
            Ok((id, Err(e))) => {
                warn!(party = id, error = %e, "Party keygen failed");
                failures.push(PartyFailure {
                    party: id,
                    reason: e.to_string(),
                });
            }
            Err(e) => warn!(error = %e, "Party task did not finish"),
        }
    }

    // Tasks that panicked never reported their id
    for (id, share) in shares.iter().enumerate() {
        let id = id as PartyId;
        if share.is_none() && !failures.iter().any(|f| f.party == id) {
            failures.push(PartyFailure {
                party: id,
                reason: "party task did not finish".into(),
            });
        }
    }

    (shares, failures)
}
