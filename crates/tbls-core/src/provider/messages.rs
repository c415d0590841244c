//! DKG message types

use serde::{Deserialize, Serialize};

/// Messages exchanged by [`Bn254Party`](super::Bn254Party) during key
/// generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DkgMessage {
    /// Broadcast: Feldman commitments to the dealer's polynomial
    /// coefficients (compressed G2)
    Commitment { coefficients: Vec<Vec<u8>> },
    /// Point-to-point: dealer's polynomial evaluated at the recipient
    Share { value: Vec<u8> },
}
