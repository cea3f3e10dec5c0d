use blake3::Hasher as Blake3Hasher;
use primitive_types::U256;
use sha3::{Digest, Keccak256};

use crate::{Challenge, MinerAddress, Nonce};

/// Compute the admission digest for one search attempt.
///
/// Keccak-256 over the packed concatenation of the epoch challenge, the
/// miner address and the nonce, read as a big-endian 256-bit integer.
/// Deterministic and side-effect free; both the searcher and the
/// engine's verification path go through this function.
pub fn admission_digest(challenge: &Challenge, address: &MinerAddress, nonce: &Nonce) -> U256 {
    let mut hasher = Keccak256::new();
    hasher.update(challenge);
    hasher.update(address);
    hasher.update(nonce);
    let out: [u8; 32] = hasher.finalize().into();
    U256::from_big_endian(&out)
}

/// Whether a digest qualifies against a target.
///
/// The comparison is strict, so a zero target admits nothing.
#[inline]
pub fn meets_target(digest: U256, target: U256) -> bool {
    digest < target
}

/// Derive the next epoch's challenge from the closing epoch's state.
///
/// Uses the canonical domain tag `"epochpow:challenge:v1"`.
pub fn derive_challenge(prev: &Challenge, epoch: u64, height: u64) -> Challenge {
    let mut hasher = Blake3Hasher::new();
    hasher.update(b"epochpow:challenge:v1");
    hasher.update(prev);
    hasher.update(&epoch.to_be_bytes());
    hasher.update(&height.to_be_bytes());
    hasher.finalize().into()
}
