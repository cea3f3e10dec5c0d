use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use primitive_types::{U256, U512};

use crate::digest::{admission_digest, derive_challenge, meets_target};
use crate::epoch::height::HeightSource;
use crate::epoch::policy::{DifficultyPolicy, MULTIPLIER_DENOMINATOR};
use crate::epoch::retarget::retarget;
use crate::epoch::reward::{RewardError, RewardSink};
use crate::epoch::types::{AdmissionReceipt, ConfigError, EngineConfig, EngineSnapshot, Transition};
use crate::{Challenge, MinerAddress, Nonce};

/// Typed rejection reasons for a submission. None of these are fatal to
/// the engine; a rejected submission leaves the epoch untouched.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Already admitted this epoch, capacity exhausted, or epoch closed.
    #[error("not admissible this epoch")]
    NotAdmissible,
    /// Digest does not meet the effective target.
    #[error("digest does not meet the effective target")]
    InvalidProof,
    /// The reward sink refused the distribution.
    #[error(transparent)]
    Reward(#[from] RewardError),
}

#[derive(Debug)]
struct EpochState {
    number: u64,
    challenge: Challenge,
    target: U256,
    capacity: u64,
    admitted: HashSet<MinerAddress>,
    start_height: u64,
}

impl EpochState {
    fn admitted_count(&self) -> u64 {
        self.admitted.len() as u64
    }
}

/// The retargeting state machine.
///
/// One instance exclusively owns all epoch state for a deployment.
/// Workers share it behind `Arc` and interact only through these
/// operations; every mutation runs under the state write lock, so a
/// submission either lands fully in the epoch it was judged against or
/// is rejected, never double-counted or lost across a rollover.
pub struct EpochEngine {
    config: EngineConfig,
    state: RwLock<EpochState>,
    height: Arc<dyn HeightSource>,
    policy: Arc<dyn DifficultyPolicy>,
    rewards: Arc<dyn RewardSink>,
}

impl EpochEngine {
    pub fn new(
        config: EngineConfig,
        height: Arc<dyn HeightSource>,
        policy: Arc<dyn DifficultyPolicy>,
        rewards: Arc<dyn RewardSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let start_height = height.current_height();
        let state = EpochState {
            number: 1,
            challenge: derive_challenge(&[0u8; 32], 0, start_height),
            target: config.initial_target,
            capacity: config.initial_capacity,
            admitted: HashSet::new(),
            start_height,
        };
        Ok(Self {
            config,
            state: RwLock::new(state),
            height,
            policy,
            rewards,
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EpochState> {
        self.state.read().expect("state lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EpochState> {
        self.state.write().expect("state lock poisoned")
    }

    fn window_elapsed(&self, state: &EpochState, height: u64) -> bool {
        height.saturating_sub(state.start_height) >= self.config.window_length
    }

    /// Whether `address` could currently submit. Pure query.
    pub fn can_submit(&self, address: &MinerAddress) -> bool {
        let state = self.read_state();
        let height = self.height.current_height();
        !self.window_elapsed(&state, height)
            && state.admitted_count() < state.capacity
            && !state.admitted.contains(address)
    }

    /// Whether `address` already won a slot in the current epoch.
    pub fn is_admitted(&self, address: &MinerAddress) -> bool {
        self.read_state().admitted.contains(address)
    }

    fn clamped_multiplier(&self, address: &MinerAddress) -> u64 {
        self.policy
            .multiplier_bps(address)
            .min(self.config.max_multiplier_bps)
    }

    /// Clamped policy multiplier for `address`, in basis points.
    pub fn difficulty_multiplier(&self, address: &MinerAddress) -> u64 {
        self.clamped_multiplier(address)
    }

    /// Base target scaled by the address's policy multiplier.
    pub fn effective_target(&self, address: &MinerAddress) -> U256 {
        let target = self.read_state().target;
        scale_by_bps(target, self.clamped_multiplier(address))
    }

    /// Read-only view of everything a poller may observe.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.read_state();
        let current_height = self.height.current_height();
        EngineSnapshot {
            epoch: state.number,
            challenge: state.challenge,
            target: state.target,
            capacity: state.capacity,
            admitted_count: state.admitted_count(),
            start_height: state.start_height,
            current_height,
            epoch_ended: self.window_elapsed(&state, current_height),
            config: self.config.clone(),
        }
    }

    /// Opportunistic window check; rolls the epoch over when its window
    /// has elapsed. Returns the transition when a rollover happened.
    pub fn tick(&self) -> Option<Transition> {
        let height = self.height.current_height();
        let mut state = self.write_state();
        if self.window_elapsed(&state, height) {
            Some(self.rollover(&mut state, height))
        } else {
            None
        }
    }

    /// Validate and record one submission from `address`.
    ///
    /// If the window has already elapsed the epoch rolls over first, so
    /// the submission is judged against the live epoch; a proof carried
    /// over from the closed one then fails as [`SubmitError::InvalidProof`]
    /// without undoing the rollover. Filling the last slot rolls the
    /// epoch over immediately.
    pub fn submit(
        &self,
        address: &MinerAddress,
        nonce: &Nonce,
        beneficiaries: &[MinerAddress],
    ) -> Result<AdmissionReceipt, SubmitError> {
        let height = self.height.current_height();
        let mut state = self.write_state();

        if self.window_elapsed(&state, height) {
            self.rollover(&mut state, height);
        }

        if state.admitted_count() >= state.capacity || state.admitted.contains(address) {
            return Err(SubmitError::NotAdmissible);
        }

        let effective = scale_by_bps(state.target, self.clamped_multiplier(address));
        if !meets_target(admission_digest(&state.challenge, address, nonce), effective) {
            return Err(SubmitError::InvalidProof);
        }

        self.rewards.distribute(address, beneficiaries)?;

        state.admitted.insert(*address);
        let slot = state.admitted_count();
        let epoch = state.number;
        log::debug!(
            "miner {} admitted to epoch {epoch}, slot {slot}/{}",
            hex::encode(address),
            state.capacity
        );

        if slot == state.capacity {
            self.rollover(&mut state, height);
        }

        Ok(AdmissionReceipt { epoch, slot })
    }

    fn rollover(&self, state: &mut EpochState, height: u64) -> Transition {
        let transition = retarget(
            &self.config,
            state.number,
            state.target,
            state.capacity,
            state.admitted_count(),
        );
        log::info!(
            "epoch {} closed at {}pm participation ({:?}): target {} -> {}, capacity {} -> {}",
            state.number,
            transition.participation_pm,
            transition.band,
            state.target,
            transition.new_target,
            state.capacity,
            transition.new_capacity
        );
        state.number += 1;
        state.challenge = derive_challenge(&state.challenge, state.number, height);
        state.target = transition.new_target;
        state.capacity = transition.new_capacity;
        state.admitted.clear();
        state.start_height = height;
        transition
    }
}

/// Scale a target by a basis-point multiplier with a full-width
/// intermediate, saturating at the digest-space limit.
fn scale_by_bps(target: U256, bps: u64) -> U256 {
    let wide = target.full_mul(U256::from(bps)) / U512::from(MULTIPLIER_DENOMINATOR);
    U256::try_from(wide).unwrap_or(U256::MAX)
}
