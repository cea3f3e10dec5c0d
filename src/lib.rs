//! Proof-of-work admission into fixed-capacity mining epochs.
//!
//! Each epoch issues one challenge, one difficulty target and a bounded
//! number of miner slots. Miners race to find a nonce whose keyed
//! digest falls below their effective target; at every epoch boundary a
//! dual-axis control loop re-tunes the target and the slot count from
//! the participation of the epoch just closed.
//!
//! - [`digest`]: the keyed admission digest and challenge derivation.
//! - [`search`]: memoryless nonce search, sequential or pooled, with
//!   optional attempt budgets.
//! - [`epoch`]: the retargeting state machine and its pluggable seams.
//! - [`worker`]: the off-chain daemon that polls, searches and submits
//!   on behalf of one miner identity.

pub mod digest;
pub mod epoch;
pub mod search;
pub mod worker;

/// 20-byte miner identity, always passed explicitly.
pub type MinerAddress = [u8; 20];

/// 32-byte proof-of-work nonce.
pub type Nonce = [u8; 32];

/// 32-byte per-epoch search key.
pub type Challenge = [u8; 32];

pub use epoch::{
    AdmissionReceipt, AxisMove, Band, ConfigError, DifficultyPolicy, DiscardRewards, EngineConfig,
    EngineSnapshot, EpochEngine, FlatMultiplier, HeightSource, ManualHeight, RetargetBands,
    RewardError, RewardSink, SubmitError, Transition,
};
pub use worker::{Worker, WorkerBuilder, WorkerHandle};
