//! Off-chain mining daemon.
//!
//! One worker drives a single miner identity against a shared
//! [`EpochEngine`]: a slow status poll logs the engine's observable
//! state, and a fast mining cycle searches for a qualifying nonce and
//! submits it. The two loops are independently scheduled tasks that
//! share nothing but the engine handle. Epoch state can change between
//! a cycle's poll and its submission, so every rejection is logged and
//! swallowed; losing such a race is a normal outcome.

use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::epoch::engine::EpochEngine;
use crate::epoch::types::ConfigError;
use crate::search::search_parallel;
use crate::MinerAddress;

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Worker {
    engine: Arc<EpochEngine>,
    address: MinerAddress,
    /// Addresses nominated to share in this worker's rewards.
    #[builder(default)]
    beneficiaries: Vec<MinerAddress>,
    /// Cadence of the observability poll.
    #[builder(default = "Duration::from_secs(10)")]
    poll_interval: Duration,
    /// Cadence of the search-and-submit cycle.
    #[builder(default = "Duration::from_secs(1)")]
    mine_interval: Duration,
    /// Per-cycle search attempt budget; a spent budget ends the cycle.
    #[builder(default = "1_000_000")]
    max_attempts: u64,
    #[builder(default = "1")]
    search_threads: usize,
}

impl WorkerBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval == Some(Duration::ZERO) {
            return Err(ConfigError("poll_interval must be non-zero".into()));
        }
        if self.mine_interval == Some(Duration::ZERO) {
            return Err(ConfigError("mine_interval must be non-zero".into()));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError("max_attempts must be >= 1".into()));
        }
        if self.search_threads == Some(0) {
            return Err(ConfigError("search_threads must be >= 1".into()));
        }
        Ok(())
    }

    pub fn build_validated(self) -> Result<Worker, ConfigError> {
        self.validate()?;
        self.build().map_err(|e| ConfigError(e.to_string()))
    }
}

/// Handles to a running worker's two loops.
pub struct WorkerHandle {
    status: JoinHandle<()>,
    mining: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop both loops.
    pub fn abort(&self) {
        self.status.abort();
        self.mining.abort();
    }

    /// Await both loops; resolves only after [`WorkerHandle::abort`].
    pub async fn join(self) {
        let _ = self.status.await;
        let _ = self.mining.await;
    }
}

impl Worker {
    /// Spawn the status poll and the mining cycle as independent tasks.
    ///
    /// The loops run until aborted through the returned handle; every
    /// per-cycle failure is swallowed and retried on the next tick.
    pub fn spawn(self) -> WorkerHandle {
        let status = tokio::spawn(status_loop(
            self.engine.clone(),
            self.address,
            self.poll_interval,
        ));
        let mining = tokio::spawn(mining_loop(
            self.engine,
            self.address,
            self.beneficiaries,
            self.mine_interval,
            self.max_attempts,
            self.search_threads,
        ));
        WorkerHandle { status, mining }
    }
}

async fn status_loop(engine: Arc<EpochEngine>, address: MinerAddress, every: Duration) {
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        let snapshot = engine.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => log::info!("miner {} status {json}", hex::encode(address)),
            Err(err) => log::warn!("status snapshot failed to serialize: {err}"),
        }
    }
}

async fn mining_loop(
    engine: Arc<EpochEngine>,
    address: MinerAddress,
    beneficiaries: Vec<MinerAddress>,
    every: Duration,
    max_attempts: u64,
    threads: usize,
) {
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        mine_once(&engine, &address, &beneficiaries, max_attempts, threads).await;
    }
}

/// One full poll-search-submit cycle; `true` when a slot was won.
pub(crate) async fn mine_once(
    engine: &Arc<EpochEngine>,
    address: &MinerAddress,
    beneficiaries: &[MinerAddress],
    max_attempts: u64,
    threads: usize,
) -> bool {
    // Opportunistic window check: an elapsed epoch rolls over here even
    // when no submission follows, keeping rollover live through idle
    // epochs.
    engine.tick();

    if !engine.can_submit(address) {
        // Already admitted this epoch, or no slot left; no point burning
        // search effort.
        return false;
    }

    let challenge = engine.snapshot().challenge;
    let target = engine.effective_target(address);
    let miner = *address;

    let found = tokio::task::spawn_blocking(move || {
        search_parallel(&challenge, &miner, target, threads, max_attempts)
    })
    .await;

    let nonce = match found {
        Ok(Some(nonce)) => nonce,
        Ok(None) => {
            log::trace!(
                "miner {} spent its search budget without a hit",
                hex::encode(address)
            );
            return false;
        }
        Err(err) => {
            log::warn!("search task failed: {err}");
            return false;
        }
    };

    match engine.submit(address, &nonce, beneficiaries) {
        Ok(receipt) => {
            log::info!(
                "miner {} won slot {} of epoch {}",
                hex::encode(address),
                receipt.slot,
                receipt.epoch
            );
            true
        }
        Err(err) => {
            log::debug!("miner {} submission rejected: {err}", hex::encode(address));
            false
        }
    }
}
