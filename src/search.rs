//! Nonce search against an admission target.
//!
//! Every attempt draws a fresh random nonce, so the search is
//! memoryless and its expected attempt count is the ratio of the digest
//! space to the target. [`search`] keeps the terminate-only-on-success
//! contract; [`search_bounded`] and [`search_parallel`] take an explicit
//! attempt budget so callers can bound worst-case latency.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use primitive_types::U256;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::digest::{admission_digest, meets_target};
use crate::{Challenge, MinerAddress, Nonce};

/// Cooperative stop signal shared by search workers.
#[derive(Debug)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempt budget shared across search workers.
#[derive(Debug)]
pub struct AttemptBudget {
    remaining: AtomicU64,
}

impl AttemptBudget {
    pub const fn new(attempts: u64) -> Self {
        Self {
            remaining: AtomicU64::new(attempts),
        }
    }

    /// Reserve one attempt; `false` once the budget is spent.
    #[inline]
    pub fn take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn random_nonce() -> Nonce {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Search until a qualifying nonce is found.
///
/// Never returns for an unsatisfiable target (a zero target admits no
/// digest); callers that need bounded latency use [`search_bounded`] or
/// [`search_parallel`] instead.
pub fn search(challenge: &Challenge, address: &MinerAddress, target: U256) -> Nonce {
    loop {
        let nonce = random_nonce();
        if meets_target(admission_digest(challenge, address, &nonce), target) {
            return nonce;
        }
    }
}

/// Search with an explicit attempt budget; `None` once it is spent.
pub fn search_bounded(
    challenge: &Challenge,
    address: &MinerAddress,
    target: U256,
    max_attempts: u64,
) -> Option<Nonce> {
    let budget = AttemptBudget::new(max_attempts);
    while budget.take() {
        let nonce = random_nonce();
        if meets_target(admission_digest(challenge, address, &nonce), target) {
            return Some(nonce);
        }
    }
    None
}

/// Multi-threaded search sharing one attempt budget; the first
/// qualifying nonce wins and stops the remaining workers.
pub fn search_parallel(
    challenge: &Challenge,
    address: &MinerAddress,
    target: U256,
    threads: usize,
    max_attempts: u64,
) -> Option<Nonce> {
    let threads = threads.max(1);
    let budget = Arc::new(AttemptBudget::new(max_attempts));
    let stop = Arc::new(StopFlag::new());
    let (tx, rx) = flume::bounded::<Nonce>(threads);

    let mut joins = Vec::with_capacity(threads);
    for _ in 0..threads {
        let challenge = *challenge;
        let address = *address;
        let worker_budget = budget.clone();
        let worker_stop = stop.clone();
        let worker_tx = tx.clone();
        let join = thread::spawn(move || {
            while !worker_stop.should_stop() && worker_budget.take() {
                let nonce = random_nonce();
                if meets_target(admission_digest(&challenge, &address, &nonce), target) {
                    worker_stop.force_stop();
                    let _ = worker_tx.send(nonce);
                    break;
                }
            }
        });
        joins.push(join);
    }
    drop(tx);

    // Resolves with the first hit, or with a closed channel once every
    // worker has spent its share of the budget.
    let found = rx.recv().ok();
    stop.force_stop();
    for join in joins {
        let _ = join.join();
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE: Challenge = [1u8; 32];
    const ADDRESS: MinerAddress = [2u8; 20];

    #[test]
    fn search_satisfies_the_predicate() {
        let target = U256::MAX;
        let nonce = search(&CHALLENGE, &ADDRESS, target);
        assert!(meets_target(
            admission_digest(&CHALLENGE, &ADDRESS, &nonce),
            target
        ));
    }

    #[test]
    fn bounded_search_finds_under_moderate_target() {
        // 1-in-16 selectivity; 10_000 attempts make a miss vanishingly
        // unlikely.
        let target = U256::MAX >> 4;
        let nonce = search_bounded(&CHALLENGE, &ADDRESS, target, 10_000)
            .expect("budget large enough for this target");
        assert!(meets_target(
            admission_digest(&CHALLENGE, &ADDRESS, &nonce),
            target
        ));
    }

    #[test]
    fn bounded_search_gives_up_on_zero_target() {
        assert!(search_bounded(&CHALLENGE, &ADDRESS, U256::zero(), 1_000).is_none());
    }

    #[test]
    fn parallel_search_satisfies_the_predicate() {
        let target = U256::MAX >> 4;
        let nonce = search_parallel(&CHALLENGE, &ADDRESS, target, 4, 100_000)
            .expect("budget large enough for this target");
        assert!(meets_target(
            admission_digest(&CHALLENGE, &ADDRESS, &nonce),
            target
        ));
    }

    #[test]
    fn parallel_search_exhausts_budget_on_zero_target() {
        assert!(search_parallel(&CHALLENGE, &ADDRESS, U256::zero(), 4, 1_000).is_none());
    }

    #[test]
    fn attempt_budget_is_exact() {
        let budget = AttemptBudget::new(2);
        assert!(budget.take());
        assert!(budget.take());
        assert!(!budget.take());
        assert!(!budget.take());
    }

    #[test]
    fn stop_flag_halts_workers() {
        let flag = StopFlag::new();
        assert!(!flag.should_stop());
        flag.force_stop();
        assert!(flag.should_stop());
    }
}
