use crate::MinerAddress;

/// Hard failure raised by a reward sink; fails the triggering
/// submission without recording an admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reward distribution failed: {0}")]
pub struct RewardError(pub String);

/// Settlement boundary invoked once per accepted submission.
///
/// The split between the winner and its nominated beneficiaries is the
/// sink's own policy; the engine only hands both over.
pub trait RewardSink: Send + Sync {
    fn distribute(
        &self,
        winner: &MinerAddress,
        beneficiaries: &[MinerAddress],
    ) -> Result<(), RewardError>;
}

/// Sink that acknowledges every distribution and pays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardRewards;

impl RewardSink for DiscardRewards {
    fn distribute(
        &self,
        _winner: &MinerAddress,
        _beneficiaries: &[MinerAddress],
    ) -> Result<(), RewardError> {
        Ok(())
    }
}
