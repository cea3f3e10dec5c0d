use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::Challenge;

/// Denominator for participation bands: percent-mille of capacity.
pub const PARTICIPATION_DENOMINATOR: u64 = 100_000;

/// Denominator for the capacity step, in basis points.
pub const CAPACITY_STEP_DENOMINATOR: u64 = 10_000;

/// Construction-time configuration failure; never raised mid-run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid config: {0}")]
pub struct ConfigError(pub String);

/// Participation bands steering the rollover decision, expressed in
/// percent-mille of capacity (100 000 = full participation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetBands {
    /// At or above: tighten the target and grow capacity.
    pub high_pm: u64,
    /// Center of the designed-for operating range.
    pub gaussian_center_pm: u64,
    /// Half-width of the operating range; inside it only the target moves.
    pub gaussian_tolerance_pm: u64,
    /// At or below: ease the target and shrink capacity.
    pub low_pm: u64,
}

impl Default for RetargetBands {
    fn default() -> Self {
        Self {
            high_pm: 100_000,
            gaussian_center_pm: 68_000,
            gaussian_tolerance_pm: 10_000,
            low_pm: 33_333,
        }
    }
}

impl RetargetBands {
    pub fn gaussian_min_pm(&self) -> u64 {
        self.gaussian_center_pm.saturating_sub(self.gaussian_tolerance_pm)
    }

    pub fn gaussian_max_pm(&self) -> u64 {
        self.gaussian_center_pm.saturating_add(self.gaussian_tolerance_pm)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.high_pm > PARTICIPATION_DENOMINATOR {
            return Err(ConfigError(
                "high_pm cannot exceed full participation".into(),
            ));
        }
        if self.gaussian_tolerance_pm >= self.gaussian_center_pm {
            return Err(ConfigError(
                "gaussian_tolerance_pm must be below gaussian_center_pm".into(),
            ));
        }
        if self.low_pm >= self.gaussian_min_pm() {
            return Err(ConfigError(
                "low_pm must sit below the gaussian band".into(),
            ));
        }
        if self.gaussian_max_pm() >= self.high_pm {
            return Err(ConfigError(
                "gaussian band must sit below high_pm".into(),
            ));
        }
        Ok(())
    }
}

/// Engine construction parameters; validated once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Epoch window in blocks.
    pub window_length: u64,
    /// Miner slots in the first epoch.
    pub initial_capacity: u64,
    /// Absorbing floor for capacity shrink.
    pub min_capacity: u64,
    /// Target of the first epoch.
    pub initial_target: U256,
    /// Hardest allowed target.
    pub min_target: U256,
    /// Easiest allowed target.
    pub max_target: U256,
    /// Per-rollover target step, in percent.
    pub target_step_percent: u64,
    /// Per-rollover capacity step, in basis points.
    pub capacity_step_bps: u64,
    /// Cap on the per-address difficulty multiplier, in basis points.
    pub max_multiplier_bps: u64,
    pub bands: RetargetBands,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let max_target = U256::one() << 250;
        Self {
            window_length: 150,
            initial_capacity: 100,
            min_capacity: 10,
            initial_target: max_target,
            min_target: U256::one() << 16,
            max_target,
            target_step_percent: 10,
            capacity_step_bps: 1_000,
            max_multiplier_bps: 20_000,
            bands: RetargetBands::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_length == 0 {
            return Err(ConfigError("window_length must be >= 1".into()));
        }
        if self.min_capacity == 0 {
            return Err(ConfigError("min_capacity must be >= 1".into()));
        }
        if self.initial_capacity < self.min_capacity {
            return Err(ConfigError(
                "initial_capacity must be >= min_capacity".into(),
            ));
        }
        if self.min_target.is_zero() {
            return Err(ConfigError("min_target must be non-zero".into()));
        }
        if self.min_target > self.max_target {
            return Err(ConfigError("min_target must be <= max_target".into()));
        }
        if self.initial_target < self.min_target || self.initial_target > self.max_target {
            return Err(ConfigError(
                "initial_target must lie within [min_target, max_target]".into(),
            ));
        }
        if self.target_step_percent == 0 || self.target_step_percent >= 100 {
            return Err(ConfigError(
                "target_step_percent must be within 1..=99".into(),
            ));
        }
        if self.capacity_step_bps == 0 || self.capacity_step_bps >= CAPACITY_STEP_DENOMINATOR {
            return Err(ConfigError(
                "capacity_step_bps must be within 1..=9999".into(),
            ));
        }
        if self.max_multiplier_bps == 0 || self.max_multiplier_bps > PARTICIPATION_DENOMINATOR {
            return Err(ConfigError(
                "max_multiplier_bps must be within 1..=100000".into(),
            ));
        }
        self.bands.validate()
    }
}

/// Numeric direction taken on one retargeting axis. For the target axis
/// a decrease means harder mining; for capacity an increase means more
/// slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisMove {
    Increase,
    Decrease,
    Hold,
}

/// Participation band a closed epoch landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    /// Full or near-full participation.
    High,
    /// The designed-for operating range.
    Gaussian,
    /// Between the configured bands.
    Slack,
    /// Under-subscription.
    Low,
}

/// Record of one rollover. Logged and handed back to the caller that
/// triggered it; the engine keeps nothing beyond the fields that seed
/// the next epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub closed_epoch: u64,
    /// Participation of the closed epoch, in percent-mille of capacity.
    pub participation_pm: u64,
    pub band: Band,
    pub target_move: AxisMove,
    pub capacity_move: AxisMove,
    pub new_target: U256,
    pub new_capacity: u64,
}

/// Acknowledgement for an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionReceipt {
    pub epoch: u64,
    /// 1-based admission slot within the epoch.
    pub slot: u64,
}

/// Externally observable engine state; a pure read for pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub epoch: u64,
    pub challenge: Challenge,
    pub target: U256,
    pub capacity: u64,
    pub admitted_count: u64,
    pub start_height: u64,
    pub current_height: u64,
    pub epoch_ended: bool,
    /// The configured retargeting parameters, exposed for observers.
    pub config: EngineConfig,
}
