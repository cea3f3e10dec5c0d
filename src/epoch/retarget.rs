//! Dual-axis retargeting: at every epoch boundary the participation of
//! the epoch just closed decides how the difficulty target and the
//! miner capacity move for the next one.

use primitive_types::U256;

use crate::epoch::types::{
    AxisMove, Band, EngineConfig, RetargetBands, Transition, CAPACITY_STEP_DENOMINATOR,
    PARTICIPATION_DENOMINATOR,
};

/// Participation of a closed epoch, in percent-mille of capacity.
pub fn participation_pm(admitted: u64, capacity: u64) -> u64 {
    if capacity == 0 {
        return 0;
    }
    (admitted as u128 * PARTICIPATION_DENOMINATOR as u128 / capacity as u128) as u64
}

fn classify(pm: u64, bands: &RetargetBands) -> Band {
    if pm >= bands.high_pm {
        Band::High
    } else if pm >= bands.gaussian_min_pm() && pm <= bands.gaussian_max_pm() {
        Band::Gaussian
    } else if pm <= bands.low_pm {
        Band::Low
    } else {
        Band::Slack
    }
}

/// Exact `floor(target * step / 100)` without widening past 256 bits.
fn target_step(target: U256, step_percent: u64) -> U256 {
    let step = U256::from(step_percent);
    let hundred = U256::from(100u64);
    (target / hundred) * step + (target % hundred) * step / hundred
}

fn capacity_step(capacity: u64, step_bps: u64) -> u64 {
    capacity.saturating_mul(step_bps) / CAPACITY_STEP_DENOMINATOR
}

/// Apply the retargeting rule to a closed epoch.
///
/// The target axis follows every band: harder on high and gaussian
/// participation, easier otherwise. The capacity axis only moves at the
/// extremes: it grows on a full epoch, shrinks on an under-subscribed
/// one, and holds anywhere in between. Both outputs are clamped, the
/// target to `[min_target, max_target]` and the capacity to
/// `>= min_capacity`.
pub fn retarget(
    config: &EngineConfig,
    closed_epoch: u64,
    target: U256,
    capacity: u64,
    admitted: u64,
) -> Transition {
    let pm = participation_pm(admitted, capacity);
    let band = classify(pm, &config.bands);

    let (target_move, capacity_move) = match band {
        Band::High => (AxisMove::Decrease, AxisMove::Increase),
        Band::Gaussian => (AxisMove::Decrease, AxisMove::Hold),
        Band::Slack => (AxisMove::Increase, AxisMove::Hold),
        Band::Low => (AxisMove::Increase, AxisMove::Decrease),
    };

    let step = target_step(target, config.target_step_percent);
    let new_target = match target_move {
        AxisMove::Decrease => (target - step).max(config.min_target),
        AxisMove::Increase => target
            .checked_add(step)
            .unwrap_or(U256::MAX)
            .min(config.max_target),
        AxisMove::Hold => target,
    };

    let step = capacity_step(capacity, config.capacity_step_bps);
    let new_capacity = match capacity_move {
        AxisMove::Increase => capacity.saturating_add(step),
        AxisMove::Decrease => capacity.saturating_sub(step).max(config.min_capacity),
        AxisMove::Hold => capacity,
    };

    Transition {
        closed_epoch,
        participation_pm: pm,
        band,
        target_move,
        capacity_move,
        new_target,
        new_capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn max_target() -> U256 {
        U256::one() << 250
    }

    #[test]
    fn full_participation_tightens_and_grows() {
        let t = retarget(&config(), 1, max_target(), 100, 100);
        assert_eq!(t.band, Band::High);
        assert_eq!(t.participation_pm, 100_000);
        assert_eq!(t.new_capacity, 110);
        // target' = target - target * 10 / 100, exactly.
        let expected = max_target() - max_target() / U256::from(10u64);
        assert_eq!(t.new_target, expected);
    }

    #[test]
    fn zero_participation_shrinks_and_holds_at_ceiling() {
        let t = retarget(&config(), 1, max_target(), 100, 0);
        assert_eq!(t.band, Band::Low);
        assert_eq!(t.participation_pm, 0);
        assert_eq!(t.new_capacity, 90);
        // Easing from the ceiling clamps right back to it.
        assert_eq!(t.new_target, max_target());
        assert_eq!(t.target_move, AxisMove::Increase);
    }

    #[test]
    fn gaussian_band_only_moves_the_target() {
        let t = retarget(&config(), 1, max_target(), 100, 68);
        assert_eq!(t.band, Band::Gaussian);
        assert_eq!(t.new_capacity, 100);
        assert!(t.new_target < max_target());
        assert_eq!(t.capacity_move, AxisMove::Hold);
    }

    #[test]
    fn slack_band_eases_and_holds_capacity() {
        // 145 of 146 slots: above the gaussian band yet not full.
        let t = retarget(&config(), 1, max_target() / U256::from(2u64), 146, 145);
        assert_eq!(t.band, Band::Slack);
        assert_eq!(t.new_capacity, 146);
        assert!(t.new_target > max_target() / U256::from(2u64));
    }

    #[test]
    fn one_third_participation_is_low() {
        // floor(146 / 3) = 48 admitted: 32_876 pm, inside the low band.
        let t = retarget(&config(), 1, max_target(), 146, 48);
        assert_eq!(t.band, Band::Low);
        assert_eq!(t.new_capacity, 146 - 14);
    }

    #[test]
    fn capacity_walk_under_repeated_full_participation() {
        let cfg = config();
        let mut capacity = 100;
        let mut target = max_target();
        let mut walk = Vec::new();
        for epoch in 1..=4 {
            let t = retarget(&cfg, epoch, target, capacity, capacity);
            capacity = t.new_capacity;
            target = t.new_target;
            walk.push(capacity);
        }
        // Truncating 10% growth per epoch.
        assert_eq!(walk, vec![110, 121, 133, 146]);
    }

    #[test]
    fn capacity_floor_is_absorbing() {
        let cfg = config();
        let mut capacity = 100;
        for epoch in 1..200 {
            let t = retarget(&cfg, epoch, max_target(), capacity, 1);
            assert!(t.new_capacity >= cfg.min_capacity);
            capacity = t.new_capacity;
        }
        assert_eq!(capacity, cfg.min_capacity);
        // One more under-subscribed epoch stays on the floor.
        let t = retarget(&cfg, 200, max_target(), capacity, 0);
        assert_eq!(t.new_capacity, cfg.min_capacity);
    }

    #[test]
    fn target_never_leaves_the_clamp() {
        let cfg = config();
        let mut target = max_target();
        // Repeated gaussian-band epochs tighten until the floor holds.
        for epoch in 1..2_000 {
            let t = retarget(&cfg, epoch, target, 100, 68);
            assert!(t.new_target >= cfg.min_target);
            assert!(t.new_target <= cfg.max_target);
            target = t.new_target;
        }
        assert_eq!(target, cfg.min_target);
    }

    #[test]
    fn easing_saturates_at_the_numeric_limit() {
        let cfg = EngineConfig {
            initial_target: U256::MAX,
            min_target: U256::one(),
            max_target: U256::MAX,
            ..config()
        };
        let t = retarget(&cfg, 1, U256::MAX, 100, 0);
        assert_eq!(t.new_target, U256::MAX);
    }

    #[test]
    fn target_step_matches_wide_arithmetic() {
        // The split computation must equal floor(t * s / 100) exactly.
        let samples = [
            max_target(),
            max_target() - U256::one(),
            U256::from(12_345_678_901_234_567_890u128),
            U256::one(),
            U256::zero(),
        ];
        for target in samples {
            let wide = target.full_mul(U256::from(10u64)) / primitive_types::U512::from(100u64);
            let expected = U256::try_from(wide).expect("fits 256 bits");
            assert_eq!(target_step(target, 10), expected, "target {target}");
        }
    }

    #[test]
    fn participation_is_integer_percent_mille() {
        assert_eq!(participation_pm(0, 100), 0);
        assert_eq!(participation_pm(100, 100), 100_000);
        assert_eq!(participation_pm(145, 146), 99_315);
        assert_eq!(participation_pm(48, 146), 32_876);
        assert_eq!(participation_pm(68, 100), 68_000);
    }
}
