//! Throttling state machine transition rules.
//!
//! The five rules below are evaluated in precedence order once per poll
//! cycle. The panic toggle always wins; leaving panic lands in Throttled
//! (never directly in Normal) so a mass-resumed process gets one throttled
//! cycle before full recovery instead of re-spiking immediately.

use super::events::{LoadSample, ThrottleState};
use crate::core::config::GuardianConfig;

/// Compute the target state for one cycle.
///
/// An unavailable GPU reading never contributes: throttle-up treats it as
/// "not hot", recovery treats it as "not blocking", so with GPU telemetry
/// permanently absent the state is fully determined by the CPU thresholds.
pub fn next_state(
    current: ThrottleState,
    panic_on: bool,
    sample: &LoadSample,
    config: &GuardianConfig,
) -> ThrottleState {
    // Rule 1: user intent beats load
    if panic_on {
        return ThrottleState::Panic;
    }

    // Rule 2: throttle on either sensor crossing its threshold
    let cpu_hot = sample.cpu_percent >= config.cpu_throttle_threshold;
    let gpu_hot = sample
        .gpu_percent
        .is_some_and(|gpu| gpu >= config.gpu_throttle_threshold);
    if current != ThrottleState::Panic && (cpu_hot || gpu_hot) {
        return ThrottleState::Throttled;
    }

    // Rule 3: recover only once both sensors are below their recovery thresholds
    let cpu_recovered = sample.cpu_percent <= config.cpu_recovery_threshold;
    let gpu_recovered = sample
        .gpu_percent
        .is_none_or(|gpu| gpu <= config.gpu_recovery_threshold);
    if current == ThrottleState::Throttled && cpu_recovered && gpu_recovered {
        return ThrottleState::Normal;
    }

    // Rule 4: leaving panic forces one throttled cycle
    if current == ThrottleState::Panic {
        return ThrottleState::Throttled;
    }

    // Rule 5: hold
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f32, gpu: Option<f32>) -> LoadSample {
        LoadSample {
            cpu_percent: cpu,
            gpu_percent: gpu,
            timestamp: 0,
        }
    }

    fn config() -> GuardianConfig {
        GuardianConfig {
            cpu_throttle_threshold: 80.0,
            cpu_recovery_threshold: 60.0,
            gpu_throttle_threshold: 85.0,
            gpu_recovery_threshold: 65.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_panic_toggle_wins_from_any_state() {
        let cfg = config();
        for current in [
            ThrottleState::Normal,
            ThrottleState::Throttled,
            ThrottleState::Panic,
        ] {
            for cpu in [0.0, 50.0, 99.0] {
                assert_eq!(
                    next_state(current, true, &sample(cpu, Some(cpu)), &cfg),
                    ThrottleState::Panic
                );
            }
        }
    }

    #[test]
    fn test_cpu_threshold_throttles() {
        let cfg = config();
        assert_eq!(
            next_state(ThrottleState::Normal, false, &sample(80.0, None), &cfg),
            ThrottleState::Throttled
        );
        assert_eq!(
            next_state(ThrottleState::Normal, false, &sample(79.9, None), &cfg),
            ThrottleState::Normal
        );
    }

    #[test]
    fn test_gpu_threshold_throttles() {
        let cfg = config();
        assert_eq!(
            next_state(
                ThrottleState::Normal,
                false,
                &sample(10.0, Some(85.0)),
                &cfg
            ),
            ThrottleState::Throttled
        );
    }

    #[test]
    fn test_unavailable_gpu_never_fires() {
        let cfg = config();
        // Decisions are driven purely by CPU when GPU telemetry is absent
        assert_eq!(
            next_state(ThrottleState::Normal, false, &sample(10.0, None), &cfg),
            ThrottleState::Normal
        );
        assert_eq!(
            next_state(ThrottleState::Throttled, false, &sample(55.0, None), &cfg),
            ThrottleState::Normal
        );
    }

    #[test]
    fn test_hysteresis_band_holds_state() {
        let cfg = config();
        // Between recovery (60) and throttle (80) thresholds neither state moves
        for cpu in [60.1, 65.0, 70.0, 79.9] {
            assert_eq!(
                next_state(ThrottleState::Throttled, false, &sample(cpu, None), &cfg),
                ThrottleState::Throttled
            );
            assert_eq!(
                next_state(ThrottleState::Normal, false, &sample(cpu, None), &cfg),
                ThrottleState::Normal
            );
        }
    }

    #[test]
    fn test_recovery_needs_both_sensors_cool() {
        let cfg = config();
        assert_eq!(
            next_state(
                ThrottleState::Throttled,
                false,
                &sample(50.0, Some(70.0)),
                &cfg
            ),
            ThrottleState::Throttled
        );
        assert_eq!(
            next_state(
                ThrottleState::Throttled,
                false,
                &sample(50.0, Some(65.0)),
                &cfg
            ),
            ThrottleState::Normal
        );
    }

    #[test]
    fn test_panic_release_goes_to_throttled_not_normal() {
        let cfg = config();
        // Even at zero load the first post-panic cycle stays throttled
        assert_eq!(
            next_state(ThrottleState::Panic, false, &sample(0.0, Some(0.0)), &cfg),
            ThrottleState::Throttled
        );
    }

    #[test]
    fn test_panic_ignores_load_rules_while_active() {
        let cfg = config();
        // High load while in Panic with toggle off still exits to Throttled
        assert_eq!(
            next_state(ThrottleState::Panic, false, &sample(99.0, None), &cfg),
            ThrottleState::Throttled
        );
    }

    #[test]
    fn test_no_chattering_on_boundary_sequence() {
        let cfg = config();
        let mut state = ThrottleState::Normal;
        let mut changes = 0;
        // Load hovers inside the hysteresis band after one spike
        for cpu in [50.0, 85.0, 75.0, 70.0, 75.0, 79.0, 61.0, 60.0] {
            let next = next_state(state, false, &sample(cpu, None), &cfg);
            if next != state {
                changes += 1;
            }
            state = next;
        }
        // One throttle on the spike, one recovery at <= 60
        assert_eq!(changes, 2);
        assert_eq!(state, ThrottleState::Normal);
    }
}
