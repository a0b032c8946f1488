//! The guardian engine: one decision cycle at a time.
//!
//! The engine owns the throttle state, the sampler, and the process-control
//! capability. It is the single writer of state and the single caller of
//! mutating process operations; the async runtime around it only schedules
//! cycles and moves inputs/outputs.

use log::{debug, info, warn};

use super::decision::next_state;
use super::events::{ControlAction, EngineEvent, ReportedCondition, ThrottleState};
use super::target::{PriorityLevel, ProcessControl, TargetProcess};
use crate::core::config::GuardianConfig;
use crate::core::sampler::LoadSampler;
use crate::error::{GuardError, Result};

pub struct GuardianEngine {
    config: GuardianConfig,
    state: ThrottleState,
    sampler: LoadSampler,
    control: Box<dyn ProcessControl>,
    target: TargetProcess,
}

impl GuardianEngine {
    /// Build an engine from validated configuration.
    ///
    /// Configuration problems are the only fatal startup error; everything
    /// that can go wrong later is reported through the cycle's event.
    pub fn new(
        config: GuardianConfig,
        sampler: LoadSampler,
        control: Box<dyn ProcessControl>,
    ) -> Result<Self> {
        config.validate()?;
        let target = TargetProcess::new(&config.target_process_name);
        Ok(Self {
            config,
            state: ThrottleState::Normal,
            sampler,
            control,
            target,
        })
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    /// Point the engine at a different process; resolution happens on the
    /// next cycle.
    pub fn set_target_process(&mut self, name: &str) {
        self.target.set_name(name);
    }

    /// Replace the whole configuration between cycles.
    pub fn reconfigure(&mut self, config: GuardianConfig) {
        info!("Engine reconfigured: {:?}", config);
        self.target.set_name(&config.target_process_name);
        self.config = config;
    }

    /// Run one atomic sampling/decision/action cycle.
    ///
    /// Always returns exactly one event; per-cycle failures are folded into
    /// it as a reported condition rather than raised.
    pub fn run_cycle(&mut self, panic_on: bool) -> EngineEvent {
        let outcome = self.sampler.sample();

        let next = next_state(self.state, panic_on, &outcome.sample, &self.config);

        let (action, condition) = if next != self.state {
            info!(
                "State transition: {} -> {} (cpu {:.1}%, gpu {})",
                self.state.as_str(),
                next.as_str(),
                outcome.sample.cpu_percent,
                outcome
                    .sample
                    .gpu_percent
                    .map_or("n/a".to_string(), |gpu| format!("{gpu:.1}%")),
            );
            self.apply_transition(next)
        } else {
            (ControlAction::None, self.enforce_expected_controls())
        };
        self.state = next;

        let condition = condition.or(if outcome.degraded {
            Some(ReportedCondition::SamplingDegraded)
        } else {
            None
        });

        EngineEvent {
            state: self.state,
            sample: outcome.sample,
            action,
            condition,
        }
    }

    /// Execute the control action for an entered state.
    fn apply_transition(
        &mut self,
        next: ThrottleState,
    ) -> (ControlAction, Option<ReportedCondition>) {
        match (self.state, next) {
            // Panic is a user-intent state: it is entered whether or not the
            // process can currently be acted upon
            (_, ThrottleState::Panic) => self.control_step(ControlAction::Suspended),
            (ThrottleState::Panic, ThrottleState::Throttled) => {
                // Resume first, then re-apply the throttled priority
                let (action, condition) = self.control_step(ControlAction::Resumed);
                if condition.is_some() {
                    return (action, condition);
                }
                let (_, condition) = self.control_step(ControlAction::PriorityLowered);
                (ControlAction::Resumed, condition)
            }
            (_, ThrottleState::Throttled) => self.control_step(ControlAction::PriorityLowered),
            (_, ThrottleState::Normal) => self.control_step(ControlAction::PriorityRestored),
        }
    }

    /// Re-assert the controls expected for the current state.
    ///
    /// Runs on cycles without a transition so that externally reverted
    /// priority or an externally resumed panic target gets corrected without
    /// touching the state machine. All the underlying operations are
    /// idempotent, so matching reality is a no-op.
    fn enforce_expected_controls(&mut self) -> Option<ReportedCondition> {
        let intent = match self.state {
            ThrottleState::Normal => ControlAction::PriorityRestored,
            ThrottleState::Throttled => ControlAction::PriorityLowered,
            ThrottleState::Panic => ControlAction::Suspended,
        };
        let (_, condition) = self.control_step(intent);
        condition
    }

    /// Resolve the target and perform one control operation on it.
    ///
    /// Failures are reported, never raised: a vanished process clears the
    /// cached handle for re-resolution next cycle, and a permission failure
    /// leaves the state machine's view of intended policy intact.
    fn control_step(&mut self, intent: ControlAction) -> (ControlAction, Option<ReportedCondition>) {
        let pid = match self.target.current(self.control.as_mut()) {
            Ok(pid) => pid,
            Err(e) => {
                debug!("Target unavailable for {:?}: {}", intent, e);
                return (ControlAction::None, Some(ReportedCondition::ProcessGone));
            }
        };

        let result = match intent {
            ControlAction::Suspended => self.control.suspend(pid),
            ControlAction::Resumed => self.control.resume(pid),
            ControlAction::PriorityLowered => {
                self.control.set_priority(pid, PriorityLevel::BelowNormal)
            }
            ControlAction::PriorityRestored => {
                self.control.set_priority(pid, PriorityLevel::Normal)
            }
            ControlAction::None => Ok(()),
        };

        match result {
            Ok(()) => (intent, None),
            Err(GuardError::ProcessGone(pid)) => {
                debug!("Process {} vanished during {:?}", pid, intent);
                self.target.invalidate();
                (ControlAction::None, Some(ReportedCondition::ProcessGone))
            }
            Err(GuardError::PermissionDenied(msg)) => {
                warn!("Not permitted to {:?} pid {}: {}", intent, pid, msg);
                (
                    ControlAction::None,
                    Some(ReportedCondition::PermissionDenied),
                )
            }
            Err(e) => {
                warn!("Control action {:?} on pid {} failed: {}", intent, pid, e);
                (ControlAction::None, Some(ReportedCondition::ProcessGone))
            }
        }
    }
}
