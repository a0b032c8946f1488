use serde::{Deserialize, Serialize};

/// One CPU/GPU utilization snapshot, produced once per poll cycle.
///
/// A machine without usable GPU telemetry reports `gpu_percent: None`, never
/// `0.0`, so an absent sensor cannot look like an idle GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub cpu_percent: f32,
    pub gpu_percent: Option<f32>,
    /// Unix timestamp of the reading
    pub timestamp: i64,
}

/// The throttling state machine's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleState {
    Normal,
    Throttled,
    Panic,
}

impl ThrottleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleState::Normal => "normal",
            ThrottleState::Throttled => "throttled",
            ThrottleState::Panic => "panic",
        }
    }
}

/// Process-control action taken during a decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    None,
    PriorityLowered,
    PriorityRestored,
    Suspended,
    Resumed,
}

/// Non-fatal condition surfaced through the cycle's event instead of
/// stopping the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedCondition {
    /// Sustained sensor unavailability; the loop continues with reduced accuracy
    SamplingDegraded,
    /// The target could not be resolved or vanished mid-action
    ProcessGone,
    /// The caller lacks rights to control the target
    PermissionDenied,
}

/// Read-only snapshot emitted once per decision cycle, transition or not,
/// so observers always see a fresh liveness signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub state: ThrottleState,
    pub sample: LoadSample,
    pub action: ControlAction,
    pub condition: Option<ReportedCondition>,
}
