//! Guardian engine: sampling loop, throttling state machine, and the
//! process-control actions it drives.

mod decision;
mod events;
mod guardian;
mod runtime;
mod target;

pub use decision::next_state;
pub use events::{ControlAction, EngineEvent, LoadSample, ReportedCondition, ThrottleState};
pub use guardian::GuardianEngine;
pub use runtime::GuardianRuntime;
pub use target::{Pid, PriorityLevel, ProcessControl, TargetProcess};
