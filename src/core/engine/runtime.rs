//! Tokio runtime wrapper driving the engine's periodic loop.
//!
//! One task owns the engine and runs the fixed-interval cycle. Inputs from
//! the presentation layer (panic toggle, target change, reconfigure) arrive
//! over `watch` channels, a single-slot latest-value handoff read without
//! blocking at the start of each cycle; intermediate values are never
//! replayed. Events fan out over a bounded `broadcast` channel, so a slow
//! consumer loses the oldest events instead of stalling the loop.

use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::events::EngineEvent;
use super::guardian::GuardianEngine;
use crate::core::config::GuardianConfig;
use crate::error::Result;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Handle to a running guardian engine.
///
/// Dropping the handle tears the runtime down; `shutdown` does so after an
/// explicit stop signal that the loop honors between cycles. A panicked
/// target is deliberately left suspended on shutdown.
pub struct GuardianRuntime {
    event_tx: broadcast::Sender<EngineEvent>,
    panic_tx: watch::Sender<bool>,
    target_tx: watch::Sender<String>,
    config_tx: watch::Sender<GuardianConfig>,
    shutdown_tx: broadcast::Sender<()>,
    _runtime: tokio::runtime::Runtime,
}

impl GuardianRuntime {
    /// Spawn the engine loop on a dedicated runtime.
    pub fn start(engine: GuardianEngine) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .thread_name("guardian-engine")
            .build()?;

        let (event_tx, _) = broadcast::channel::<EngineEvent>(EVENT_CHANNEL_CAPACITY);
        let (panic_tx, panic_rx) = watch::channel(false);
        let (target_tx, target_rx) =
            watch::channel(engine.config().target_process_name.clone());
        let (config_tx, config_rx) = watch::channel(engine.config().clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        runtime.spawn(engine_task(
            engine,
            event_tx.clone(),
            panic_rx,
            target_rx,
            config_rx,
            shutdown_rx,
        ));

        Ok(Self {
            event_tx,
            panic_tx,
            target_tx,
            config_tx,
            shutdown_tx,
            _runtime: runtime,
        })
    }

    /// Subscribe to the per-cycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Set the panic toggle; only the latest value is acted on.
    pub fn set_panic(&self, on: bool) {
        let _ = self.panic_tx.send(on);
    }

    /// Retarget the engine; takes effect on the next cycle's resolution.
    pub fn set_target_process(&self, name: &str) {
        let _ = self.target_tx.send(name.to_string());
    }

    /// Atomically replace the engine configuration between cycles.
    pub fn reconfigure(&self, config: GuardianConfig) -> Result<()> {
        config.validate()?;
        let _ = self.config_tx.send(config);
        Ok(())
    }

    /// Signal the loop to stop, honored between cycles.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        // Runtime shuts down when dropped
    }
}

async fn engine_task(
    mut engine: GuardianEngine,
    event_tx: broadcast::Sender<EngineEvent>,
    panic_rx: watch::Receiver<bool>,
    mut target_rx: watch::Receiver<String>,
    mut config_rx: watch::Receiver<GuardianConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut poll_interval = Duration::from_millis(engine.config().poll_interval_ms);
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!(
        "Guardian engine loop started (interval {}ms, target '{}')",
        engine.config().poll_interval_ms,
        engine.config().target_process_name
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Apply pending input between cycles, latest value only
                if config_rx.has_changed().unwrap_or(false) {
                    let config = config_rx.borrow_and_update().clone();
                    let new_interval = Duration::from_millis(config.poll_interval_ms);
                    if new_interval != poll_interval {
                        poll_interval = new_interval;
                        ticker = interval(poll_interval);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                    engine.reconfigure(config);
                }
                if target_rx.has_changed().unwrap_or(false) {
                    let name = target_rx.borrow_and_update().clone();
                    engine.set_target_process(&name);
                }
                let panic_on = *panic_rx.borrow();

                let started = Instant::now();
                let event = engine.run_cycle(panic_on);
                let elapsed = started.elapsed();
                if elapsed > poll_interval {
                    log::warn!(
                        "Cycle overran the poll interval ({}ms > {}ms)",
                        elapsed.as_millis(),
                        poll_interval.as_millis()
                    );
                }

                // Fire-and-forget; no subscribers is fine
                let _ = event_tx.send(event);
            }
            _ = shutdown.recv() => {
                break;
            }
        }
    }

    // No further control actions after the stop signal; a suspended target
    // stays suspended rather than surprising the operator with a resume
    log::info!("Guardian engine loop stopped");
}
