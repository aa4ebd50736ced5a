//! [`SyncLoop`] – the actuator host's command synchronisation loop.
//!
//! Each iteration:
//!
//! 1. **Supervise** – run the [`Watchdog`] check, whatever the network is
//!    doing.
//! 2. **Fetch** – ask the [`CommandSource`] for the latest command, bounded by
//!    the fetch timeout.  A failure is logged and marks the link offline.
//! 3. **Filter** – the [`SequenceGate`] drops anything not strictly newer than
//!    the last applied command.  Repeats are the idle case and produce a
//!    heartbeat log at most once per heartbeat interval.
//! 4. **Actuate** – a fresh command is mapped by [`Kinematics`] and applied
//!    through the [`Actuation`] driver; the watchdog is re-armed.
//! 5. **Pace** – sleep fast or slow depending on recent activity.
//!
//! A shutdown signal interrupts the fetch or the sleep, and the loop always
//! ends by stopping the rover.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use rover_hal::{ActuationConfig, RoverDriver, SimBackend};
//! use rover_kernel::Kinematics;
//! use rover_runtime::command_source::CommandStore;
//! use rover_runtime::sync_loop::{MotionContext, SyncConfig, SyncLoop};
//!
//! # async fn demo() {
//! let mut backend = SimBackend::new();
//! let driver = RoverDriver::new(&mut backend, &ActuationConfig::default());
//! let config = SyncConfig::default();
//! let ctx = MotionContext::new(driver, Kinematics::default(), config.watchdog_timeout(), Instant::now());
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let mut sync = SyncLoop::new(ctx, CommandStore::new(), config);
//! // Some other task sends `true` on `shutdown_tx` to stop the loop.
//! # drop(shutdown_tx);
//! sync.run(shutdown_rx).await;
//! # }
//! ```

use std::time::{Duration, Instant};

use chrono::Utc;
use rover_hal::Actuation;
use rover_kernel::{Kinematics, SequenceGate, Watchdog};
use rover_types::{
    Command, ConnectionState, MotionPlan, RoverError, RoverStatus, WatchdogState,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cadence::Cadence;
use crate::command_source::CommandSource;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[sync]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub watchdog_timeout_seconds: f64,
    pub fetch_timeout_ms: u64,
    pub fast_poll_ms: u64,
    pub slow_poll_ms: u64,
    pub activity_window_ms: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_seconds: 1.0,
            fetch_timeout_ms: 500,
            fast_poll_ms: 50,
            slow_poll_ms: 500,
            activity_window_ms: 2000,
            heartbeat_interval_secs: 5,
        }
    }
}

impl SyncConfig {
    /// Watchdog timeout; falls back to one second for zero, negative or
    /// non-finite values.
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.watchdog_timeout_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    fn cadence(&self, start: Instant) -> Cadence {
        Cadence::new(
            Duration::from_millis(self.fast_poll_ms),
            Duration::from_millis(self.slow_poll_ms),
            Duration::from_millis(self.activity_window_ms),
            start,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MotionContext
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the actuator host owns about motion: the driver, the mapper,
/// the watchdog and the sequence marker.  Built once at startup.
pub struct MotionContext<A> {
    driver: A,
    kinematics: Kinematics,
    watchdog: Watchdog,
    gate: SequenceGate,
}

impl<A: Actuation> MotionContext<A> {
    pub fn new(driver: A, kinematics: Kinematics, watchdog_timeout: Duration, now: Instant) -> Self {
        Self {
            driver,
            kinematics,
            watchdog: Watchdog::new(watchdog_timeout, now),
            gate: SequenceGate::new(),
        }
    }

    pub fn driver(&self) -> &A {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut A {
        &mut self.driver
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }

    pub fn check_watchdog(&mut self, now: Instant) -> WatchdogState {
        self.watchdog.check(now, &mut self.driver)
    }

    /// Apply `command` if it is newer than the last one applied.
    ///
    /// Hardware write failures are logged and do not un-accept the command.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::StaleCommand`] for an old or repeated command;
    /// nothing is touched in that case.
    pub fn apply(&mut self, command: &Command, now: Instant) -> Result<MotionPlan, RoverError> {
        self.gate.admit(command.sequence)?;
        self.watchdog.accept(now);

        let plan = self.kinematics.plan_for(command);
        info!(
            sequence = %command.sequence,
            turn = command.turn,
            throttle = command.throttle,
            speed_cap = command.speed_cap,
            drive = ?plan.drive,
            steering = ?plan.steering,
            "command applied"
        );
        if let Err(e) = self.driver.apply_drive(&plan.drive) {
            warn!(error = %e, "drive output not fully applied");
        }
        if let Err(e) = self.driver.apply_steering(&plan.steering) {
            warn!(error = %e, "steering output not fully applied");
        }
        Ok(plan)
    }

    /// Fail-safe stop.
    pub fn stop(&mut self) {
        self.driver.stop();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Actuator-host loop tying a [`CommandSource`] to a [`MotionContext`].
pub struct SyncLoop<S, A> {
    ctx: MotionContext<A>,
    source: S,
    config: SyncConfig,
    cadence: Cadence,
    connection: ConnectionState,
    last_heartbeat: Instant,
    status_tx: watch::Sender<RoverStatus>,
}

impl<S, A> SyncLoop<S, A>
where
    S: CommandSource,
    A: Actuation + Send,
{
    pub fn new(ctx: MotionContext<A>, source: S, config: SyncConfig) -> Self {
        let start = Instant::now();
        let cadence = config.cadence(start);
        let (status_tx, _) = watch::channel(snapshot(&ctx, ConnectionState::Unknown, start));
        Self {
            ctx,
            source,
            config,
            cadence,
            connection: ConnectionState::Unknown,
            last_heartbeat: start,
            status_tx,
        }
    }

    pub fn context(&self) -> &MotionContext<A> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut MotionContext<A> {
        &mut self.ctx
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Current status as of `now`.
    pub fn status(&self, now: Instant) -> RoverStatus {
        snapshot(&self.ctx, self.connection, now)
    }

    /// Receiver that sees a fresh [`RoverStatus`] after every iteration.
    pub fn subscribe_status(&self) -> watch::Receiver<RoverStatus> {
        self.status_tx.subscribe()
    }

    /// Run one iteration at `now` and return how long to sleep before the
    /// next one.
    pub async fn step(&mut self, now: Instant) -> Duration {
        self.ctx.check_watchdog(now);

        let fetched = match tokio::time::timeout(
            self.config.fetch_timeout(),
            self.source.fetch_latest(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RoverError::TransientLink(format!(
                "no answer within {} ms",
                self.config.fetch_timeout_ms
            ))),
        };

        match fetched {
            Err(e) => {
                if self.connection != ConnectionState::Offline {
                    warn!(source = %self.source.describe(), error = %e, "command link lost");
                } else {
                    warn!(error = %e, "command fetch failed");
                }
                self.connection = ConnectionState::Offline;
            }
            Ok(command) => {
                if self.connection != ConnectionState::Online {
                    info!(source = %self.source.describe(), "command link online");
                }
                self.connection = ConnectionState::Online;
                match self.ctx.apply(&command, now) {
                    Ok(plan) => {
                        if !plan.is_idle() {
                            self.cadence.record_activity(now);
                        }
                    }
                    Err(_) => self.heartbeat(now),
                }
            }
        }

        self.status_tx.send_replace(self.status(now));
        self.cadence.next_delay(now)
    }

    /// Loop until `shutdown` turns `true` (or its sender is dropped), then
    /// stop the rover.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source.describe(),
            watchdog_timeout_ms = self.ctx.watchdog().timeout().as_millis() as u64,
            "sync loop started"
        );
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            let delay = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                delay = self.step(Instant::now()) => delay,
            };
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
        self.ctx.stop();
        self.status_tx.send_replace(self.status(Instant::now()));
        info!("sync loop stopped; rover halted");
    }

    fn heartbeat(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_heartbeat) >= self.config.heartbeat_interval() {
            info!(last_sequence = %self.ctx.gate().last(), "heartbeat: connected, idle");
            self.last_heartbeat = now;
        }
    }
}

fn snapshot<A>(ctx: &MotionContext<A>, connection: ConnectionState, now: Instant) -> RoverStatus {
    RoverStatus {
        connection,
        last_command_age_secs: ctx.watchdog.last_command_age(now).map(|d| d.as_secs_f64()),
        watchdog: ctx.watchdog.state(),
        last_sequence: ctx.gate.last(),
        updated_at: Utc::now(),
    }
}
