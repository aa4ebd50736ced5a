//! `rover-runtime` – Actuator Host Loop
//!
//! Keeps the rover in step with a remote command source: fetches the latest
//! command, filters stale ones, drives the hardware, and keeps the safety
//! watchdog running on every tick.
//!
//! # Modules
//!
//! - [`command_source`] – [`CommandSource`][command_source::CommandSource]:
//!   the fetch-latest contract, with an HTTP client for the dashboard backend
//!   and an in-process [`CommandStore`][command_source::CommandStore].
//! - [`cadence`] – [`Cadence`][cadence::Cadence]:
//!   fast polling while the operator drives, slow polling when idle.
//! - [`sync_loop`] – [`SyncLoop`][sync_loop::SyncLoop] and
//!   [`MotionContext`][sync_loop::MotionContext]: the loop itself and the
//!   motion state it owns.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   global `tracing` subscriber with optional OTLP span export.

pub mod cadence;
pub mod command_source;
pub mod sync_loop;
pub mod telemetry;

pub use cadence::Cadence;
pub use command_source::{CommandSource, CommandStore, HttpCommandSource};
pub use sync_loop::{MotionContext, SyncConfig, SyncLoop};
pub use telemetry::{TracerProviderGuard, init_tracing};
