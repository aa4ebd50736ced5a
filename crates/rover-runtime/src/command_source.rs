//! Where commands come from.
//!
//! [`CommandSource`] is the client side of the command transport: the sync
//! loop asks it for the latest command once per iteration and never blocks
//! longer than the source's own timeout.
//!
//! - [`HttpCommandSource`] polls `GET {base}/api/drive` on the dashboard
//!   backend.
//! - [`CommandStore`] is an in-process source that stamps submitted commands
//!   with a strictly increasing sequence, for local operation and tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rover_types::{Command, RoverError, Sequence};
use thiserror::Error;
use tracing::debug;

/// Path of the latest-command endpoint on the backend.
pub const DRIVE_ENDPOINT: &str = "/api/drive";

/// Supplies the most recent command.
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Fetch the latest command.
    ///
    /// Repeated calls may return the same command; the caller filters by
    /// sequence.  Every failure is a [`RoverError::TransientLink`].
    async fn fetch_latest(&self) -> Result<Command, RoverError>;

    /// Short name for logs.
    fn describe(&self) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP source
// ─────────────────────────────────────────────────────────────────────────────

/// Errors internal to the HTTP source.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connect, timeout or non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The body was not a command.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

impl From<FetchError> for RoverError {
    fn from(err: FetchError) -> Self {
        RoverError::TransientLink(err.to_string())
    }
}

/// Polls the dashboard backend over HTTP.
///
/// Construct once; the inner client keeps connections alive across polls.
pub struct HttpCommandSource {
    url: String,
    client: reqwest::Client,
}

impl HttpCommandSource {
    /// `base_url` is the backend root, e.g. `"http://localhost:8000"`.
    /// `timeout` bounds each request end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RoverError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoverError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            url: drive_url(base_url),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Command, FetchError> {
        self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Command>()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    FetchError::BadResponse(e.to_string())
                } else {
                    FetchError::Http(e)
                }
            })
    }
}

#[async_trait]
impl CommandSource for HttpCommandSource {
    async fn fetch_latest(&self) -> Result<Command, RoverError> {
        Ok(self.fetch().await?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn drive_url(base_url: &str) -> String {
    format!("{}{DRIVE_ENDPOINT}", base_url.trim_end_matches('/'))
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    latest: Command,
    next: u64,
    offline: bool,
}

/// Latest-command register shared between a producer and the sync loop.
///
/// Cloning shares the register.  Every [`submit`][Self::submit] replaces the
/// held command and stamps it with the next sequence number, so the loop sees
/// each submission exactly once.
#[derive(Debug, Clone, Default)]
pub struct CommandStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl CommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store `command` as the latest one and return the sequence it was
    /// stamped with.  Any sequence already on `command` is overwritten.
    pub fn submit(&self, mut command: Command) -> Sequence {
        let mut inner = self.lock();
        inner.next += 1;
        let sequence = Sequence::from(inner.next);
        command.sequence = sequence;
        debug!(%sequence, turn = command.turn, throttle = command.throttle, "command stored");
        inner.latest = command;
        sequence
    }

    /// Convenience for [`submit`][Self::submit] with stick values only.
    pub fn drive(&self, turn: i32, throttle: i32, speed_cap: i32) -> Sequence {
        self.submit(Command::new(turn, throttle, speed_cap, Sequence::ZERO))
    }

    /// Latest stored command (sequence `0` before the first submit).
    pub fn latest(&self) -> Command {
        self.lock().latest.clone()
    }

    /// Simulate a dropped link: while offline every fetch fails.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }
}

#[async_trait]
impl CommandSource for CommandStore {
    async fn fetch_latest(&self) -> Result<Command, RoverError> {
        let inner = self.lock();
        if inner.offline {
            return Err(RoverError::TransientLink("command store offline".to_string()));
        }
        Ok(inner.latest.clone())
    }

    fn describe(&self) -> String {
        "in-process store".to_string()
    }
}
