//! Session lifecycle supervision.
//!
//! The messaging layer lives behind `SessionPort`. The supervisor owns the
//! connect/run/restart loop: provider blocks are retried on a randomized
//! backoff with a bounded budget, any other startup failure is fatal, and an
//! operator shutdown releases the session cleanly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::domain::{ChatId, InboundMessage, MessageId};
use crate::errors::Error;
use crate::retry::RetryPolicy;
use crate::Result;

/// Events surfaced by an established session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Message(InboundMessage),
    /// Raw connection-state name reported by the messaging layer.
    StateChanged(String),
    /// The provider blocked the automation session.
    Blocked { reason: String },
}

/// Lifecycle phase of the supervised session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Starting,
    Running,
    Blocked,
    Terminating,
}

/// Sends chat replies through the messaging layer.
#[async_trait]
pub trait ReplyPort: Send + Sync {
    async fn reply(&self, chat: &ChatId, text: &str, quoted: Option<&MessageId>) -> Result<()>;
}

/// Establishes sessions with the messaging layer.
#[async_trait]
pub trait SessionPort: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SessionConnection>>;
}

/// One established session. `next_event` returning `None` means the event
/// stream is gone and the session cannot recover.
#[async_trait]
pub trait SessionConnection: Send {
    async fn next_event(&mut self) -> Option<SessionEvent>;

    /// Releases the session on the messaging layer (best effort).
    async fn close(&mut self) -> Result<()>;
}

enum SessionEnd {
    Shutdown,
    Blocked(String),
}

enum Recovery {
    Retry,
    Shutdown,
}

pub struct Supervisor {
    port: Arc<dyn SessionPort>,
    dispatcher: Arc<Dispatcher>,
    policy: RetryPolicy,
    phase: Mutex<SessionPhase>,
}

impl Supervisor {
    pub fn new(
        port: Arc<dyn SessionPort>,
        dispatcher: Arc<Dispatcher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            port,
            dispatcher,
            policy,
            phase: Mutex::new(SessionPhase::Starting),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.lock().await
    }

    async fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock().await = phase;
        tracing::debug!(?phase, "session phase");
    }

    /// Runs the session until the operator shuts the bot down (`Ok`) or the
    /// session fails beyond recovery (`Err`).
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut blocks: u32 = 0;
        loop {
            self.set_phase(SessionPhase::Starting).await;
            tracing::info!("starting messaging session");

            let connected = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.set_phase(SessionPhase::Terminating).await;
                    return Ok(());
                }
                res = self.port.connect() => res,
            };

            let mut conn = match connected {
                Ok(conn) => conn,
                Err(Error::Blocked(reason)) => {
                    blocks += 1;
                    match self.recover(blocks, reason, &shutdown).await? {
                        Recovery::Retry => continue,
                        Recovery::Shutdown => {
                            self.set_phase(SessionPhase::Terminating).await;
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    self.set_phase(SessionPhase::Terminating).await;
                    tracing::error!("session startup failed: {err}");
                    return Err(err);
                }
            };

            blocks = 0;
            self.set_phase(SessionPhase::Running).await;
            tracing::info!("messaging session established");

            match self.pump(conn.as_mut(), &shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    tracing::info!("shutting down");
                    if let Err(err) = conn.close().await {
                        tracing::warn!("session close failed: {err}");
                    }
                    self.set_phase(SessionPhase::Terminating).await;
                    return Ok(());
                }
                Ok(SessionEnd::Blocked(reason)) => {
                    if let Err(err) = conn.close().await {
                        tracing::warn!("session close failed: {err}");
                    }
                    blocks += 1;
                    match self.recover(blocks, reason, &shutdown).await? {
                        Recovery::Retry => continue,
                        Recovery::Shutdown => {
                            self.set_phase(SessionPhase::Terminating).await;
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    if let Err(close_err) = conn.close().await {
                        tracing::warn!("session close failed: {close_err}");
                    }
                    self.set_phase(SessionPhase::Terminating).await;
                    tracing::error!("session failed: {err}");
                    return Err(err);
                }
            }
        }
    }

    /// Forwards session events until shutdown, a block, or stream loss.
    /// Message handling runs on spawned tasks that are abandoned when this
    /// session ends.
    async fn pump(
        &self,
        conn: &mut dyn SessionConnection,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd> {
        let handlers = CancellationToken::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    handlers.cancel();
                    return Ok(SessionEnd::Shutdown);
                }
                event = conn.next_event() => match event {
                    None => {
                        handlers.cancel();
                        return Err(Error::Session("session event stream closed".to_string()));
                    }
                    Some(SessionEvent::Message(msg)) => {
                        let dispatcher = self.dispatcher.clone();
                        let abandoned = handlers.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = abandoned.cancelled() => {}
                                res = dispatcher.handle(msg) => {
                                    if let Err(err) = res {
                                        tracing::error!("message handling failed: {err}");
                                    }
                                }
                            }
                        });
                    }
                    Some(SessionEvent::StateChanged(state)) => {
                        if state.eq_ignore_ascii_case("connected") {
                            tracing::info!("session connected");
                        } else {
                            tracing::debug!(%state, "session state changed");
                        }
                    }
                    Some(SessionEvent::Blocked { reason }) => {
                        handlers.cancel();
                        return Ok(SessionEnd::Blocked(reason));
                    }
                }
            }
        }
    }

    /// Waits out one block-recovery backoff, or gives up once the attempt
    /// budget is spent.
    async fn recover(
        &self,
        blocks: u32,
        reason: String,
        shutdown: &CancellationToken,
    ) -> Result<Recovery> {
        self.set_phase(SessionPhase::Blocked).await;
        if blocks > self.policy.max_attempts {
            self.set_phase(SessionPhase::Terminating).await;
            tracing::error!("maximum retry attempts reached; could not recover from the block");
            tracing::error!("suggestions:");
            tracing::error!("  1. try a different WhatsApp account");
            tracing::error!("  2. wait a few hours before trying again");
            tracing::error!("  3. update the wa-automate gateway to the latest version");
            return Err(Error::Blocked(reason));
        }

        let delay = self.policy.delay(blocks);
        tracing::warn!(
            attempt = blocks,
            max_attempts = self.policy.max_attempts,
            "session blocked: {reason}; restarting in {:.1}s",
            delay.as_secs_f32()
        );
        tokio::select! {
            _ = shutdown.cancelled() => Ok(Recovery::Shutdown),
            _ = tokio::time::sleep(delay) => Ok(Recovery::Retry),
        }
    }
}
