//! WhatsApp session adapter.
//!
//! Owns an `@open-wa/wa-automate` gateway as a child process: commands go out
//! over its HTTP API (`POST {base}/{method}` with JSON args) and events come
//! back through a local webhook listener. Session launch, block detection and
//! teardown all live here, behind the core session ports.

pub mod events;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use watb_core::{
    config::{Config, SessionOptions},
    domain::{ChatId, MessageId},
    errors::Error,
    session::{ReplyPort, SessionConnection, SessionEvent, SessionPort},
    Result,
};

const EVENT_BUFFER: usize = 64;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct WaGateway {
    gateway_path: PathBuf,
    port: u16,
    api_key: Option<String>,
    webhook_bind: SocketAddr,
    session: SessionOptions,
    http: reqwest::Client,
}

impl WaGateway {
    pub fn new(cfg: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            gateway_path: cfg.gateway_path.clone(),
            port: cfg.gateway_port,
            api_key: cfg.gateway_api_key.clone(),
            webhook_bind: cfg.webhook_bind,
            session: cfg.session.clone(),
            http,
        }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Calls one gateway method. The gateway wraps results as
    /// `{"success": bool, "response": ...}`.
    async fn call(&self, method: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let mut req = self
            .http
            .post(format!("{}/{method}", self.base_url()))
            .json(&json!({ "args": args }));
        if let Some(key) = &self.api_key {
            req = req.header("api_key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Session(format!("gateway call {method} failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            if body.contains("TOSBLOCK") {
                return Err(Error::Blocked(format!(
                    "gateway rejected {method}: {}",
                    preview(&body)
                )));
            }
            return Err(Error::Session(format!(
                "gateway call {method} failed: {status} {}",
                preview(&body)
            )));
        }

        serde_json::from_str(&body).map_err(Error::Json)
    }

    async fn connection_state(&self) -> Result<String> {
        let v = self.call("getConnectionState", json!({})).await?;
        Ok(v.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| v.to_string()))
    }

    /// Polls the gateway until the session is authenticated. Pairing can
    /// involve a QR scan, so the budget is the auth plus QR timeout.
    async fn await_ready(&self, child: &mut Child, blocked: &AtomicBool) -> Result<()> {
        let budget = Duration::from_secs(
            self.session.auth_timeout as u64 + self.session.qr_timeout as u64,
        );
        let deadline = Instant::now() + budget;

        loop {
            if blocked.load(Ordering::SeqCst) {
                return Err(Error::Blocked(
                    "gateway reported TOSBLOCK during startup".to_string(),
                ));
            }
            if let Some(status) = child.try_wait()? {
                if blocked.load(Ordering::SeqCst) {
                    return Err(Error::Blocked(
                        "gateway reported TOSBLOCK during startup".to_string(),
                    ));
                }
                return Err(Error::Session(format!(
                    "gateway exited during startup: {status}"
                )));
            }

            match self.connection_state().await {
                Ok(state) if state == "CONNECTED" => {
                    tracing::info!("gateway session authenticated");
                    return Ok(());
                }
                Ok(state) if state.contains("TOS_BLOCK") => {
                    return Err(Error::Blocked(format!("gateway reports {state}")));
                }
                Ok(state) => tracing::debug!(%state, "gateway not ready yet"),
                Err(Error::Blocked(reason)) => return Err(Error::Blocked(reason)),
                Err(err) => tracing::debug!("gateway not answering yet: {err}"),
            }

            if Instant::now() >= deadline {
                return Err(Error::Session(format!(
                    "gateway did not authenticate within {}s",
                    budget.as_secs()
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl SessionPort for WaGateway {
    async fn connect(&self) -> Result<Box<dyn SessionConnection>> {
        // Webhook listener first so no early gateway event is lost.
        let listener = tokio::net::TcpListener::bind(self.webhook_bind)
            .await
            .map_err(|e| {
                Error::Session(format!("webhook bind {} failed: {e}", self.webhook_bind))
            })?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();
        let guard = shutdown.clone().drop_guard();

        let server = tokio::spawn({
            let events = events_tx.clone();
            let shutdown = shutdown.clone();
            async move {
                if let Err(err) = events::serve(listener, events, shutdown).await {
                    tracing::error!("webhook listener failed: {err}");
                }
            }
        });

        let webhook_url = format!("http://{}/webhook", self.webhook_bind);
        let args = launch_args(
            &self.session,
            self.port,
            self.api_key.as_deref(),
            &webhook_url,
        );
        tracing::info!(
            gateway = %self.gateway_path.display(),
            session_id = %self.session.session_id,
            "launching messaging gateway"
        );

        let mut cmd = Command::new(&self.gateway_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Session(format!(
                "failed to launch {}: {e}",
                self.gateway_path.display()
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Session("gateway stdout was not captured".to_string()))?;

        let blocked = Arc::new(AtomicBool::new(false));
        spawn_stdout_scanner(stdout, events_tx, blocked.clone(), shutdown.clone());

        self.await_ready(&mut child, &blocked).await?;

        Ok(Box::new(WaConnection {
            gateway: self.clone(),
            child,
            events: events_rx,
            shutdown,
            server,
            _guard: guard,
        }))
    }
}

#[async_trait]
impl ReplyPort for WaGateway {
    async fn reply(&self, chat: &ChatId, text: &str, quoted: Option<&MessageId>) -> Result<()> {
        match quoted {
            Some(id) => {
                self.call(
                    "reply",
                    json!({
                        "to": chat.0,
                        "content": text,
                        "quotedMsgId": id.0,
                        "sendSeen": false,
                    }),
                )
                .await?;
            }
            None => {
                self.call("sendText", json!({ "to": chat.0, "content": text }))
                    .await?;
            }
        }
        Ok(())
    }
}

struct WaConnection {
    gateway: WaGateway,
    child: Child,
    events: mpsc::Receiver<SessionEvent>,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
    _guard: DropGuard,
}

#[async_trait]
impl SessionConnection for WaConnection {
    async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            biased;
            event = self.events.recv() => event,
            status = self.child.wait() => {
                match status {
                    Ok(st) => tracing::error!("gateway process exited: {st}"),
                    Err(err) => tracing::error!("gateway process wait failed: {err}"),
                }
                None
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Ask the gateway to log the session out before tearing it down.
        if let Err(err) = self.gateway.call("kill", json!({})).await {
            tracing::debug!("gateway logout failed: {err}");
        }
        stop_child(&mut self.child).await?;
        self.shutdown.cancel();
        let _ = (&mut self.server).await;
        Ok(())
    }
}

/// CLI flags for the gateway launcher. Boolean options are plain flags the
/// launcher reads as true.
fn launch_args(
    session: &SessionOptions,
    port: u16,
    api_key: Option<&str>,
    webhook: &str,
) -> Vec<String> {
    let mut args = vec![
        "--session-id".to_string(),
        session.session_id.clone(),
        "--port".to_string(),
        port.to_string(),
        "--webhook".to_string(),
        webhook.to_string(),
        "--auth-timeout".to_string(),
        session.auth_timeout.to_string(),
        "--qr-timeout".to_string(),
        session.qr_timeout.to_string(),
    ];
    if let Some(key) = api_key {
        args.push("--key".to_string());
        args.push(key.to_string());
    }
    if session.multi_device {
        args.push("--multi-device".to_string());
    }
    if session.headless {
        args.push("--headless".to_string());
    }
    if session.use_chrome {
        args.push("--use-chrome".to_string());
    }
    if session.skip_update_check {
        args.push("--skip-update-check".to_string());
    }
    if session.throw_error_on_tos_block {
        args.push("--throw-error-on-tos-block".to_string());
    }
    if !session.chromium_args.is_empty() {
        args.push("--chromium-args".to_string());
        args.push(session.chromium_args.join(" "));
    }
    args
}

/// Streams gateway stdout into the log and watches for block markers.
fn spawn_stdout_scanner(
    stdout: ChildStdout,
    events: mpsc::Sender<SessionEvent>,
    blocked: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    tracing::debug!(target: "wa_gateway", "{line}");
                    if line.contains("TOSBLOCK") {
                        blocked.store(true, Ordering::SeqCst);
                        let _ = events
                            .send(SessionEvent::Blocked {
                                reason: "TOSBLOCK reported by gateway".to_string(),
                            })
                            .await;
                    }
                }
            }
        }
    });
}

async fn stop_child(child: &mut Child) -> Result<()> {
    // Already exited: try_wait reaps it.
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    match child.kill().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // It may have exited between try_wait and kill.
            if child.try_wait()?.is_none() {
                return Err(Error::Io(err));
            }
            Ok(())
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SessionOptions {
        SessionOptions {
            session_id: "wa-translator-bot".to_string(),
            multi_device: true,
            auth_timeout: 60,
            qr_timeout: 30,
            throw_error_on_tos_block: false,
            skip_update_check: true,
            headless: true,
            use_chrome: false,
            chromium_args: vec!["--no-sandbox".to_string()],
        }
    }

    #[test]
    fn launch_args_carry_the_session_options() {
        let args = launch_args(
            &options(),
            8002,
            Some("secret"),
            "http://127.0.0.1:8811/webhook",
        );
        let joined = args.join(" ");
        assert!(joined.contains("--session-id wa-translator-bot"));
        assert!(joined.contains("--port 8002"));
        assert!(joined.contains("--webhook http://127.0.0.1:8811/webhook"));
        assert!(joined.contains("--auth-timeout 60"));
        assert!(joined.contains("--qr-timeout 30"));
        assert!(joined.contains("--key secret"));
        assert!(joined.contains("--multi-device"));
        assert!(joined.contains("--headless"));
        assert!(joined.contains("--skip-update-check"));
        assert!(joined.contains("--chromium-args --no-sandbox"));
        assert!(!joined.contains("--use-chrome"));
        assert!(!joined.contains("--throw-error-on-tos-block"));
    }

    #[test]
    fn launch_args_omit_the_key_when_unset() {
        let args = launch_args(&options(), 8002, None, "http://127.0.0.1:8811/webhook");
        assert!(!args.contains(&"--key".to_string()));
    }
}
