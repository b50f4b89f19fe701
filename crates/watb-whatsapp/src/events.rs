//! Webhook intake: maps gateway event envelopes onto core session events.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use watb_core::domain::{ChatId, InboundMessage, MessageId, QuotedMessage};
use watb_core::session::SessionEvent;

/// Envelope the gateway posts for every forwarded event.
#[derive(Clone, Debug, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `onMessage` payload fields the bot consumes.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    from: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    quoted_msg: Option<WireQuoted>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct WireQuoted {
    #[serde(default)]
    body: String,
}

/// Maps one gateway envelope to a session event. Events the bot does not
/// care about map to `None`.
pub fn map_event(envelope: EventEnvelope) -> Option<SessionEvent> {
    // Event ids may be namespaced by session ("host.onMessage").
    let name = envelope
        .event
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string();

    match name.as_str() {
        "onMessage" => {
            let wire: WireMessage = match serde_json::from_value(envelope.data) {
                Ok(wire) => wire,
                Err(err) => {
                    tracing::warn!("dropping undecodable message event: {err}");
                    return None;
                }
            };
            Some(SessionEvent::Message(InboundMessage {
                id: MessageId(wire.id),
                chat: ChatId(wire.from),
                body: wire.body,
                from_me: wire.from_me,
                quoted: wire.quoted_msg.map(|q| QuotedMessage { body: q.body }),
            }))
        }
        "onStateChanged" => {
            let state = envelope
                .data
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| envelope.data.to_string());
            if state.contains("TOS_BLOCK") {
                Some(SessionEvent::Blocked { reason: state })
            } else {
                Some(SessionEvent::StateChanged(state))
            }
        }
        "TOSBLOCK" => Some(SessionEvent::Blocked {
            reason: "TOSBLOCK event from gateway".to_string(),
        }),
        _ => None,
    }
}

#[derive(Clone)]
struct WebhookState {
    events: mpsc::Sender<SessionEvent>,
}

async fn receive(
    State(state): State<WebhookState>,
    Json(envelope): Json<EventEnvelope>,
) -> StatusCode {
    if let Some(event) = map_event(envelope) {
        if state.events.send(event).await.is_err() {
            return StatusCode::GONE;
        }
    }
    StatusCode::OK
}

/// Serves the webhook listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/", post(receive))
        .route("/webhook", post(receive))
        .with_state(WebhookState { events });

    tracing::info!("webhook listener on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
