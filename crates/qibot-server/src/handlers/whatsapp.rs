//! `GET|POST /webhook/whatsapp`: Meta verification handshake and inbound messages.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use qibot_core::InboundEvent;
use qibot_core::validation::sanitize_for_log;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::server::AppState;
use crate::whatsapp::WebhookPayload;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

pub async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    let expected = state.verify_token.as_deref();
    let accepted = expected.is_some()
        && params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == expected;

    if accepted {
        info!("whatsapp webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(mode = ?params.mode, "whatsapp webhook verification refused");
        (StatusCode::FORBIDDEN, "Forbidden: token mismatch or mode error").into_response()
    }
}

/// Runs every text message through the conversation service, keyed by the
/// sender, and sends the reply back. Answers 200 once the payload parses.
pub async fn receive(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("invalid whatsapp payload: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    for (from, text) in payload.text_messages() {
        let event = InboundEvent::new(from.clone(), text).with_client_key(from.clone());
        match state.chat.handle(event).await {
            Ok(reply) => deliver(&state, &from, &reply.text).await,
            Err(err) => warn!(sender = %sanitize_for_log(&from), "whatsapp message refused: {err}"),
        }
    }
    StatusCode::OK
}

async fn deliver(state: &AppState, to: &str, text: &str) {
    let Some(client) = &state.whatsapp else {
        debug!(to = %sanitize_for_log(to), "whatsapp reply dropped (outbound not configured)");
        return;
    };
    if let Err(e) = client.send_text(to, text).await {
        warn!(to = %sanitize_for_log(to), "failed to send whatsapp reply: {e:#}");
    }
}
