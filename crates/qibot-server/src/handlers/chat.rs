//! `POST /chatbot`: the web chat channel.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use qibot_core::TurnError;
use qibot_core::session::identity::{self, IdentityHints, ResolvedIdentity, SESSION_HEADER};
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn chatbot(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let mut hints = hints_from_headers(&headers, &state.cookie.name);

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("rejected chat payload: {}", rejection.body_text());
            let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            let identity = identity::resolve(&hints);
            let body = ChatResponse {
                response: "Requisição inválida".to_string(),
                session_id: identity.key.clone(),
                error: Some("invalid_request".to_string()),
            };
            return respond(&state, &identity, status, body);
        }
    };

    hints.explicit = request.user_id;
    let client_key = peer.ip().to_string();
    let turn = state
        .chat
        .handle_web(&hints, &request.message, Some(&client_key))
        .await;

    let (status, body) = match turn.outcome {
        Ok(reply) => (
            StatusCode::OK,
            ChatResponse {
                response: reply.text,
                session_id: turn.identity.key.clone(),
                error: None,
            },
        ),
        Err(err) => (
            status_for(&err),
            ChatResponse {
                response: err.to_string(),
                session_id: turn.identity.key.clone(),
                error: Some(error_code(&err).to_string()),
            },
        ),
    };
    respond(&state, &turn.identity, status, body)
}

fn hints_from_headers(headers: &HeaderMap, cookie_name: &str) -> IdentityHints {
    let header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| identity::cookie_value(raw, cookie_name));
    IdentityHints {
        explicit: None,
        header,
        cookie,
    }
}

fn respond(
    state: &AppState,
    identity: &ResolvedIdentity,
    status: StatusCode,
    body: ChatResponse,
) -> Response {
    let mut response = (status, Json(body)).into_response();
    if identity.is_generated() {
        match HeaderValue::from_str(&state.cookie.header_value(&identity.key)) {
            Ok(cookie) => {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Err(e) => tracing::warn!("session cookie not set: {e}"),
        }
    }
    response
}

fn status_for(err: &TurnError) -> StatusCode {
    match err {
        TurnError::Input(_) => StatusCode::BAD_REQUEST,
        TurnError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        TurnError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_code(err: &TurnError) -> &'static str {
    match err {
        TurnError::Input(_) => "invalid_input",
        TurnError::RateLimited => "rate_limited",
        TurnError::Unavailable => "unavailable",
    }
}

#[cfg(test)]
mod tests {
    use qibot_core::InputError;

    use super::*;

    #[test]
    fn hints_read_header_and_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session-id", HeaderValue::from_static("from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; qid=from-cookie"));

        let hints = hints_from_headers(&headers, "qid");
        assert_eq!(hints.header.as_deref(), Some("from-header"));
        assert_eq!(hints.cookie.as_deref(), Some("from-cookie"));
        assert!(hints.explicit.is_none());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_for(&TurnError::Input(InputError::EmptyMessage)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&TurnError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error_code(&TurnError::RateLimited), "rate_limited");
    }
}
