//! WebSocket session drivers.
//!
//! One task per connection. The pure `Session` machine decides every
//! transition; this module only moves frames and performs the async
//! work the machine asks for — credential resolution and coordinator
//! dispatch. Dispatch is awaited inline per frame, so acks go out in
//! the order messages arrived and no lock outlives its dispatch when
//! the peer disconnects.

use crate::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use guardian_ingest::{FrameDisposition, ServerMessage, Session, SessionCloseCode};
use tracing::{debug, info, warn};

/// `GET /ws/ingest/{child_hash}` — direct streaming path.
pub(crate) async fn ingest_ws(
    State(state): State<AppState>,
    Path(child_hash): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_direct(socket, state, child_hash))
}

/// `GET /ws/ingest-auth` — handshake streaming path.
pub(crate) async fn ingest_auth_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_handshake(socket, state))
}

/// Credential arrived in the connection target: resolve once, then
/// either acknowledge and stream, or close 4004 without ever sending
/// `connection_established`.
async fn run_direct(mut socket: WebSocket, state: AppState, child_hash: String) {
    let mut session = Session::new();
    match state.resolver.resolve(&child_hash).await {
        Ok(identity) => {
            let established = session.identity_resolved(identity);
            if send(&mut socket, &established).await.is_err() {
                return;
            }
        }
        Err(e) => {
            warn!(credential = %child_hash, "rejecting connection: {e}");
            close(socket, session.identity_rejected()).await;
            return;
        }
    }

    info!(device = %child_hash, "ingest connection established");
    receive_loop(socket, state, session).await;
}

/// No credential in the connection target: prompt for the auth frame,
/// bound the wait, allow exactly one attempt.
async fn run_handshake(mut socket: WebSocket, state: AppState) {
    let mut session = Session::new();
    if send(&mut socket, &session.begin_auth()).await.is_err() {
        return;
    }

    let first = tokio::time::timeout(state.auth_timeout, next_text(&mut socket)).await;
    let Ok(Some(text)) = first else {
        // Timed out, or the peer left before authenticating.
        close(socket, session.auth_timed_out()).await;
        return;
    };

    let credential = match session.handle_frame(&text) {
        FrameDisposition::Authenticate(credential) => credential,
        FrameDisposition::Close(code) => {
            close(socket, code).await;
            return;
        }
        _ => {
            close(socket, SessionCloseCode::AuthRequired).await;
            return;
        }
    };

    match state.resolver.resolve(&credential).await {
        Ok(identity) => {
            let established = session.identity_resolved(identity);
            if send(&mut socket, &established).await.is_err() {
                return;
            }
        }
        Err(e) => {
            warn!(credential = %credential, "authentication failed: {e}");
            close(socket, session.identity_rejected()).await;
            return;
        }
    }

    info!(device = %credential, "ingest connection authenticated");
    receive_loop(socket, state, session).await;
}

/// The Active loop: validate each frame, dispatch, ack in order.
async fn receive_loop(mut socket: WebSocket, state: AppState, mut session: Session) {
    while let Some(text) = next_text(&mut socket).await {
        match session.handle_frame(&text) {
            FrameDisposition::Dispatch(message) => {
                let Some(identity) = session.identity().cloned() else {
                    close(socket, SessionCloseCode::AuthRequired).await;
                    return;
                };
                let reply = match state.coordinator.dispatch(&identity, message).await {
                    Ok(ack) => ack.into_message(),
                    Err(e) if e.is_fatal() => {
                        warn!(device = %identity, "fatal dispatch error: {e}");
                        match e.close_code() {
                            Some(code) => close(socket, code).await,
                            None => session.peer_disconnected(),
                        }
                        return;
                    }
                    Err(e) => ServerMessage::error(e.to_string()),
                };
                if send(&mut socket, &reply).await.is_err() {
                    return;
                }
            }
            FrameDisposition::Reply(message) => {
                if send(&mut socket, &message).await.is_err() {
                    return;
                }
            }
            FrameDisposition::Close(code) => {
                close(socket, code).await;
                return;
            }
            FrameDisposition::Authenticate(_) | FrameDisposition::Ignore => {}
        }
    }

    session.peer_disconnected();
    debug!(frames = session.frames_seen(), "peer disconnected");
}

/// The next text-like frame, or `None` when the connection is gone.
///
/// Binary frames are passed through as lossy text so transport-level
/// corruption soft-fails in the validator instead of killing the
/// session; ping/pong are handled by axum.
async fn next_text(socket: &mut WebSocket) -> Option<String> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => return Some(text.to_string()),
            Some(Ok(Message::Binary(bytes))) => {
                return Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            Some(Ok(Message::Close(_))) | None => return None,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!("transport error: {e}");
                return None;
            }
        }
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(e) => {
            warn!("failed to encode server frame: {e}");
            Ok(())
        }
    }
}

async fn close(mut socket: WebSocket, code: SessionCloseCode) {
    let frame = CloseFrame {
        code: code.as_u16(),
        reason: code.reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
