//! WebSocket endpoint for the realtime channel
//!
//! One session per connection. The bearer token is presented at handshake
//! time (header or `token` query parameter). Inbound frames carry room and
//! typing actions; outbound frames are serialized [`RealtimeEvent`]s.
//! There is no replay after a disconnect; clients re-fetch over REST.

use actix_web::{rt, web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use bloxtrade_core::ChatId;

use crate::api::AppState;
use crate::auth::authenticate;
use crate::error::ApiError;

/// Client-to-server frame
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving chat-room events while viewing a chat
    JoinChat { chat_id: ChatId },
    /// Stop receiving chat-room events
    LeaveChat { chat_id: ChatId },
    /// Announce typing to the chat room
    StartTyping { chat_id: ChatId },
    /// Withdraw the typing announcement
    StopTyping { chat_id: ChatId },
}

/// WebSocket upgrade handler
pub async fn realtime(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = authenticate(&req, &state.auth)?;
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let mut conn = state.service.hub().connect(user_id.clone());
    let conn_id = conn.id;
    info!(user = %user_id, conn = %conn_id, "websocket session opened");

    let state = state.clone();
    rt::spawn(async move {
        loop {
            tokio::select! {
                frame = msg_stream.next() => {
                    match frame {
                        Some(Ok(actix_ws::Message::Text(text))) => {
                            handle_frame(&state, &user_id, conn_id, &text);
                        }
                        Some(Ok(actix_ws::Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Close(reason))) => {
                            debug!(conn = %conn_id, ?reason, "client closed websocket");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(conn = %conn_id, error = %e, "websocket protocol error");
                            break;
                        }
                        None => break,
                    }
                }
                event = conn.recv() => {
                    let Some(event) = event else { break };
                    let Ok(json) = serde_json::to_string(&event) else { continue };
                    if session.text(json).await.is_err() {
                        break;
                    }
                }
            }
        }
        state.service.hub().disconnect(conn_id);
        let _ = session.close(None).await;
        info!(conn = %conn_id, "websocket session closed");
    });

    Ok(response)
}

fn handle_frame(
    state: &web::Data<AppState>,
    user_id: &bloxtrade_core::UserId,
    conn_id: bloxtrade_realtime::ConnId,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn = %conn_id, error = %e, "ignoring malformed client frame");
            return;
        }
    };
    let result: Result<(), ApiError> = match frame {
        ClientFrame::JoinChat { chat_id } => {
            // Room membership requires chat membership
            state
                .service
                .get_chat(user_id, &chat_id)
                .map(|_| state.service.hub().join_chat(conn_id, &chat_id))
                .map_err(Into::into)
        }
        ClientFrame::LeaveChat { chat_id } => {
            state.service.hub().leave_chat(conn_id, &chat_id);
            Ok(())
        }
        ClientFrame::StartTyping { chat_id } => state
            .service
            .typing(user_id, &chat_id, true)
            .map_err(Into::into),
        ClientFrame::StopTyping { chat_id } => state
            .service
            .typing(user_id, &chat_id, false)
            .map_err(Into::into),
    };
    if let Err(e) = result {
        debug!(conn = %conn_id, error = %e, "client frame rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_parsing() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"join_chat","chat_id":"c1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::JoinChat { .. }));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"start_typing","chat_id":"c1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::StartTyping { .. }));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"action":"dance"}"#).is_err());
    }
}
