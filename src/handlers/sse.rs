use crate::context::{self, RequestContext, TransportKind};
use crate::error::{AppError, Result};
use crate::state::{AppState, SessionGuard};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

/// Outbound half of an SSE session. Owns the guard, so the session is
/// unregistered as soon as axum drops the stream on disconnect.
struct SessionStream {
    inner: ReceiverStream<String>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .poll_next_unpin(cx)
            .map(|next| next.map(|data| Ok(Event::default().event("message").data(data))))
    }
}

/// GET /sse - Open a long-lived event stream.
///
/// The first event names the endpoint the client must POST its messages to.
/// Credentials sent here are remembered for the session and used by any
/// message that arrives without its own. The stream ends when the server
/// begins shutting down.
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let ctx = RequestContext::from_headers(&headers, &state.headers, TransportKind::Sse);
    let has_credential = ctx.credential().is_some();
    let (session_id, receiver, guard) = state.sessions.open(ctx, state.config.sse_channel_capacity);

    tracing::info!(session_id = %session_id, has_credential, "SSE session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?sessionId={}", guard.id()));
    let messages = SessionStream {
        inner: ReceiverStream::new(receiver),
        _guard: guard,
    }
    .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream::once(async move { Ok(endpoint) }).chain(messages)).keep_alive(KeepAlive::default())
}

/// POST /messages?sessionId=... - Deliver one message to an open SSE session.
///
/// Accepted messages are processed on their own task; the response travels
/// back over the event stream, not in this HTTP reply.
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let session_id = query.session_id.ok_or(AppError::TransportNotFound)?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or(AppError::TransportNotFound)?;

    let value: Value =
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if session.sender.is_closed() {
        return Err(AppError::SessionClosed(session_id));
    }

    let ctx = RequestContext::from_headers(&headers, &state.headers, TransportKind::Sse)
        .or_inherit(&session.context);
    let dispatcher = Arc::clone(&state.dispatcher);

    tokio::spawn(async move {
        let Some(response) = context::establish(ctx, dispatcher.handle_value(value)).await else {
            return;
        };

        match serde_json::to_string(&response) {
            Ok(data) => {
                if session.sender.send(data).await.is_err() {
                    tracing::debug!(session_id = %session_id, "Session gone, response discarded");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize response"),
        }
    });

    Ok(StatusCode::ACCEPTED)
}
