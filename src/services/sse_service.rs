use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::view_service,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the view stream and build the handshake carrying the current
/// view. Subscribing first means no render pass falls between the two.
pub async fn subscribe_view(
    state: &SharedState,
) -> (ServerEvent, broadcast::Receiver<ServerEvent>) {
    let receiver = state.view_sse().subscribe();
    let handshake = Handshake {
        message: "view stream connected".into(),
        view: view_service::current_view(state).await,
    };
    let event = ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake).unwrap_or_else(
        |_| ServerEvent {
            event: Some(EVENT_HANDSHAKE.to_string()),
            data: String::from("{}"),
        },
    );
    (event, receiver)
}

/// Convert a broadcast receiver into an SSE response, sending `first` before
/// forwarding events, and cleaning up once the client disconnects.
pub fn to_sse_stream(
    first: ServerEvent,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(first))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Patches were lost; the client must repaint from a
                            // fresh handshake.
                            debug!(skipped, "view SSE subscriber lagged; closing stream");
                            break;
                        }
                    }
                }
            }
        }

        info!("View SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
