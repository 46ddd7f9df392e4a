use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::events::{AppEvent, EventData, EventSender};

fn to_sse(event: &AppEvent) -> SseEvent {
    SseEvent::default()
        .json_data(event)
        .unwrap_or_else(|_| SseEvent::default().data("Error serializing event"))
}

/// Forwards session events to one SSE client until it disconnects.
pub fn event_stream(sender: &EventSender) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);
    let mut event_receiver = sender.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = event_receiver.recv() => {
                    match event {
                        Ok(app_event) => {
                            if tx.send(Ok(to_sse(&app_event))).await.is_err() {
                                break; // Client disconnected
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "SSE client lagging, asking it to resync");
                            let resync = AppEvent::new("resync", EventData::default());
                            if tx.send(Ok(to_sse(&resync))).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    let heartbeat = AppEvent::notice("heartbeat", "SSE connection alive");
                    if tx.send(Ok(to_sse(&heartbeat))).await.is_err() {
                        break; // Client disconnected
                    }
                }
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive-message"),
    )
}
