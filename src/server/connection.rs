//! WebSocket connection handling

use crate::relay::{ConnectionHandle, Outbound, Relay, Session, SessionEnd, TransportError};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{future, SinkExt, Stream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the writer may keep flushing after its session ended
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run one upgraded socket through a relay session
pub async fn serve_socket(socket: WebSocket, peer: SocketAddr, relay: Arc<Relay>, queue: usize) {
    let (sink, stream) = socket.split();
    let (handle, outbound) = ConnectionHandle::channel(queue);
    let connection_id = handle.id();

    tracing::debug!("Connection {} accepted from {}", connection_id, peer);

    let mut writer = tokio::spawn(client_writer_task(sink, outbound));

    let end = Session::new(relay, handle)
        .with_peer(peer)
        .run(inbound_frames(stream))
        .await;

    if let SessionEnd::Disconnected = end {
        tracing::debug!("Connection {} closed by peer", connection_id);
    }

    // The writer stops once every handle clone is gone or a close frame went out
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        tracing::debug!("Writer for {} did not drain in time", connection_id);
        writer.abort();
    }

    tracing::debug!("Connection handler finished: {}", connection_id);
}

/// Text frames from the client, ending at the first close frame
pub fn inbound_frames(
    stream: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<String, TransportError>> + Send {
    stream
        .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| TransportError(format!("Binary frame is not UTF-8: {}", e))),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError(e.to_string()))),
            })
        })
}

/// Task to write queued frames to the client
pub async fn client_writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut receiver: mpsc::Receiver<Outbound>,
) {
    while let Some(frame) = receiver.recv().await {
        match frame {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.as_ref().into())).await {
                    tracing::debug!("Failed to write message to client: {}", e);
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                let close = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(close))).await {
                    tracing::debug!("Failed to send close frame: {}", e);
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
    tracing::debug!("Client writer task finished");
}
