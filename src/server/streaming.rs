//! SSE (Server-Sent Events) streaming for chat completions.
//!
//! A spawned task drives the Vertex stream through a [`ChunkTranslator`] and
//! sends chunks into a bounded channel; the response body is built from the
//! channel's receiver and always ends with `data: [DONE]`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::Event;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::openai::ChatCompletionChunk;
use crate::server::openai_api::AppState;
use crate::translate::stream::ChunkTranslator;
use crate::vertex::ResponseStream;

/// Spawn the upstream reader and return the SSE event stream for the client.
pub fn chat_completion_stream(
    state: Arc<AppState>,
    upstream: ResponseStream,
    translator: ChunkTranslator,
    request_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel(state.config.streaming.channel_capacity.max(1));

    tokio::spawn(forward(state, upstream, translator, tx, request_id));

    ReceiverStream::new(rx)
        .map(|chunk| Ok(chunk_event(&chunk)))
        // Append the [DONE] sentinel after all chunks.
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))))
}

async fn forward(
    state: Arc<AppState>,
    mut upstream: ResponseStream,
    mut translator: ChunkTranslator,
    tx: mpsc::Sender<ChatCompletionChunk>,
    request_id: String,
) {
    let mut events = 0usize;

    while let Some(item) = upstream.next().await {
        let chunks = match item {
            Ok(response) => translator.on_response(response),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Upstream stream failed");
                state.metrics.record_upstream_error("chat_completions");
                send_all(&tx, translator.error(&e.to_string())).await;
                return;
            }
        };
        events += 1;

        if !send_all(&tx, chunks).await {
            debug!(request_id = %request_id, "Client disconnected, dropping upstream stream");
            return;
        }
    }

    send_all(&tx, translator.finish()).await;
    debug!(request_id = %request_id, events, "Stream complete");
}

/// Send every chunk; false once the receiver is gone.
async fn send_all(tx: &mpsc::Sender<ChatCompletionChunk>, chunks: Vec<ChatCompletionChunk>) -> bool {
    for chunk in chunks {
        if tx.send(chunk).await.is_err() {
            return false;
        }
    }
    true
}

fn chunk_event(chunk: &ChatCompletionChunk) -> Event {
    let data = serde_json::to_string(chunk).unwrap_or_default();
    Event::default().data(data)
}
