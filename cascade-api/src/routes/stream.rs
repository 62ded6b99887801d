//! NDJSON streaming of progress events

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use cascade_core::ProgressEvent;
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Idle gap after which a keepalive line is sent, so proxies and browsers
/// don't cut the connection while a worker blocks on an upstream call.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Turn an engine event stream into a streaming `application/x-ndjson`
/// response, one JSON event per line.
///
/// When the client disconnects, the line channel closes, the forwarder task
/// drops the event stream, and the producing worker observes cancellation at
/// its next emit.
pub fn ndjson_response(events: impl Stream<Item = ProgressEvent> + Send + 'static) -> Response {
    let (tx, rx) = mpsc::channel::<String>(16);

    tokio::spawn(async move {
        tokio::pin!(events);

        loop {
            match tokio::time::timeout(KEEPALIVE_INTERVAL, events.next()).await {
                Ok(Some(event)) => {
                    let line = match serde_json::to_string(&event) {
                        Ok(json) => json + "\n",
                        Err(e) => {
                            tracing::error!("Failed to serialize progress event: {}", e);
                            continue;
                        }
                    };
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    if tx.send("{\"type\":\"keepalive\"}\n".to_string()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-store"),
            (header::HeaderName::from_static("x-content-type-options"), "nosniff"),
        ],
        body,
    )
        .into_response()
}
