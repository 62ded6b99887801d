//! Progress emission for streaming runs

use cascade_core::ProgressEvent;
use serde_json::Value;
use tokio::sync::mpsc;

/// The consumer dropped the event stream; the run should stop quietly.
///
/// Cancellation is modeled purely as channel closure: a caller that stops
/// consuming the stream causes the next emit to fail, which unwinds the
/// worker via `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Sends progress events into a run's channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    pub async fn step(&self, message: impl Into<String>) -> Result<(), Cancelled> {
        self.send(ProgressEvent::step(message)).await
    }

    pub async fn result(&self, message: impl Into<String>) -> Result<(), Cancelled> {
        self.send(ProgressEvent::result(message)).await
    }

    pub async fn result_with(
        &self,
        message: impl Into<String>,
        data: Value,
    ) -> Result<(), Cancelled> {
        self.send(ProgressEvent::result_with(message, data)).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), Cancelled> {
        self.send(ProgressEvent::error(message)).await
    }

    pub async fn done(&self, data: Value) -> Result<(), Cancelled> {
        self.send(ProgressEvent::done(data)).await
    }

    async fn send(&self, event: ProgressEvent) -> Result<(), Cancelled> {
        self.tx.send(event).await.map_err(|_| Cancelled)
    }
}
