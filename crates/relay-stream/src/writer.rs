use bytes::Bytes;
use relay_protocol::{sse, UiEvent};
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Outbound event encoder. Writes SSE frames into a bounded channel whose
/// receiving end is the HTTP response body.
///
/// `send` waits for channel capacity, so the translator never runs ahead
/// of what the client has accepted.
#[derive(Debug)]
pub struct SseWriter {
    tx: mpsc::Sender<Bytes>,
    events: usize,
}

impl SseWriter {
    /// Create a writer and the body receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, events: 0 }, rx)
    }

    pub async fn send(&mut self, event: &UiEvent) -> Result<(), SessionError> {
        let frame = sse::encode(event)?;
        self.tx
            .send(Bytes::from(frame))
            .await
            .map_err(|_| SessionError::SinkClosed)?;
        self.events += 1;
        Ok(())
    }

    /// Write the terminal sentinel and release the sink. Returns the number
    /// of events written before it.
    pub async fn finish(self) -> Result<usize, SessionError> {
        self.tx
            .send(Bytes::from_static(sse::DONE_FRAME.as_bytes()))
            .await
            .map_err(|_| SessionError::SinkClosed)?;
        Ok(self.events)
    }

    /// Handle that resolves once the client side is gone, usable while the
    /// writer itself is mutably borrowed.
    pub fn close_watcher(&self) -> mpsc::Sender<Bytes> {
        self.tx.clone()
    }

    /// Events written so far, excluding the sentinel.
    pub fn events_written(&self) -> usize {
        self.events
    }
}
