//! Staged agent stream: a cancellable subscription plus the state machine
//! that turns its items into transcript entries and a single outcome.

use crate::protocol::StagePayload;
use crate::transcript::Entry;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Payload(StagePayload),
    /// The connection failed or ended; the reason is for logs only.
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("{0}")]
    Agent(String),
    #[error("Stream interrupted")]
    Interrupted,
}

/// Receiving end of one agent stream. Dropping it closes the connection.
pub struct Subscription {
    events: ReceiverStream<StreamItem>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<StreamItem>, pump: JoinHandle<()>) -> Self {
        Self {
            events: ReceiverStream::new(events),
            pump: Some(pump),
        }
    }

    #[cfg(test)]
    pub fn detached(events: mpsc::Receiver<StreamItem>) -> Self {
        Self {
            events: ReceiverStream::new(events),
            pump: None,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.events.close();
    }

    /// Follows the stream to its terminal item, then closes it.
    pub async fn run<F, Fut>(mut self, on_entry: F) -> Result<(), StreamError>
    where
        F: FnMut(Entry) -> Fut,
        Fut: Future<Output = ()>,
    {
        let outcome = follow(&mut self, on_entry).await;
        self.cancel();
        outcome
    }
}

impl Stream for Subscription {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

enum Step {
    Continue(Entry),
    Complete(Entry),
    Fail(String),
}

fn step(payload: StagePayload) -> Step {
    if payload.is_error() {
        return Step::Fail(payload.content);
    }
    let complete = payload.is_complete();
    if let Some(headline) = payload.headline.as_deref().filter(|_| complete) {
        tracing::info!(%headline, "agent summary headline");
    }
    let entry = Entry::from_payload(payload);
    if complete {
        Step::Complete(entry)
    } else {
        Step::Continue(entry)
    }
}

/// Drives staged items into `on_entry` until the first terminal item.
///
/// Returns as soon as a `complete` or `error` payload or a disconnect is
/// seen; nothing after it is read. A stream that simply ends counts as an
/// interruption.
pub async fn follow<S, F, Fut>(mut events: S, mut on_entry: F) -> Result<(), StreamError>
where
    S: Stream<Item = StreamItem> + Unpin,
    F: FnMut(Entry) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(item) = events.next().await {
        match item {
            StreamItem::Payload(payload) => match step(payload) {
                Step::Continue(entry) => on_entry(entry).await,
                Step::Complete(entry) => {
                    on_entry(entry).await;
                    tracing::debug!("agent stream completed");
                    return Ok(());
                }
                Step::Fail(message) => {
                    tracing::warn!(%message, "agent reported an error");
                    return Err(StreamError::Agent(message));
                }
            },
            StreamItem::Disconnected(reason) => {
                tracing::warn!(%reason, "agent stream disconnected");
                return Err(StreamError::Interrupted);
            }
        }
    }

    tracing::warn!("agent stream ended without a terminal stage");
    Err(StreamError::Interrupted)
}
