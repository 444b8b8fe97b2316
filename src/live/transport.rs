//! Push channel transport.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest_eventsource::{retry::Never, Event, EventSource};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to open event stream: {0}")]
    Open(String),

    #[error("event stream error: {0}")]
    Stream(String),
}

/// Item delivered by an open push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Connection established.
    Open,
    /// One raw message payload.
    Message(String),
}

/// An open push channel. Dropping it closes the underlying connection.
pub type PushChannel = BoxStream<'static, Result<PushMessage, TransportError>>;

/// Opens push channels. The transport carries no custom headers.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, url: &str) -> Result<PushChannel, TransportError>;
}

/// Server-sent events over `reqwest-eventsource`.
///
/// Reconnection is disabled: the first error ends the channel so the caller
/// can fall back to polling.
#[derive(Debug, Clone, Default)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn open(&self, url: &str) -> Result<PushChannel, TransportError> {
        let mut source = EventSource::new(self.client.get(url))
            .map_err(|e| TransportError::Open(e.to_string()))?;
        source.set_retry_policy(Box::new(Never));
        Ok(event_channel(source, url.to_string()))
    }
}

/// Map raw event-source items onto a push channel. The first error is
/// yielded and then ends the channel, dropping (and so closing) the source.
fn event_channel<S>(mut source: S, url: String) -> PushChannel
where
    S: Stream<Item = Result<Event, reqwest_eventsource::Error>> + Send + Unpin + 'static,
{
    let stream = async_stream::stream! {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => yield Ok(PushMessage::Open),
                Ok(Event::Message(message)) => yield Ok(PushMessage::Message(message.data)),
                Err(err) => {
                    yield Err(TransportError::Stream(err.to_string()));
                    break;
                }
            }
        }
        drop(source);
        debug!(url = %url, "Event stream closed");
    };
    stream.boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn message(data: &str) -> Event {
        let mut event = Event::Message(Default::default());
        if let Event::Message(inner) = &mut event {
            inner.data = data.to_string();
        }
        event
    }

    /// Sets a flag when the source it is attached to is dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn events_map_to_push_messages() {
        let events: Vec<Result<Event, reqwest_eventsource::Error>> =
            vec![Ok(Event::Open), Ok(message("{\"status\":\"queued\"}"))];
        let source = stream::iter(events);
        let items: Vec<_> = event_channel(source, "http://test/events".to_string())
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(PushMessage::Open)));
        assert!(matches!(
            &items[1],
            Ok(PushMessage::Message(data)) if data == "{\"status\":\"queued\"}"
        ));
    }

    #[tokio::test]
    async fn first_error_ends_channel_and_drops_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let events: Vec<Result<Event, reqwest_eventsource::Error>> = vec![
            Ok(message("a")),
            Err(reqwest_eventsource::Error::StreamEnded),
            Ok(message("b")),
        ];
        let source = stream::iter(events).map(move |item| {
            let _ = &flag;
            item
        });
        let mut channel = event_channel(source, "http://test/events".to_string());

        assert!(matches!(channel.next().await, Some(Ok(PushMessage::Message(data))) if data == "a"));
        assert!(matches!(
            channel.next().await,
            Some(Err(TransportError::Stream(message))) if message == "Stream ended"
        ));
        assert!(channel.next().await.is_none());
        assert!(dropped.load(Ordering::SeqCst));
    }
}
