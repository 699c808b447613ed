use crate::model::ServiceType;
use crate::result::QueryResult;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

pub(crate) type LatestSlot = Arc<Mutex<Option<QueryResult>>>;

/// Write side of a dispatch: providers hand every incremental result to it.
///
/// Clones share the same channel and bookkeeping, so a callback-style provider
/// can move a clone into its completion handler. Once the dispatch is cancelled
/// or the caller drops the stream, `send` discards results and returns false.
#[derive(Clone)]
pub struct ResultSink {
    sender: UnboundedSender<QueryResult>,
    token: CancellationToken,
    service_type: ServiceType,
    latest: LatestSlot,
    yielded: Arc<AtomicUsize>,
    error_yielded: Arc<AtomicBool>,
}

impl ResultSink {
    pub(crate) fn new(
        sender: UnboundedSender<QueryResult>,
        token: CancellationToken,
        service_type: ServiceType,
        latest: LatestSlot,
    ) -> Self {
        Self {
            sender,
            token,
            service_type,
            latest,
            yielded: Arc::new(AtomicUsize::new(0)),
            error_yielded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver one result to the caller.
    pub fn send(&self, mut result: QueryResult) -> bool {
        if self.token.is_cancelled() {
            return false;
        }

        result.service_type = self.service_type;
        if result.error.is_some() {
            result.is_loading = false;
        }
        let carries_error = result.error.is_some();

        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(result.clone());
        }

        if self.sender.unbounded_send(result).is_err() {
            return false;
        }

        self.yielded.fetch_add(1, Ordering::SeqCst);
        if carries_error {
            self.error_yielded.store(true, Ordering::SeqCst);
        }
        true
    }

    pub fn has_yielded(&self) -> bool {
        self.yielded.load(Ordering::SeqCst) > 0
    }

    pub fn has_yielded_error(&self) -> bool {
        self.error_yielded.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.sender.is_closed()
    }

    /// Resolves when the dispatch is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Adapt the sink into a plain completion callback.
    pub fn into_callback(self) -> impl Fn(QueryResult) + Send + Sync + 'static {
        move |result| {
            self.send(result);
        }
    }
}

/// Read side of a dispatch, in the order the provider produced results.
///
/// Ends when the provider finishes or as soon as the dispatch is cancelled,
/// waking a consumer that is already waiting.
pub struct QueryStream {
    receiver: UnboundedReceiver<QueryResult>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    terminated: bool,
}

impl QueryStream {
    pub(crate) fn new(
        receiver: UnboundedReceiver<QueryResult>,
        token: Option<CancellationToken>,
    ) -> Self {
        Self {
            receiver,
            cancelled: token.map(|token| Box::pin(token.cancelled_owned())),
            terminated: false,
        }
    }
}

impl Stream for QueryStream {
    type Item = QueryResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        // Registers the waker on the token, so a stop ends a pending `next()`
        let stopped = match self.cancelled.as_mut() {
            Some(cancelled) => cancelled.as_mut().poll(cx).is_ready(),
            None => false,
        };
        if stopped {
            self.terminated = true;
            self.cancelled = None;
            self.receiver.close();
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.receiver).poll_next(cx) {
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use futures::channel::mpsc;
    use futures::StreamExt;
    use std::time::{Duration, Instant};

    fn sink_and_stream() -> (ResultSink, QueryStream, CancellationToken) {
        let (sender, receiver) = mpsc::unbounded();
        let token = CancellationToken::new();
        let sink = ResultSink::new(
            sender,
            token.clone(),
            ServiceType::Google,
            Arc::new(Mutex::new(None)),
        );
        (sink, QueryStream::new(receiver, Some(token.clone())), token)
    }

    #[tokio::test]
    async fn test_sink_tracks_in_band_errors() {
        let (sink, mut stream, _token) = sink_and_stream();
        assert!(sink.send(QueryResult::new(ServiceType::Custom)));
        assert!(sink.has_yielded());
        assert!(!sink.has_yielded_error());

        let failed = QueryResult::new(ServiceType::Custom).with_error(QueryError::no_result());
        assert!(sink.send(failed));
        assert!(sink.has_yielded_error());
        drop(sink);

        let first = stream.next().await.unwrap();
        assert_eq!(first.service_type, ServiceType::Google);
        assert!(stream.next().await.unwrap().error.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_sink_discards_results() {
        let (sink, mut stream, token) = sink_and_stream();
        token.cancel();
        assert!(!sink.send(QueryResult::new(ServiceType::Google)));
        assert!(sink.is_cancelled());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_callback_bridge() {
        let (sink, mut stream, _token) = sink_and_stream();
        let callback = sink.into_callback();
        std::thread::spawn(move || {
            let result = QueryResult::new(ServiceType::Google);
            result.push_segment("done");
            callback(result);
        })
        .join()
        .unwrap();

        let delivered = stream.next().await.unwrap();
        assert_eq!(delivered.segments(), Some(vec!["done".to_string()]));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiting_consumer() {
        let (sink, mut stream, token) = sink_and_stream();
        // A callback parked by a provider keeps the channel open
        let callback = sink.into_callback();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = Instant::now();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("cancel should end the stream");
        assert!(next.is_none());
        // Woken by the cancel itself, not by the timeout re-polling
        assert!(started.elapsed() < Duration::from_secs(1));

        // Late deliveries are discarded and the stream stays finished
        callback(QueryResult::new(ServiceType::Google));
        assert!(stream.next().await.is_none());
    }
}
