//! Event fan-out.
//!
//! Each event kind has its own [`Dispatcher`]. Handlers are either plain
//! callbacks or bounded channel sinks. Emitting never blocks: events are
//! queued and a per-kind worker task, spawned on first use, runs the
//! handlers in registration order. One event is fully delivered before the
//! next of the same kind is picked up.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shardchat_proto::Message;
use tokio::sync::mpsc;
use tracing::debug;

use super::channel::Channel;
use super::chat::{ChatMessage, ClearChat, ClearMessage, Notice, UserNotice};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

enum Handler<T> {
    Callback(Callback<T>),
    Sink(mpsc::Sender<T>),
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Callback(f) => Self::Callback(Arc::clone(f)),
            Self::Sink(tx) => Self::Sink(tx.clone()),
        }
    }
}

type Handlers<T> = Arc<RwLock<Vec<Handler<T>>>>;

struct DispatcherInner<T> {
    handlers: Handlers<T>,
    queue: Mutex<Option<mpsc::UnboundedSender<T>>>,
}

/// Ordered fan-out for one event kind.
pub struct Dispatcher<T> {
    inner: Arc<DispatcherInner<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Dispatcher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                handlers: Arc::new(RwLock::new(Vec::new())),
                queue: Mutex::new(None),
            }),
        }
    }

    /// Register a callback. It runs on the dispatcher's worker task, so it
    /// should hand long work off rather than block.
    pub fn on<F>(&self, callback: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .push(Handler::Callback(Arc::new(callback)));
    }

    /// Register a channel sink holding up to `buffer` undelivered events.
    ///
    /// A full sink holds up later handlers and events of this kind; it never
    /// holds up the emitter. Dropping the receiver unregisters the sink.
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.inner.handlers.write().push(Handler::Sink(tx));
        rx
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Queue an event for delivery. No-op when nothing is registered.
    pub fn emit(&self, event: T) {
        if self.inner.handlers.read().is_empty() {
            return;
        }

        let mut queue = self.inner.queue.lock();
        if let Some(tx) = queue.as_ref() {
            match tx.send(event) {
                Ok(()) => return,
                // Worker gone (runtime shut down); start a new one.
                Err(mpsc::error::SendError(event)) => {
                    *queue = self.spawn_worker();
                    if let Some(tx) = queue.as_ref() {
                        let _ = tx.send(event);
                    }
                    return;
                }
            }
        }

        *queue = self.spawn_worker();
        if let Some(tx) = queue.as_ref() {
            let _ = tx.send(event);
        }
    }

    fn spawn_worker(&self) -> Option<mpsc::UnboundedSender<T>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime, dropping event");
            return None;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let handlers = Arc::clone(&self.inner.handlers);
        runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                let snapshot: Vec<Handler<T>> = handlers.read().clone();
                let mut closed = false;
                for handler in snapshot {
                    match handler {
                        Handler::Callback(f) => f(event.clone()),
                        Handler::Sink(tx) => closed |= tx.send(event.clone()).await.is_err(),
                    }
                }
                if closed {
                    handlers.write().retain(|h| match h {
                        Handler::Sink(tx) => !tx.is_closed(),
                        Handler::Callback(_) => true,
                    });
                }
            }
        });
        Some(tx)
    }
}

/// Why a connection went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `close` was called.
    Closed,
    /// The server closed the socket.
    Eof,
    /// Read failure.
    Error(String),
}

/// One dispatcher per event kind for a connection.
#[derive(Clone, Default)]
pub struct Events {
    /// Every parsed line, including ones no other event covers.
    pub raw: Dispatcher<Message>,
    pub chat: Dispatcher<ChatMessage>,
    pub notice: Dispatcher<Notice>,
    pub user_notice: Dispatcher<UserNotice>,
    pub clear_chat: Dispatcher<ClearChat>,
    pub clear_message: Dispatcher<ClearMessage>,
    /// A join acknowledged by `ROOMSTATE`.
    pub joined: Dispatcher<Channel>,
    /// The server asked us to reconnect.
    pub reconnect: Dispatcher<()>,
    /// Fired once per connection that reached the ready state.
    pub disconnect: Dispatcher<DisconnectReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let dispatcher = Dispatcher::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            dispatcher.on(move |n| seen.lock().push((tag, n)));
        }
        let mut sink = dispatcher.subscribe(8);

        for n in 1..=3 {
            dispatcher.emit(n);
        }

        for expected in 1..=3 {
            let got = tokio::time::timeout(Duration::from_secs(1), sink.recv())
                .await
                .unwrap();
            assert_eq!(got, Some(expected));
        }

        assert_eq!(
            *seen.lock(),
            vec![
                ("first", 1),
                ("second", 1),
                ("first", 2),
                ("second", 2),
                ("first", 3),
                ("second", 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_emit_without_handlers_is_noop() {
        let dispatcher = Dispatcher::<u32>::new();
        dispatcher.emit(1);
        assert!(dispatcher.inner.queue.lock().is_none());
    }

    #[tokio::test]
    async fn test_dropped_sink_is_pruned() {
        let dispatcher = Dispatcher::<u32>::new();
        let rx = dispatcher.subscribe(1);
        let mut keep = dispatcher.subscribe(4);
        drop(rx);

        dispatcher.emit(7);
        assert_eq!(keep.recv().await, Some(7));
        dispatcher.emit(8);
        assert_eq!(keep.recv().await, Some(8));
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_handlers() {
        let dispatcher = Dispatcher::<&'static str>::new();
        let clone = dispatcher.clone();
        let mut rx = dispatcher.subscribe(1);
        clone.emit("hello");
        assert_eq!(rx.recv().await, Some("hello"));
    }
}
