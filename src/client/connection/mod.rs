//! A single chat connection.
//!
//! A [`Connection`] owns one socket at a time. Its read loop is the only
//! task that advances state in response to inbound lines; public methods
//! may be called from any task. State inspection (`state`, `get_channel`,
//! `latency`) goes through a lock separate from the write lock, so a slow
//! socket write never blocks a lookup.
//!
//! ```text
//! Disconnected -> Connecting (authenticating) -> Connected -> Disconnected
//! ```
//!
//! Each successful `connect` starts a new socket generation. Late cleanup
//! from an older generation never touches the current one.

mod handshake;
mod read_loop;
mod waiters;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::SinkExt;
use shardchat_proto::{ChannelExt, Ctcp, LineCodec, Message};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use self::waiters::Waiters;
use super::channel::Channel;
use super::events::{DisconnectReason, Events};
use super::transport::TransportWriteHalf;
use super::user::UserState;
use crate::config::defaults::{ANONYMOUS_TOKEN, anonymous_username};
use crate::config::{ClientConfig, Token};
use crate::error::{ClientError, ClientResult};

/// Socket lifecycle as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Dialing or logging in.
    Connecting,
    /// Logged in and ready.
    Connected,
}

/// Progress of the current login attempt, shared with `connect` callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoginStatus {
    Idle,
    Authenticating,
    Ready,
    Failed(String),
    /// The socket went away before login finished.
    Dropped,
}

pub(crate) struct State {
    conn: ConnectionState,
    generation: u64,
    channels: HashMap<String, Channel>,
    global_user_state: Option<UserState>,
    latency: Duration,
    stop: Option<CancellationToken>,
    read_task: Option<JoinHandle<()>>,
}

pub(crate) struct Writer {
    generation: u64,
    sink: FramedWrite<TransportWriteHalf, LineCodec>,
}

pub(crate) struct Inner {
    id: usize,
    config: ClientConfig,
    login_name: String,
    token: Token,
    anonymous: bool,
    events: Events,
    state: parking_lot::Mutex<State>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    /// Held for the whole of one attempt; records how the last one failed.
    connect_lock: tokio::sync::Mutex<Option<handshake::AttemptFailure>>,
    attempts: AtomicU64,
    login: watch::Sender<LoginStatus>,
    joins: Arc<Waiters<ClientResult<Channel>>>,
    pings: Arc<Waiters<ClientResult<Instant>>>,
    ping_seq: AtomicU64,
}

/// Handle to one connection. Clones share the same socket and state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("username", &self.inner.login_name)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_id(0, config)
    }

    /// Create a connection labelled with a shard id.
    pub fn with_id(id: usize, config: ClientConfig) -> Self {
        let (login_name, token, anonymous) =
            match (&config.identity.username, &config.identity.token) {
                (Some(username), Some(token)) => (username.to_lowercase(), token.clone(), false),
                _ => (anonymous_username(), Token::new(ANONYMOUS_TOKEN), true),
            };
        let (login, _) = watch::channel(LoginStatus::Idle);

        Self {
            inner: Arc::new(Inner {
                id,
                config,
                login_name,
                token,
                anonymous,
                events: Events::default(),
                state: parking_lot::Mutex::new(State {
                    conn: ConnectionState::Disconnected,
                    generation: 0,
                    channels: HashMap::new(),
                    global_user_state: None,
                    latency: Duration::ZERO,
                    stop: None,
                    read_task: None,
                }),
                writer: tokio::sync::Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(None),
                attempts: AtomicU64::new(0),
                login,
                joins: Waiters::new(),
                pings: Waiters::new(),
                ping_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Login name actually used on the wire.
    pub fn username(&self) -> &str {
        &self.inner.login_name
    }

    /// Whether this connection logged in without credentials (read-only).
    pub fn is_anonymous(&self) -> bool {
        self.inner.anonymous
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Event registration for this connection.
    pub fn events(&self) -> &Events {
        &self.inner.events
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().conn
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Last measured round-trip time; zero until the first pong.
    pub fn latency(&self) -> Duration {
        self.inner.state.lock().latency
    }

    pub fn global_user_state(&self) -> Option<UserState> {
        self.inner.state.lock().global_user_state.clone()
    }

    /// Case-insensitive lookup of a tracked room, pending or acknowledged.
    pub fn get_channel(&self, name: &str) -> Option<Channel> {
        self.inner
            .state
            .lock()
            .channels
            .get(&name.to_room_key())
            .cloned()
    }

    /// Every tracked room, sorted by name.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> =
            self.inner.state.lock().channels.values().cloned().collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    pub fn channel_count(&self) -> usize {
        self.inner.state.lock().channels.len()
    }

    /// Connect and log in.
    ///
    /// Returns immediately when already connected. Concurrent callers queue
    /// behind the attempt in flight and then observe its result rather than
    /// dialing again.
    #[instrument(skip_all, fields(shard = self.inner.id))]
    pub async fn connect(&self, cancel: &CancellationToken) -> ClientResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let seen = self.inner.attempts.load(Ordering::Acquire);
        let mut last_failure = tokio::select! {
            guard = self.inner.connect_lock.lock() => guard,
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
        };
        if self.is_connected() {
            return Ok(());
        }
        if self.inner.attempts.load(Ordering::Acquire) != seen {
            if let Some(failure) = last_failure.as_ref() {
                debug!(?failure, "sharing result of the attempt we queued behind");
                return Err(failure.replay());
            }
        }

        let result = self.open(cancel).await;
        *last_failure = result.as_ref().err().and_then(handshake::AttemptFailure::capture);
        self.inner.attempts.fetch_add(1, Ordering::Release);
        result
    }

    /// Close the socket and wait for the read loop to stop.
    ///
    /// Safe to call any number of times. Clears every tracked room.
    #[instrument(skip_all, fields(shard = self.inner.id))]
    pub async fn close(&self) -> ClientResult<()> {
        let (generation, stop, task) = {
            let mut st = self.inner.state.lock();
            if st.conn == ConnectionState::Disconnected
                && st.stop.is_none()
                && st.read_task.is_none()
            {
                return Ok(());
            }
            (st.generation, st.stop.take(), st.read_task.take())
        };

        if let Some(stop) = stop {
            stop.cancel();
        }
        if let Some(task) = task {
            let grace = self.inner.config.options.close_grace();
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!(grace_ms = grace.as_millis() as u64, "read loop did not stop in time");
            }
        }

        self.finish(generation, DisconnectReason::Closed).await;
        Ok(())
    }

    /// Write raw lines, connecting first if needed and allowed.
    ///
    /// Lines are written back to back under the write lock, so concurrent
    /// callers never interleave.
    pub async fn send_raw<S: AsRef<str> + Sync>(&self, lines: &[S]) -> ClientResult<()> {
        if !self.is_connected() {
            if !self.inner.config.options.auto_connect {
                return Err(ClientError::NotConnected);
            }
            self.connect(&CancellationToken::new()).await?;
        }
        self.write_lines(lines).await
    }

    pub async fn send(&self, message: &Message) -> ClientResult<()> {
        self.send_raw(&[message.to_string()]).await
    }

    /// Join rooms and wait until the server acknowledges each one.
    ///
    /// Rooms are tracked as pending right away. On timeout the room stays
    /// pending and [`ClientError::JoinTimeout`] is returned; a suspended or
    /// missing room yields [`ClientError::RoomUnavailable`].
    #[instrument(skip_all, fields(shard = self.inner.id, rooms = rooms.len()))]
    pub async fn join<S: AsRef<str> + Sync>(&self, rooms: &[S]) -> ClientResult<Vec<Channel>> {
        let mut keys: Vec<String> = Vec::with_capacity(rooms.len());
        for room in rooms {
            let key = room.as_ref().to_room_key();
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }

        let mut waits = Vec::with_capacity(keys.len());
        let mut inserted = Vec::new();
        let mut lines = Vec::new();
        for key in keys {
            let acknowledged = {
                let mut st = self.inner.state.lock();
                match st.channels.get(&key) {
                    Some(channel) if channel.is_acknowledged() => Some(channel.clone()),
                    Some(_) => None,
                    None => {
                        st.channels.insert(key.clone(), Channel::pending(&key));
                        inserted.push(key.clone());
                        None
                    }
                }
            };
            match acknowledged {
                Some(channel) => waits.push(JoinWait::Done(channel)),
                None => {
                    let (guard, rx) = self.inner.joins.register(&key);
                    lines.push(Message::join(key.to_channel_name()).to_string());
                    waits.push(JoinWait::Pending { key, guard, rx });
                }
            }
        }

        if !lines.is_empty() {
            if let Err(e) = self.send_raw(&lines).await {
                let mut st = self.inner.state.lock();
                for key in &inserted {
                    if st.channels.get(key).is_some_and(|c| !c.is_acknowledged()) {
                        st.channels.remove(key);
                    }
                }
                return Err(e);
            }
        }

        let deadline = Instant::now() + self.inner.config.options.join_timeout();
        let mut joined = Vec::with_capacity(waits.len());
        for wait in waits {
            match wait {
                JoinWait::Done(channel) => joined.push(channel),
                JoinWait::Pending { key, guard, rx } => {
                    let outcome = tokio::time::timeout_at(deadline, rx).await;
                    drop(guard);
                    match outcome {
                        Ok(Ok(result)) => joined.push(result?),
                        Ok(Err(_)) => return Err(ClientError::Disconnected),
                        Err(_) => {
                            warn!(room = %key, "join not acknowledged in time");
                            return Err(ClientError::JoinTimeout { room: key });
                        }
                    }
                }
            }
        }
        Ok(joined)
    }

    /// Stop tracking rooms and send `PART` for each.
    ///
    /// Does not connect just to leave: a disconnected connection has no
    /// rooms to part.
    #[instrument(skip_all, fields(shard = self.inner.id, rooms = rooms.len()))]
    pub async fn leave<S: AsRef<str> + Sync>(&self, rooms: &[S]) -> ClientResult<()> {
        let mut lines = Vec::with_capacity(rooms.len());
        for room in rooms {
            let key = room.as_ref().to_room_key();
            if key.is_empty() {
                continue;
            }
            self.inner.state.lock().channels.remove(&key);
            self.inner.joins.resolve(&key, || Err(ClientError::Cancelled));
            lines.push(Message::part(key.to_channel_name()).to_string());
        }

        if lines.is_empty() || !self.is_connected() {
            return Ok(());
        }
        self.write_lines(&lines).await
    }

    /// Send a keep-alive probe and measure the round trip.
    ///
    /// Times out after the configured ping timeout plus the last measured
    /// latency.
    #[instrument(skip_all, fields(shard = self.inner.id))]
    pub async fn ping(&self, cancel: &CancellationToken) -> ClientResult<Duration> {
        let token = format!(
            "shardchat-{}-{}",
            self.inner.id,
            self.inner.ping_seq.fetch_add(1, Ordering::Relaxed)
        );
        let (_waiter, rx) = self.inner.pings.register(&token);
        let limit = self.inner.config.options.ping_timeout() + self.latency();

        let sent_at = Instant::now();
        self.write_lines(&[Message::ping(token.as_str()).to_string()])
            .await?;

        tokio::select! {
            reply = rx => {
                let received_at = reply.map_err(|_| ClientError::Disconnected)??;
                let rtt = received_at.saturating_duration_since(sent_at);
                self.inner.state.lock().latency = rtt;
                debug!(latency_ms = rtt.as_millis() as u64, "pong");
                Ok(rtt)
            }
            _ = tokio::time::sleep(limit) => Err(ClientError::PingTimeout),
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
        }
    }

    /// Send a chat message to a room.
    pub async fn say(&self, room: &str, text: &str) -> ClientResult<()> {
        self.send(&Message::privmsg(room.to_channel_name(), text))
            .await
    }

    /// Reply to a message in a room by its `id` tag.
    pub async fn reply(&self, room: &str, parent_msg_id: &str, text: &str) -> ClientResult<()> {
        let message = Message::privmsg(room.to_channel_name(), text)
            .with_tag("reply-parent-msg-id", parent_msg_id);
        self.send(&message).await
    }

    /// Send a `/me` action.
    pub async fn action(&self, room: &str, text: &str) -> ClientResult<()> {
        let body = Ctcp::action(text).to_string();
        self.send(&Message::privmsg(room.to_channel_name(), body))
            .await
    }

    /// Write lines on the current socket without connecting.
    pub(crate) async fn write_lines<S: AsRef<str> + Sync>(&self, lines: &[S]) -> ClientResult<()> {
        let mut writer = self.inner.writer.lock().await;
        let writer = writer.as_mut().ok_or(ClientError::NotConnected)?;
        for line in lines {
            writer.sink.feed(line.as_ref().to_string()).await?;
        }
        SinkExt::<String>::flush(&mut writer.sink).await?;
        Ok(())
    }

    /// Tear down state for `generation`. Only the first call per generation
    /// has any effect.
    pub(crate) async fn finish(&self, generation: u64, reason: DisconnectReason) {
        let mut writer = self.inner.writer.lock().await;
        let was_connected = {
            let mut st = self.inner.state.lock();
            if st.generation != generation || st.conn == ConnectionState::Disconnected {
                return;
            }
            let was_connected = st.conn == ConnectionState::Connected;
            st.conn = ConnectionState::Disconnected;
            st.channels.clear();
            st.global_user_state = None;
            if let Some(stop) = st.stop.take() {
                stop.cancel();
            }
            was_connected
        };

        if writer.as_ref().is_some_and(|w| w.generation == generation) {
            if let Some(mut old) = writer.take() {
                let grace = self.inner.config.options.close_grace();
                let _ = tokio::time::timeout(grace, SinkExt::<String>::close(&mut old.sink)).await;
            }
        }
        drop(writer);

        self.inner.login.send_if_modified(|status| {
            if *status == LoginStatus::Authenticating {
                *status = LoginStatus::Dropped;
                true
            } else {
                false
            }
        });
        self.inner
            .joins
            .resolve_all(|_| Err(ClientError::Disconnected));
        self.inner
            .pings
            .resolve_all(|_| Err(ClientError::Disconnected));

        if was_connected {
            info!(?reason, "disconnected");
            self.inner.events.disconnect.emit(reason);
        }
    }
}

enum JoinWait {
    Done(Channel),
    Pending {
        key: String,
        guard: waiters::WaiterGuard<ClientResult<Channel>>,
        rx: tokio::sync::oneshot::Receiver<ClientResult<Channel>>,
    },
}
