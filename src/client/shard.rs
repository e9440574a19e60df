//! Shard manager: spreads rooms over several connections.
//!
//! Each shard is a [`Connection`] with a soft cap on the rooms assigned to
//! it. The manager lock guards only the shard table and is never held
//! across a call into a shard. Shard events are re-emitted on the
//! manager's [`ShardEvents`], tagged with the shard id.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use parking_lot::Mutex;
use shardchat_proto::{ChannelExt, Message};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::channel::Channel;
use super::chat::{ChatMessage, ClearChat, ClearMessage, Notice, UserNotice};
use super::connection::{Connection, ConnectionState};
use super::establish::ensure_connection;
use super::events::{DisconnectReason, Dispatcher};
use crate::config::ClientConfig;
use crate::config::defaults::default_max_channels_per_shard;
use crate::error::{ClientError, ClientResult};
use crate::telemetry::spans;

/// An event from one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sharded<T> {
    pub shard_id: usize,
    pub event: T,
}

/// Aggregated events from every shard.
#[derive(Clone, Default)]
pub struct ShardEvents {
    pub raw: Dispatcher<Sharded<Message>>,
    pub chat: Dispatcher<Sharded<ChatMessage>>,
    pub notice: Dispatcher<Sharded<Notice>>,
    pub user_notice: Dispatcher<Sharded<UserNotice>>,
    pub clear_chat: Dispatcher<Sharded<ClearChat>>,
    pub clear_message: Dispatcher<Sharded<ClearMessage>>,
    pub joined: Dispatcher<Sharded<Channel>>,
    pub reconnect: Dispatcher<Sharded<()>>,
    pub disconnect: Dispatcher<Sharded<DisconnectReason>>,
}

struct ShardEntry {
    conn: Connection,
    /// Rooms this shard is responsible for, joined or in flight.
    rooms: BTreeSet<String>,
}

impl ShardEntry {
    fn load(&self) -> usize {
        self.rooms.len().max(self.conn.channel_count())
    }
}

struct ManagerInner {
    config: ClientConfig,
    max_per_shard: AtomicUsize,
    shards: Mutex<BTreeMap<usize, ShardEntry>>,
    events: ShardEvents,
    /// Shards whose next disconnect was caused by `close`.
    closing: Mutex<HashSet<usize>>,
    /// Disconnects observed for shards in `closing`.
    closed: watch::Sender<usize>,
    reconnecting: Mutex<HashSet<usize>>,
    shutdown: Mutex<CancellationToken>,
}

/// Pool of connections with per-shard room capacity.
#[derive(Clone)]
pub struct ShardManager {
    inner: Arc<ManagerInner>,
}

impl ShardManager {
    pub fn new(config: ClientConfig) -> Self {
        let max = match config.options.max_channels_per_shard {
            0 => default_max_channels_per_shard(),
            n => n,
        };
        let (closed, _) = watch::channel(0);
        Self {
            inner: Arc::new(ManagerInner {
                config,
                max_per_shard: AtomicUsize::new(max),
                shards: Mutex::new(BTreeMap::new()),
                events: ShardEvents::default(),
                closing: Mutex::new(HashSet::new()),
                closed,
                reconnecting: Mutex::new(HashSet::new()),
                shutdown: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Set the soft room cap per shard. Zero or negative restores the default.
    pub fn set_max_channels_per_shard(&self, n: i64) {
        let max = match usize::try_from(n) {
            Ok(n) if n > 0 => n,
            _ => default_max_channels_per_shard(),
        };
        self.inner.max_per_shard.store(max, Ordering::Relaxed);
    }

    pub fn max_channels_per_shard(&self) -> usize {
        self.inner.max_per_shard.load(Ordering::Relaxed)
    }

    /// A shard with spare capacity, provisioning the next id if all are full.
    pub fn get_next_shard(&self) -> Connection {
        let max = self.max_channels_per_shard();
        let mut table = self.inner.shards.lock();
        if let Some(entry) = table.values().find(|e| e.load() < max) {
            return entry.conn.clone();
        }
        let id = next_id(&table);
        let entry = self.inner.new_entry(id);
        let conn = entry.conn.clone();
        table.insert(id, entry);
        conn
    }

    /// The shard with this id, provisioned on first use.
    pub fn get_shard(&self, id: i64) -> ClientResult<Connection> {
        let id = usize::try_from(id).map_err(|_| ClientError::ShardOutOfBounds(id))?;
        let mut table = self.inner.shards.lock();
        let entry = table
            .entry(id)
            .or_insert_with(|| self.inner.new_entry(id));
        Ok(entry.conn.clone())
    }

    pub fn shard_count(&self) -> usize {
        self.inner.shards.lock().len()
    }

    /// Every provisioned shard, by id.
    pub fn shards(&self) -> Vec<Connection> {
        self.inner
            .shards
            .lock()
            .values()
            .map(|e| e.conn.clone())
            .collect()
    }

    /// Which shard tracks a room, and the room itself.
    pub fn get_channel(&self, room: &str) -> Option<(usize, Channel)> {
        self.shards()
            .into_iter()
            .find_map(|conn| conn.get_channel(room).map(|c| (conn.id(), c)))
    }

    pub fn events(&self) -> &ShardEvents {
        &self.inner.events
    }

    /// Join rooms, spreading them over shards with spare capacity.
    ///
    /// Rooms already assigned stay on their shard. Shards are connected
    /// (with backoff) and joined concurrently; the first error is returned.
    pub async fn join<S: AsRef<str> + Sync>(&self, rooms: &[S]) -> ClientResult<Vec<Channel>> {
        let mut batches: BTreeMap<usize, (Connection, Vec<String>)> = BTreeMap::new();
        for room in rooms {
            let key = room.as_ref().to_room_key();
            if key.is_empty() {
                continue;
            }
            let (id, conn) = self.inner.assign(&key, self.max_channels_per_shard());
            let batch = &mut batches.entry(id).or_insert_with(|| (conn, Vec::new())).1;
            if !batch.contains(&key) {
                batch.push(key);
            }
        }

        let cancel = self.inner.shutdown.lock().clone();
        let results = join_all(batches.into_iter().map(|(id, (conn, keys))| {
            let inner = Arc::clone(&self.inner);
            let cancel = cancel.clone();
            async move {
                let result = match ensure_connection(&cancel, Some(&conn)).await {
                    Ok(()) => conn.join(&keys).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    warn!(error = %e, code = e.error_code(), rooms = keys.len(), "join failed");
                    inner.release_untracked(id, &conn, &keys);
                }
                result
            }
            .instrument(spans::shard(id))
        }))
        .await;

        let mut joined = Vec::new();
        for result in results {
            joined.extend(result?);
        }
        Ok(joined)
    }

    /// Leave rooms on whichever shards hold them.
    pub async fn leave<S: AsRef<str> + Sync>(&self, rooms: &[S]) -> ClientResult<()> {
        let mut batches: BTreeMap<usize, (Connection, Vec<String>)> = BTreeMap::new();
        {
            let mut table = self.inner.shards.lock();
            for room in rooms {
                let key = room.as_ref().to_room_key();
                for (id, entry) in table.iter_mut() {
                    let assigned = entry.rooms.remove(&key);
                    if assigned || entry.conn.get_channel(&key).is_some() {
                        batches
                            .entry(*id)
                            .or_insert_with(|| (entry.conn.clone(), Vec::new()))
                            .1
                            .push(key.clone());
                    }
                }
            }
        }

        let results = join_all(
            batches
                .into_values()
                .map(|(conn, keys)| async move { conn.leave(&keys).await }),
        )
        .await;
        results.into_iter().collect()
    }

    /// Close every shard and wait until each connected one reported its
    /// disconnect.
    pub async fn close(&self) -> ClientResult<()> {
        {
            let mut shutdown = self.inner.shutdown.lock();
            shutdown.cancel();
            *shutdown = CancellationToken::new();
        }

        let shards = self.shards();
        let expected = {
            let mut closing = self.inner.closing.lock();
            closing.clear();
            for conn in shards.iter().filter(|c| c.state() == ConnectionState::Connected) {
                closing.insert(conn.id());
            }
            closing.len()
        };
        self.inner.closed.send_replace(0);
        let mut closed = self.inner.closed.subscribe();
        info!(shards = shards.len(), connected = expected, "closing shards");

        let results = join_all(shards.iter().map(|conn| conn.close())).await;

        let grace = self.inner.config.options.close_grace();
        let all_reported = tokio::time::timeout(grace, closed.wait_for(|n| *n >= expected))
            .await
            .is_ok_and(|r| r.is_ok());
        if !all_reported {
            warn!(expected, "not every shard reported its disconnect");
        }

        self.inner.closing.lock().clear();
        self.inner.shards.lock().clear();
        results.into_iter().collect()
    }
}

fn next_id(table: &BTreeMap<usize, ShardEntry>) -> usize {
    table.keys().next_back().map_or(0, |id| id + 1)
}

impl ManagerInner {
    fn new_entry(self: &Arc<Self>, id: usize) -> ShardEntry {
        debug!(shard = id, "provisioning shard");
        let conn = Connection::with_id(id, self.config.clone());
        self.forward(&conn);
        ShardEntry {
            conn,
            rooms: BTreeSet::new(),
        }
    }

    /// Reserve `room` on a shard and return it.
    fn assign(self: &Arc<Self>, room: &str, max: usize) -> (usize, Connection) {
        let mut table = self.shards.lock();
        if let Some((id, entry)) = table.iter().find(|(_, e)| e.rooms.contains(room)) {
            return (*id, entry.conn.clone());
        }

        let id = table
            .iter()
            .find(|(_, e)| e.load() < max)
            .map_or_else(|| next_id(&table), |(id, _)| *id);
        let entry = table.entry(id).or_insert_with(|| self.new_entry(id));
        entry.rooms.insert(room.to_string());
        (id, entry.conn.clone())
    }

    /// Drop assignments for rooms the shard does not track after a failed join.
    fn release_untracked(&self, id: usize, conn: &Connection, rooms: &[String]) {
        if let Some(entry) = self.shards.lock().get_mut(&id) {
            for room in rooms {
                if conn.get_channel(room).is_none() {
                    entry.rooms.remove(room);
                }
            }
        }
    }

    fn forward(self: &Arc<Self>, conn: &Connection) {
        let id = conn.id();
        let events = conn.events();
        relay(&events.raw, &self.events.raw, id);
        relay(&events.chat, &self.events.chat, id);
        relay(&events.notice, &self.events.notice, id);
        relay(&events.user_notice, &self.events.user_notice, id);
        relay(&events.clear_chat, &self.events.clear_chat, id);
        relay(&events.clear_message, &self.events.clear_message, id);
        relay(&events.joined, &self.events.joined, id);

        let weak = Arc::downgrade(self);
        events.disconnect.on(move |reason| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.on_disconnect(id, reason);
            }
        });
        let weak = Arc::downgrade(self);
        events.reconnect.on(move |()| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.events.reconnect.emit(Sharded {
                    shard_id: id,
                    event: (),
                });
                inner.spawn_reconnect(id, true);
            }
        });
    }

    fn on_disconnect(self: &Arc<Self>, id: usize, reason: DisconnectReason) {
        if self.closing.lock().remove(&id) {
            self.closed.send_modify(|n| *n += 1);
        } else {
            self.spawn_reconnect(id, false);
        }
        self.events.disconnect.emit(Sharded {
            shard_id: id,
            event: reason,
        });
    }

    fn spawn_reconnect(self: &Arc<Self>, id: usize, requested: bool) {
        if !self.config.options.auto_reconnect || !self.reconnecting.lock().insert(id) {
            return;
        }
        let inner = Arc::clone(self);
        let cancel = self.shutdown.lock().clone();
        tokio::spawn(
            async move {
                inner.reconnect(id, requested, &cancel).await;
                inner.reconnecting.lock().remove(&id);
            }
            .instrument(spans::shard(id)),
        );
    }

    async fn reconnect(&self, id: usize, requested: bool, cancel: &CancellationToken) {
        let shard = self.shards.lock().get(&id).map(|entry| {
            let rooms: Vec<String> = entry.rooms.iter().cloned().collect();
            (entry.conn.clone(), rooms)
        });
        let Some((conn, rooms)) = shard else {
            return;
        };

        if requested {
            info!("reconnecting on server request");
            if let Err(e) = conn.close().await {
                debug!(error = %e, "close before reconnect failed");
            }
        }

        if let Err(e) = ensure_connection(cancel, Some(&conn)).await {
            warn!(error = %e, code = e.error_code(), "giving up on reconnect");
            return;
        }
        if rooms.is_empty() {
            return;
        }
        match conn.join(&rooms).await {
            Ok(channels) => info!(rooms = channels.len(), "rejoined"),
            Err(e) => warn!(error = %e, code = e.error_code(), "rejoin failed"),
        }
    }
}

fn relay<T: Clone + Send + 'static>(from: &Dispatcher<T>, to: &Dispatcher<Sharded<T>>, shard_id: usize) {
    let to = to.clone();
    from.on(move |event| to.emit(Sharded { shard_id, event }));
}
