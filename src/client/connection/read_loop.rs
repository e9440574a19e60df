//! Inbound line handling.

use futures_util::StreamExt;
use shardchat_proto::{ChannelExt, Command, LineCodec, Message, Tags};
use tokio::time::Instant;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{Connection, ConnectionState, LoginStatus};
use crate::client::chat::{ChatMessage, ClearChat, ClearMessage, Notice, UserNotice};
use crate::client::events::DisconnectReason;
use crate::client::transport::TransportReadHalf;
use crate::client::user::UserState;
use crate::error::ClientError;

/// Read until the socket ends or `stop` fires, then tear down `generation`.
pub(super) async fn run(
    conn: Connection,
    mut reader: FramedRead<TransportReadHalf, LineCodec>,
    generation: u64,
    stop: CancellationToken,
) {
    let reason = loop {
        let frame = tokio::select! {
            _ = stop.cancelled() => break DisconnectReason::Closed,
            frame = reader.next() => frame,
        };

        match frame {
            Some(Ok(line)) if line.is_empty() => continue,
            Some(Ok(line)) => match line.parse::<Message>() {
                Ok(message) => conn.handle_message(generation, message).await,
                Err(e) => debug!(error = %e, code = e.error_code(), line = %line, "dropping unparseable line"),
            },
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                break DisconnectReason::Error(e.to_string());
            }
            None => break DisconnectReason::Eof,
        }
    };

    debug!(?reason, "read loop finished");
    conn.finish(generation, reason).await;
}

impl Connection {
    async fn handle_message(&self, generation: u64, message: Message) {
        trace!(line = %message.raw, "recv");
        let events = &self.inner.events;
        events.raw.emit(message.clone());

        match &message.command {
            command if command.is_ready() => self.on_ready(generation),
            Command::PING => {
                let payload = message
                    .text()
                    .or_else(|| message.param(0))
                    .unwrap_or("tmi.twitch.tv")
                    .to_string();
                if let Err(e) = self.write_lines(&[Message::pong(payload).to_string()]).await {
                    debug!(error = %e, "could not answer keep-alive");
                }
            }
            Command::PONG => {
                let token = message
                    .text()
                    .or_else(|| message.params.last().map(String::as_str));
                if let Some(token) = token {
                    let now = Instant::now();
                    self.inner.pings.resolve(token, || Ok(now));
                }
            }
            Command::RECONNECT => {
                info!("server requested reconnect");
                events.reconnect.emit(());
            }
            Command::ROOMSTATE => self.on_room_state(&message),
            Command::USERSTATE => self.on_user_state(&message),
            Command::GLOBALUSERSTATE => {
                let state = message
                    .tags
                    .as_ref()
                    .map(UserState::from_tags)
                    .unwrap_or_default();
                self.inner.state.lock().global_user_state = Some(state);
            }
            Command::NOTICE => self.on_notice(generation, &message),
            Command::PRIVMSG => {
                if let Some(chat) = ChatMessage::from_message(&message) {
                    events.chat.emit(chat);
                }
            }
            Command::USERNOTICE => {
                if let Some(notice) = UserNotice::from_message(&message) {
                    events.user_notice.emit(notice);
                }
            }
            Command::CLEARCHAT => {
                if let Some(clear) = ClearChat::from_message(&message) {
                    events.clear_chat.emit(clear);
                }
            }
            Command::CLEARMSG => {
                if let Some(clear) = ClearMessage::from_message(&message) {
                    events.clear_message.emit(clear);
                }
            }
            Command::JOIN | Command::PART
                if message.source_nickname() == Some(self.inner.login_name.as_str()) =>
            {
                debug!(command = %message.command, room = message.channel().unwrap_or_default(), "membership echo");
            }
            _ => {}
        }
    }

    fn on_ready(&self, generation: u64) {
        {
            let mut st = self.inner.state.lock();
            if st.generation != generation || st.conn != ConnectionState::Connecting {
                return;
            }
            st.conn = ConnectionState::Connected;
        }
        self.inner.login.send_replace(LoginStatus::Ready);

        let conn = self.clone();
        tokio::spawn(async move {
            match conn.ping(&CancellationToken::new()).await {
                Ok(rtt) => debug!(latency_ms = rtt.as_millis() as u64, "initial ping"),
                Err(e) => debug!(error = %e, "initial ping failed"),
            }
        });
    }

    fn on_room_state(&self, message: &Message) {
        let Some(key) = message.channel().map(|c| c.to_room_key()) else {
            return;
        };
        let empty = Tags::new();
        let tags = message.tags.as_ref().unwrap_or(&empty);

        let acknowledged = {
            let mut st = self.inner.state.lock();
            let Some(channel) = st.channels.get_mut(&key) else {
                debug!(room = %key, "room state for untracked room");
                return;
            };
            channel.apply_room_state(tags).then(|| channel.clone())
        };

        if let Some(channel) = acknowledged {
            info!(room = %key, "joined");
            self.inner.joins.resolve(&key, || Ok(channel.clone()));
            self.inner.events.joined.emit(channel);
        }
    }

    fn on_user_state(&self, message: &Message) {
        let Some(key) = message.channel().map(|c| c.to_room_key()) else {
            return;
        };
        let state = message
            .tags
            .as_ref()
            .map(UserState::from_tags)
            .unwrap_or_default();
        if let Some(channel) = self.inner.state.lock().channels.get_mut(&key) {
            channel.user_state = Some(state);
        }
    }

    fn on_notice(&self, generation: u64, message: &Message) {
        let notice = Notice::from_message(message);
        let authenticating = *self.inner.login.borrow() == LoginStatus::Authenticating;

        if authenticating && notice.channel.is_none() && notice.is_auth_failure() {
            if self.inner.state.lock().generation == generation {
                warn!(reason = %notice.text, "authentication failed");
                self.inner
                    .login
                    .send_replace(LoginStatus::Failed(notice.text.clone()));
            }
        } else if let Some(room) = notice.channel.as_deref() {
            // Bans also answer chat in rooms we already joined; only a join
            // still waiting on the server is refused.
            if notice.is_room_unavailable() && self.drop_pending(room) {
                let reason = notice.msg_id.clone().unwrap_or_else(|| notice.text.clone());
                warn!(room = %room, reason = %reason, "room unavailable");
                self.inner.joins.resolve(room, || {
                    Err(ClientError::RoomUnavailable {
                        room: room.to_string(),
                        reason: reason.clone(),
                    })
                });
            }
        }

        self.inner.events.notice.emit(notice);
    }

    /// Untrack `room` if its join is still unacknowledged.
    fn drop_pending(&self, room: &str) -> bool {
        let mut st = self.inner.state.lock();
        match st.channels.get(room) {
            Some(channel) if !channel.is_acknowledged() => {
                st.channels.remove(room);
                true
            }
            _ => false,
        }
    }
}
