//! Scripted chat server.
//!
//! Listens on `127.0.0.1:0` and answers the login burst, joins and pings the
//! way the real service does. Tests can silence or suspend rooms, reject a
//! token, push arbitrary lines and drop every open socket.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use shardchat::config::{ClientOptions, IdentityConfig, ServerConfig};
use shardchat::ClientConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Script {
    silent_rooms: HashSet<String>,
    suspended_rooms: HashSet<String>,
    rejected_token: Option<String>,
}

struct Shared {
    lines: Mutex<Vec<String>>,
    script: Mutex<Script>,
    connections: AtomicUsize,
    ignore_pings: AtomicBool,
    kill: broadcast::Sender<()>,
    push: broadcast::Sender<String>,
}

/// A test server instance.
pub struct MockServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let (kill, _) = broadcast::channel(4);
        let (push, _) = broadcast::channel(64);
        let shared = Arc::new(Shared {
            lines: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
            connections: AtomicUsize::new(0),
            ignore_pings: AtomicBool::new(false),
            kill,
            push,
        });

        let task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    shared.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, Arc::clone(&shared)));
                }
            })
        };

        Self { addr, shared, task }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::plain("127.0.0.1", self.addr.port())
    }

    /// Anonymous client config with short timeouts and no auto-reconnect.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::anonymous(self.server_config()).with_options(ClientOptions {
            login_timeout_ms: 2_000,
            join_timeout_ms: 2_000,
            ping_timeout_ms: 1_000,
            close_grace_ms: 500,
            auto_reconnect: false,
            ..ClientOptions::default()
        })
    }

    /// Client config logging in as `username` with `token`.
    pub fn identified_config(&self, username: &str, token: &str) -> ClientConfig {
        self.client_config()
            .with_identity(IdentityConfig::new(username, token))
    }

    /// Never acknowledge joins for this room.
    pub fn silence_room(&self, room: &str) {
        self.shared.script.lock().silent_rooms.insert(room.to_string());
    }

    /// Answer joins for this room with a suspension notice.
    pub fn suspend_room(&self, room: &str) {
        self.shared.script.lock().suspended_rooms.insert(room.to_string());
    }

    /// Fail logins that present this token.
    pub fn reject_token(&self, token: &str) {
        self.shared.script.lock().rejected_token = Some(token.to_string());
    }

    pub fn ignore_pings(&self) {
        self.shared.ignore_pings.store(true, Ordering::SeqCst);
    }

    /// Close every open client socket.
    pub fn drop_connections(&self) {
        let _ = self.shared.kill.send(());
    }

    /// Write a line to every open client socket.
    pub fn broadcast(&self, line: &str) {
        let _ = self.shared.push.send(line.to_string());
    }

    /// Every line received so far, across all sockets.
    pub fn lines(&self) -> Vec<String> {
        self.shared.lines.lock().clone()
    }

    /// Number of sockets accepted so far.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Wait until a received line satisfies `pred`.
    pub async fn wait_for_line(&self, pred: impl Fn(&str) -> bool) -> String {
        let deadline = tokio::time::Instant::now() + super::WAIT;
        loop {
            if let Some(line) = self.lines().into_iter().find(|l| pred(l)) {
                return line;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "line never arrived; got {:?}",
                self.lines()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until the server has accepted `n` sockets.
    pub async fn wait_for_connections(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + super::WAIT;
        while self.connection_count() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {n} connections, saw {}",
                self.connection_count()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
        let _ = self.shared.kill.send(());
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut kill = shared.kill.subscribe();
    let mut push = shared.push.subscribe();
    let mut password = String::new();

    loop {
        let (replies, hang_up) = tokio::select! {
            _ = kill.recv() => return,
            pushed = push.recv() => match pushed {
                Ok(line) => (vec![line], false),
                Err(_) => continue,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    shared.lines.lock().push(line.clone());
                    respond(&shared, &line, &mut password)
                }
                _ => return,
            },
        };

        for reply in replies {
            if write_half
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .is_err()
            {
                return;
            }
        }
        if hang_up {
            let _ = write_half.shutdown().await;
            return;
        }
    }
}

/// Replies for one client line, and whether to hang up after sending them.
fn respond(shared: &Shared, line: &str, password: &mut String) -> (Vec<String>, bool) {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let replies = match command {
        "CAP" => vec![format!(":tmi.twitch.tv CAP * ACK {}", rest.trim_start_matches("REQ "))],
        "PASS" => {
            *password = rest.trim_start_matches("oauth:").to_string();
            vec![]
        }
        "NICK" => {
            let nick = rest;
            let rejected = shared.script.lock().rejected_token.clone();
            if rejected.as_deref() == Some(password.as_str()) {
                return (
                    vec![":tmi.twitch.tv NOTICE * :Login authentication failed".to_string()],
                    true,
                );
            }
            vec![
                format!(":tmi.twitch.tv 001 {nick} :Welcome, GLHF!"),
                format!(":tmi.twitch.tv 002 {nick} :Your host is tmi.twitch.tv"),
                format!(":tmi.twitch.tv 375 {nick} :-"),
                format!(":tmi.twitch.tv 376 {nick} :>"),
                format!(
                    "@badge-info=;badges=;color=;display-name={nick};emote-sets=0;user-id=1;user-type= :tmi.twitch.tv GLOBALUSERSTATE"
                ),
            ]
        }
        "JOIN" => {
            let script = shared.script.lock();
            let mut replies = Vec::new();
            for channel in rest.split(',') {
                let room = channel.trim_start_matches('#');
                replies.push(format!(":me!me@me.tmi.twitch.tv JOIN {channel}"));
                if script.suspended_rooms.contains(room) {
                    replies.push(format!(
                        "@msg-id=msg_channel_suspended :tmi.twitch.tv NOTICE {channel} :This channel has been suspended."
                    ));
                } else if !script.silent_rooms.contains(room) {
                    replies.push(format!(
                        "@emote-only=0;followers-only=-1;r9k=0;room-id=42;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE {channel}"
                    ));
                    replies.push(format!(
                        "@badge-info=;badges=;color=;display-name=me;emote-sets=0;mod=0;subscriber=0;user-type= :tmi.twitch.tv USERSTATE {channel}"
                    ));
                }
            }
            replies
        }
        "PART" => vec![format!(":me!me@me.tmi.twitch.tv PART {rest}")],
        "PING" => {
            if shared.ignore_pings.load(Ordering::SeqCst) {
                vec![]
            } else {
                let token = rest.trim_start_matches(':');
                vec![format!(":tmi.twitch.tv PONG tmi.twitch.tv :{token}")]
            }
        }
        _ => vec![],
    };
    (replies, false)
}
