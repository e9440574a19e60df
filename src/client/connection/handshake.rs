//! Dial and login.

use shardchat_proto::{LineCodec, Message};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::{Connection, ConnectionState, LoginStatus, Writer, read_loop};
use crate::client::transport;
use crate::error::{ClientError, ClientResult};
use crate::telemetry::spans;

/// How a login attempt failed, replayed to callers that queued behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum AttemptFailure {
    Auth(String),
    InvalidServerName(String),
    LoginTimeout,
    Io(std::io::ErrorKind, String),
    Dropped,
}

impl AttemptFailure {
    /// `None` for cancellation, which belongs to the caller that cancelled.
    pub(super) fn capture(err: &ClientError) -> Option<Self> {
        Some(match err {
            ClientError::Cancelled => return None,
            ClientError::AuthenticationFailed(reason) => Self::Auth(reason.clone()),
            ClientError::InvalidServerName(name) => Self::InvalidServerName(name.clone()),
            ClientError::LoginTimeout => Self::LoginTimeout,
            ClientError::Io(e) => Self::Io(e.kind(), e.to_string()),
            _ => Self::Dropped,
        })
    }

    pub(super) fn replay(&self) -> ClientError {
        match self {
            Self::Auth(reason) => ClientError::AuthenticationFailed(reason.clone()),
            Self::InvalidServerName(name) => ClientError::InvalidServerName(name.clone()),
            Self::LoginTimeout => ClientError::LoginTimeout,
            Self::Io(kind, message) => ClientError::Io(std::io::Error::new(*kind, message.clone())),
            Self::Dropped => ClientError::Disconnected,
        }
    }
}

impl Connection {
    /// Open a fresh socket and log in. Caller holds the connect lock.
    pub(super) async fn open(&self, cancel: &CancellationToken) -> ClientResult<()> {
        let server = &self.inner.config.server;
        self.inner.state.lock().conn = ConnectionState::Connecting;
        self.inner.login.send_replace(LoginStatus::Authenticating);
        let mut login = self.inner.login.subscribe();

        debug!(host = %server.host, port = server.port, tls = server.tls, "dialing");
        let dialed = tokio::select! {
            result = transport::dial(server) => result,
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
        };
        let (read_half, write_half) = match dialed {
            Ok(halves) => halves,
            Err(e) => {
                self.abandon_attempt();
                return Err(e);
            }
        };

        let stop = CancellationToken::new();
        let generation = {
            let mut st = self.inner.state.lock();
            // close() ran while we were dialing
            if st.conn != ConnectionState::Connecting {
                return Err(ClientError::Cancelled);
            }
            st.generation += 1;
            st.stop = Some(stop.clone());
            st.generation
        };

        *self.inner.writer.lock().await = Some(Writer {
            generation,
            sink: FramedWrite::new(write_half, LineCodec::new()),
        });
        let reader = FramedRead::new(read_half, LineCodec::new().lenient());
        let task = tokio::spawn(
            read_loop::run(self.clone(), reader, generation, stop)
                .instrument(spans::connection(self.inner.id, &server.host)),
        );
        self.inner.state.lock().read_task = Some(task);

        if let Err(e) = self.write_lines(&self.login_lines()).await {
            let _ = self.close().await;
            return Err(e);
        }

        let outcome = tokio::select! {
            status = login.wait_for(|s| !matches!(s, LoginStatus::Idle | LoginStatus::Authenticating)) => {
                match status.map(|s| (*s).clone()) {
                    Ok(LoginStatus::Ready) => Ok(()),
                    Ok(LoginStatus::Failed(reason)) => Err(ClientError::AuthenticationFailed(reason)),
                    _ => Err(ClientError::Disconnected),
                }
            }
            _ = tokio::time::sleep(self.inner.config.options.login_timeout()) => Err(ClientError::LoginTimeout),
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
        };

        match outcome {
            Ok(()) => {
                info!(user = %self.inner.login_name, anonymous = self.inner.anonymous, "logged in");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "login failed");
                let _ = self.close().await;
                Err(e)
            }
        }
    }

    /// `CAP REQ`, `PASS`, `NICK`, in that order.
    pub(super) fn login_lines(&self) -> Vec<String> {
        let capabilities = &self.inner.config.options.capabilities;
        let mut lines = Vec::with_capacity(3);
        if !capabilities.is_empty() {
            lines.push(Message::cap_req(capabilities).to_string());
        }
        lines.push(Message::pass(format!("oauth:{}", self.inner.token.expose())).to_string());
        lines.push(Message::nick(self.inner.login_name.as_str()).to_string());
        lines
    }

    fn abandon_attempt(&self) {
        let mut st = self.inner.state.lock();
        if st.conn == ConnectionState::Connecting {
            st.conn = ConnectionState::Disconnected;
        }
        drop(st);
        self.inner.login.send_replace(LoginStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, IdentityConfig, ServerConfig};

    #[test]
    fn test_attempt_failure_replay() {
        let auth = ClientError::AuthenticationFailed("Login authentication failed".into());
        let failure = AttemptFailure::capture(&auth).unwrap();
        assert!(matches!(
            failure.replay(),
            ClientError::AuthenticationFailed(reason) if reason == "Login authentication failed"
        ));

        let refused = ClientError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        match AttemptFailure::capture(&refused).unwrap().replay() {
            ClientError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
            other => panic!("expected Io, got {other:?}"),
        }

        assert_eq!(AttemptFailure::capture(&ClientError::Cancelled), None);
        assert!(matches!(
            AttemptFailure::capture(&ClientError::NotConnected).unwrap().replay(),
            ClientError::Disconnected
        ));
    }

    #[test]
    fn test_login_lines_order() {
        let config = ClientConfig::anonymous(ServerConfig::plain("127.0.0.1", 1))
            .with_identity(IdentityConfig::new("Bot", "oauth:secret"));
        let conn = Connection::new(config);
        assert_eq!(
            conn.login_lines(),
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership".to_string(),
                "PASS oauth:secret".to_string(),
                "NICK bot".to_string(),
            ]
        );
    }

    #[test]
    fn test_login_lines_without_capabilities() {
        let mut config = ClientConfig::anonymous(ServerConfig::plain("127.0.0.1", 1));
        config.options.capabilities.clear();
        let conn = Connection::new(config);
        let lines = conn.login_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("PASS oauth:"));
        assert!(lines[1].starts_with("NICK justinfan"));
    }

    #[tokio::test]
    async fn test_dial_failure_resets_state() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let conn = Connection::new(ClientConfig::anonymous(ServerConfig::plain("127.0.0.1", port)));
        let err = conn.connect(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)), "{err:?}");
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
