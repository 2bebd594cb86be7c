//! The raw connection to the chat server and its login handshake.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const IRC_HOST: &str = "irc.chat.twitch.tv";
pub const IRC_PORT: u16 = 6667;

/// Byte-level duplex channel to the chat server.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, data: &str) -> std::io::Result<()>;

    /// Reads into `buf` and returns the number of bytes read. Zero means
    /// the peer closed the connection.
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Opens a fresh transport, once per (re)connection.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self) -> std::io::Result<Self::Transport>;
}

/// Plain TCP to the public chat endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self) -> std::io::Result<TcpTransport> {
        let stream = TcpStream::connect((IRC_HOST, IRC_PORT)).await?;
        Ok(TcpTransport { stream })
    }
}

pub struct TcpTransport {
    stream: TcpStream,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &str) -> std::io::Result<()> {
        self.stream.write_all(data.as_bytes()).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf).await
    }
}

/// An anonymous IRC session on top of a [`Transport`].
///
/// Login uses the well-known anonymous credentials, so chat is read-only.
/// The tags, commands and membership capabilities are requested up front;
/// without them the server omits the metadata the parser runs on.
pub struct TwitchIrc<T: Transport> {
    transport: T,
    current_channel: Option<String>,
}

impl<T: Transport> TwitchIrc<T> {
    pub async fn handshake(transport: T) -> std::io::Result<Self> {
        let mut session = Self {
            transport,
            current_channel: None,
        };
        session
            .send_raw("CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership")
            .await?;
        session.send_raw("PASS SCHMOOPIIE").await?;
        session.send_raw("NICK justinfan67420").await?;
        Ok(session)
    }

    /// Sends one raw IRC line, appending the terminator.
    pub async fn send_raw(&mut self, message: &str) -> std::io::Result<()> {
        self.transport.send(&format!("{message}\r\n")).await
    }

    /// Joins a channel. Joining the current channel again is a no-op.
    pub async fn join_channel(&mut self, channel_name: &str) -> std::io::Result<()> {
        let channel = channel_name.to_lowercase();
        if self.current_channel.as_deref() != Some(channel.as_str()) {
            self.send_raw(&format!("JOIN #{channel}")).await?;
            self.current_channel = Some(channel);
        }
        Ok(())
    }

    pub async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.transport.recv(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&mut self, data: &str) -> std::io::Result<()> {
            self.sent.lock().unwrap().push(data.to_string());
            Ok(())
        }

        async fn recv(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_handshake_lines() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { sent: sent.clone() };
        TwitchIrc::handshake(transport).await.unwrap();

        let lines = sent.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership\r\n",
                "PASS SCHMOOPIIE\r\n",
                "NICK justinfan67420\r\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_join_channel_is_idempotent_and_lowercases() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { sent: sent.clone() };
        let mut irc = TwitchIrc::handshake(transport).await.unwrap();

        irc.join_channel("SomeChannel").await.unwrap();
        irc.join_channel("somechannel").await.unwrap();
        irc.join_channel("SOMECHANNEL").await.unwrap();

        let lines = sent.lock().unwrap();
        let joins: Vec<&String> = lines.iter().filter(|l| l.starts_with("JOIN")).collect();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0], "JOIN #somechannel\r\n");
    }

    #[tokio::test]
    async fn test_send_raw_appends_terminator() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { sent: sent.clone() };
        let mut irc = TwitchIrc::handshake(transport).await.unwrap();
        irc.send_raw("PING").await.unwrap();

        let lines = sent.lock().unwrap();
        assert_eq!(lines.last().unwrap(), "PING\r\n");
    }
}
