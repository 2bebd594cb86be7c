//! Live chat streaming over the IRC gateway.
//!
//! Pulls raw bytes off an injected [`Connector`], accumulates them in a
//! read buffer, and turns complete lines into [`ChatEvent`]s. Reconnects
//! on transport failures, answers server keepalives, and terminates
//! normally when the caller's overall timeout or idle budget runs out.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::badges::BadgeCatalog;
use crate::client::ChatParams;
use crate::error::Result;
use crate::event::ChatEvent;
use crate::filter::should_add;
use crate::irc::parser::{parse_irc_line, split_buffer};
use crate::irc::transport::{Connector, TwitchIrc};
use crate::remap::KNOWN_IRC_KEYS;
use crate::retry::{Deadline, run_with_retries};

/// Keepalive probe the server sends; answered with [`PONG_TEXT`] whenever
/// it shows up anywhere in the read buffer.
pub const PING_TEXT: &str = "PING :tmi.twitch.tv";
pub const PONG_TEXT: &str = "PONG :tmi.twitch.tv";

/// A live chat session on one channel.
///
/// Events are pulled with [`next_event`](Self::next_event); `None` marks a
/// normal end of the stream (overall timeout or idle budget spent). The
/// connection is (re)established lazily under the caller's retry policy,
/// and a reconnect always starts over with an empty read buffer.
pub struct LiveChatStream<C: Connector> {
    connector: C,
    channel: String,
    params: ChatParams,
    badges: Arc<BadgeCatalog>,
    irc: Option<TwitchIrc<C::Transport>>,
    buffer: String,
    pending: VecDeque<ChatEvent>,
    deadline: Deadline,
    idle: Duration,
    last_ping: Instant,
    finished: bool,
}

impl<C: Connector> LiveChatStream<C> {
    pub fn new(
        connector: C,
        channel: impl Into<String>,
        params: ChatParams,
        badges: Arc<BadgeCatalog>,
    ) -> Self {
        let deadline = Deadline::new(params.timeout);
        Self {
            connector,
            channel: channel.into(),
            badges,
            irc: None,
            buffer: String::new(),
            pending: VecDeque::new(),
            deadline,
            idle: Duration::ZERO,
            last_ping: Instant::now(),
            finished: false,
            params,
        }
    }

    /// Next chat event, or `None` once the stream has ended.
    ///
    /// A failed reconnect surfaces its error here once; every later call
    /// returns `None`.
    pub async fn next_event(&mut self) -> Option<Result<ChatEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if let Err(error) = self.step().await {
                self.finished = true;
                return Some(Err(error));
            }
        }
    }

    async fn step(&mut self) -> Result<()> {
        if self.deadline.expired() {
            info!(channel = %self.channel, "Overall timeout reached, ending live chat");
            self.finished = true;
            return Ok(());
        }
        if self.irc.is_none() {
            let irc = self.connect().await?;
            debug!(channel = %self.channel, "Connected and joined channel");
            self.irc = Some(irc);
        }

        let recv_timeout = self.params.message_receive_timeout;
        let mut chunk = vec![0u8; self.params.buffer_size];
        let received = match self.irc.as_mut() {
            Some(irc) => tokio::time::timeout(recv_timeout, irc.recv(&mut chunk)).await,
            None => return Ok(()),
        };

        match received {
            Ok(Ok(0)) => {
                warn!(channel = %self.channel, "Lost connection, reconnecting");
                self.reset_connection();
            }
            Ok(Ok(read)) => {
                self.buffer.push_str(&String::from_utf8_lossy(&chunk[..read]));
                if self.buffer.contains(PING_TEXT) {
                    if let Err(error) = self.send_raw(PONG_TEXT).await {
                        warn!(channel = %self.channel, %error, "Failed to answer keepalive, reconnecting");
                        self.reset_connection();
                        return Ok(());
                    }
                }
                self.drain_buffer();
                self.maybe_ping().await;
            }
            Ok(Err(error)) => {
                warn!(channel = %self.channel, %error, "Connection error, reconnecting");
                self.reset_connection();
            }
            Err(_) => {
                // A read timeout is not an error on a live stream; it only
                // counts against the idle budget, and only when the caller
                // asked for one.
                if let Some(limit) = self.params.timeout {
                    self.idle += recv_timeout;
                    if self.idle >= limit {
                        info!(
                            channel = %self.channel,
                            ?limit,
                            "No data received within the timeout, ending live chat"
                        );
                        self.finished = true;
                    }
                }
            }
        }
        Ok(())
    }

    /// Opens a transport, performs the anonymous handshake and joins the
    /// channel, all under the bounded retry policy.
    async fn connect(&self) -> Result<TwitchIrc<C::Transport>> {
        run_with_retries(
            self.params.max_attempts,
            self.params.retry_timeout,
            &Deadline::none(),
            || {
                let connector = &self.connector;
                let channel = self.channel.as_str();
                async move {
                    let transport = connector.connect().await?;
                    let mut irc = TwitchIrc::handshake(transport).await?;
                    irc.join_channel(channel).await?;
                    Ok(irc)
                }
            },
        )
        .await
    }

    fn reset_connection(&mut self) {
        self.irc = None;
        self.buffer.clear();
    }

    async fn send_raw(&mut self, message: &str) -> std::io::Result<()> {
        match self.irc.as_mut() {
            Some(irc) => irc.send_raw(message).await,
            None => Ok(()),
        }
    }

    /// Parses every complete line out of the buffer into pending events.
    ///
    /// The idle counter is reset only when lines were actually matched;
    /// noise that clears without matching does not count as activity.
    fn drain_buffer(&mut self) {
        let (lines, rest) = split_buffer(&self.buffer);
        self.buffer = rest;
        if lines.is_empty() {
            return;
        }
        self.idle = Duration::ZERO;
        for line in &lines {
            let event = parse_irc_line(line, &self.badges);
            let missing: Vec<&str> = event
                .0
                .keys()
                .map(String::as_str)
                .filter(|key| !KNOWN_IRC_KEYS.contains(key))
                .collect();
            if !missing.is_empty() {
                debug!(
                    command = %line.command,
                    ?missing,
                    parsed = ?event,
                    "Parsed message contains unrecognised keys"
                );
            }
            if should_add(&event, &self.params.message_groups, &self.params.message_types) {
                self.pending.push_back(event);
            }
        }
    }

    /// Sends a bare `PING` when nothing has been sent for `ping_interval`.
    async fn maybe_ping(&mut self) {
        if self.last_ping.elapsed() > self.params.ping_interval {
            match self.send_raw("PING").await {
                Ok(()) => self.last_ping = Instant::now(),
                Err(error) => {
                    warn!(channel = %self.channel, %error, "Failed to send keepalive, reconnecting");
                    self.reset_connection();
                }
            }
        }
    }
}
