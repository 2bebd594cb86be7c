//! Twitch chat retrieval library.
//!
//! This crate reads chat from Twitch live streams over IRC and replays chat
//! for VODs and clips through the comments API, normalising both into the
//! same event shape.
//!
//! ## Core Types
//!
//! - [`TwitchChatDownloader`] - Entry point resolving URLs into chats
//! - [`Chat`] - An open retrieval yielding events lazily
//! - [`ChatParams`] - Tuning knobs: time window, timeouts, retries, filters
//! - [`ChatEvent`] - One chat message or room action, as loose JSON
//!
//! ## Live and Replay
//!
//! - [`LiveChatStream`] - The IRC read loop for live channels
//! - [`ReplayChatStream`] - Cursor-paged comment replay for VODs and clips
//!
//! ## Backend Access
//!
//! - [`TwitchApi`] - GQL metadata, comment pages and browse queries
//! - [`BadgeCatalog`] - Global badge metadata folded into events

pub mod api;
pub mod badges;
pub mod client;
pub mod error;
pub mod event;
pub mod filter;
pub mod irc;
pub mod remap;
pub mod replay;
pub mod retry;
pub mod utils;

pub use api::{ClipInfo, GqlOperation, StreamInfo, TwitchApi, VideoInfo};
pub use badges::BadgeCatalog;
pub use client::{Chat, ChatParams, ContentRef, TwitchChatDownloader};
pub use error::{Result, TwitchChatError};
pub use event::ChatEvent;
pub use irc::{LiveChatStream, TcpConnector};
pub use replay::{ApiPageSource, PageSource, ReplayChatStream};
