//! The live chat path: transport, line parsing and the streaming loop.

pub mod parser;
pub mod stream;
pub mod transport;

pub use parser::{parse_irc_line, split_buffer};
pub use stream::LiveChatStream;
pub use transport::{Connector, TcpConnector, Transport, TwitchIrc};
