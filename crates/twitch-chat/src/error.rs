use thiserror::Error;

/// Errors that can occur while retrieving Twitch chat
#[derive(Error, Debug)]
pub enum TwitchChatError {
    /// Network-level failure (socket, DNS, TLS, HTTP transport)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The configured overall timeout for the retrieval was exceeded
    #[error("Timeout exceeded: {0}")]
    TimeoutExceeded(String),

    /// All retry attempts for an operation were exhausted
    #[error("Failed after {attempts} attempts: {last_error}")]
    RetriesExceeded { attempts: u32, last_error: String },

    /// The backend answered, but not with the shape we expected
    #[error("Unexpected response: {0}")]
    UnexpectedResponseShape(String),

    /// The backend reported an explicit error payload
    #[error("Twitch error: {0}")]
    BackendReported(String),

    /// The requested content has no chat replay
    #[error("No chat replay: {0}")]
    NoReplayAvailable(String),

    /// A caller-supplied parameter was invalid
    #[error("Invalid parameter: {0}")]
    UnknownParameter(String),
}

impl TwitchChatError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::TimeoutExceeded(msg.into())
    }

    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        Self::UnexpectedResponseShape(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::BackendReported(msg.into())
    }

    pub fn no_replay<S: Into<String>>(msg: S) -> Self {
        Self::NoReplayAvailable(msg.into())
    }

    pub fn parameter<S: Into<String>>(msg: S) -> Self {
        Self::UnknownParameter(msg.into())
    }

    /// Whether a retry loop should swallow this error and try again.
    ///
    /// Only transient transport failures and malformed responses are worth
    /// retrying. Explicit backend errors, missing replays and bad parameters
    /// will not get better on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::UnexpectedResponseShape(_)
        )
    }
}

impl From<std::io::Error> for TwitchChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for TwitchChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::UnexpectedResponseShape(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TwitchChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::UnexpectedResponseShape(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TwitchChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TwitchChatError::transport("connection reset").is_retryable());
        assert!(TwitchChatError::unexpected("not json").is_retryable());

        assert!(!TwitchChatError::timeout("deadline hit").is_retryable());
        assert!(!TwitchChatError::backend("invalid request").is_retryable());
        assert!(!TwitchChatError::no_replay("vod deleted").is_retryable());
        assert!(!TwitchChatError::parameter("bad url").is_retryable());
        assert!(
            !TwitchChatError::RetriesExceeded {
                attempts: 3,
                last_error: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_io_error_maps_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: TwitchChatError = io.into();
        assert!(matches!(err, TwitchChatError::Transport(_)));
    }

    #[test]
    fn test_error_display() {
        let err = TwitchChatError::RetriesExceeded {
            attempts: 5,
            last_error: "boom".into(),
        };
        assert_eq!(err.to_string(), "Failed after 5 attempts: boom");
    }
}
