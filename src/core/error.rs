use std::path::PathBuf;

use thiserror::Error;

pub type SdResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    #[error("Insufficient arguments")]
    InsufficientArguments,
    #[error("Too many arguments")]
    TooManyArguments,
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Unable to read symbol map {path:?}: {source}")]
    MapUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to open debug channel {path:?}: {source}")]
    ChannelOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Debug channel timed out")]
    ChannelTimeout,
    #[error("Debug channel closed by peer")]
    ChannelClosed,
    #[error("Command contains a NUL byte: {0:?}")]
    EmbeddedNul(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "cli")]
    #[error(transparent)]
    Readline(#[from] rustyline::error::ReadlineError),
}

impl Error {
    /// Errors after which the channel can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ChannelTimeout | Self::ChannelClosed | Self::ChannelOpen { .. } | Self::Io(_)
        )
    }
}
