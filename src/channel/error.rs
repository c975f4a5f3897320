//! Channel error taxonomy, per `spec.md` §4.2/§7.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("bad mode/permission combination")]
    BadModeFlags,

    #[error("bad info string: {0}")]
    BadInfoString(String),

    #[error("unsupported mode for this scheme")]
    BadMode,

    #[error("bad open argument: {0}")]
    BadOpenArg(String),

    #[error("bad memory-map size")]
    BadMmapSize,

    #[error("short write: wrote {wrote} of {requested} bytes")]
    ShortWrite { wrote: usize, requested: usize },

    #[error("unable to connect: {0}")]
    UnableToConnect(String),

    #[error("bad descriptor")]
    BadDescriptor,

    #[error("stream exhausted")]
    Eof,

    #[error("unknown scheme: {0}")]
    UnknownScheme(String),

    #[error("operation not seekable on this back-end")]
    NotSeekable,

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ChannelError::Eof
        } else {
            ChannelError::Io(e.to_string())
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
