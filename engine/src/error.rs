use thiserror::Error;

pub type Result<T> = std::result::Result<T, SealError>;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed envelope: {0}")]
    Format(String),

    #[error("salt in encrypted data does not match cached key salt")]
    SaltMismatch,

    #[error("authentication failed: wrong password or tampered data")]
    AuthenticationFailure,

    #[error("cryptographic primitive unavailable: {0}")]
    AlgorithmUnavailable(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// [`SealError`] 的无负载分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Format,
    SaltMismatch,
    AuthenticationFailure,
    AlgorithmUnavailable,
    Io,
}

impl SealError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Format(_) => ErrorKind::Format,
            Self::SaltMismatch => ErrorKind::SaltMismatch,
            Self::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            Self::AlgorithmUnavailable(_) => ErrorKind::AlgorithmUnavailable,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}
