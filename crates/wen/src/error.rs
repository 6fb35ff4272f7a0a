use thiserror::Error;

/// Everything that can go wrong while driving a link.
///
/// Surfaced either as an immediate `Err` from an API call or as an
/// [`Event::Error`](crate::Event::Error) out of `poll`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkError {
    #[error("transport read or write failed")]
    Io,
    #[error("malformed wire data or failed handshake")]
    Protocol,
    #[error("buffer, arena or event queue capacity exhausted")]
    Overflow,
    #[error("operation not valid in the current link state")]
    State,
    #[error("no codec attached or operation not implemented by the codec")]
    Unsupported,
    #[error("link already closed")]
    Closed,
}
