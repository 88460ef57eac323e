//! Error types.
//!
//! Three classes of failure exist:
//! - [`InitError`]: recoverable, returned from `Context::init`
//! - [`ProtocolError`]: a malformed command or uniform stream
//! - [`Fatal`]: configuration too small or a broken stream; reported through [`fatal`],
//!   which logs and panics

use crate::backend::BackendKind;
use crate::handle::ResourceType;

/// Failure while bringing up a [`Context`](crate::Context).
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// A `Limits` value is outside what the key and opcode layouts can address.
    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    /// The render thread could not be spawned.
    #[error("failed to spawn render thread")]
    Spawn(#[source] std::io::Error),

    /// The backend factory returned an error on the render side.
    #[error("{kind:?} backend failed to initialize")]
    Backend {
        kind: BackendKind,
        #[source]
        source: anyhow::Error,
    },
}

/// A violation of the command or uniform stream format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown command tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("read of {len} bytes at offset {offset} runs past end of stream ({end} bytes written)")]
    ReadPastEnd { offset: usize, len: usize, end: usize },

    #[error("invalid {what} value {value}")]
    InvalidEnum { what: &'static str, value: u8 },

    #[error("stream reset without a terminating End record")]
    Unterminated,

    #[error("indirect uniform record references missing uniform slot {0}")]
    MissingUniform(u16),
}

/// Unrecoverable pipeline conditions.
#[derive(Debug, thiserror::Error)]
pub enum Fatal {
    #[error("{kind:?} handle table exhausted ({capacity} slots)")]
    HandleTableFull { kind: ResourceType, capacity: u16 },

    #[error("command buffer overflow: {needed} bytes needed, {remaining} remaining")]
    CommandBufferOverflow { needed: usize, remaining: usize },

    #[error("uniform buffer overflow: {needed} bytes needed, {remaining} remaining")]
    UniformBufferOverflow { needed: usize, remaining: usize },

    #[error("memory table full ({capacity} blobs per frame)")]
    MemoryTableFull { capacity: usize },

    #[error("render thread terminated unexpectedly")]
    RenderThreadLost,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Logs `err` and aborts the current thread.
///
/// The frame handshake cannot resume after any of these conditions, so there is
/// no partial-success path.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: impl Into<Fatal>) -> ! {
    let err = err.into();
    log::error!("fatal: {err}");
    panic!("nabu fatal error: {err}");
}
