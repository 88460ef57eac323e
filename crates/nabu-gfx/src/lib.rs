//! nabu graphics pipeline crate.
//!
//! Application code records draw and compute work into a [`Frame`] through a
//! [`Context`]; a render thread (or the calling thread, in single-threaded mode)
//! replays the previous frame against a pluggable [`Backend`].
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`handle`] | generational handles and fixed-capacity allocators |
//! | [`command`] | resource lifecycle command stream |
//! | [`uniform`] | constant-update stream and render-side uniform table |
//! | [`sort_key`] | 64-bit sort keys and radix sort |
//! | [`frame`] | per-frame storage, draw/compute items |
//! | [`context`] | double-buffered frame boundary, resource API |
//! | [`backend`] | executor trait and the noop executor |
//!
//! # Quick start
//!
//! ```rust
//! use nabu_gfx::{Context, Init, Threading};
//!
//! let mut ctx = Context::init(Init::noop().threading(Threading::SingleThreaded)).unwrap();
//! ctx.set_view_rect(0, 0, 0, 1280, 720);
//! ctx.frame();
//! let report = ctx.shutdown();
//! assert!(report.is_clean());
//! ```

/// Declares a `#[repr(u8)]` enum together with a fallible decoder used by the
/// command and uniform streams.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl $name {
            #[inline]
            pub(crate) fn from_wire(value: u8) -> Result<Self, crate::error::ProtocolError> {
                match value {
                    $($value => Ok(Self::$variant),)*
                    _ => Err(crate::error::ProtocolError::InvalidEnum {
                        what: stringify!($name),
                        value,
                    }),
                }
            }
        }
    };
}

pub mod backend;
pub mod command;
pub mod context;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod handle;
pub mod limits;
pub mod logging;
pub mod resource;
pub mod sort_key;
pub mod state;
pub mod stats;
pub mod uniform;
pub mod view;

mod renderer;

pub use backend::{Backend, BackendFactory, BackendKind};
pub use context::{Context, ContextState, ShutdownReport};
pub use encoder::Encoder;
pub use error::{InitError, ProtocolError};
pub use frame::{Binding, ComputeItem, DrawItem, Frame, RenderItem, SortedItem};
pub use handle::{
    BufferHandle, FrameTargetHandle, Handle, HandleCounts, ProgramHandle, ShaderHandle,
    TextureHandle, UniformHandle, VertexLayoutHandle,
};
pub use limits::{Init, Limits, Threading};
pub use renderer::RenderFrame;
pub use resource::Memory;
pub use sort_key::{SortKey, ViewMode};
pub use state::{Discard, StateFlags};
pub use stats::FrameStats;
pub use uniform::{UniformTable, UniformType};
pub use view::{ViewId, ViewRect};
