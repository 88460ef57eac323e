use core::fmt;

use crate::backend::{self, Backend, BackendFactory, BackendKind};
use crate::error::InitError;
use crate::sort_key;
use crate::uniform;
use crate::view::{self, Resolution};

/// Fixed capacities chosen at initialization.
///
/// Every per-frame structure is allocated once from these values and never
/// grows. Exhausting a handle table, the command buffer or the uniform buffer is
/// fatal; exhausting `max_items` or `max_transforms` only drops the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Number of addressable views (at most 256).
    pub max_views: u16,
    /// Draw plus compute items per frame (at most 65536).
    pub max_items: u32,
    /// Matrices in the per-frame transform cache, including the identity slot.
    pub max_transforms: u32,
    /// Memory blobs (buffer/texture/shader payloads) per frame.
    pub max_memory_blobs: u32,
    /// Bytes reserved for each frame's command stream.
    pub command_buffer_size: usize,
    /// Bytes reserved for each frame's constant-update stream.
    pub uniform_buffer_size: usize,

    pub max_buffers: u16,
    pub max_shaders: u16,
    /// At most 1024; the program index is part of the sort key.
    pub max_programs: u16,
    pub max_textures: u16,
    /// At most 16384; the uniform index is the slot field of a uniform opcode.
    pub max_uniforms: u16,
    pub max_frame_targets: u16,
    pub max_vertex_layouts: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_views: 256,
            max_items: 4096,
            max_transforms: 4096,
            max_memory_blobs: 1024,
            command_buffer_size: 64 << 10,
            uniform_buffer_size: 1 << 20,
            max_buffers: 4096,
            max_shaders: 512,
            max_programs: 512,
            max_textures: 4096,
            max_uniforms: 512,
            max_frame_targets: 128,
            max_vertex_layouts: 64,
        }
    }
}

impl Limits {
    /// Checks the values against the widths of the sort key and uniform opcode.
    pub fn validate(&self) -> Result<(), InitError> {
        let fail = |msg: String| Err(InitError::InvalidLimits(msg));

        if self.max_views == 0 || self.max_views as usize > view::MAX_VIEWS {
            return fail(format!("max_views must be in 1..={}", view::MAX_VIEWS));
        }
        if self.max_items == 0 || self.max_items > sort_key::MAX_SEQUENCE + 1 {
            return fail(format!(
                "max_items must be in 1..={}",
                sort_key::MAX_SEQUENCE + 1
            ));
        }
        if self.max_programs as u32 > sort_key::MAX_PROGRAMS {
            return fail(format!(
                "max_programs must not exceed {}",
                sort_key::MAX_PROGRAMS
            ));
        }
        if self.max_uniforms as u32 > uniform::MAX_SLOT as u32 + 1 {
            return fail(format!(
                "max_uniforms must not exceed {}",
                uniform::MAX_SLOT as u32 + 1
            ));
        }
        if self.max_transforms == 0 {
            return fail("max_transforms must reserve the identity slot".into());
        }
        if self.command_buffer_size < 64 || self.uniform_buffer_size < 64 {
            return fail("stream sizes must be at least 64 bytes".into());
        }
        Ok(())
    }
}

/// Where the backend executor runs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Threading {
    /// `Context::frame` replays the frame on the calling thread.
    SingleThreaded,
    /// A dedicated render thread replays one frame while the next is recorded.
    #[default]
    RenderThread,
}

/// Initialization parameters for a [`Context`](crate::Context).
pub struct Init {
    pub backend: BackendKind,
    pub threading: Threading,
    pub limits: Limits,
    pub resolution: Resolution,
    pub(crate) factory: BackendFactory,
}

impl Init {
    /// Uses `factory` to construct the backend on the render side.
    pub fn new<F>(backend: BackendKind, factory: F) -> Self
    where
        F: FnOnce(&Limits) -> anyhow::Result<Box<dyn Backend>> + Send + 'static,
    {
        Self {
            backend,
            threading: Threading::default(),
            limits: Limits::default(),
            resolution: Resolution::default(),
            factory: Box::new(factory),
        }
    }

    /// Headless configuration backed by [`backend::noop::NoopBackend`].
    pub fn noop() -> Self {
        Self::new(BackendKind::Noop, backend::noop::factory)
    }

    pub fn threading(mut self, threading: Threading) -> Self {
        self.threading = threading;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution { width, height };
        self
    }
}

impl fmt::Debug for Init {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Init")
            .field("backend", &self.backend)
            .field("threading", &self.threading)
            .field("limits", &self.limits)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_valid() {
        Limits::default().validate().unwrap();
    }

    #[test]
    fn too_many_programs_rejected() {
        let limits = Limits {
            max_programs: 2048,
            ..Limits::default()
        };
        assert!(matches!(limits.validate(), Err(InitError::InvalidLimits(_))));
    }

    #[test]
    fn item_count_bounded_by_sequence_width() {
        let ok = Limits {
            max_items: 65536,
            ..Limits::default()
        };
        ok.validate().unwrap();

        let too_many = Limits {
            max_items: 65537,
            ..Limits::default()
        };
        assert!(too_many.validate().is_err());
    }
}
