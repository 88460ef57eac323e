//! Per-item state recording.
//!
//! An [`Encoder`] borrows the context's recording frame. State set through it
//! accumulates until `submit` or `dispatch` snapshots it into an item.
//!
//! ```rust
//! use nabu_gfx::{Context, Init, Threading};
//! use nabu_gfx::resource::{BufferDesc, Memory, ShaderStage};
//!
//! let mut ctx = Context::init(Init::noop().threading(Threading::SingleThreaded)).unwrap();
//! let vs = ctx.create_shader(ShaderStage::Vertex, Memory::copy(b"vs"));
//! let fs = ctx.create_shader(ShaderStage::Fragment, Memory::copy(b"fs"));
//! let program = ctx.create_program(vs, fs);
//! let vb = ctx.create_buffer(Memory::copy(&[0u8; 48]), BufferDesc::default());
//!
//! let mut enc = ctx.encoder();
//! enc.set_vertex_buffer(vb, 0, 3);
//! assert_eq!(enc.submit(0, program, 0), 1);
//!
//! ctx.frame();
//! ctx.destroy_buffer(vb);
//! ctx.destroy_program(program);
//! ctx.destroy_shader(vs);
//! ctx.destroy_shader(fs);
//! assert!(ctx.shutdown().is_clean());
//! ```

use bytemuck::Pod;

use crate::context::Resources;
use crate::frame::{Binding, BufferRange, Frame, MAX_BINDINGS};
use crate::handle::{BufferHandle, ProgramHandle, TextureHandle, UniformHandle};
use crate::resource::Access;
use crate::state::{Discard, StateFlags, StencilState};
use crate::uniform::UniformType;
use crate::view::{ViewId, ViewRect};

pub struct Encoder<'a> {
    frame: &'a mut Frame,
    resources: &'a Resources,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(frame: &'a mut Frame, resources: &'a Resources) -> Self {
        Self { frame, resources }
    }

    /// Pipeline state and constant blend factor (`0xRRGGBBAA`).
    pub fn set_state(&mut self, state: StateFlags, blend_factor: u32) {
        self.frame.pending.state = state;
        self.frame.pending.blend_factor = blend_factor;
    }

    pub fn set_stencil(&mut self, stencil: StencilState) {
        self.frame.pending.stencil = stencil;
    }

    pub fn set_scissor(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.frame.pending.scissor = Some(ViewRect::new(x, y, width, height));
    }

    /// Copies `matrices` into the frame's transform cache and selects them.
    ///
    /// Returns the cache slot for reuse with [`set_transform_cached`]; when the
    /// cache is full the identity slot is used and a dropped call is counted.
    ///
    /// [`set_transform_cached`]: Self::set_transform_cached
    pub fn set_transform(&mut self, matrices: &[[f32; 16]]) -> u32 {
        let slot = self.frame.add_transforms(matrices);
        let (slot, count) = match slot {
            Some(slot) => (slot, matrices.len() as u16),
            None => (0, 1),
        };
        self.set_transform_cached(slot, count);
        slot
    }

    pub fn set_transform_cached(&mut self, slot: u32, count: u16) {
        self.frame.pending.transform = slot;
        self.frame.pending.transform_count = count;
    }

    pub fn set_vertex_buffer(&mut self, handle: BufferHandle, start: u32, count: u32) {
        self.check_buffer(handle);
        self.frame.pending.vertex = BufferRange {
            handle,
            start,
            count,
        };
    }

    pub fn set_index_buffer(&mut self, handle: BufferHandle, start: u32, count: u32) {
        self.check_buffer(handle);
        self.frame.pending.index = BufferRange {
            handle,
            start,
            count,
        };
    }

    pub fn set_instance_buffer(&mut self, handle: BufferHandle, start: u32, count: u32) {
        self.check_buffer(handle);
        self.frame.pending.instance = BufferRange {
            handle,
            start,
            count,
        };
        self.frame.pending.instance_count = count;
    }

    pub fn set_instance_count(&mut self, count: u32) {
        self.frame.pending.instance_count = count;
    }

    /// Binds `texture` at `stage` and points the `sampler` uniform at that stage.
    pub fn set_texture(
        &mut self,
        stage: u8,
        sampler: UniformHandle,
        texture: TextureHandle,
        flags: u32,
    ) {
        debug_assert!(
            self.resources.tables.textures.is_valid(texture),
            "set_texture with dead handle {texture:?}"
        );
        self.bind(
            stage,
            Binding::Texture {
                handle: texture,
                flags,
            },
        );
        self.set_uniform(sampler, &[stage as u32]);
    }

    /// Binds one mip of `texture` as a storage image.
    pub fn set_image(&mut self, stage: u8, texture: TextureHandle, mip: u8, access: Access) {
        debug_assert!(
            self.resources.tables.textures.is_valid(texture),
            "set_image with dead handle {texture:?}"
        );
        self.bind(
            stage,
            Binding::Image {
                handle: texture,
                mip,
                access,
            },
        );
    }

    /// Binds `buffer` as a storage buffer.
    pub fn set_buffer(&mut self, stage: u8, buffer: BufferHandle, access: Access) {
        self.check_buffer(buffer);
        self.bind(
            stage,
            Binding::Buffer {
                handle: buffer,
                access,
            },
        );
    }

    /// Writes `values` inline into the constant stream for the next item.
    ///
    /// The element count is derived from the byte length and the uniform type.
    pub fn set_uniform<T: Pod>(&mut self, handle: UniformHandle, values: &[T]) {
        let Some((ty, max)) = self.uniform_info(handle) else {
            return;
        };
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let count = bytes.len() / ty.size();
        debug_assert_eq!(bytes.len() % ty.size(), 0, "partial {ty:?} uniform value");
        if count == 0 {
            return;
        }
        let count = count.min(max as usize);
        let used = &bytes[..count * ty.size()];
        self.frame
            .uniforms
            .write_uniform(ty, handle.index(), used, count as u16);
    }

    /// References `handle` from the next item; the value is the one current
    /// when the frame is replayed, including later `update_uniform` calls in
    /// the same frame.
    pub fn bind_uniform(&mut self, handle: UniformHandle) {
        let Some((ty, count)) = self.uniform_info(handle) else {
            return;
        };
        self.frame
            .uniforms
            .write_uniform_handle(ty, handle.index(), handle, count);
    }

    /// Drops the state accumulated so far on the next `submit`/`dispatch`.
    pub fn discard(&mut self) {
        self.frame.discard();
    }

    /// Records a draw item in `view`. Returns the number of recorded items.
    pub fn submit(&mut self, view: ViewId, program: ProgramHandle, depth: u32) -> u32 {
        self.check_view(view);
        debug_assert!(
            self.resources.tables.programs.is_valid(program),
            "submit with dead program {program:?}"
        );
        let mode = self.resources.views[view as usize].mode;
        self.frame.submit(view, mode, program, depth)
    }

    /// Records a compute item in `view`. `flags` selects the state cleared afterwards.
    pub fn dispatch(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        groups: [u32; 3],
        flags: Discard,
    ) -> u32 {
        self.check_view(view);
        debug_assert!(
            self.resources.tables.programs.is_valid(program),
            "dispatch with dead program {program:?}"
        );
        self.frame.dispatch(view, program, groups, flags)
    }

    pub fn dropped_calls(&self) -> u32 {
        self.frame.dropped_calls()
    }

    fn bind(&mut self, stage: u8, binding: Binding) {
        assert!(
            (stage as usize) < MAX_BINDINGS,
            "binding stage {stage} out of range (max {MAX_BINDINGS})"
        );
        self.frame.pending.bindings[stage as usize] = binding;
    }

    fn uniform_info(&self, handle: UniformHandle) -> Option<(UniformType, u16)> {
        let info = self
            .resources
            .tables
            .uniforms
            .is_valid(handle)
            .then(|| self.resources.uniforms[handle.index() as usize])
            .flatten();
        debug_assert!(info.is_some(), "uniform write with dead handle {handle:?}");
        if info.is_none() {
            log::warn!("uniform write with dead handle {handle:?} ignored");
        }
        info
    }

    fn check_buffer(&self, handle: BufferHandle) {
        debug_assert!(
            self.resources.tables.buffers.is_valid(handle),
            "bind of dead buffer {handle:?}"
        );
    }

    fn check_view(&self, view: ViewId) {
        assert!(
            (view as usize) < self.resources.views.len(),
            "view {view} out of range (max_views {})",
            self.resources.views.len()
        );
    }
}
