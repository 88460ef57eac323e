//! Backend executor interface.
//!
//! A backend owns every native object and translates the abstract resource,
//! format and state values into its API. It lives entirely on the render side:
//! it is constructed there by a [`BackendFactory`] when the `RendererInit`
//! command executes, and is dropped there on `RendererShutdownEnd`.

pub mod noop;

use crate::frame::Frame;
use crate::handle::{
    BufferHandle, FrameTargetHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformHandle,
    VertexLayoutHandle,
};
use crate::limits::Limits;
use crate::resource::{BufferDesc, ShaderStage, TextureDesc, TextureRegion, VertexLayout};
use crate::uniform::{UniformTable, UniformType};

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub enum BackendKind {
        /// Accepts every call and draws nothing.
        #[default]
        Noop = 0,
        /// Supplied by the application through [`Init::new`](crate::Init::new).
        Custom = 1,
    }
}

/// Builds the backend on the render side.
pub type BackendFactory = Box<dyn FnOnce(&Limits) -> anyhow::Result<Box<dyn Backend>> + Send>;

/// One method per resource lifecycle command plus frame replay.
///
/// Backends must be `Send` so a context can move between threads; each one is
/// still only ever called from the render side.
///
/// Calls arrive in command-stream order, then [`submit`](Backend::submit)
/// once per frame, then [`flip`](Backend::flip). Handles passed to `destroy_*`
/// are never referenced again by later frames until recreated.
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    fn create_vertex_layout(&mut self, handle: VertexLayoutHandle, layout: &VertexLayout);
    fn destroy_vertex_layout(&mut self, handle: VertexLayoutHandle);

    fn create_buffer(&mut self, handle: BufferHandle, desc: &BufferDesc, data: &[u8]);
    fn update_buffer(&mut self, handle: BufferHandle, offset: u32, data: &[u8]);
    fn destroy_buffer(&mut self, handle: BufferHandle);

    fn create_shader(&mut self, handle: ShaderHandle, stage: ShaderStage, code: &[u8]);
    fn destroy_shader(&mut self, handle: ShaderHandle);

    /// `fs` is `INVALID` for compute programs.
    fn create_program(&mut self, handle: ProgramHandle, vs: ShaderHandle, fs: ShaderHandle);
    fn destroy_program(&mut self, handle: ProgramHandle);

    fn create_texture(&mut self, handle: TextureHandle, desc: &TextureDesc, data: Option<&[u8]>);
    fn update_texture(&mut self, handle: TextureHandle, region: &TextureRegion, data: &[u8]);
    fn destroy_texture(&mut self, handle: TextureHandle);

    fn create_uniform(&mut self, handle: UniformHandle, ty: UniformType, count: u16);
    fn destroy_uniform(&mut self, handle: UniformHandle);

    fn create_frame_target(&mut self, handle: FrameTargetHandle, attachments: &[TextureHandle]);
    fn destroy_frame_target(&mut self, handle: FrameTargetHandle);

    /// Replays the sorted frame.
    ///
    /// Iterate [`Frame::sorted`] for the item order and [`Frame::uniforms`]
    /// for each item's constants. The frame must not be modified.
    fn submit(&mut self, frame: &Frame, uniforms: &UniformTable);

    /// Presents the finished frame.
    fn flip(&mut self);
}
