//! Backend that accepts every call and does nothing.

use super::{Backend, BackendKind};
use crate::frame::{Frame, RenderItem};
use crate::handle::{
    BufferHandle, FrameTargetHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformHandle,
    VertexLayoutHandle,
};
use crate::limits::Limits;
use crate::resource::{BufferDesc, ShaderStage, TextureDesc, TextureRegion, VertexLayout};
use crate::uniform::{UniformTable, UniformType};

/// Headless executor; it still walks every item and its constants so stream
/// corruption surfaces without a GPU.
#[derive(Debug, Default)]
pub struct NoopBackend;

/// [`BackendFactory`](super::BackendFactory) for [`NoopBackend`].
pub fn factory(_limits: &Limits) -> anyhow::Result<Box<dyn Backend>> {
    Ok(Box::new(NoopBackend))
}

impl Backend for NoopBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Noop
    }

    fn create_vertex_layout(&mut self, _: VertexLayoutHandle, _: &VertexLayout) {}
    fn destroy_vertex_layout(&mut self, _: VertexLayoutHandle) {}

    fn create_buffer(&mut self, _: BufferHandle, _: &BufferDesc, _: &[u8]) {}
    fn update_buffer(&mut self, _: BufferHandle, _: u32, _: &[u8]) {}
    fn destroy_buffer(&mut self, _: BufferHandle) {}

    fn create_shader(&mut self, _: ShaderHandle, _: ShaderStage, _: &[u8]) {}
    fn destroy_shader(&mut self, _: ShaderHandle) {}

    fn create_program(&mut self, _: ProgramHandle, _: ShaderHandle, _: ShaderHandle) {}
    fn destroy_program(&mut self, _: ProgramHandle) {}

    fn create_texture(&mut self, _: TextureHandle, _: &TextureDesc, _: Option<&[u8]>) {}
    fn update_texture(&mut self, _: TextureHandle, _: &TextureRegion, _: &[u8]) {}
    fn destroy_texture(&mut self, _: TextureHandle) {}

    fn create_uniform(&mut self, _: UniformHandle, _: UniformType, _: u16) {}
    fn destroy_uniform(&mut self, _: UniformHandle) {}

    fn create_frame_target(&mut self, _: FrameTargetHandle, _: &[TextureHandle]) {}
    fn destroy_frame_target(&mut self, _: FrameTargetHandle) {}

    fn submit(&mut self, frame: &Frame, uniforms: &UniformTable) {
        let mut draws = 0u32;
        for sorted in frame.sorted() {
            if let RenderItem::Draw(_) = sorted.item {
                draws += 1;
            }
            for _ in frame.uniforms(sorted.item.constants(), uniforms) {}
        }
        log::trace!("noop: frame {} replayed {draws} draws", frame.number());
    }

    fn flip(&mut self) {}
}
