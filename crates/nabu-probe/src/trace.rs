//! Backend that counts what it is asked to do and logs a summary per frame.

use std::collections::HashMap;

use nabu_gfx::limits::Limits;
use nabu_gfx::resource::{BufferDesc, ShaderStage, TextureDesc, TextureRegion, VertexLayout};
use nabu_gfx::{
    Backend, BackendKind, BufferHandle, Frame, FrameTargetHandle, ProgramHandle, RenderItem,
    ShaderHandle, TextureHandle, UniformHandle, UniformTable, UniformType, VertexLayoutHandle,
    ViewId,
};

#[derive(Debug)]
pub struct TraceBackend {
    live: HashMap<&'static str, i64>,
    /// Kind each live texture slot was counted under.
    textures: HashMap<u16, &'static str>,
    uploaded: usize,
    frames: u64,
    log_every: u64,
    /// Items per view of the last submitted frame, in replay order.
    per_view: Vec<(ViewId, u32)>,
}

impl TraceBackend {
    pub fn factory(
        log_every: u64,
    ) -> impl FnOnce(&Limits) -> anyhow::Result<Box<dyn Backend>> + Send + 'static {
        move |limits| {
            log::info!(
                "trace backend: {} items, {} views",
                limits.max_items,
                limits.max_views
            );
            Ok(Box::new(TraceBackend::new(log_every, limits.max_views)) as Box<dyn Backend>)
        }
    }

    fn new(log_every: u64, max_views: u16) -> Self {
        TraceBackend {
            live: HashMap::new(),
            textures: HashMap::new(),
            uploaded: 0,
            frames: 0,
            log_every: log_every.max(1),
            per_view: Vec::with_capacity(max_views as usize),
        }
    }

    fn created(&mut self, kind: &'static str, bytes: usize) {
        *self.live.entry(kind).or_default() += 1;
        self.uploaded += bytes;
    }

    fn destroyed(&mut self, kind: &'static str) {
        let live = self.live.entry(kind).or_default();
        *live -= 1;
        if *live < 0 {
            log::error!("backend saw more {kind} destroys than creates");
        }
    }
}

impl Drop for TraceBackend {
    fn drop(&mut self) {
        let mut live: Vec<_> = self.live.iter().filter(|(_, n)| **n != 0).collect();
        live.sort();
        if live.is_empty() {
            log::info!(
                "trace backend: {} frames, {} bytes uploaded, nothing left alive",
                self.frames,
                self.uploaded
            );
        } else {
            log::warn!("trace backend dropped with live objects: {live:?}");
        }
    }
}

impl Backend for TraceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom
    }

    fn create_vertex_layout(&mut self, _: VertexLayoutHandle, layout: &VertexLayout) {
        log::debug!("vertex layout stride {}", layout.stride);
        self.created("vertex layout", 0);
    }

    fn destroy_vertex_layout(&mut self, _: VertexLayoutHandle) {
        self.destroyed("vertex layout");
    }

    fn create_buffer(&mut self, handle: BufferHandle, _: &BufferDesc, data: &[u8]) {
        log::debug!("create {handle:?}, {} bytes", data.len());
        self.created("buffer", data.len());
    }

    fn update_buffer(&mut self, _: BufferHandle, _: u32, data: &[u8]) {
        self.uploaded += data.len();
    }

    fn destroy_buffer(&mut self, _: BufferHandle) {
        self.destroyed("buffer");
    }

    fn create_shader(&mut self, handle: ShaderHandle, stage: ShaderStage, code: &[u8]) {
        log::debug!("create {stage:?} {handle:?}");
        self.created("shader", code.len());
    }

    fn destroy_shader(&mut self, _: ShaderHandle) {
        self.destroyed("shader");
    }

    fn create_program(&mut self, _: ProgramHandle, _: ShaderHandle, _: ShaderHandle) {
        self.created("program", 0);
    }

    fn destroy_program(&mut self, _: ProgramHandle) {
        self.destroyed("program");
    }

    fn create_texture(&mut self, handle: TextureHandle, desc: &TextureDesc, data: Option<&[u8]>) {
        log::debug!(
            "create {handle:?} {}x{} {:?}",
            desc.width,
            desc.height,
            desc.format
        );
        let kind = if desc.format.is_depth() {
            "depth texture"
        } else if desc.format.is_compressed() {
            "compressed texture"
        } else {
            "texture"
        };
        self.textures.insert(handle.index(), kind);
        self.created(kind, data.map_or(0, <[u8]>::len));
    }

    fn update_texture(&mut self, _: TextureHandle, _: &TextureRegion, data: &[u8]) {
        self.uploaded += data.len();
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        let kind = self.textures.remove(&handle.index()).unwrap_or("texture");
        self.destroyed(kind);
    }

    fn create_uniform(&mut self, _: UniformHandle, _: UniformType, _: u16) {
        self.created("uniform", 0);
    }

    fn destroy_uniform(&mut self, _: UniformHandle) {
        self.destroyed("uniform");
    }

    fn create_frame_target(&mut self, handle: FrameTargetHandle, attachments: &[TextureHandle]) {
        log::debug!("create {handle:?} with {} attachments", attachments.len());
        self.created("frame target", 0);
    }

    fn destroy_frame_target(&mut self, _: FrameTargetHandle) {
        self.destroyed("frame target");
    }

    fn submit(&mut self, frame: &Frame, uniforms: &UniformTable) {
        self.per_view.clear();
        let mut constants = 0;
        let mut matrices = 0;
        let mut stenciled = 0;
        for sorted in frame.sorted() {
            match self.per_view.last_mut() {
                Some((view, n)) if *view == sorted.view => *n += 1,
                _ => self.per_view.push((sorted.view, 1)),
            }
            if let RenderItem::Draw(draw) = sorted.item {
                if !frame.view(sorted.view).rect.is_empty() && !draw.vertex.is_bound() {
                    log::trace!("draw without vertex buffer in view {}", sorted.view);
                }
                matrices += frame.transforms(draw.transform, draw.transform_count).len();
                if draw.stencil.is_enabled() {
                    stenciled += 1;
                }
            }
            constants += frame
                .uniforms(sorted.item.constants(), uniforms)
                .map(|u| u.data.len())
                .sum::<usize>();
        }

        if frame.number() % self.log_every == 0 {
            log::info!(
                "frame {}: views {:?}, {matrices} matrices, {stenciled} stenciled draws, {constants} constant bytes",
                frame.number(),
                self.per_view
            );
        }
    }

    fn flip(&mut self) {
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nabu_gfx::resource::TextureFormat;

    #[test]
    fn factory_builds_a_trace_backend() {
        let backend = TraceBackend::factory(0)(&Limits::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Custom);
    }

    #[test]
    fn textures_are_counted_by_format_class() {
        let mut backend = TraceBackend::new(1, 4);
        let color = TextureHandle::from_bits(0);
        let depth = TextureHandle::from_bits(1);

        backend.create_texture(color, &TextureDesc::new_2d(4, 4, TextureFormat::Rgba8), None);
        backend.create_texture(depth, &TextureDesc::new_2d(4, 4, TextureFormat::D24S8), None);
        assert_eq!(backend.live["texture"], 1);
        assert_eq!(backend.live["depth texture"], 1);

        backend.destroy_texture(depth);
        backend.destroy_texture(color);
        assert!(backend.live.values().all(|&n| n == 0));
        assert!(backend.textures.is_empty());
    }

    #[test]
    fn uploads_accumulate() {
        let mut backend = TraceBackend::new(1, 4);
        let buffer = BufferHandle::from_bits(0);
        backend.create_buffer(buffer, &BufferDesc::default(), &[0; 16]);
        backend.update_buffer(buffer, 0, &[0; 8]);
        backend.destroy_buffer(buffer);
        assert_eq!(backend.uploaded, 24);
        assert_eq!(backend.live["buffer"], 0);
    }
}
