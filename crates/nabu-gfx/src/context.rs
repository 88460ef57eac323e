//! The pipeline context.
//!
//! [`Context`] owns the recording frame, the handle tables and the per-view
//! state, and drives the frame boundary. The other frame is either on the
//! render thread or parked inside the context, depending on [`Threading`].
//!
//! Frame ownership moves through two depth-1 channels: `ready` carries a
//! recorded frame to the render thread, `done` carries it back once executed.
//! At most one frame is in flight while the next is recorded.

use std::mem;
use std::thread::{self, JoinHandle};

use bytemuck::Pod;
use flume::{Receiver, Sender};

use crate::backend::BackendKind;
use crate::command::{Attachments, Command};
use crate::encoder::Encoder;
use crate::error::{Fatal, InitError, fatal};
use crate::frame::{Frame, Freed};
use crate::handle::{
    BufferHandle, FrameTargetHandle, Handle, HandleAllocator, HandleCounts, HandleTables,
    ProgramHandle, ResourceKind, ResourceType, ShaderHandle, TextureHandle, UniformHandle,
    VertexLayoutHandle,
};
use crate::limits::{Init, Limits, Threading};
use crate::renderer::{RenderFrame, RenderLoop, Renderer, RendererStatus};
use crate::resource::{BufferDesc, Memory, ShaderStage, TextureDesc, TextureRegion, VertexLayout};
use crate::sort_key::ViewMode;
use crate::stats::FrameStats;
use crate::uniform::{MAX_COUNT, UniformType};
use crate::view::{self, Clear, ClearFlags, Resolution, View, ViewId, ViewRect};

const RENDER_THREAD_NAME: &str = "nabu-render";

/// Lifecycle of a [`Context`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContextState {
    Uninitialized,
    Initializing,
    Running,
    ShuttingDown,
}

/// Outcome of [`Context::shutdown`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ShutdownReport {
    /// Frame boundaries crossed over the context's lifetime.
    pub frames: u64,
    /// Handles still live when the tables were torn down.
    pub leaks: HandleCounts,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.leaks.total() == 0
    }
}

/// Submission-side resource bookkeeping, readable by [`Encoder`].
pub(crate) struct Resources {
    pub tables: HandleTables,
    /// Type and element count per uniform slot.
    pub uniforms: Vec<Option<(UniformType, u16)>>,
    pub views: Vec<View>,
    pub view_remap: Vec<ViewId>,
    pub resolution: Resolution,
}

enum Pipeline {
    /// The render step runs inside `frame()`; `rendered` holds the frame it
    /// last executed.
    Inline {
        renderer: Renderer,
        rendered: Option<Box<Frame>>,
    },
    Threaded {
        ready: Sender<Box<Frame>>,
        done: Receiver<Box<Frame>>,
        thread: Option<JoinHandle<()>>,
    },
}

pub struct Context {
    state: ContextState,
    backend: BackendKind,
    limits: Limits,
    submit: Box<Frame>,
    pipeline: Pipeline,
    resources: Resources,
    frame_count: u64,
    last_stats: FrameStats,
}

impl Context {
    /// Brings up the pipeline and constructs the backend on the render side.
    ///
    /// Returns once the backend reported success or failure. On failure the
    /// render side is torn down before the error is returned.
    pub fn init(init: Init) -> Result<Self, InitError> {
        init.limits.validate()?;

        let Init {
            backend,
            threading,
            limits,
            resolution,
            factory,
        } = init;

        log::info!("initializing {backend:?} context ({threading:?})");

        let submit = Box::new(Frame::new(&limits));
        let spare = Box::new(Frame::new(&limits));
        let renderer = Renderer::new(factory, limits.clone());

        let pipeline = match threading {
            Threading::SingleThreaded => Pipeline::Inline {
                renderer,
                rendered: Some(spare),
            },
            Threading::RenderThread => {
                let (ready_tx, ready_rx) = flume::bounded(1);
                let (done_tx, done_rx) = flume::bounded(1);
                // The spare frame is "already rendered", so the first boundary
                // does not block.
                if done_tx.send(spare).is_err() {
                    fatal(Fatal::RenderThreadLost);
                }

                let thread = thread::Builder::new()
                    .name(RENDER_THREAD_NAME.into())
                    .spawn(move || RenderLoop::new(renderer, ready_rx, done_tx).run())
                    .map_err(InitError::Spawn)?;

                Pipeline::Threaded {
                    ready: ready_tx,
                    done: done_rx,
                    thread: Some(thread),
                }
            }
        };

        let max_views = limits.max_views as usize;
        let resources = Resources {
            tables: HandleTables::new(&limits),
            uniforms: vec![None; limits.max_uniforms as usize],
            views: vec![View::default(); max_views],
            view_remap: (0..max_views).map(|v| v as ViewId).collect(),
            resolution,
        };

        let mut ctx = Self {
            state: ContextState::Initializing,
            backend,
            limits,
            submit,
            pipeline,
            resources,
            frame_count: 0,
            last_stats: FrameStats::default(),
        };

        Command::RendererInit { kind: backend }.encode(&mut ctx.submit.commands);
        // First boundary executes the init command, the second hands back the
        // frame carrying its result.
        ctx.frame();
        ctx.frame();

        let source = match mem::take(&mut ctx.submit.status) {
            RendererStatus::Ready => {
                ctx.state = ContextState::Running;
                log::info!("context running");
                return Ok(ctx);
            }
            RendererStatus::Failed(source) => source,
            RendererStatus::Pending => anyhow::anyhow!("renderer never reported its status"),
        };

        ctx.state = ContextState::ShuttingDown;
        Command::RendererShutdownEnd.encode(&mut ctx.submit.commands);
        ctx.frame();
        ctx.join();
        ctx.state = ContextState::Uninitialized;
        Err(InitError::Backend {
            kind: backend,
            source,
        })
    }

    /// Ends the current recording interval.
    ///
    /// Blocks until the render side finished the previous frame, hands it the
    /// frame just recorded and starts recording into the one it returned.
    /// Returns the new frame count.
    pub fn frame(&mut self) -> u64 {
        // (a) wait for the previous render frame
        let next = match &mut self.pipeline {
            Pipeline::Inline { rendered, .. } => rendered.take(),
            Pipeline::Threaded { done, .. } => done.recv().ok(),
        };
        let Some(next) = next else {
            fatal(Fatal::RenderThreadLost);
        };

        // (b) snapshot view state into the recorded frame
        self.submit.capture_views(
            &self.resources.views,
            &self.resources.view_remap,
            self.resources.resolution,
        );
        self.submit.number = self.frame_count;
        self.submit.finish();

        // (c) swap
        let mut recorded = mem::replace(&mut self.submit, next);

        // (d) release the render side
        match &mut self.pipeline {
            Pipeline::Inline { renderer, rendered } => {
                if renderer.execute(&mut recorded) == RenderFrame::Exiting {
                    log::debug!("inline renderer exited");
                }
                *rendered = Some(recorded);
            }
            Pipeline::Threaded { ready, .. } => {
                if ready.send(recorded).is_err() {
                    fatal(Fatal::RenderThreadLost);
                }
            }
        }

        // (e) recycle the returned frame and apply its deferred frees
        self.last_stats = self.submit.stats;
        self.submit.start();
        self.apply_deferred_frees();

        // (f)
        self.frame_count += 1;
        log::trace!("frame boundary {}", self.frame_count);
        self.frame_count
    }

    /// Drains the pipeline, stops the backend and reports leaked handles.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.shutdown_in_place()
    }

    fn shutdown_in_place(&mut self) -> ShutdownReport {
        log::info!("context shutting down after {} frames", self.frame_count);
        self.state = ContextState::ShuttingDown;

        // Two boundaries: the recorded frame executes and the frees deferred
        // in it are written into the next stream.
        self.frame();
        self.frame();

        Command::RendererShutdownBegin.encode(&mut self.submit.commands);
        self.frame();
        Command::RendererShutdownEnd.encode(&mut self.submit.commands);
        self.frame();
        self.join();

        let leaks = self.resources.tables.counts();
        report_leaks(&self.resources.tables, &leaks);
        self.state = ContextState::Uninitialized;

        ShutdownReport {
            frames: self.frame_count,
            leaks,
        }
    }

    fn join(&mut self) {
        let Pipeline::Threaded { thread, .. } = &mut self.pipeline else {
            return;
        };
        if let Some(handle) = thread.take() {
            if handle.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }

    fn apply_deferred_frees(&mut self) {
        let frame = &mut *self.submit;
        let tables = &mut self.resources.tables;

        for freed in frame.free_list.drain(..) {
            let command = match freed {
                Freed::VertexLayout(handle) => {
                    tables.vertex_layouts.free(handle);
                    Command::DestroyVertexLayout { handle }
                }
                Freed::Buffer(handle) => {
                    tables.buffers.free(handle);
                    Command::DestroyBuffer { handle }
                }
                Freed::Shader(handle) => {
                    tables.shaders.free(handle);
                    Command::DestroyShader { handle }
                }
                Freed::Program(handle) => {
                    tables.programs.free(handle);
                    Command::DestroyProgram { handle }
                }
                Freed::Texture(handle) => {
                    tables.textures.free(handle);
                    Command::DestroyTexture { handle }
                }
                Freed::Uniform(handle) => {
                    tables.uniforms.free(handle);
                    self.resources.uniforms[handle.index() as usize] = None;
                    Command::DestroyUniform { handle }
                }
                Freed::FrameTarget(handle) => {
                    tables.frame_targets.free(handle);
                    Command::DestroyFrameTarget { handle }
                }
            };
            command.encode(&mut frame.commands);
        }
    }

    fn defer_free(&mut self, freed: Freed) {
        self.submit.free_list.push(freed);
    }

    fn record(&mut self, command: Command<'_>) {
        command.encode(&mut self.submit.commands);
    }

    // Resources.

    pub fn create_vertex_layout(&mut self, layout: &VertexLayout) -> VertexLayoutHandle {
        let handle = alloc(&mut self.resources.tables.vertex_layouts);
        self.record(Command::CreateVertexLayout {
            handle,
            layout: *layout,
        });
        handle
    }

    pub fn destroy_vertex_layout(&mut self, handle: VertexLayoutHandle) {
        retire(&mut self.resources.tables.vertex_layouts, handle);
        self.defer_free(Freed::VertexLayout(handle));
    }

    /// Creates a buffer initialized with `data`.
    ///
    /// A zero `desc.size` takes the size from `data`.
    pub fn create_buffer(&mut self, data: Memory, mut desc: BufferDesc) -> BufferHandle {
        let handle = alloc(&mut self.resources.tables.buffers);
        if desc.size == 0 {
            desc.size = data.len() as u32;
        }
        let memory = self.submit.memories.push(data);
        self.record(Command::CreateBuffer {
            handle,
            desc,
            memory,
        });
        handle
    }

    pub fn update_buffer(&mut self, handle: BufferHandle, offset: u32, data: Memory) {
        check(&self.resources.tables.buffers, handle);
        let memory = self.submit.memories.push(data);
        self.record(Command::UpdateBuffer {
            handle,
            offset,
            memory,
        });
    }

    pub fn destroy_buffer(&mut self, handle: BufferHandle) {
        retire(&mut self.resources.tables.buffers, handle);
        self.defer_free(Freed::Buffer(handle));
    }

    pub fn create_shader(&mut self, stage: ShaderStage, code: Memory) -> ShaderHandle {
        let handle = alloc(&mut self.resources.tables.shaders);
        let memory = self.submit.memories.push(code);
        self.record(Command::CreateShader {
            handle,
            stage,
            memory,
        });
        handle
    }

    pub fn destroy_shader(&mut self, handle: ShaderHandle) {
        retire(&mut self.resources.tables.shaders, handle);
        self.defer_free(Freed::Shader(handle));
    }

    pub fn create_program(&mut self, vs: ShaderHandle, fs: ShaderHandle) -> ProgramHandle {
        check(&self.resources.tables.shaders, vs);
        check(&self.resources.tables.shaders, fs);
        let handle = alloc(&mut self.resources.tables.programs);
        self.record(Command::CreateProgram { handle, vs, fs });
        handle
    }

    pub fn create_compute_program(&mut self, cs: ShaderHandle) -> ProgramHandle {
        check(&self.resources.tables.shaders, cs);
        let handle = alloc(&mut self.resources.tables.programs);
        self.record(Command::CreateProgram {
            handle,
            vs: cs,
            fs: ShaderHandle::INVALID,
        });
        handle
    }

    pub fn destroy_program(&mut self, handle: ProgramHandle) {
        retire(&mut self.resources.tables.programs, handle);
        self.defer_free(Freed::Program(handle));
    }

    /// Creates a texture, optionally with initial contents for every mip and layer.
    pub fn create_texture(&mut self, desc: TextureDesc, data: Option<Memory>) -> TextureHandle {
        let handle = alloc(&mut self.resources.tables.textures);
        let memory = data.map(|m| self.submit.memories.push(m));
        self.record(Command::CreateTexture {
            handle,
            desc,
            memory,
        });
        handle
    }

    pub fn update_texture(&mut self, handle: TextureHandle, region: TextureRegion, data: Memory) {
        check(&self.resources.tables.textures, handle);
        let memory = self.submit.memories.push(data);
        self.record(Command::UpdateTexture {
            handle,
            region,
            memory,
        });
    }

    pub fn destroy_texture(&mut self, handle: TextureHandle) {
        retire(&mut self.resources.tables.textures, handle);
        self.defer_free(Freed::Texture(handle));
    }

    /// Registers a uniform of `count` elements; its value starts zeroed.
    pub fn create_uniform(&mut self, ty: UniformType, count: u16) -> UniformHandle {
        assert!(ty != UniformType::End, "End is not a uniform type");
        assert!(
            (1..=MAX_COUNT).contains(&count),
            "uniform count must be in 1..={MAX_COUNT}"
        );
        let handle = alloc(&mut self.resources.tables.uniforms);
        self.resources.uniforms[handle.index() as usize] = Some((ty, count));
        self.record(Command::CreateUniform { handle, ty, count });
        handle
    }

    /// Replaces the uniform's current value on the render side.
    ///
    /// Items that reference the uniform with `bind_uniform` observe the last
    /// update recorded in their frame.
    pub fn update_uniform<T: Pod>(&mut self, handle: UniformHandle, value: &[T]) {
        check(&self.resources.tables.uniforms, handle);
        self.record(Command::UpdateUniform {
            handle,
            data: bytemuck::cast_slice(value),
        });
    }

    pub fn destroy_uniform(&mut self, handle: UniformHandle) {
        retire(&mut self.resources.tables.uniforms, handle);
        self.defer_free(Freed::Uniform(handle));
    }

    pub fn create_frame_target(&mut self, attachments: &[TextureHandle]) -> FrameTargetHandle {
        for &texture in attachments {
            check(&self.resources.tables.textures, texture);
        }
        let handle = alloc(&mut self.resources.tables.frame_targets);
        self.record(Command::CreateFrameTarget {
            handle,
            attachments: Attachments::new(attachments),
        });
        handle
    }

    pub fn destroy_frame_target(&mut self, handle: FrameTargetHandle) {
        retire(&mut self.resources.tables.frame_targets, handle);
        self.defer_free(Freed::FrameTarget(handle));
    }

    // Views.

    fn view_mut(&mut self, id: ViewId) -> &mut View {
        let max = self.resources.views.len();
        assert!((id as usize) < max, "view {id} out of range (max_views {max})");
        &mut self.resources.views[id as usize]
    }

    pub fn set_view_rect(&mut self, id: ViewId, x: u16, y: u16, width: u16, height: u16) {
        self.view_mut(id).rect = ViewRect::new(x, y, width, height);
    }

    /// An empty rectangle disables the view scissor.
    pub fn set_view_scissor(&mut self, id: ViewId, x: u16, y: u16, width: u16, height: u16) {
        self.view_mut(id).scissor = ViewRect::new(x, y, width, height);
    }

    pub fn set_view_clear(
        &mut self,
        id: ViewId,
        flags: ClearFlags,
        rgba: u32,
        depth: f32,
        stencil: u8,
    ) {
        self.view_mut(id).clear = Clear {
            flags,
            rgba,
            depth,
            stencil,
        };
    }

    /// Ordering policy for draw items recorded into this view from now on.
    pub fn set_view_mode(&mut self, id: ViewId, mode: ViewMode) {
        self.view_mut(id).mode = mode;
    }

    pub fn set_view_transform(&mut self, id: ViewId, view: &[f32; 16], proj: &[f32; 16]) {
        let v = self.view_mut(id);
        v.view = *view;
        v.proj = *proj;
    }

    /// `FrameTargetHandle::INVALID` renders to the backbuffer.
    pub fn set_view_frame_target(&mut self, id: ViewId, target: FrameTargetHandle) {
        if target.is_valid() {
            check(&self.resources.tables.frame_targets, target);
        }
        self.view_mut(id).frame_target = target;
    }

    /// Replays the listed views first, in the given order; the others follow
    /// in id order. An empty slice restores id order.
    pub fn set_view_order(&mut self, order: &[ViewId]) {
        let max = self.resources.views.len();
        assert!(
            order.iter().all(|&v| (v as usize) < max),
            "view order names a view beyond max_views {max}"
        );
        view::build_remap(order, &mut self.resources.view_remap);
    }

    pub fn reset_view(&mut self, id: ViewId) {
        *self.view_mut(id) = View::default();
    }

    /// Sets the backbuffer resolution seen by the next frames.
    pub fn reset(&mut self, width: u32, height: u32) {
        log::debug!("resolution {width}x{height}");
        self.resources.resolution = Resolution { width, height };
    }

    // Recording.

    /// Per-item state recorder for the current frame.
    pub fn encoder(&mut self) -> Encoder<'_> {
        Encoder::new(&mut self.submit, &self.resources)
    }

    // Diagnostics.

    /// Statistics of the most recently completed frame.
    pub fn stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Calls dropped so far in the frame being recorded.
    pub fn dropped_calls(&self) -> u32 {
        self.submit.dropped_calls()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn handle_counts(&self) -> HandleCounts {
        self.resources.tables.counts()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn resolution(&self) -> Resolution {
        self.resources.resolution
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.state != ContextState::Running || thread::panicking() {
            return;
        }
        let report = self.shutdown_in_place();
        if !report.is_clean() {
            log::debug!("context dropped with {} live handles", report.leaks.total());
        }
    }
}

fn alloc<K: ResourceKind>(table: &mut HandleAllocator<K>) -> Handle<K> {
    match table.alloc() {
        Some(handle) => handle,
        None => fatal(Fatal::HandleTableFull {
            kind: K::TYPE,
            capacity: table.capacity(),
        }),
    }
}

#[track_caller]
fn check<K: ResourceKind>(table: &HandleAllocator<K>, handle: Handle<K>) {
    assert!(
        table.is_valid(handle),
        "use of dead {:?} handle {handle:?}",
        K::TYPE
    );
}

/// Checks `handle` and marks it destroyed; a second destroy panics here
/// rather than when the deferred free runs.
#[track_caller]
fn retire<K: ResourceKind>(table: &mut HandleAllocator<K>, handle: Handle<K>) {
    check(table, handle);
    assert!(
        table.retire(handle),
        "{:?} handle {handle:?} destroyed twice",
        K::TYPE
    );
}

fn report_leaks(tables: &HandleTables, leaks: &HandleCounts) {
    for ty in ResourceType::ALL {
        let count = leaks.get(ty);
        if count > 0 {
            log::warn!("leaked {count} {ty:?} handle(s)");
        }
    }
    if leaks.total() > 0 && log::log_enabled!(log::Level::Debug) {
        log_live(&tables.vertex_layouts);
        log_live(&tables.buffers);
        log_live(&tables.shaders);
        log_live(&tables.programs);
        log_live(&tables.textures);
        log_live(&tables.uniforms);
        log_live(&tables.frame_targets);
    }
}

fn log_live<K: ResourceKind>(table: &HandleAllocator<K>) {
    for handle in table.live() {
        log::debug!("live at shutdown: {handle:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() -> Context {
        Context::init(Init::noop().threading(Threading::SingleThreaded)).unwrap()
    }

    #[test]
    fn init_runs_and_shutdown_is_clean() {
        let ctx = init();
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.frame_count(), 2);
        let report = ctx.shutdown();
        assert!(report.is_clean());
        assert_eq!(report.frames, 6);
    }

    #[test]
    fn leaks_are_reported_not_fatal() {
        let mut ctx = init();
        ctx.create_buffer(Memory::copy(&[0; 16]), BufferDesc::default());
        ctx.create_uniform(UniformType::Vec4, 1);
        let report = ctx.shutdown();
        assert_eq!(report.leaks.buffers, 1);
        assert_eq!(report.leaks.uniforms, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn destroyed_slot_is_held_for_two_boundaries() {
        let mut ctx = init();
        let a = ctx.create_buffer(Memory::copy(&[0; 4]), BufferDesc::default());
        ctx.destroy_buffer(a);

        ctx.frame();
        assert_eq!(ctx.handle_counts().buffers, 1);
        ctx.frame();
        assert_eq!(ctx.handle_counts().buffers, 0);

        let b = ctx.create_buffer(Memory::copy(&[0; 4]), BufferDesc::default());
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        ctx.destroy_buffer(b);
        assert!(ctx.shutdown().is_clean());
    }

    #[test]
    #[should_panic(expected = "use of dead")]
    fn stale_handle_is_detected() {
        let mut ctx = init();
        let a = ctx.create_shader(ShaderStage::Compute, Memory::copy(b"cs"));
        ctx.destroy_shader(a);
        ctx.frame();
        ctx.frame();
        ctx.destroy_shader(a);
    }

    #[test]
    #[should_panic(expected = "destroyed twice")]
    fn second_destroy_before_free_panics_at_the_call() {
        let mut ctx = init();
        let a = ctx.create_buffer(Memory::copy(&[0; 4]), BufferDesc::default());
        ctx.destroy_buffer(a);
        ctx.frame();
        ctx.destroy_buffer(a);
    }

    #[test]
    fn second_destroy_in_the_same_frame_is_caught() {
        let mut ctx = init();
        let u = ctx.create_uniform(UniformType::Vec4, 1);
        ctx.destroy_uniform(u);
        let again = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.destroy_uniform(u)
        }));
        assert!(again.is_err());
    }

    #[test]
    #[should_panic(expected = "handle table exhausted")]
    fn handle_table_exhaustion_is_fatal() {
        let limits = Limits {
            max_textures: 2,
            ..Limits::default()
        };
        let mut ctx = Context::init(
            Init::noop()
                .threading(Threading::SingleThreaded)
                .limits(limits),
        )
        .unwrap();
        for _ in 0..3 {
            ctx.create_texture(TextureDesc::new_2d(4, 4, Default::default()), None);
        }
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let limits = Limits {
            max_views: 0,
            ..Limits::default()
        };
        let err = Context::init(Init::noop().limits(limits)).err().unwrap();
        assert!(matches!(err, InitError::InvalidLimits(_)));
    }

    #[test]
    fn stats_describe_last_completed_frame() {
        let mut ctx = init();
        let vs = ctx.create_shader(ShaderStage::Vertex, Memory::copy(b"v"));
        let fs = ctx.create_shader(ShaderStage::Fragment, Memory::copy(b"f"));
        let program = ctx.create_program(vs, fs);

        let mut enc = ctx.encoder();
        enc.submit(0, program, 0);
        enc.submit(0, program, 0);
        enc.dispatch(1, program, [1, 1, 1], crate::state::Discard::ALL);

        ctx.frame();
        ctx.frame();
        let stats = ctx.stats();
        assert_eq!((stats.draws, stats.computes), (2, 1));

        ctx.destroy_program(program);
        ctx.destroy_shader(vs);
        ctx.destroy_shader(fs);
        assert!(ctx.shutdown().is_clean());
    }
}
