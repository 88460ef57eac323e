//! Render-side execution.
//!
//! [`Renderer`] drains one frame's command stream into the backend, sorts the
//! frame and replays it. [`RenderLoop`] wraps it with the channel handshake for
//! the dedicated render thread; single-threaded contexts call
//! [`Renderer::execute`] directly.

use std::time::Instant;

use flume::{Receiver, Sender};

use crate::backend::{Backend, BackendFactory, BackendKind};
use crate::command::Command;
use crate::error::{ProtocolError, fatal};
use crate::frame::{Frame, RenderItem};
use crate::limits::Limits;
use crate::resource::MemoryRef;
use crate::stats::FrameStats;
use crate::uniform::UniformTable;

/// Result of one render step.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderFrame {
    /// The frame was executed; keep going.
    Render,
    /// `RendererShutdownEnd` was executed or the submission side is gone.
    Exiting,
}

/// Backend construction result, reported back through the frame that carried
/// `RendererInit`.
#[derive(Debug, Default)]
pub(crate) enum RendererStatus {
    #[default]
    Pending,
    Ready,
    Failed(anyhow::Error),
}

pub(crate) struct Renderer {
    factory: Option<BackendFactory>,
    backend: Option<Box<dyn Backend>>,
    uniforms: UniformTable,
    limits: Limits,
    shutting_down: bool,
}

impl Renderer {
    pub fn new(factory: BackendFactory, limits: Limits) -> Self {
        Self {
            factory: Some(factory),
            backend: None,
            uniforms: UniformTable::new(limits.max_uniforms),
            limits,
            shutting_down: false,
        }
    }

    /// Executes commands, then sorts and submits the frame.
    pub fn execute(&mut self, frame: &mut Frame) -> RenderFrame {
        let started = Instant::now();

        let exiting = match self.execute_commands(frame) {
            Ok(exiting) => exiting,
            Err(e) => fatal(e),
        };
        if exiting {
            return RenderFrame::Exiting;
        }

        frame.sort();
        if let Some(backend) = self.backend.as_mut() {
            backend.submit(frame, &self.uniforms);
            backend.flip();
        }

        let (draws, computes) = frame.sorted().fold((0, 0), |(d, c), s| match s.item {
            RenderItem::Draw(_) => (d + 1, c),
            RenderItem::Compute(_) => (d, c + 1),
        });
        frame.stats = FrameStats {
            frame: frame.number,
            draws,
            computes,
            dropped_calls: frame.dropped_calls(),
            command_bytes: frame.commands.len(),
            uniform_bytes: frame.uniforms.pos() as usize,
            render_time: started.elapsed(),
        };
        log::trace!(
            "frame {}: {draws} draws, {computes} dispatches, {} command bytes",
            frame.number,
            frame.stats.command_bytes
        );

        RenderFrame::Render
    }

    /// Drains the command stream; returns `true` once `RendererShutdownEnd` ran.
    fn execute_commands(&mut self, frame: &mut Frame) -> Result<bool, ProtocolError> {
        let Frame {
            commands,
            memories,
            status,
            ..
        } = frame;
        let memories = &*memories;

        loop {
            let command = Command::decode(commands)?;
            let backend = self.backend.as_deref_mut();

            match command {
                Command::End => return Ok(false),
                Command::RendererInit { kind } => {
                    *status = self.init_backend(kind);
                }
                Command::RendererShutdownBegin => {
                    log::info!("renderer shutdown begin");
                    self.shutting_down = true;
                }
                Command::RendererShutdownEnd => {
                    if !self.shutting_down {
                        log::debug!("renderer shutdown without shutdown begin");
                    }
                    self.backend = None;
                    log::info!("renderer shut down");
                    return Ok(true);
                }
                Command::UpdateUniform { handle, data } => self.uniforms.update(handle, data),
                Command::CreateUniform { handle, ty, count } => {
                    self.uniforms.create(handle, ty, count);
                    if let Some(b) = backend {
                        b.create_uniform(handle, ty, count);
                    }
                }
                Command::DestroyUniform { handle } => {
                    self.uniforms.destroy(handle);
                    if let Some(b) = backend {
                        b.destroy_uniform(handle);
                    }
                }
                command => {
                    if let Some(b) = backend {
                        dispatch(b, command, move |m| memories.get(m));
                    }
                }
            }
        }
    }

    fn init_backend(&mut self, kind: BackendKind) -> RendererStatus {
        let Some(factory) = self.factory.take() else {
            log::warn!("duplicate renderer init ignored");
            return RendererStatus::Ready;
        };

        match factory(&self.limits) {
            Ok(backend) => {
                if backend.kind() != kind {
                    log::debug!("requested {kind:?} backend, factory built {:?}", backend.kind());
                }
                log::info!("{:?} backend initialized", backend.kind());
                self.backend = Some(backend);
                RendererStatus::Ready
            }
            Err(e) => {
                log::error!("{kind:?} backend failed to initialize: {e:#}");
                RendererStatus::Failed(e)
            }
        }
    }
}

/// Forwards one resource lifecycle command to the backend.
fn dispatch<'m>(
    backend: &mut dyn Backend,
    command: Command<'_>,
    memory: impl Fn(MemoryRef) -> &'m [u8],
) {
    match command {
        Command::CreateVertexLayout { handle, layout } => {
            backend.create_vertex_layout(handle, &layout)
        }
        Command::DestroyVertexLayout { handle } => backend.destroy_vertex_layout(handle),
        Command::CreateBuffer {
            handle,
            desc,
            memory: m,
        } => backend.create_buffer(handle, &desc, memory(m)),
        Command::UpdateBuffer {
            handle,
            offset,
            memory: m,
        } => backend.update_buffer(handle, offset, memory(m)),
        Command::DestroyBuffer { handle } => backend.destroy_buffer(handle),
        Command::CreateShader {
            handle,
            stage,
            memory: m,
        } => backend.create_shader(handle, stage, memory(m)),
        Command::DestroyShader { handle } => backend.destroy_shader(handle),
        Command::CreateProgram { handle, vs, fs } => backend.create_program(handle, vs, fs),
        Command::DestroyProgram { handle } => backend.destroy_program(handle),
        Command::CreateTexture {
            handle,
            desc,
            memory: m,
        } => backend.create_texture(handle, &desc, m.map(&memory)),
        Command::UpdateTexture {
            handle,
            region,
            memory: m,
        } => backend.update_texture(handle, &region, memory(m)),
        Command::DestroyTexture { handle } => backend.destroy_texture(handle),
        Command::CreateFrameTarget {
            handle,
            attachments,
        } => backend.create_frame_target(handle, attachments.as_slice()),
        Command::DestroyFrameTarget { handle } => backend.destroy_frame_target(handle),
        Command::RendererInit { .. }
        | Command::RendererShutdownBegin
        | Command::RendererShutdownEnd
        | Command::CreateUniform { .. }
        | Command::UpdateUniform { .. }
        | Command::DestroyUniform { .. }
        | Command::End => {}
    }
}

/// Render thread body: receive, execute, hand back.
pub(crate) struct RenderLoop {
    renderer: Renderer,
    ready: Receiver<Box<Frame>>,
    done: Sender<Box<Frame>>,
}

impl RenderLoop {
    pub fn new(renderer: Renderer, ready: Receiver<Box<Frame>>, done: Sender<Box<Frame>>) -> Self {
        Self {
            renderer,
            ready,
            done,
        }
    }

    /// Blocks until a frame is ready, executes it and signals completion.
    pub fn render_frame(&mut self) -> RenderFrame {
        let Ok(mut frame) = self.ready.recv() else {
            log::debug!("submission side disconnected");
            return RenderFrame::Exiting;
        };

        let result = self.renderer.execute(&mut frame);

        if self.done.send(frame).is_err() {
            return RenderFrame::Exiting;
        }
        result
    }

    pub fn run(mut self) {
        log::debug!("render thread started");
        while self.render_frame() == RenderFrame::Render {}
        log::debug!("render thread exiting");
    }
}
