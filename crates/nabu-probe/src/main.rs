mod trace;

use anyhow::{Context as _, bail};
use clap::{Parser, ValueEnum};

use nabu_gfx::logging::{LoggingConfig, init_logging};
use nabu_gfx::resource::{
    Access, Attrib, AttribType, BufferDesc, BufferFlags, BufferUsage, Memory, ShaderStage,
    TextureDesc, TextureFlags, TextureFormat, VertexLayout,
};
use nabu_gfx::view::{ClearFlags, IDENTITY};
use nabu_gfx::{
    BackendKind, Context, Discard, Init, Limits, StateFlags, Threading, UniformType, ViewMode,
};

use crate::trace::TraceBackend;

const OFFSCREEN: u8 = 0;
const BACKBUFFER: u8 = 1;
const PREPASS: u8 = 2;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    /// Accepts everything and draws nothing.
    Noop,
    /// Counts resources and logs a per-frame summary.
    Trace,
}

#[derive(Parser, Debug)]
#[command(
    name = "nabu-probe",
    about = "Record and replay synthetic frames through the nabu pipeline."
)]
struct Args {
    /// Number of frames to record
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Quads drawn per frame into the offscreen view
    #[arg(long, default_value_t = 64)]
    quads: u32,

    /// Replay frames on the calling thread instead of a render thread
    #[arg(long, action = clap::ArgAction::SetTrue)]
    single_threaded: bool,

    #[arg(long, value_enum, default_value_t = BackendArg::Trace)]
    backend: BackendArg,

    /// Maximum items recorded per frame
    #[arg(long, default_value_t = Limits::default().max_items)]
    max_items: u32,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    #[arg(long, default_value_t = 1280)]
    width: u16,

    #[arg(long, default_value_t = 720)]
    height: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        default_level: args.log_level,
        ..LoggingConfig::default()
    });

    let threading = if args.single_threaded {
        Threading::SingleThreaded
    } else {
        Threading::RenderThread
    };
    let init = match args.backend {
        BackendArg::Noop => Init::noop(),
        BackendArg::Trace => Init::new(BackendKind::Custom, TraceBackend::factory(60)),
    }
    .threading(threading)
    .resolution(args.width as u32, args.height as u32)
    .limits(Limits {
        max_items: args.max_items,
        ..Limits::default()
    });

    let mut ctx = Context::init(init).context("failed to initialize nabu")?;
    let scene = Scene::create(&mut ctx, &args);

    for frame in 0..args.frames {
        scene.record(&mut ctx, frame, args.quads);
        ctx.frame();

        let stats = ctx.stats();
        if stats.dropped_calls > 0 {
            log::warn!(
                "frame {}: {} calls dropped, raise --max-items",
                stats.frame,
                stats.dropped_calls
            );
        }
    }

    let stats = ctx.stats();
    println!(
        "last frame {}: {} draws, {} dispatches, {} command bytes, {} uniform bytes, {:?}",
        stats.frame,
        stats.draws,
        stats.computes,
        stats.command_bytes,
        stats.uniform_bytes,
        stats.render_time
    );

    scene.destroy(&mut ctx);
    let report = ctx.shutdown();
    println!("shut down after {} frames", report.frames);
    if !report.is_clean() {
        bail!("leaked handles: {:?}", report.leaks);
    }
    Ok(())
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: u32,
}

const QUAD: [Vertex; 4] = [
    Vertex { position: [-0.5, -0.5, 0.0], color: 0xff0000ff },
    Vertex { position: [0.5, -0.5, 0.0], color: 0xff00ff00 },
    Vertex { position: [0.5, 0.5, 0.0], color: 0xffff0000 },
    Vertex { position: [-0.5, 0.5, 0.0], color: 0xffffffff },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Everything one probe run allocates.
struct Scene {
    layout: nabu_gfx::VertexLayoutHandle,
    vertices: nabu_gfx::BufferHandle,
    indices: nabu_gfx::BufferHandle,
    particles: nabu_gfx::BufferHandle,
    shaders: Vec<nabu_gfx::ShaderHandle>,
    draw: nabu_gfx::ProgramHandle,
    simulate: nabu_gfx::ProgramHandle,
    color: nabu_gfx::TextureHandle,
    depth: nabu_gfx::TextureHandle,
    target: nabu_gfx::FrameTargetHandle,
    tint: nabu_gfx::UniformHandle,
    sampler: nabu_gfx::UniformHandle,
}

impl Scene {
    fn create(ctx: &mut Context, args: &Args) -> Self {
        let layout = ctx.create_vertex_layout(
            &VertexLayout::new()
                .add(Attrib::Position, 3, AttribType::F32, false)
                .add(Attrib::Color0, 4, AttribType::U8, true),
        );
        let vertices = ctx.create_buffer(
            Memory::of(&QUAD),
            BufferDesc {
                layout,
                ..BufferDesc::default()
            },
        );
        let indices = ctx.create_buffer(
            Memory::of(&QUAD_INDICES),
            BufferDesc {
                usage: BufferUsage::Index16,
                ..BufferDesc::default()
            },
        );
        let particles = ctx.create_buffer(
            Memory::of(&[0f32; 4 * 256]),
            BufferDesc {
                usage: BufferUsage::Storage,
                flags: BufferFlags::DYNAMIC | BufferFlags::COMPUTE_WRITE,
                ..BufferDesc::default()
            },
        );

        let vs = ctx.create_shader(ShaderStage::Vertex, Memory::copy(b"probe.vs"));
        let fs = ctx.create_shader(ShaderStage::Fragment, Memory::copy(b"probe.fs"));
        let cs = ctx.create_shader(ShaderStage::Compute, Memory::copy(b"probe.cs"));
        let draw = ctx.create_program(vs, fs);
        let simulate = ctx.create_compute_program(cs);

        let (w, h) = (args.width / 2, args.height / 2);
        let color = ctx.create_texture(
            TextureDesc {
                flags: TextureFlags::RENDER_TARGET | TextureFlags::COMPUTE_WRITE,
                ..TextureDesc::new_2d(w, h, TextureFormat::Rgba8)
            },
            None,
        );
        let depth = ctx.create_texture(
            TextureDesc {
                flags: TextureFlags::RENDER_TARGET,
                ..TextureDesc::new_2d(w, h, TextureFormat::D24S8)
            },
            None,
        );
        let target = ctx.create_frame_target(&[color, depth]);

        let tint = ctx.create_uniform(UniformType::Vec4, 1);
        let sampler = ctx.create_uniform(UniformType::Sampler, 1);

        ctx.set_view_rect(OFFSCREEN, 0, 0, w, h);
        ctx.set_view_frame_target(OFFSCREEN, target);
        ctx.set_view_clear(
            OFFSCREEN,
            ClearFlags::COLOR | ClearFlags::DEPTH,
            0x303030ff,
            1.0,
            0,
        );
        ctx.set_view_mode(OFFSCREEN, ViewMode::DepthAscending);

        ctx.set_view_rect(BACKBUFFER, 0, 0, args.width, args.height);
        ctx.set_view_clear(BACKBUFFER, ClearFlags::COLOR, 0x000000ff, 1.0, 0);
        ctx.set_view_mode(BACKBUFFER, ViewMode::Sequential);
        ctx.set_view_transform(BACKBUFFER, &IDENTITY, &IDENTITY);

        ctx.set_view_order(&[PREPASS, OFFSCREEN, BACKBUFFER]);

        Self {
            layout,
            vertices,
            indices,
            particles,
            shaders: vec![vs, fs, cs],
            draw,
            simulate,
            color,
            depth,
            target,
            tint,
            sampler,
        }
    }

    fn record(&self, ctx: &mut Context, frame: u32, quads: u32) {
        let t = frame as f32 / 60.0;
        ctx.update_uniform(self.tint, &[t.sin().abs(), t.cos().abs(), 0.5, 1.0]);

        let mut enc = ctx.encoder();

        enc.set_buffer(0, self.particles, Access::ReadWrite);
        enc.dispatch(PREPASS, self.simulate, [4, 1, 1], Discard::ALL);

        for quad in 0..quads {
            let mut model = IDENTITY;
            model[12] = (quad % 8) as f32 - 4.0;
            model[13] = (quad / 8) as f32 - 4.0;
            model[14] = quad as f32;

            enc.set_transform(&[model]);
            enc.set_vertex_buffer(self.vertices, 0, QUAD.len() as u32);
            enc.set_index_buffer(self.indices, 0, QUAD_INDICES.len() as u32);
            enc.set_state(StateFlags::DEFAULT, 0);
            enc.bind_uniform(self.tint);
            enc.submit(OFFSCREEN, self.draw, quads - quad);
        }

        enc.set_vertex_buffer(self.vertices, 0, QUAD.len() as u32);
        enc.set_index_buffer(self.indices, 0, QUAD_INDICES.len() as u32);
        enc.set_texture(0, self.sampler, self.color, 0);
        enc.set_state(StateFlags::DEFAULT | StateFlags::BLEND_ALPHA, 0);
        enc.submit(BACKBUFFER, self.draw, 0);

        if frame % 30 == 0 {
            ctx.update_buffer(self.particles, 0, Memory::of(&[t; 4]));
        }
    }

    fn destroy(self, ctx: &mut Context) {
        ctx.destroy_frame_target(self.target);
        ctx.destroy_texture(self.color);
        ctx.destroy_texture(self.depth);
        ctx.destroy_uniform(self.tint);
        ctx.destroy_uniform(self.sampler);
        ctx.destroy_program(self.draw);
        ctx.destroy_program(self.simulate);
        for shader in self.shaders {
            ctx.destroy_shader(shader);
        }
        ctx.destroy_buffer(self.vertices);
        ctx.destroy_buffer(self.indices);
        ctx.destroy_buffer(self.particles);
        ctx.destroy_vertex_layout(self.layout);
    }
}
