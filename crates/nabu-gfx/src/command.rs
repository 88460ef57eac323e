//! Resource lifecycle command stream.
//!
//! A [`CommandBuffer`] is a fixed-size byte buffer with independent write and
//! read cursors. The submission side appends [`Command`] records during a
//! frame; the render side drains them once, in order, before replaying the
//! frame's items.
//!
//! Record format: `{u8 tag}{payload}`. Payloads are `#[repr(C)]` plain-data
//! structs copied byte-for-byte, except `UpdateUniform`, which carries a
//! `u32` length followed by the raw value. The layout is only stable within one
//! process.

use bytemuck::{Pod, Zeroable};

use crate::backend::BackendKind;
use crate::error::{Fatal, ProtocolError, fatal};
use crate::handle::{
    BufferHandle, FrameTargetHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformHandle,
    VertexLayoutHandle,
};
use crate::resource::{
    BufferDesc, BufferFlags, BufferUsage, MAX_ATTACHMENTS, MemoryRef, ShaderStage, TextureDesc,
    TextureFlags, TextureFormat, TextureRegion, VertexLayout,
};
use crate::uniform::UniformType;

/// Bytes kept back so the `End` record always fits.
const END_RESERVE: usize = 1;

/// Append-only byte stream, allocated once and rewound every frame.
pub struct CommandBuffer {
    data: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
    terminated: bool,
}

impl CommandBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            write_pos: 0,
            read_pos: 0,
            terminated: false,
        }
    }

    /// Appends the raw bytes of `value`; returns the number of bytes written.
    #[inline]
    pub fn write<T: Pod>(&mut self, value: &T) -> usize {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// # Panics
    /// Overflowing the fixed capacity is fatal. The last byte is reserved for
    /// `End`, so the overflow is reported by the record that caused it.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        debug_assert!(!self.terminated, "write after End record");

        let end = self.write_pos + bytes.len();
        if bytes.len() > self.remaining() {
            fatal(Fatal::CommandBufferOverflow {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }
        self.data[self.write_pos..end].copy_from_slice(bytes);
        self.write_pos = end;
        bytes.len()
    }

    /// Reads a value in the order it was written.
    #[inline]
    pub fn read<T: Pod>(&mut self) -> Result<T, ProtocolError> {
        let bytes = self.read_bytes(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], ProtocolError> {
        let start = self.read_pos;
        let end = start + len;
        if end > self.write_pos {
            return Err(ProtocolError::ReadPastEnd {
                offset: start,
                len,
                end: self.write_pos,
            });
        }
        self.read_pos = end;
        Ok(&self.data[start..end])
    }

    /// Appends the terminal `End` record.
    pub fn finish(&mut self) {
        debug_assert!(!self.terminated, "End record written twice");
        let Some(slot) = self.data.get_mut(self.write_pos) else {
            fatal(Fatal::CommandBufferOverflow {
                needed: END_RESERVE,
                remaining: 0,
            });
        };
        *slot = Tag::End as u8;
        self.write_pos += END_RESERVE;
        self.terminated = true;
    }

    /// Rewinds both cursors, keeping the allocation.
    ///
    /// # Panics
    /// A buffer that was written but never finished is a protocol violation.
    pub fn reset(&mut self) {
        if self.write_pos != 0 && !self.terminated {
            fatal(ProtocolError::Unterminated);
        }
        self.write_pos = 0;
        self.read_pos = 0;
        self.terminated = false;
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.write_pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    /// Bytes still available to records, not counting the `End` reserve.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data
            .len()
            .saturating_sub(END_RESERVE)
            .saturating_sub(self.write_pos)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    enum Tag {
        RendererInit = 0,
        RendererShutdownBegin = 1,
        RendererShutdownEnd = 2,
        CreateVertexLayout = 3,
        DestroyVertexLayout = 4,
        CreateBuffer = 5,
        UpdateBuffer = 6,
        DestroyBuffer = 7,
        CreateShader = 8,
        DestroyShader = 9,
        CreateProgram = 10,
        DestroyProgram = 11,
        CreateTexture = 12,
        UpdateTexture = 13,
        DestroyTexture = 14,
        CreateUniform = 15,
        UpdateUniform = 16,
        DestroyUniform = 17,
        CreateFrameTarget = 18,
        DestroyFrameTarget = 19,
        End = 255,
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct VertexLayoutCreate {
    handle: u32,
    layout: VertexLayout,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BufferCreate {
    handle: u32,
    layout: u32,
    memory: u32,
    size: u32,
    flags: u16,
    usage: u8,
    _pad: u8,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BufferUpdate {
    handle: u32,
    offset: u32,
    memory: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ShaderCreate {
    handle: u32,
    memory: u32,
    stage: u8,
    _pad: [u8; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ProgramCreate {
    handle: u32,
    vs: u32,
    fs: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct TextureCreate {
    handle: u32,
    memory: u32,
    width: u16,
    height: u16,
    layers: u16,
    mips: u8,
    format: u8,
    flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct TextureUpdate {
    handle: u32,
    memory: u32,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    layer: u16,
    mip: u8,
    _pad: u8,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct UniformCreate {
    handle: u32,
    count: u16,
    ty: u8,
    _pad: u8,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameTargetCreate {
    handle: u32,
    count: u32,
    attachments: [u32; MAX_ATTACHMENTS],
}

/// Attachment list of a frame target.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Attachments {
    textures: [TextureHandle; MAX_ATTACHMENTS],
    len: u8,
}

impl Attachments {
    /// # Panics
    /// Panics when given more than [`MAX_ATTACHMENTS`] textures.
    pub fn new(textures: &[TextureHandle]) -> Self {
        assert!(
            textures.len() <= MAX_ATTACHMENTS,
            "frame target holds at most {MAX_ATTACHMENTS} attachments"
        );
        let mut out = [TextureHandle::INVALID; MAX_ATTACHMENTS];
        out[..textures.len()].copy_from_slice(textures);
        Self {
            textures: out,
            len: textures.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[TextureHandle] {
        &self.textures[..self.len as usize]
    }
}

/// One record of the command stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    RendererInit { kind: BackendKind },
    RendererShutdownBegin,
    RendererShutdownEnd,
    CreateVertexLayout { handle: VertexLayoutHandle, layout: VertexLayout },
    DestroyVertexLayout { handle: VertexLayoutHandle },
    CreateBuffer { handle: BufferHandle, desc: BufferDesc, memory: MemoryRef },
    UpdateBuffer { handle: BufferHandle, offset: u32, memory: MemoryRef },
    DestroyBuffer { handle: BufferHandle },
    CreateShader { handle: ShaderHandle, stage: ShaderStage, memory: MemoryRef },
    DestroyShader { handle: ShaderHandle },
    /// `fs` is `INVALID` for compute programs.
    CreateProgram { handle: ProgramHandle, vs: ShaderHandle, fs: ShaderHandle },
    DestroyProgram { handle: ProgramHandle },
    CreateTexture { handle: TextureHandle, desc: TextureDesc, memory: Option<MemoryRef> },
    UpdateTexture { handle: TextureHandle, region: TextureRegion, memory: MemoryRef },
    DestroyTexture { handle: TextureHandle },
    CreateUniform { handle: UniformHandle, ty: UniformType, count: u16 },
    UpdateUniform { handle: UniformHandle, data: &'a [u8] },
    DestroyUniform { handle: UniformHandle },
    CreateFrameTarget { handle: FrameTargetHandle, attachments: Attachments },
    DestroyFrameTarget { handle: FrameTargetHandle },
    End,
}

impl Command<'_> {
    /// Appends this record to `buf`; returns the number of bytes written.
    pub fn encode(&self, buf: &mut CommandBuffer) -> usize {
        let tag = |buf: &mut CommandBuffer, tag: Tag| buf.write(&(tag as u8));

        match *self {
            Command::RendererInit { kind } => tag(buf, Tag::RendererInit) + buf.write(&(kind as u8)),
            Command::RendererShutdownBegin => tag(buf, Tag::RendererShutdownBegin),
            Command::RendererShutdownEnd => tag(buf, Tag::RendererShutdownEnd),
            Command::CreateVertexLayout { handle, layout } => {
                tag(buf, Tag::CreateVertexLayout)
                    + buf.write(&VertexLayoutCreate {
                        handle: handle.to_bits(),
                        layout,
                    })
            }
            Command::DestroyVertexLayout { handle } => {
                tag(buf, Tag::DestroyVertexLayout) + buf.write(&handle.to_bits())
            }
            Command::CreateBuffer {
                handle,
                desc,
                memory,
            } => {
                tag(buf, Tag::CreateBuffer)
                    + buf.write(&BufferCreate {
                        handle: handle.to_bits(),
                        layout: desc.layout.to_bits(),
                        memory: memory.0,
                        size: desc.size,
                        flags: desc.flags.bits(),
                        usage: desc.usage as u8,
                        _pad: 0,
                    })
            }
            Command::UpdateBuffer {
                handle,
                offset,
                memory,
            } => {
                tag(buf, Tag::UpdateBuffer)
                    + buf.write(&BufferUpdate {
                        handle: handle.to_bits(),
                        offset,
                        memory: memory.0,
                    })
            }
            Command::DestroyBuffer { handle } => {
                tag(buf, Tag::DestroyBuffer) + buf.write(&handle.to_bits())
            }
            Command::CreateShader {
                handle,
                stage,
                memory,
            } => {
                tag(buf, Tag::CreateShader)
                    + buf.write(&ShaderCreate {
                        handle: handle.to_bits(),
                        memory: memory.0,
                        stage: stage as u8,
                        _pad: [0; 3],
                    })
            }
            Command::DestroyShader { handle } => {
                tag(buf, Tag::DestroyShader) + buf.write(&handle.to_bits())
            }
            Command::CreateProgram { handle, vs, fs } => {
                tag(buf, Tag::CreateProgram)
                    + buf.write(&ProgramCreate {
                        handle: handle.to_bits(),
                        vs: vs.to_bits(),
                        fs: fs.to_bits(),
                    })
            }
            Command::DestroyProgram { handle } => {
                tag(buf, Tag::DestroyProgram) + buf.write(&handle.to_bits())
            }
            Command::CreateTexture {
                handle,
                desc,
                memory,
            } => {
                tag(buf, Tag::CreateTexture)
                    + buf.write(&TextureCreate {
                        handle: handle.to_bits(),
                        memory: memory.map_or(MemoryRef::NONE, |m| m.0),
                        width: desc.width,
                        height: desc.height,
                        layers: desc.layers,
                        mips: desc.mips,
                        format: desc.format as u8,
                        flags: desc.flags.bits(),
                    })
            }
            Command::UpdateTexture {
                handle,
                region,
                memory,
            } => {
                tag(buf, Tag::UpdateTexture)
                    + buf.write(&TextureUpdate {
                        handle: handle.to_bits(),
                        memory: memory.0,
                        x: region.x,
                        y: region.y,
                        width: region.width,
                        height: region.height,
                        layer: region.layer,
                        mip: region.mip,
                        _pad: 0,
                    })
            }
            Command::DestroyTexture { handle } => {
                tag(buf, Tag::DestroyTexture) + buf.write(&handle.to_bits())
            }
            Command::CreateUniform { handle, ty, count } => {
                tag(buf, Tag::CreateUniform)
                    + buf.write(&UniformCreate {
                        handle: handle.to_bits(),
                        count,
                        ty: ty as u8,
                        _pad: 0,
                    })
            }
            Command::UpdateUniform { handle, data } => {
                tag(buf, Tag::UpdateUniform)
                    + buf.write(&handle.to_bits())
                    + buf.write(&(data.len() as u32))
                    + buf.write_bytes(data)
            }
            Command::DestroyUniform { handle } => {
                tag(buf, Tag::DestroyUniform) + buf.write(&handle.to_bits())
            }
            Command::CreateFrameTarget {
                handle,
                attachments,
            } => {
                let mut raw = [TextureHandle::INVALID.to_bits(); MAX_ATTACHMENTS];
                for (dst, src) in raw.iter_mut().zip(attachments.as_slice()) {
                    *dst = src.to_bits();
                }
                tag(buf, Tag::CreateFrameTarget)
                    + buf.write(&FrameTargetCreate {
                        handle: handle.to_bits(),
                        count: attachments.len as u32,
                        attachments: raw,
                    })
            }
            Command::DestroyFrameTarget { handle } => {
                tag(buf, Tag::DestroyFrameTarget) + buf.write(&handle.to_bits())
            }
            Command::End => {
                buf.finish();
                1
            }
        }
    }
}

impl<'a> Command<'a> {
    /// Reads the next record from `buf`.
    pub fn decode(buf: &'a mut CommandBuffer) -> Result<Command<'a>, ProtocolError> {
        let raw = buf.read::<u8>()?;
        let tag = Tag::from_wire(raw).map_err(|_| ProtocolError::UnknownTag(raw))?;

        let command = match tag {
            Tag::RendererInit => Command::RendererInit {
                kind: BackendKind::from_wire(buf.read()?)?,
            },
            Tag::RendererShutdownBegin => Command::RendererShutdownBegin,
            Tag::RendererShutdownEnd => Command::RendererShutdownEnd,
            Tag::CreateVertexLayout => {
                let p: VertexLayoutCreate = buf.read()?;
                Command::CreateVertexLayout {
                    handle: VertexLayoutHandle::from_bits(p.handle),
                    layout: p.layout,
                }
            }
            Tag::DestroyVertexLayout => Command::DestroyVertexLayout {
                handle: VertexLayoutHandle::from_bits(buf.read()?),
            },
            Tag::CreateBuffer => {
                let p: BufferCreate = buf.read()?;
                Command::CreateBuffer {
                    handle: BufferHandle::from_bits(p.handle),
                    desc: BufferDesc {
                        usage: BufferUsage::from_wire(p.usage)?,
                        flags: BufferFlags::from_bits_retain(p.flags),
                        layout: VertexLayoutHandle::from_bits(p.layout),
                        size: p.size,
                    },
                    memory: MemoryRef(p.memory),
                }
            }
            Tag::UpdateBuffer => {
                let p: BufferUpdate = buf.read()?;
                Command::UpdateBuffer {
                    handle: BufferHandle::from_bits(p.handle),
                    offset: p.offset,
                    memory: MemoryRef(p.memory),
                }
            }
            Tag::DestroyBuffer => Command::DestroyBuffer {
                handle: BufferHandle::from_bits(buf.read()?),
            },
            Tag::CreateShader => {
                let p: ShaderCreate = buf.read()?;
                Command::CreateShader {
                    handle: ShaderHandle::from_bits(p.handle),
                    stage: ShaderStage::from_wire(p.stage)?,
                    memory: MemoryRef(p.memory),
                }
            }
            Tag::DestroyShader => Command::DestroyShader {
                handle: ShaderHandle::from_bits(buf.read()?),
            },
            Tag::CreateProgram => {
                let p: ProgramCreate = buf.read()?;
                Command::CreateProgram {
                    handle: ProgramHandle::from_bits(p.handle),
                    vs: ShaderHandle::from_bits(p.vs),
                    fs: ShaderHandle::from_bits(p.fs),
                }
            }
            Tag::DestroyProgram => Command::DestroyProgram {
                handle: ProgramHandle::from_bits(buf.read()?),
            },
            Tag::CreateTexture => {
                let p: TextureCreate = buf.read()?;
                Command::CreateTexture {
                    handle: TextureHandle::from_bits(p.handle),
                    desc: TextureDesc {
                        width: p.width,
                        height: p.height,
                        layers: p.layers,
                        mips: p.mips,
                        format: TextureFormat::from_wire(p.format)?,
                        flags: TextureFlags::from_bits_retain(p.flags),
                    },
                    memory: (p.memory != MemoryRef::NONE).then_some(MemoryRef(p.memory)),
                }
            }
            Tag::UpdateTexture => {
                let p: TextureUpdate = buf.read()?;
                Command::UpdateTexture {
                    handle: TextureHandle::from_bits(p.handle),
                    region: TextureRegion {
                        mip: p.mip,
                        layer: p.layer,
                        x: p.x,
                        y: p.y,
                        width: p.width,
                        height: p.height,
                    },
                    memory: MemoryRef(p.memory),
                }
            }
            Tag::DestroyTexture => Command::DestroyTexture {
                handle: TextureHandle::from_bits(buf.read()?),
            },
            Tag::CreateUniform => {
                let p: UniformCreate = buf.read()?;
                Command::CreateUniform {
                    handle: UniformHandle::from_bits(p.handle),
                    ty: UniformType::from_wire(p.ty)?,
                    count: p.count,
                }
            }
            Tag::UpdateUniform => {
                let handle = UniformHandle::from_bits(buf.read()?);
                let len: u32 = buf.read()?;
                Command::UpdateUniform {
                    handle,
                    data: buf.read_bytes(len as usize)?,
                }
            }
            Tag::DestroyUniform => Command::DestroyUniform {
                handle: UniformHandle::from_bits(buf.read()?),
            },
            Tag::CreateFrameTarget => {
                let p: FrameTargetCreate = buf.read()?;
                let count = (p.count as usize).min(MAX_ATTACHMENTS);
                let mut textures = [TextureHandle::INVALID; MAX_ATTACHMENTS];
                for (dst, &src) in textures.iter_mut().zip(&p.attachments[..count]) {
                    *dst = TextureHandle::from_bits(src);
                }
                Command::CreateFrameTarget {
                    handle: FrameTargetHandle::from_bits(p.handle),
                    attachments: Attachments {
                        textures,
                        len: count as u8,
                    },
                }
            }
            Tag::DestroyFrameTarget => Command::DestroyFrameTarget {
                handle: FrameTargetHandle::from_bits(buf.read()?),
            },
            Tag::End => Command::End,
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Attrib, AttribType};

    #[repr(C)]
    #[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
    struct Small {
        a: u32,
        b: f32,
        c: [u16; 2],
    }

    #[test]
    fn typed_values_round_trip_in_write_order() {
        let mut buf = CommandBuffer::with_capacity(256);
        let h = BufferHandle::new(17, 3);
        let small = Small {
            a: 7,
            b: -2.5,
            c: [1, 65535],
        };

        assert_eq!(buf.write(&0xABu8), 1);
        assert_eq!(buf.write(&-12345i32), 4);
        assert_eq!(buf.write(&0xDEAD_BEEF_0123_4567u64), 8);
        assert_eq!(buf.write(&1.25f32), 4);
        assert_eq!(buf.write(&core::f64::consts::PI), 8);
        assert_eq!(buf.write(&h.to_bits()), 4);
        assert_eq!(buf.write(&small), 12);

        assert_eq!(buf.read::<u8>().unwrap(), 0xAB);
        assert_eq!(buf.read::<i32>().unwrap(), -12345);
        assert_eq!(buf.read::<u64>().unwrap(), 0xDEAD_BEEF_0123_4567);
        assert_eq!(buf.read::<f32>().unwrap().to_bits(), 1.25f32.to_bits());
        assert_eq!(buf.read::<f64>().unwrap().to_bits(), core::f64::consts::PI.to_bits());
        assert_eq!(BufferHandle::from_bits(buf.read().unwrap()), h);
        assert_eq!(buf.read::<Small>().unwrap(), small);
    }

    #[test]
    fn read_past_written_bytes_is_an_error() {
        let mut buf = CommandBuffer::with_capacity(64);
        buf.write(&1u16);
        assert!(matches!(
            buf.read::<u32>(),
            Err(ProtocolError::ReadPastEnd { offset: 0, len: 4, end: 2 })
        ));
    }

    #[test]
    #[should_panic(expected = "command buffer overflow")]
    fn overflow_is_fatal() {
        let mut buf = CommandBuffer::with_capacity(4);
        buf.write(&1u64);
    }

    #[test]
    #[should_panic(expected = "without a terminating End")]
    fn reset_of_unterminated_stream_is_fatal() {
        let mut buf = CommandBuffer::with_capacity(16);
        buf.write(&1u8);
        buf.reset();
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut buf = CommandBuffer::with_capacity(32);
        Command::DestroyBuffer {
            handle: BufferHandle::new(1, 0),
        }
        .encode(&mut buf);
        buf.finish();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 32);
        assert_eq!(buf.remaining(), 31);
    }

    #[test]
    fn end_record_fits_after_a_full_stream() {
        let mut buf = CommandBuffer::with_capacity(9);
        buf.write(&7u64);
        assert_eq!(buf.remaining(), 0);
        buf.finish();
        assert_eq!(buf.len(), 9);
        buf.read::<u64>().unwrap();
        assert_eq!(buf.read::<u8>().unwrap(), Tag::End as u8);
    }

    #[test]
    #[should_panic(expected = "command buffer overflow")]
    fn record_taking_the_end_byte_overflows() {
        let mut buf = CommandBuffer::with_capacity(8);
        buf.write(&7u64);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = CommandBuffer::with_capacity(8);
        buf.write(&200u8);
        assert_eq!(Command::decode(&mut buf), Err(ProtocolError::UnknownTag(200)));
    }

    #[test]
    fn commands_decode_in_order() {
        let mut buf = CommandBuffer::with_capacity(1024);
        let layout = VertexLayout::new().add(Attrib::Position, 3, AttribType::F32, false);
        let targets = [TextureHandle::new(4, 0), TextureHandle::new(5, 2)];

        let written = vec![
            Command::RendererInit {
                kind: BackendKind::Noop,
            },
            Command::CreateVertexLayout {
                handle: VertexLayoutHandle::new(0, 0),
                layout,
            },
            Command::CreateBuffer {
                handle: BufferHandle::new(2, 1),
                desc: BufferDesc {
                    usage: BufferUsage::Index16,
                    flags: BufferFlags::DYNAMIC,
                    layout: VertexLayoutHandle::INVALID,
                    size: 96,
                },
                memory: MemoryRef(3),
            },
            Command::CreateTexture {
                handle: TextureHandle::new(4, 0),
                desc: TextureDesc::new_2d(64, 32, TextureFormat::D24S8),
                memory: None,
            },
            Command::UpdateUniform {
                handle: UniformHandle::new(9, 0),
                data: &[1, 2, 3, 4, 5],
            },
            Command::CreateFrameTarget {
                handle: FrameTargetHandle::new(1, 0),
                attachments: Attachments::new(&targets),
            },
            Command::RendererShutdownBegin,
        ];
        for c in &written {
            c.encode(&mut buf);
        }
        buf.finish();

        for expected in &written {
            assert_eq!(&Command::decode(&mut buf).unwrap(), expected);
        }
        assert_eq!(Command::decode(&mut buf).unwrap(), Command::End);
        assert!(Command::decode(&mut buf).is_err());
    }
}
