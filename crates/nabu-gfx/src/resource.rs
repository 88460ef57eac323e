//! Resource descriptors and payload memory.
//!
//! Everything here is backend-agnostic: formats and usages are abstract values
//! that each backend translates to its native equivalents.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::error::{Fatal, fatal};
use crate::handle::VertexLayoutHandle;

/// Maximum color + depth attachments of a frame target.
pub const MAX_ATTACHMENTS: usize = 8;

/// Maximum attributes in one [`VertexLayout`].
pub const MAX_ATTRIBUTES: usize = 8;

/// Owned payload handed to a create/update call.
///
/// The blob travels with the frame and is released when the frame is recycled.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory(Box<[u8]>);

impl Memory {
    pub fn copy(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Copies a slice of plain-old-data values (vertices, indices, matrices).
    pub fn of<T: Pod>(values: &[T]) -> Self {
        Self::copy(bytemuck::cast_slice(values))
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Memory {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl From<&[u8]> for Memory {
    fn from(bytes: &[u8]) -> Self {
        Self::copy(bytes)
    }
}

impl core::fmt::Debug for Memory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Memory({} bytes)", self.0.len())
    }
}

/// Index of a [`Memory`] blob inside a frame's pool.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MemoryRef(pub(crate) u32);

impl MemoryRef {
    pub(crate) const NONE: u32 = u32::MAX;
}

/// Per-frame blob table with a fixed number of slots.
pub(crate) struct MemoryPool {
    blobs: Vec<Memory>,
    capacity: usize,
}

impl MemoryPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            blobs: Vec::with_capacity(capacity as usize),
            capacity: capacity as usize,
        }
    }

    pub fn push(&mut self, memory: Memory) -> MemoryRef {
        if self.blobs.len() >= self.capacity {
            fatal(Fatal::MemoryTableFull {
                capacity: self.capacity,
            });
        }
        self.blobs.push(memory);
        MemoryRef(self.blobs.len() as u32 - 1)
    }

    #[inline]
    pub fn get(&self, r: MemoryRef) -> &[u8] {
        self.blobs[r.0 as usize].as_slice()
    }

    pub fn clear(&mut self) {
        self.blobs.clear();
    }
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub enum BufferUsage {
        #[default]
        Vertex = 0,
        Index16 = 1,
        Index32 = 2,
        Instance = 3,
        Storage = 4,
        Indirect = 5,
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u16 {
        /// Contents may be replaced with `update_buffer`.
        const DYNAMIC = 1 << 0;
        const COMPUTE_READ = 1 << 1;
        const COMPUTE_WRITE = 1 << 2;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct BufferDesc {
    pub usage: BufferUsage,
    pub flags: BufferFlags,
    /// Required for `Vertex` and `Instance` usage.
    pub layout: VertexLayoutHandle,
    /// Size in bytes; when zero the initial data length is used.
    pub size: u32,
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub enum Attrib {
        Position = 0,
        Normal = 1,
        Tangent = 2,
        Color0 = 3,
        Color1 = 4,
        TexCoord0 = 5,
        TexCoord1 = 6,
        Indices = 7,
        Weights = 8,
    }
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub enum AttribType {
        U8 = 0,
        I16 = 1,
        F16 = 2,
        F32 = 3,
    }
}

impl AttribType {
    pub const fn size(self) -> u16 {
        match self {
            AttribType::U8 => 1,
            AttribType::I16 | AttribType::F16 => 2,
            AttribType::F32 => 4,
        }
    }
}

/// One attribute as stored in a [`VertexLayout`].
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Pod, Zeroable)]
pub struct VertexAttribute {
    pub attrib: u8,
    pub components: u8,
    pub ty: u8,
    pub normalized: u8,
    pub offset: u16,
}

impl VertexAttribute {
    pub fn attrib(&self) -> Option<Attrib> {
        Attrib::from_wire(self.attrib).ok()
    }

    pub fn ty(&self) -> Option<AttribType> {
        AttribType::from_wire(self.ty).ok()
    }
}

/// Interleaved vertex layout, built with [`VertexLayout::add`].
///
/// The struct is plain data so it can be copied into the command stream as-is.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Pod, Zeroable)]
pub struct VertexLayout {
    pub stride: u16,
    count: u8,
    _pad: u8,
    attributes: [VertexAttribute; MAX_ATTRIBUTES],
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute at the current end of the vertex.
    ///
    /// # Panics
    /// Panics when more than [`MAX_ATTRIBUTES`] attributes are added.
    pub fn add(mut self, attrib: Attrib, components: u8, ty: AttribType, normalized: bool) -> Self {
        assert!(
            (self.count as usize) < MAX_ATTRIBUTES,
            "vertex layout holds at most {MAX_ATTRIBUTES} attributes"
        );
        self.attributes[self.count as usize] = VertexAttribute {
            attrib: attrib as u8,
            components,
            ty: ty as u8,
            normalized: normalized as u8,
            offset: self.stride,
        };
        self.count += 1;
        self.stride += components as u16 * ty.size();
        self
    }

    /// Leaves a gap of `bytes` in the vertex.
    pub fn skip(mut self, bytes: u16) -> Self {
        self.stride += bytes;
        self
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes[..self.count as usize]
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.attributes().iter().any(|a| a.attrib == attrib as u8)
    }
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub enum ShaderStage {
        Vertex = 0,
        Fragment = 1,
        Compute = 2,
    }
}

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub enum TextureFormat {
        R8 = 0,
        Rg8 = 1,
        #[default]
        Rgba8 = 2,
        Bgra8 = 3,
        R32F = 4,
        Rgba16F = 5,
        Rgba32F = 6,
        Bc1 = 7,
        Bc3 = 8,
        D16 = 9,
        D24S8 = 10,
        D32F = 11,
    }
}

impl TextureFormat {
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D16 | TextureFormat::D24S8 | TextureFormat::D32F)
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self, TextureFormat::Bc1 | TextureFormat::Bc3)
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        const RENDER_TARGET = 1 << 0;
        const COMPUTE_WRITE = 1 << 1;
        const SRGB = 1 << 2;
        const READ_BACK = 1 << 3;
        const CUBE = 1 << 4;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u16,
    pub height: u16,
    /// Array layers (6 per cube).
    pub layers: u16,
    pub mips: u8,
    pub format: TextureFormat,
    pub flags: TextureFlags,
}

impl TextureDesc {
    pub fn new_2d(width: u16, height: u16, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            layers: 1,
            mips: 1,
            format,
            flags: TextureFlags::empty(),
        }
    }
}

/// Sub-rectangle of one mip level and layer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct TextureRegion {
    pub mip: u8,
    pub layer: u16,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Access mode of a compute binding.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Access {
    #[default]
    Read,
    Write,
    ReadWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_accumulates_offsets_and_stride() {
        let layout = VertexLayout::new()
            .add(Attrib::Position, 3, AttribType::F32, false)
            .add(Attrib::Color0, 4, AttribType::U8, true)
            .add(Attrib::TexCoord0, 2, AttribType::F16, false);

        let offsets: Vec<u16> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(layout.stride, 20);
        assert!(layout.has(Attrib::Color0));
        assert!(!layout.has(Attrib::Normal));
        assert_eq!(layout.attributes()[1].attrib(), Some(Attrib::Color0));
    }

    #[test]
    fn format_classes() {
        assert!(TextureFormat::D24S8.is_depth());
        assert!(!TextureFormat::D24S8.is_compressed());
        assert!(TextureFormat::Bc3.is_compressed());
        assert!(!TextureFormat::Rgba8.is_depth());
    }

    #[test]
    fn skip_pads_stride() {
        let layout = VertexLayout::new()
            .add(Attrib::Position, 2, AttribType::F32, false)
            .skip(8);
        assert_eq!(layout.stride, 16);
    }

    #[test]
    #[should_panic(expected = "at most")]
    fn too_many_attributes_panics() {
        let mut layout = VertexLayout::new();
        for _ in 0..=MAX_ATTRIBUTES {
            layout = layout.add(Attrib::TexCoord0, 1, AttribType::F32, false);
        }
    }

    #[test]
    fn memory_of_pod_slice() {
        let m = Memory::of(&[1u16, 2, 3]);
        assert_eq!(m.len(), 6);
        assert_eq!(m.as_slice(), bytemuck::cast_slice::<u16, u8>(&[1, 2, 3]));
    }
}
