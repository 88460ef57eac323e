//! Generational resource handles.
//!
//! Every GPU object is referenced through a [`Handle<K>`]: a dense 16-bit slot
//! index plus a 16-bit generation. Slots come from a fixed-capacity
//! [`HandleAllocator`]; freeing a slot bumps its generation so stale copies of
//! the handle are detected instead of silently aliasing the next resource.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem;

/// Resource kind tags.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceType {
    Buffer,
    Shader,
    Program,
    Texture,
    Uniform,
    FrameTarget,
    VertexLayout,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Buffer,
        ResourceType::Shader,
        ResourceType::Program,
        ResourceType::Texture,
        ResourceType::Uniform,
        ResourceType::FrameTarget,
        ResourceType::VertexLayout,
    ];
}

/// Marker implemented by the zero-sized kind types in [`kind`].
pub trait ResourceKind: 'static {
    const TYPE: ResourceType;
}

/// Uninhabited marker types, one per resource kind.
pub mod kind {
    use super::{ResourceKind, ResourceType};

    macro_rules! kinds {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug)]
                pub enum $name {}

                impl ResourceKind for $name {
                    const TYPE: ResourceType = ResourceType::$name;
                }
            )*
        };
    }

    kinds!(Buffer, Shader, Program, Texture, Uniform, FrameTarget, VertexLayout);
}

pub type BufferHandle = Handle<kind::Buffer>;
pub type ShaderHandle = Handle<kind::Shader>;
pub type ProgramHandle = Handle<kind::Program>;
pub type TextureHandle = Handle<kind::Texture>;
pub type UniformHandle = Handle<kind::Uniform>;
pub type FrameTargetHandle = Handle<kind::FrameTarget>;
pub type VertexLayoutHandle = Handle<kind::VertexLayout>;

const INVALID_INDEX: u16 = u16::MAX;

/// Typed reference to a slot in a [`HandleAllocator`].
pub struct Handle<K> {
    index: u16,
    generation: u16,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    /// Sentinel that never refers to a live slot.
    pub const INVALID: Self = Self::new(INVALID_INDEX, 0);

    #[inline]
    pub(crate) const fn new(index: u16, generation: u16) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Dense slot index; backends use it to address their own tables.
    #[inline]
    pub const fn index(self) -> u16 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_INDEX
    }

    /// Packs the handle as `generation << 16 | index` for the command stream.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        ((self.generation as u32) << 16) | self.index as u32
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self::new(bits as u16, (bits >> 16) as u16)
    }
}

impl<K> Clone for Handle<K> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

impl<K> Default for Handle<K> {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: ResourceKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:?}({}v{})", K::TYPE, self.index, self.generation)
        } else {
            write!(f, "{:?}(invalid)", K::TYPE)
        }
    }
}

/// Fixed-capacity slot allocator with O(1) `alloc`/`free`.
///
/// Layout: `dense[..live]` holds live slot indices, `dense[live..]` the free
/// ones; `sparse[i]` is the position of slot `i` inside `dense`. A freed slot
/// is swapped to the front of the free region, so reuse is LIFO.
pub struct HandleAllocator<K> {
    dense: Vec<u16>,
    sparse: Vec<u16>,
    generations: Vec<u16>,
    retiring: Vec<bool>,
    live: u16,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> HandleAllocator<K> {
    /// Creates an allocator with `capacity` slots. The storage is never resized.
    pub fn new(capacity: u16) -> Self {
        Self {
            dense: (0..capacity).collect(),
            sparse: (0..capacity).collect(),
            generations: vec![0; capacity as usize],
            retiring: vec![false; capacity as usize],
            live: 0,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u16 {
        self.dense.len() as u16
    }

    /// Number of live handles.
    #[inline]
    pub fn count(&self) -> u16 {
        self.live
    }

    /// Returns `None` when every slot is taken.
    pub fn alloc(&mut self) -> Option<Handle<K>> {
        if self.live as usize == self.dense.len() {
            return None;
        }

        let index = self.dense[self.live as usize];
        self.live += 1;
        Some(Handle::new(index, self.generations[index as usize]))
    }

    /// Returns `handle`'s slot to the free region.
    ///
    /// # Panics
    /// Panics on a double free or a handle from an earlier generation.
    pub fn free(&mut self, handle: Handle<K>) {
        assert!(
            self.is_valid(handle),
            "free of dead {:?} handle {handle:?}",
            K::TYPE
        );

        let index = handle.index();
        let slot = index as usize;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.retiring[slot] = false;

        self.live -= 1;
        let pos = self.sparse[slot];
        let last = self.dense[self.live as usize];

        self.dense[self.live as usize] = index;
        self.sparse[slot] = self.live;
        self.dense[pos as usize] = last;
        self.sparse[last as usize] = pos;
    }

    /// `true` if `handle` is live and of the current generation.
    #[inline]
    pub fn is_valid(&self, handle: Handle<K>) -> bool {
        let slot = handle.index() as usize;
        slot < self.dense.len()
            && self.sparse[slot] < self.live
            && self.generations[slot] == handle.generation()
    }

    /// Marks a live handle as destroyed ahead of its deferred [`free`](Self::free).
    ///
    /// The slot stays live until freed. Returns `false` if it was already
    /// marked.
    pub fn retire(&mut self, handle: Handle<K>) -> bool {
        debug_assert!(self.is_valid(handle));
        let slot = handle.index() as usize;
        !mem::replace(&mut self.retiring[slot], true)
    }

    /// Iterates live handles in allocation-table order.
    pub fn live(&self) -> impl Iterator<Item = Handle<K>> + '_ {
        self.dense[..self.live as usize]
            .iter()
            .map(|&index| Handle::new(index, self.generations[index as usize]))
    }
}

/// Live handle counts, one per resource kind.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct HandleCounts {
    pub buffers: u16,
    pub shaders: u16,
    pub programs: u16,
    pub textures: u16,
    pub uniforms: u16,
    pub frame_targets: u16,
    pub vertex_layouts: u16,
}

impl HandleCounts {
    pub fn get(&self, ty: ResourceType) -> u16 {
        match ty {
            ResourceType::Buffer => self.buffers,
            ResourceType::Shader => self.shaders,
            ResourceType::Program => self.programs,
            ResourceType::Texture => self.textures,
            ResourceType::Uniform => self.uniforms,
            ResourceType::FrameTarget => self.frame_targets,
            ResourceType::VertexLayout => self.vertex_layouts,
        }
    }

    pub fn total(&self) -> u32 {
        ResourceType::ALL.iter().map(|&ty| self.get(ty) as u32).sum()
    }
}

/// One allocator per resource kind, owned by the submission side.
pub(crate) struct HandleTables {
    pub buffers: HandleAllocator<kind::Buffer>,
    pub shaders: HandleAllocator<kind::Shader>,
    pub programs: HandleAllocator<kind::Program>,
    pub textures: HandleAllocator<kind::Texture>,
    pub uniforms: HandleAllocator<kind::Uniform>,
    pub frame_targets: HandleAllocator<kind::FrameTarget>,
    pub vertex_layouts: HandleAllocator<kind::VertexLayout>,
}

impl HandleTables {
    pub fn new(limits: &crate::limits::Limits) -> Self {
        Self {
            buffers: HandleAllocator::new(limits.max_buffers),
            shaders: HandleAllocator::new(limits.max_shaders),
            programs: HandleAllocator::new(limits.max_programs),
            textures: HandleAllocator::new(limits.max_textures),
            uniforms: HandleAllocator::new(limits.max_uniforms),
            frame_targets: HandleAllocator::new(limits.max_frame_targets),
            vertex_layouts: HandleAllocator::new(limits.max_vertex_layouts),
        }
    }

    pub fn counts(&self) -> HandleCounts {
        HandleCounts {
            buffers: self.buffers.count(),
            shaders: self.shaders.count(),
            programs: self.programs.count(),
            textures: self.textures.count(),
            uniforms: self.uniforms.count(),
            frame_targets: self.frame_targets.count(),
            vertex_layouts: self.vertex_layouts.count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Alloc = HandleAllocator<kind::Buffer>;

    #[test]
    fn alloc_is_dense_until_full() {
        let mut a = Alloc::new(3);
        let h: Vec<_> = (0..3).map(|_| a.alloc().unwrap()).collect();
        assert_eq!(h.iter().map(|h| h.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(a.count(), 3);
        assert!(a.alloc().is_none());
    }

    #[test]
    fn free_reuses_slot_with_new_generation() {
        let mut a = Alloc::new(4);
        let first = a.alloc().unwrap();
        let _second = a.alloc().unwrap();
        a.free(first);

        let reused = a.alloc().unwrap();
        assert_eq!(reused.index(), first.index());
        assert_ne!(reused.generation(), first.generation());
        assert!(!a.is_valid(first));
        assert!(a.is_valid(reused));
    }

    #[test]
    fn free_from_middle_keeps_live_set_consistent() {
        let mut a = Alloc::new(8);
        let h: Vec<_> = (0..5).map(|_| a.alloc().unwrap()).collect();
        a.free(h[1]);
        a.free(h[3]);

        let mut live: Vec<u16> = a.live().map(|h| h.index()).collect();
        live.sort_unstable();
        assert_eq!(live, vec![0, 2, 4]);
        assert_eq!(a.count(), 3);
    }

    #[test]
    #[should_panic(expected = "free of dead")]
    fn double_free_panics() {
        let mut a = Alloc::new(2);
        let h = a.alloc().unwrap();
        a.free(h);
        a.free(h);
    }

    #[test]
    fn retire_marks_once_until_freed() {
        let mut a = Alloc::new(2);
        let h = a.alloc().unwrap();
        assert!(a.retire(h));
        assert!(!a.retire(h));
        assert!(a.is_valid(h));
        assert_eq!(a.count(), 1);

        a.free(h);
        let reused = a.alloc().unwrap();
        assert_eq!(reused.index(), h.index());
        assert!(a.retire(reused));
    }

    #[test]
    fn invalid_handle_is_never_live() {
        let a = Alloc::new(2);
        assert!(!BufferHandle::INVALID.is_valid());
        assert!(!a.is_valid(BufferHandle::INVALID));
    }

    #[test]
    fn bits_round_trip() {
        let h = TextureHandle::new(42, 7);
        assert_eq!(TextureHandle::from_bits(h.to_bits()), h);
        assert_eq!(format!("{h:?}"), "Texture(42v7)");
    }
}
