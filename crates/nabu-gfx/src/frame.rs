//! Per-frame storage.
//!
//! A [`Frame`] is allocated once (twice, for double buffering) and reused for
//! the life of the context. While recording it collects draw and compute items,
//! their sort keys, the command stream and the constant-update stream. On the
//! render side it is sorted and handed read-only to the backend.

use crate::command::CommandBuffer;
use crate::handle::{
    BufferHandle, FrameTargetHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformHandle,
    VertexLayoutHandle,
};
use crate::limits::Limits;
use crate::renderer::RendererStatus;
use crate::resource::{Access, MemoryPool};
use crate::sort_key::{self, DrawKey, ViewMode};
use crate::state::{Discard, StateFlags, StencilState};
use crate::stats::FrameStats;
use crate::uniform::{UniformBuffer, UniformReplay, UniformSpan, UniformTable};
use crate::view::{IDENTITY, Resolution, View, ViewId, ViewRect};

/// Texture, image and buffer binding points per item.
pub const MAX_BINDINGS: usize = 8;

/// Buffer reference with an element range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferRange {
    pub handle: BufferHandle,
    pub start: u32,
    /// `u32::MAX` means "to the end of the buffer".
    pub count: u32,
}

impl BufferRange {
    pub const NONE: Self = Self {
        handle: BufferHandle::INVALID,
        start: 0,
        count: u32::MAX,
    };

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.handle.is_valid()
    }
}

impl Default for BufferRange {
    fn default() -> Self {
        Self::NONE
    }
}

/// Resource bound to one binding point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Binding {
    #[default]
    None,
    Texture {
        handle: TextureHandle,
        /// Backend-defined sampler flags.
        flags: u32,
    },
    Image {
        handle: TextureHandle,
        mip: u8,
        access: Access,
    },
    Buffer {
        handle: BufferHandle,
        access: Access,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawItem {
    pub program: ProgramHandle,
    pub state: StateFlags,
    pub stencil: StencilState,
    /// Packed `0xRRGGBBAA` constant blend factor.
    pub blend_factor: u32,
    /// Per-item scissor, intersected with the view scissor by the backend.
    pub scissor: Option<ViewRect>,
    /// First matrix in the frame's transform cache; slot 0 is identity.
    pub transform: u32,
    pub transform_count: u16,
    pub vertex: BufferRange,
    pub index: BufferRange,
    pub instance: BufferRange,
    pub instance_count: u32,
    pub bindings: [Binding; MAX_BINDINGS],
    /// Constant-stream records written for this item.
    pub constants: UniformSpan,
}

impl Default for DrawItem {
    fn default() -> Self {
        Self {
            program: ProgramHandle::INVALID,
            state: StateFlags::DEFAULT,
            stencil: StencilState::default(),
            blend_factor: 0,
            scissor: None,
            transform: 0,
            transform_count: 1,
            vertex: BufferRange::NONE,
            index: BufferRange::NONE,
            instance: BufferRange::NONE,
            instance_count: 1,
            bindings: [Binding::None; MAX_BINDINGS],
            constants: UniformSpan::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ComputeItem {
    pub program: ProgramHandle,
    pub groups: [u32; 3],
    pub bindings: [Binding; MAX_BINDINGS],
    pub constants: UniformSpan,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RenderItem {
    Draw(DrawItem),
    Compute(ComputeItem),
}

impl RenderItem {
    pub fn program(&self) -> ProgramHandle {
        match self {
            RenderItem::Draw(d) => d.program,
            RenderItem::Compute(c) => c.program,
        }
    }

    pub fn constants(&self) -> UniformSpan {
        match self {
            RenderItem::Draw(d) => d.constants,
            RenderItem::Compute(c) => c.constants,
        }
    }
}

/// One item in replay order.
#[derive(Debug, Copy, Clone)]
pub struct SortedItem<'a> {
    pub key: u64,
    /// Logical view id (before the view-order permutation).
    pub view: ViewId,
    pub item: &'a RenderItem,
}

/// Handle released while recording; applied when the frame is recycled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Freed {
    VertexLayout(VertexLayoutHandle),
    Buffer(BufferHandle),
    Shader(ShaderHandle),
    Program(ProgramHandle),
    Texture(TextureHandle),
    Uniform(UniformHandle),
    FrameTarget(FrameTargetHandle),
}

pub struct Frame {
    pub(crate) commands: CommandBuffer,
    pub(crate) uniforms: UniformBuffer,
    pub(crate) memories: MemoryPool,
    pub(crate) free_list: Vec<Freed>,
    pub(crate) status: RendererStatus,
    pub(crate) stats: FrameStats,
    /// Boundary counter value when this frame was submitted.
    pub(crate) number: u64,

    items: Vec<RenderItem>,
    keys: Vec<u64>,
    indices: Vec<u32>,
    temp_keys: Vec<u64>,
    temp_indices: Vec<u32>,
    max_items: usize,
    sorted: bool,

    views: Vec<View>,
    view_remap: Vec<ViewId>,
    view_unmap: Vec<ViewId>,
    sequence: Vec<u16>,
    resolution: Resolution,

    pub(crate) pending: DrawItem,
    pub(crate) discard: bool,
    uniform_begin: u32,

    transforms: Vec<[f32; 16]>,
    max_transforms: usize,

    dropped_calls: u32,
}

impl Frame {
    pub(crate) fn new(limits: &Limits) -> Self {
        let max_items = limits.max_items as usize;
        let max_views = limits.max_views as usize;
        let max_transforms = limits.max_transforms as usize;

        let mut transforms = Vec::with_capacity(max_transforms);
        transforms.push(IDENTITY);

        let free_capacity = [
            limits.max_buffers,
            limits.max_shaders,
            limits.max_programs,
            limits.max_textures,
            limits.max_uniforms,
            limits.max_frame_targets,
            limits.max_vertex_layouts,
        ]
        .iter()
        .map(|&n| n as usize)
        .sum();

        Self {
            commands: CommandBuffer::with_capacity(limits.command_buffer_size),
            uniforms: UniformBuffer::with_capacity(limits.uniform_buffer_size),
            memories: MemoryPool::new(limits.max_memory_blobs),
            free_list: Vec::with_capacity(free_capacity),
            status: RendererStatus::default(),
            stats: FrameStats::default(),
            number: 0,

            items: Vec::with_capacity(max_items),
            keys: Vec::with_capacity(max_items),
            indices: Vec::with_capacity(max_items),
            temp_keys: vec![0; max_items],
            temp_indices: vec![0; max_items],
            max_items,
            sorted: false,

            views: vec![View::default(); max_views],
            view_remap: (0..max_views).map(|v| v as ViewId).collect(),
            view_unmap: (0..max_views).map(|v| v as ViewId).collect(),
            sequence: vec![0; max_views],
            resolution: Resolution::default(),

            pending: DrawItem::default(),
            discard: false,
            uniform_begin: 0,

            transforms,
            max_transforms,

            dropped_calls: 0,
        }
    }

    /// Records the pending draw state as one item.
    ///
    /// Returns the number of recorded items. A pending discard drops the item;
    /// a full item array drops it and counts a dropped call. Either way the
    /// pending state is cleared.
    pub fn submit(
        &mut self,
        view: ViewId,
        mode: ViewMode,
        program: ProgramHandle,
        depth: u32,
    ) -> u32 {
        if let Some(count) = self.reject() {
            return count;
        }

        let sequence = self.next_sequence(view);
        let mut item = self.pending;
        item.program = program;
        item.constants = self.take_constants();

        let key = DrawKey {
            view,
            mode,
            sequence,
            program: program.index(),
            depth: depth.min(sort_key::MAX_DEPTH),
            blend: item.state.blend_order(),
        }
        .encode();

        self.keys.push(key);
        self.items.push(RenderItem::Draw(item));
        self.reset_pending(Discard::ALL);
        self.num_items()
    }

    /// Records a compute dispatch using the pending bindings and constants.
    ///
    /// `flags` selects which parts of the pending state are cleared afterwards.
    pub fn dispatch(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        groups: [u32; 3],
        flags: Discard,
    ) -> u32 {
        if let Some(count) = self.reject() {
            return count;
        }

        let sequence = self.next_sequence(view);
        let item = ComputeItem {
            program,
            groups,
            bindings: self.pending.bindings,
            constants: self.take_constants(),
        };

        self.keys.push(sort_key::encode_compute(view, sequence, program.index()));
        self.items.push(RenderItem::Compute(item));
        self.reset_pending(flags);
        self.num_items()
    }

    /// Drops the in-progress item on the next `submit`/`dispatch`.
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// Applies the view-order permutation to every key, then radix sorts.
    ///
    /// Idempotent until the next [`start`](Self::start).
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        self.sorted = true;

        let len = self.keys.len();
        for key in self.keys.iter_mut() {
            *key = sort_key::remap_view(*key, &self.view_remap);
        }
        self.indices.clear();
        self.indices.extend(0..len as u32);

        sort_key::radix_sort(
            &mut self.keys,
            &mut self.indices,
            &mut self.temp_keys[..len],
            &mut self.temp_indices[..len],
        );
    }

    /// Rewinds the frame for a new recording interval.
    ///
    /// The free list and renderer status survive; the context consumes them.
    pub fn start(&mut self) {
        self.commands.reset();
        self.uniforms.reset();
        self.memories.clear();
        self.items.clear();
        self.keys.clear();
        self.indices.clear();
        self.sorted = false;
        self.sequence.fill(0);
        self.pending = DrawItem::default();
        self.discard = false;
        self.uniform_begin = 0;
        self.transforms.truncate(1);
        self.dropped_calls = 0;
        self.stats = FrameStats::default();
    }

    /// Terminates both streams.
    pub fn finish(&mut self) {
        self.commands.finish();
        self.uniforms.finish();
    }

    /// Snapshots per-view state at the frame boundary.
    pub(crate) fn capture_views(&mut self, views: &[View], remap: &[ViewId], resolution: Resolution) {
        self.views.clone_from_slice(views);
        self.view_remap.copy_from_slice(remap);
        for (view, &pos) in remap.iter().enumerate() {
            self.view_unmap[pos as usize] = view as ViewId;
        }
        self.resolution = resolution;
    }

    /// Appends matrices to the transform cache.
    ///
    /// Returns the first slot, or `None` (and a dropped call) when the cache is full.
    pub(crate) fn add_transforms(&mut self, matrices: &[[f32; 16]]) -> Option<u32> {
        if self.transforms.len() + matrices.len() > self.max_transforms {
            self.drop_call("transform cache");
            return None;
        }
        let slot = self.transforms.len() as u32;
        self.transforms.extend_from_slice(matrices);
        Some(slot)
    }

    pub(crate) fn reset_pending(&mut self, flags: Discard) {
        let clean = DrawItem::default();
        let pending = &mut self.pending;

        if flags.contains(Discard::STATE) {
            pending.state = clean.state;
            pending.stencil = clean.stencil;
            pending.blend_factor = clean.blend_factor;
            pending.scissor = clean.scissor;
        }
        if flags.contains(Discard::TRANSFORM) {
            pending.transform = clean.transform;
            pending.transform_count = clean.transform_count;
        }
        if flags.contains(Discard::VERTEX_STREAMS) {
            pending.vertex = clean.vertex;
        }
        if flags.contains(Discard::INDEX_BUFFER) {
            pending.index = clean.index;
        }
        if flags.contains(Discard::INSTANCE_DATA) {
            pending.instance = clean.instance;
            pending.instance_count = clean.instance_count;
        }
        if flags.contains(Discard::BINDINGS) {
            pending.bindings = clean.bindings;
        }
    }

    fn reject(&mut self) -> Option<u32> {
        if self.discard {
            self.discard = false;
        } else if self.items.len() >= self.max_items {
            self.drop_call("item array");
        } else {
            return None;
        }
        self.reset_pending(Discard::ALL);
        self.uniform_begin = self.uniforms.pos();
        Some(self.num_items())
    }

    fn next_sequence(&mut self, view: ViewId) -> u16 {
        let counter = &mut self.sequence[view as usize];
        let sequence = *counter;
        *counter = counter.wrapping_add(1);
        sequence
    }

    fn take_constants(&mut self) -> UniformSpan {
        let span = UniformSpan {
            begin: self.uniform_begin,
            end: self.uniforms.pos(),
        };
        self.uniform_begin = span.end;
        span
    }

    fn drop_call(&mut self, what: &str) {
        if self.dropped_calls == 0 {
            log::warn!("{what} full; dropping calls for the rest of this frame");
        }
        self.dropped_calls += 1;
    }

    // Render-side accessors.

    /// Items in replay order. Meaningful after [`sort`](Self::sort).
    pub fn sorted(&self) -> impl Iterator<Item = SortedItem<'_>> + '_ {
        self.keys
            .iter()
            .zip(self.indices.iter())
            .map(|(&key, &index)| SortedItem {
                key,
                view: self.view_unmap[sort_key::decode_view(key) as usize],
                item: &self.items[index as usize],
            })
    }

    /// Item by recording index.
    pub fn item(&self, index: u32) -> Option<&RenderItem> {
        self.items.get(index as usize)
    }

    /// Sort keys in their current order (recording order before `sort`).
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn num_items(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn dropped_calls(&self) -> u32 {
        self.dropped_calls
    }

    /// Per-view state, indexed by logical view id.
    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, id: ViewId) -> &View {
        &self.views[id as usize]
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn matrix(&self, slot: u32) -> &[f32; 16] {
        self.transforms.get(slot as usize).unwrap_or(&IDENTITY)
    }

    pub fn transforms(&self, slot: u32, count: u16) -> &[[f32; 16]] {
        let start = (slot as usize).min(self.transforms.len());
        let end = (start + count as usize).min(self.transforms.len());
        &self.transforms[start..end]
    }

    /// Resolves the constant records of one item.
    pub fn uniforms<'a>(&'a self, span: UniformSpan, table: &'a UniformTable) -> UniformReplay<'a> {
        UniformReplay::new(self.uniforms.records(span), table)
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort_key::SortKey;
    use crate::uniform::UniformType;

    fn limits(max_items: u32) -> Limits {
        Limits {
            max_views: 4,
            max_items,
            max_transforms: 4,
            ..Limits::default()
        }
    }

    fn program(index: u16) -> ProgramHandle {
        ProgramHandle::new(index, 0)
    }

    #[test]
    fn full_item_array_drops_calls() {
        let mut frame = Frame::new(&limits(8));
        for i in 0..8 {
            assert_eq!(frame.submit(0, ViewMode::Program, program(1), 0), i + 1);
        }
        assert_eq!(frame.dropped_calls(), 0);

        assert_eq!(frame.submit(0, ViewMode::Program, program(1), 0), 8);
        assert_eq!(frame.dispatch(0, program(2), [1, 1, 1], Discard::ALL), 8);
        assert_eq!(frame.num_items(), 8);
        assert_eq!(frame.dropped_calls(), 2);
    }

    #[test]
    fn discard_then_submit_records_nothing() {
        let mut frame = Frame::new(&limits(8));
        frame.pending.state = StateFlags::BLEND_ALPHA;
        frame.pending.vertex.handle = BufferHandle::new(3, 0);
        frame.discard();

        assert_eq!(frame.submit(0, ViewMode::Program, program(1), 0), 0);
        assert_eq!(frame.num_items(), 0);
        assert_eq!(frame.pending, DrawItem::default());
        assert!(!frame.discard);

        // The flag applies to one item only.
        assert_eq!(frame.submit(0, ViewMode::Program, program(1), 0), 1);
    }

    #[test]
    fn sequence_is_per_view() {
        let mut frame = Frame::new(&limits(8));
        frame.submit(0, ViewMode::Sequential, program(1), 0);
        frame.submit(1, ViewMode::Sequential, program(1), 0);
        frame.submit(0, ViewMode::Sequential, program(1), 0);

        let seq = |k: u64| match SortKey::decode(k) {
            SortKey::Draw(d) => d.sequence,
            SortKey::Compute(c) => c.sequence,
        };
        let seqs: Vec<u16> = frame.keys().iter().map(|&k| seq(k)).collect();
        assert_eq!(seqs, vec![0, 0, 1]);
    }

    #[test]
    fn constant_spans_cover_writes_since_previous_item() {
        let mut frame = Frame::new(&limits(8));
        frame.uniforms.write_uniform(UniformType::Sampler, 0, &0u32.to_ne_bytes(), 1);
        frame.submit(0, ViewMode::Program, program(1), 0);
        frame.submit(0, ViewMode::Program, program(1), 0);

        let spans: Vec<UniformSpan> = (0..2)
            .map(|i| frame.item(i).unwrap().constants())
            .collect();
        assert_eq!(spans[0], UniformSpan { begin: 0, end: 8 });
        assert!(spans[1].is_empty());
    }

    #[test]
    fn sort_orders_compute_first_and_applies_view_order() {
        let mut frame = Frame::new(&limits(16));
        frame.submit(0, ViewMode::Program, program(5), 0);
        frame.dispatch(0, program(9), [1, 1, 1], Discard::ALL);
        frame.submit(1, ViewMode::Program, program(1), 0);

        let views = vec![View::default(); 4];
        frame.capture_views(&views, &[1, 0, 2, 3], Resolution::default());
        frame.sort();
        frame.sort();

        let order: Vec<(ViewId, u16)> = frame
            .sorted()
            .map(|s| (s.view, s.item.program().index()))
            .collect();
        assert_eq!(order, vec![(1, 1), (0, 9), (0, 5)]);
    }

    #[test]
    fn transform_cache_overflow_is_soft() {
        let mut frame = Frame::new(&limits(8));
        assert_eq!(frame.add_transforms(&[IDENTITY; 2]), Some(1));
        assert_eq!(frame.add_transforms(&[IDENTITY; 2]), None);
        assert_eq!(frame.add_transforms(&[IDENTITY]), Some(3));
        assert_eq!(frame.dropped_calls(), 1);
        assert_eq!(frame.matrix(99), &IDENTITY);
    }

    #[test]
    fn start_rewinds_everything_but_the_free_list() {
        let mut frame = Frame::new(&limits(8));
        frame.submit(0, ViewMode::Program, program(1), 0);
        frame.free_list.push(Freed::Buffer(BufferHandle::new(0, 0)));
        frame.finish();
        frame.start();

        assert_eq!(frame.num_items(), 0);
        assert_eq!(frame.free_list.len(), 1);
        assert!(frame.commands.is_empty());
        assert_eq!(frame.uniforms.pos(), 0);
    }
}
