//! 64-bit sort keys and the radix sort that orders a frame.
//!
//! Layout, high to low:
//!
//! ```text
//! 63      56 55 54  53 52                                             0
//! [ view:8 ][D][mode:2][ mode-dependent payload: 53 bits             ]   draw    (D = 1)
//! [ view:8 ][D][ sequence:16 ][ program:10 ][ unused: 29              ]   compute (D = 0)
//! ```
//!
//! Draw payload per [`ViewMode`]:
//! - `Program`: blend:3, program:10, depth:24, sequence:16
//! - `DepthAscending`: depth:24, blend:3, program:10, sequence:16
//! - `DepthDescending`: inverted depth:24, blend:3, program:10, sequence:16
//! - `Sequential`: sequence:16, blend:3, program:10, depth:24
//!
//! Because the discriminator sits directly under the view, every compute item
//! of a view sorts before its draw items. The mode bits make keys
//! self-describing, so [`SortKey::decode`] never needs the item.

use crate::view::ViewId;

pub const VIEW_BITS: u32 = 8;
pub const VIEW_SHIFT: u32 = 64 - VIEW_BITS;
pub const VIEW_MASK: u64 = ((1 << VIEW_BITS) - 1) << VIEW_SHIFT;

const DRAW_BIT: u64 = 1 << 55;

const MODE_SHIFT: u32 = 53;
const MODE_MASK: u64 = 0b11;

pub const BLEND_BITS: u32 = 3;
pub const PROGRAM_BITS: u32 = 10;
pub const DEPTH_BITS: u32 = 24;
pub const SEQUENCE_BITS: u32 = 16;

pub const MAX_BLEND: u8 = (1 << BLEND_BITS) - 1;
pub const MAX_PROGRAMS: u32 = 1 << PROGRAM_BITS;
pub const MAX_DEPTH: u32 = (1 << DEPTH_BITS) - 1;
pub const MAX_SEQUENCE: u32 = (1 << SEQUENCE_BITS) - 1;

const BLEND_MASK: u64 = MAX_BLEND as u64;
const PROGRAM_MASK: u64 = (MAX_PROGRAMS - 1) as u64;
const DEPTH_MASK: u64 = MAX_DEPTH as u64;
const SEQUENCE_MASK: u64 = MAX_SEQUENCE as u64;

const COMPUTE_SEQUENCE_SHIFT: u32 = 39;
const COMPUTE_PROGRAM_SHIFT: u32 = 29;

wire_enum! {
    /// Ordering policy for the draw items of one view.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub enum ViewMode {
        /// Blend order, then program, then depth (front-to-back).
        #[default]
        Program = 0,
        /// Depth front-to-back, then blend order and program.
        DepthAscending = 1,
        /// Depth back-to-front, then blend order and program.
        DepthDescending = 2,
        /// Submission order.
        Sequential = 3,
    }
}

/// Field shifts of one draw layout.
struct DrawLayout {
    blend: u32,
    program: u32,
    depth: u32,
    sequence: u32,
}

impl ViewMode {
    const fn layout(self) -> DrawLayout {
        match self {
            ViewMode::Program => DrawLayout {
                blend: 50,
                program: 40,
                depth: 16,
                sequence: 0,
            },
            ViewMode::DepthAscending | ViewMode::DepthDescending => DrawLayout {
                depth: 29,
                blend: 26,
                program: 16,
                sequence: 0,
            },
            ViewMode::Sequential => DrawLayout {
                sequence: 37,
                blend: 34,
                program: 24,
                depth: 0,
            },
        }
    }
}

/// Decoded draw key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DrawKey {
    pub view: ViewId,
    pub mode: ViewMode,
    pub sequence: u16,
    pub program: u16,
    /// Caller-defined depth, at most [`MAX_DEPTH`]; see [`depth_bits`].
    pub depth: u32,
    /// Blend order; opaque (0) draws sort before blended ones.
    pub blend: u8,
}

impl DrawKey {
    pub fn encode(&self) -> u64 {
        debug_assert!((self.program as u32) < MAX_PROGRAMS, "program index out of key range");
        debug_assert!(self.depth <= MAX_DEPTH, "depth out of key range");
        debug_assert!(self.blend <= MAX_BLEND, "blend order out of key range");

        let layout = self.mode.layout();
        let depth = match self.mode {
            ViewMode::DepthDescending => MAX_DEPTH - (self.depth & MAX_DEPTH),
            _ => self.depth,
        } as u64;

        ((self.view as u64) << VIEW_SHIFT)
            | DRAW_BIT
            | ((self.mode as u64) << MODE_SHIFT)
            | ((self.blend as u64 & BLEND_MASK) << layout.blend)
            | ((self.program as u64 & PROGRAM_MASK) << layout.program)
            | ((depth & DEPTH_MASK) << layout.depth)
            | ((self.sequence as u64 & SEQUENCE_MASK) << layout.sequence)
    }

    fn decode(key: u64) -> Self {
        // Two mode bits cover all four variants.
        let mode = ViewMode::from_wire(((key >> MODE_SHIFT) & MODE_MASK) as u8).unwrap_or_default();
        let layout = mode.layout();
        let depth = ((key >> layout.depth) & DEPTH_MASK) as u32;

        Self {
            view: decode_view(key),
            mode,
            sequence: ((key >> layout.sequence) & SEQUENCE_MASK) as u16,
            program: ((key >> layout.program) & PROGRAM_MASK) as u16,
            depth: match mode {
                ViewMode::DepthDescending => MAX_DEPTH - depth,
                _ => depth,
            },
            blend: ((key >> layout.blend) & BLEND_MASK) as u8,
        }
    }
}

/// Decoded compute key. Compute items of a view run in submission order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ComputeKey {
    pub view: ViewId,
    pub sequence: u16,
    pub program: u16,
}

impl ComputeKey {
    pub fn encode(&self) -> u64 {
        debug_assert!((self.program as u32) < MAX_PROGRAMS, "program index out of key range");

        ((self.view as u64) << VIEW_SHIFT)
            | ((self.sequence as u64 & SEQUENCE_MASK) << COMPUTE_SEQUENCE_SHIFT)
            | ((self.program as u64 & PROGRAM_MASK) << COMPUTE_PROGRAM_SHIFT)
    }

    fn decode(key: u64) -> Self {
        Self {
            view: decode_view(key),
            sequence: ((key >> COMPUTE_SEQUENCE_SHIFT) & SEQUENCE_MASK) as u16,
            program: ((key >> COMPUTE_PROGRAM_SHIFT) & PROGRAM_MASK) as u16,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SortKey {
    Draw(DrawKey),
    Compute(ComputeKey),
}

impl SortKey {
    pub fn encode(&self) -> u64 {
        match self {
            SortKey::Draw(k) => k.encode(),
            SortKey::Compute(k) => k.encode(),
        }
    }

    pub fn decode(key: u64) -> Self {
        if is_compute(key) {
            SortKey::Compute(ComputeKey::decode(key))
        } else {
            SortKey::Draw(DrawKey::decode(key))
        }
    }

    pub fn view(&self) -> ViewId {
        match self {
            SortKey::Draw(k) => k.view,
            SortKey::Compute(k) => k.view,
        }
    }

    pub fn is_compute(&self) -> bool {
        matches!(self, SortKey::Compute(_))
    }
}

/// Draw key in the default [`ViewMode::Program`] ordering.
#[inline]
pub fn encode_draw(view: ViewId, sequence: u16, program: u16, depth: u32) -> u64 {
    DrawKey {
        view,
        mode: ViewMode::Program,
        sequence,
        program,
        depth,
        blend: 0,
    }
    .encode()
}

#[inline]
pub fn encode_compute(view: ViewId, sequence: u16, program: u16) -> u64 {
    ComputeKey {
        view,
        sequence,
        program,
    }
    .encode()
}

#[inline]
pub const fn decode_view(key: u64) -> ViewId {
    (key >> VIEW_SHIFT) as ViewId
}

#[inline]
pub const fn is_compute(key: u64) -> bool {
    key & DRAW_BIT == 0
}

/// Rewrites only the view field: `remap[view]` becomes the key's view.
#[inline]
pub fn remap_view(key: u64, remap: &[ViewId]) -> u64 {
    let view = remap[decode_view(key) as usize];
    (key & !VIEW_MASK) | ((view as u64) << VIEW_SHIFT)
}

/// Maps a non-negative float depth onto the 24-bit depth field, preserving order.
///
/// Negative and NaN inputs map to 0.
#[inline]
pub fn depth_bits(z: f32) -> u32 {
    if !(z > 0.0) {
        return 0;
    }
    // Positive IEEE-754 floats order like their bit patterns; the top 24 of
    // the 31 non-sign bits keep that order.
    (z.to_bits() >> 7).min(MAX_DEPTH)
}

const RADIX_BITS: u32 = 11;
const RADIX: usize = 1 << RADIX_BITS;
const RADIX_MASK: u64 = (RADIX - 1) as u64;
const RADIX_PASSES: u32 = 64_u32.div_ceil(RADIX_BITS);

/// Stable LSD radix sort of `keys`, applying the same permutation to `values`.
///
/// `temp_keys`/`temp_values` are scratch storage of at least `keys.len()`
/// elements. Passes in which every key has the same digit are skipped.
pub fn radix_sort(
    keys: &mut [u64],
    values: &mut [u32],
    temp_keys: &mut [u64],
    temp_values: &mut [u32],
) {
    let len = keys.len();
    assert_eq!(values.len(), len, "radix_sort: keys/values length mismatch");
    assert!(
        temp_keys.len() >= len && temp_values.len() >= len,
        "radix_sort: scratch too small"
    );
    if len < 2 {
        return;
    }

    let temp_keys = &mut temp_keys[..len];
    let temp_values = &mut temp_values[..len];
    let mut histogram = [0u32; RADIX];
    let mut in_temp = false;

    for pass in 0..RADIX_PASSES {
        let shift = pass * RADIX_BITS;
        let (src_keys, src_values, dst_keys, dst_values) = if in_temp {
            (&*temp_keys, &*temp_values, &mut *keys, &mut *values)
        } else {
            (&*keys, &*values, &mut *temp_keys, &mut *temp_values)
        };

        histogram.fill(0);
        let first = ((src_keys[0] >> shift) & RADIX_MASK) as usize;
        let mut uniform = true;
        for &key in src_keys.iter() {
            let digit = ((key >> shift) & RADIX_MASK) as usize;
            histogram[digit] += 1;
            uniform &= digit == first;
        }
        if uniform {
            continue;
        }

        let mut offset = 0u32;
        for count in histogram.iter_mut() {
            let n = *count;
            *count = offset;
            offset += n;
        }

        for (&key, &value) in src_keys.iter().zip(src_values.iter()) {
            let digit = ((key >> shift) & RADIX_MASK) as usize;
            let dst = histogram[digit] as usize;
            dst_keys[dst] = key;
            dst_values[dst] = value;
            histogram[digit] += 1;
        }

        in_temp = !in_temp;
    }

    if in_temp {
        keys.copy_from_slice(temp_keys);
        values.copy_from_slice(temp_values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sorted_indices(keys: &[u64]) -> Vec<u32> {
        let mut k = keys.to_vec();
        let mut v: Vec<u32> = (0..keys.len() as u32).collect();
        let mut tk = vec![0; keys.len()];
        let mut tv = vec![0; keys.len()];
        radix_sort(&mut k, &mut v, &mut tk, &mut tv);
        v
    }

    fn draw(view: ViewId, mode: ViewMode, sequence: u16, program: u16, depth: u32, blend: u8) -> u64 {
        DrawKey {
            view,
            mode,
            sequence,
            program,
            depth,
            blend,
        }
        .encode()
    }

    #[test]
    fn compute_sorts_before_draw_in_same_view() {
        let keys = [
            encode_draw(1, 0, 0, 0),
            encode_compute(1, 5, 900),
            encode_draw(0, 3, 7, 7),
        ];
        // view 0 draw, then view 1 compute, then view 1 draw
        assert_eq!(sorted_indices(&keys), vec![2, 1, 0]);
    }

    #[test]
    fn program_mode_orders_by_program_then_depth() {
        let keys = [
            draw(0, ViewMode::Program, 0, 2, 10, 0),
            draw(0, ViewMode::Program, 1, 1, 50, 0),
            draw(0, ViewMode::Program, 2, 1, 20, 0),
        ];
        assert_eq!(sorted_indices(&keys), vec![2, 1, 0]);
    }

    #[test]
    fn blended_draws_follow_opaque_in_program_mode() {
        let keys = [
            draw(0, ViewMode::Program, 0, 0, 0, 1),
            draw(0, ViewMode::Program, 1, 9, 99, 0),
        ];
        assert_eq!(sorted_indices(&keys), vec![1, 0]);
    }

    #[test]
    fn depth_ascending_is_front_to_back() {
        let keys = [
            draw(0, ViewMode::DepthAscending, 0, 0, 300, 0),
            draw(0, ViewMode::DepthAscending, 1, 5, 100, 0),
            draw(0, ViewMode::DepthAscending, 2, 1, 200, 0),
        ];
        assert_eq!(sorted_indices(&keys), vec![1, 2, 0]);
    }

    #[test]
    fn depth_descending_is_back_to_front() {
        let keys = [
            draw(0, ViewMode::DepthDescending, 0, 0, 300, 0),
            draw(0, ViewMode::DepthDescending, 1, 5, 100, 0),
            draw(0, ViewMode::DepthDescending, 2, 1, 200, 0),
        ];
        assert_eq!(sorted_indices(&keys), vec![0, 2, 1]);
    }

    #[test]
    fn sequential_mode_keeps_submission_order() {
        let keys = [
            draw(0, ViewMode::Sequential, 0, 9, 900, 1),
            draw(0, ViewMode::Sequential, 1, 0, 0, 0),
            draw(0, ViewMode::Sequential, 2, 4, 50, 0),
        ];
        assert_eq!(sorted_indices(&keys), vec![0, 1, 2]);
    }

    #[test]
    fn depth_bits_is_monotonic() {
        let samples = [0.0f32, 1e-6, 0.25, 0.5, 1.0, 10.0, 1e6, f32::MAX];
        for pair in samples.windows(2) {
            assert!(depth_bits(pair[0]) <= depth_bits(pair[1]));
        }
        assert_eq!(depth_bits(-1.0), 0);
        assert_eq!(depth_bits(f32::NAN), 0);
        assert!(depth_bits(f32::MAX) <= MAX_DEPTH);
    }

    #[test]
    fn empty_and_single_sorts_are_noops() {
        assert!(sorted_indices(&[]).is_empty());
        assert_eq!(sorted_indices(&[42]), vec![0]);
    }

    fn any_mode() -> impl Strategy<Value = ViewMode> {
        prop_oneof![
            Just(ViewMode::Program),
            Just(ViewMode::DepthAscending),
            Just(ViewMode::DepthDescending),
            Just(ViewMode::Sequential),
        ]
    }

    proptest! {
        #[test]
        fn draw_key_round_trips(
            view in any::<u8>(),
            mode in any_mode(),
            sequence in any::<u16>(),
            program in 0u16..(MAX_PROGRAMS as u16),
            depth in 0u32..=MAX_DEPTH,
            blend in 0u8..=MAX_BLEND,
        ) {
            let key = DrawKey { view, mode, sequence, program, depth, blend };
            let bits = key.encode();
            prop_assert_eq!(SortKey::decode(bits), SortKey::Draw(key));
            prop_assert_eq!(decode_view(bits), view);
            prop_assert!(!is_compute(bits));
        }

        #[test]
        fn compute_key_round_trips(
            view in any::<u8>(),
            sequence in any::<u16>(),
            program in 0u16..(MAX_PROGRAMS as u16),
        ) {
            let key = ComputeKey { view, sequence, program };
            let bits = key.encode();
            prop_assert_eq!(SortKey::decode(bits), SortKey::Compute(key));
            prop_assert_eq!(decode_view(bits), view);
            prop_assert!(is_compute(bits));
        }

        #[test]
        fn remap_rewrites_only_view(
            view in any::<u8>(),
            sequence in any::<u16>(),
            program in 0u16..(MAX_PROGRAMS as u16),
            depth in 0u32..=MAX_DEPTH,
            table in Just((0..=255u8).collect::<Vec<ViewId>>()).prop_shuffle(),
        ) {
            let remapped = remap_view(encode_draw(view, sequence, program, depth), &table);
            prop_assert_eq!(remapped, encode_draw(table[view as usize], sequence, program, depth));

            let compute = remap_view(encode_compute(view, sequence, program), &table);
            prop_assert_eq!(compute, encode_compute(table[view as usize], sequence, program));
        }

        #[test]
        fn radix_matches_stable_reference(
            keys in prop::collection::vec(
                prop_oneof![any::<u64>(), (0u64..8).prop_map(|k| k << 58), 0u64..4],
                0..512,
            )
        ) {
            let mut reference: Vec<(u64, u32)> =
                keys.iter().copied().zip(0u32..).collect();
            reference.sort_by_key(|&(k, _)| k);
            let expected: Vec<u32> = reference.into_iter().map(|(_, i)| i).collect();

            prop_assert_eq!(sorted_indices(&keys), expected);
        }
    }
}
