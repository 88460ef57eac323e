//! Fixed-function render state carried by draw items.

use bitflags::bitflags;

bitflags! {
    /// Abstract pipeline state; each backend maps it to native state objects.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct StateFlags: u64 {
        const WRITE_R = 1 << 0;
        const WRITE_G = 1 << 1;
        const WRITE_B = 1 << 2;
        const WRITE_A = 1 << 3;
        const WRITE_Z = 1 << 4;
        const WRITE_RGB = Self::WRITE_R.bits() | Self::WRITE_G.bits() | Self::WRITE_B.bits();

        const DEPTH_TEST_LESS = 1 << 8;
        const DEPTH_TEST_LEQUAL = 1 << 9;
        const DEPTH_TEST_EQUAL = 1 << 10;
        const DEPTH_TEST_GREATER = 1 << 11;
        const DEPTH_TEST_ALWAYS = 1 << 12;

        const CULL_CW = 1 << 16;
        const CULL_CCW = 1 << 17;

        const BLEND_ALPHA = 1 << 24;
        const BLEND_ADD = 1 << 25;
        const BLEND_MULTIPLY = 1 << 26;
        const BLEND_INDEPENDENT = 1 << 27;

        const PT_TRISTRIP = 1 << 32;
        const PT_LINES = 1 << 33;
        const PT_LINESTRIP = 1 << 34;
        const PT_POINTS = 1 << 35;

        const MSAA = 1 << 40;
        const CONSERVATIVE_RASTER = 1 << 41;
    }
}

impl StateFlags {
    /// Opaque triangles, depth-tested, back faces culled.
    pub const DEFAULT: Self = Self::WRITE_RGB
        .union(Self::WRITE_A)
        .union(Self::WRITE_Z)
        .union(Self::DEPTH_TEST_LESS)
        .union(Self::CULL_CW)
        .union(Self::MSAA);

    /// Blend-order field of the sort key: opaque first, then each blend kind.
    pub fn blend_order(self) -> u8 {
        if self.contains(Self::BLEND_INDEPENDENT) {
            4
        } else if self.contains(Self::BLEND_MULTIPLY) {
            3
        } else if self.contains(Self::BLEND_ADD) {
            2
        } else if self.contains(Self::BLEND_ALPHA) {
            1
        } else {
            0
        }
    }
}

impl Default for StateFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

bitflags! {
    /// Which parts of the pending item state survive a `submit`/`dispatch`.
    ///
    /// Passing a flag discards that part; [`Discard::ALL`] starts the next
    /// item from a clean slate.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Discard: u8 {
        const BINDINGS = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const VERTEX_STREAMS = 1 << 2;
        const INSTANCE_DATA = 1 << 3;
        const STATE = 1 << 4;
        const TRANSFORM = 1 << 5;
        const ALL = Self::BINDINGS.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::VERTEX_STREAMS.bits()
            | Self::INSTANCE_DATA.bits()
            | Self::STATE.bits()
            | Self::TRANSFORM.bits();
    }
}

/// Packed front and back stencil state; zero disables the stencil test.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct StencilState {
    pub front: u32,
    pub back: u32,
}

impl StencilState {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.front != 0 || self.back != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_order_puts_opaque_first() {
        assert_eq!(StateFlags::DEFAULT.blend_order(), 0);
        assert_eq!((StateFlags::DEFAULT | StateFlags::BLEND_ALPHA).blend_order(), 1);
        assert_eq!((StateFlags::BLEND_ALPHA | StateFlags::BLEND_ADD).blend_order(), 2);
    }

    #[test]
    fn zero_stencil_is_disabled() {
        assert!(!StencilState::default().is_enabled());
        assert!(StencilState { front: 0, back: 0x11 }.is_enabled());
    }

    #[test]
    fn blend_order_fits_key_field() {
        assert!(StateFlags::all().blend_order() <= crate::sort_key::MAX_BLEND);
    }
}
