//! Per-view state.
//!
//! A view is a logical pass slot with its own viewport, scissor, clear values,
//! transforms and item ordering mode. The submission side owns the
//! authoritative copy; it is snapshotted into each frame at the boundary.

use bitflags::bitflags;

use crate::handle::FrameTargetHandle;
use crate::sort_key::ViewMode;

/// Logical view index.
pub type ViewId = u8;

pub const MAX_VIEWS: usize = 256;

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Backbuffer size in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Integer rectangle in pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ViewRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl ViewRect {
    #[inline]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap of two rectangles; `None` when they only touch or are disjoint.
    pub fn intersect(self, other: ViewRect) -> Option<ViewRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x as u32 + self.width as u32).min(other.x as u32 + other.width as u32);
        let y1 = (self.y as u32 + self.height as u32).min(other.y as u32 + other.height as u32);

        if x1 <= x0 as u32 || y1 <= y0 as u32 {
            None
        } else {
            Some(ViewRect::new(x0, y0, (x1 - x0 as u32) as u16, (y1 - y0 as u32) as u16))
        }
    }
}

bitflags! {
    /// Which attachments a view clears before its first item.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Clear {
    pub flags: ClearFlags,
    /// Packed `0xRRGGBBAA`.
    pub rgba: u32,
    pub depth: f32,
    pub stencil: u8,
}

impl Default for Clear {
    fn default() -> Self {
        Self {
            flags: ClearFlags::empty(),
            rgba: 0x0000_00ff,
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub rect: ViewRect,
    /// Empty means "no view-level scissor".
    pub scissor: ViewRect,
    pub clear: Clear,
    pub mode: ViewMode,
    /// `INVALID` renders to the backbuffer.
    pub frame_target: FrameTargetHandle,
    pub view: [f32; 16],
    pub proj: [f32; 16],
}

impl Default for View {
    fn default() -> Self {
        Self {
            rect: ViewRect::default(),
            scissor: ViewRect::default(),
            clear: Clear::default(),
            mode: ViewMode::default(),
            frame_target: FrameTargetHandle::INVALID,
            view: IDENTITY,
            proj: IDENTITY,
        }
    }
}

/// Builds a full view permutation from a partial order.
///
/// Views listed in `order` come first, in that order; the rest keep their
/// relative id order. `remap[view]` is the view's position.
pub(crate) fn build_remap(order: &[ViewId], remap: &mut [ViewId]) {
    let mut placed = [false; MAX_VIEWS];
    let mut next = 0usize;

    for &view in order {
        if placed[view as usize] {
            log::warn!("view {view} listed twice in view order; ignoring duplicate");
            continue;
        }
        placed[view as usize] = true;
        remap[view as usize] = next as ViewId;
        next += 1;
    }

    for view in 0..remap.len() {
        if !placed[view] {
            remap[view] = next as ViewId;
            next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: u16, y: u16, w: u16, h: u16) -> ViewRect {
        ViewRect::new(x, y, w, h)
    }

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 10, 10)), Some(r(5, 5, 5, 5)));
    }

    #[test]
    fn intersect_contained() {
        let inner = r(10, 10, 20, 20);
        assert_eq!(r(0, 0, 100, 100).intersect(inner), Some(inner));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 10, 10)).is_none());
    }

    #[test]
    fn intersect_near_u16_max_does_not_overflow() {
        let a = r(u16::MAX - 4, 0, 4, 4);
        let b = r(u16::MAX - 2, 0, 100, 4);
        assert_eq!(a.intersect(b), Some(r(u16::MAX - 2, 0, 2, 4)));
    }

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0, 0, 0, 5).is_empty());
        assert!(!r(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn remap_places_ordered_views_first() {
        let mut remap = [0u8; 4];
        build_remap(&[3, 1], &mut remap);
        assert_eq!(remap, [2, 1, 3, 0]);
    }

    #[test]
    fn empty_order_is_identity() {
        let mut remap = [9u8; 4];
        build_remap(&[], &mut remap);
        assert_eq!(remap, [0, 1, 2, 3]);
    }
}
