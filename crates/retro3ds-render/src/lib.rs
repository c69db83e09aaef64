// SPDX-License-Identifier: GPL-2.0-or-later
//! Shared render-side types: the touch rectangle, the screen layout with
//! its stereo flags, and the cursor geometry used by every backend.
mod cursor;

pub use cursor::{CursorGeometry, SoftwareCursor, CURSOR_XOR_MASK};

use bitflags::bitflags;

/// Axis-aligned sub-rectangle of the output buffer, edges inclusive of
/// `left`/`top` and exclusive-ish of `right`/`bottom` the way the layout
/// collaborator reports them (right/bottom are one past the last row the
/// screen occupies when width = right - left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Rect { left, top, right, bottom }
    }

    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left as i32
            && x <= self.right as i32
            && y >= self.top as i32
            && y <= self.bottom as i32
    }
}

bitflags! {
    /// Stereo display modes that split the output buffer and therefore
    /// duplicate the touch region.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StereoFlags: u32 {
        const SIDE_BY_SIDE = 1 << 0;
        const CARDBOARD = 1 << 1;
    }
}

/// Per-frame layout input: where the touch-enabled bottom screen sits in
/// the output buffer, plus the active stereo mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScreenLayout {
    pub bottom_screen: Rect,
    pub stereo: StereoFlags,
}

impl ScreenLayout {
    pub fn new(bottom_screen: Rect) -> Self {
        ScreenLayout { bottom_screen, stereo: StereoFlags::empty() }
    }

    pub fn with_stereo(mut self, stereo: StereoFlags) -> Self {
        self.stereo = stereo;
        self
    }

    /// Maps a buffer-space point onto the touch screen. In side-by-side
    /// and cardboard modes the bottom screen is drawn once per eye, so a
    /// point inside the right-eye copy resolves to the same rectangle.
    pub fn resolve_touch(&self, x: i32, y: i32, buffer_width: u32) -> Option<(i32, i32)> {
        if self.bottom_screen.contains(x, y) {
            return Some((x, y));
        }
        if self
            .stereo
            .intersects(StereoFlags::SIDE_BY_SIDE | StereoFlags::CARDBOARD)
        {
            let shifted = x - (buffer_width / 2) as i32;
            if self.bottom_screen.contains(shifted, y) {
                return Some((shifted, y));
            }
        }
        None
    }
}
