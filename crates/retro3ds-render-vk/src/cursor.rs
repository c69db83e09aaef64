// SPDX-License-Identifier: GPL-2.0-or-later
use retro3ds_render::CursorGeometry;
use tracing::trace;

/// Cursor backend for the Vulkan path. Geometry is computed for parity
/// with the other backends, but no draw is recorded: touch input works,
/// only the visual cursor is absent. Wiring a pipeline into the
/// presentation render pass is the known gap here.
#[derive(Default)]
pub struct VulkanCursor {
    last_geometry: Option<CursorGeometry>,
}

impl VulkanCursor {
    pub fn new() -> Self {
        VulkanCursor::default()
    }

    pub fn draw(&mut self, geometry: &CursorGeometry, buffer_width: u32, buffer_height: u32) {
        trace!(
            "vulkan cursor at {:?} in {buffer_width}x{buffer_height} (not drawn)",
            geometry.vertical
        );
        self.last_geometry = Some(*geometry);
    }

    /// Geometry of the most recent frame, if any.
    pub fn last_geometry(&self) -> Option<&CursorGeometry> {
        self.last_geometry.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro3ds_render::Rect;

    #[test]
    fn draw_records_geometry_without_rendering() {
        let mut cursor = VulkanCursor::new();
        assert!(cursor.last_geometry().is_none());
        let g = CursorGeometry::plus_shape(160.0, 180.0, 4.0, &Rect::new(0, 120, 320, 240));
        cursor.draw(&g, 400, 240);
        assert_eq!(cursor.last_geometry(), Some(&g));
    }
}
