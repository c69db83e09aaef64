// SPDX-License-Identifier: GPL-2.0-or-later
use crate::analog::{shape_deflection, speed_multiplier};
use anyhow::{Context as _, Result};
use glam::DVec2;
use retro3ds_core::{GraphicsApi, Settings};
use retro3ds_env::input::{device, id, index, InputSource, POINTER_RANGE};
use retro3ds_render::{CursorGeometry, Rect, ScreenLayout, SoftwareCursor};
use retro3ds_render_gl::GlCursor;
use retro3ds_render_vk::VulkanCursor;
use std::sync::Arc;
use tracing::info;

/// Cursor renderer variants, selected once at construction from the
/// active graphics API. All three consume the same geometry.
pub enum CursorBackend {
    OpenGl(GlCursor),
    Vulkan(VulkanCursor),
    Software,
}

/// Rescales one absolute pointer axis (±0x7fff) into buffer pixels.
pub(crate) fn pointer_to_buffer(value: i16, extent: u32) -> i32 {
    ((value as i32 + POINTER_RANGE) as f32 / (POINTER_RANGE * 2) as f32 * extent as f32) as i32
}

/// Tracks the touch cursor over the bottom screen.
///
/// The accumulator position lives in rectangle-local pixel space and is
/// clamped after every update; the projected position re-maps it into
/// full-buffer coordinates for rendering and the touch consumer.
pub struct PointerTracker {
    x: f64,
    y: f64,
    last_mouse_x: i32,
    last_mouse_y: i32,
    projected_x: f32,
    projected_y: f32,
    render_ratio: f32,
    pressed: bool,
    centered: bool,
    layout: ScreenLayout,
    backend: CursorBackend,
}

impl PointerTracker {
    /// The GL backend needs the frontend's GL context; the other
    /// backends take nothing.
    pub fn new(settings: &Settings, gl: Option<Arc<glow::Context>>) -> Result<Self> {
        let backend = match settings.graphics_api {
            GraphicsApi::OpenGl => {
                let gl = gl.context("the GL cursor backend requires a GL context")?;
                CursorBackend::OpenGl(GlCursor::new(gl, settings.use_gles)?)
            }
            GraphicsApi::Vulkan => CursorBackend::Vulkan(VulkanCursor::new()),
            GraphicsApi::Software => CursorBackend::Software,
        };
        info!(
            "cursor backend = {}",
            match backend {
                CursorBackend::OpenGl(_) => "gl",
                CursorBackend::Vulkan(_) => "vk",
                CursorBackend::Software => "software",
            }
        );
        Ok(Self::with_backend(backend))
    }

    pub fn with_backend(backend: CursorBackend) -> Self {
        PointerTracker {
            x: 0.0,
            y: 0.0,
            last_mouse_x: 0,
            last_mouse_y: 0,
            projected_x: 0.0,
            projected_y: 0.0,
            render_ratio: 0.0,
            pressed: false,
            centered: false,
            layout: ScreenLayout::default(),
            backend,
        }
    }

    /// Applies a relative cursor move in rectangle-local pixels.
    pub fn on_move(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Runs one frame of input fusion. Order is fixed: mouse pointer,
    /// touch pointer, analog stick; the absolute paths overwrite each
    /// other, the analog path moves relatively.
    pub fn update(
        &mut self,
        input: &mut dyn InputSource,
        settings: &Settings,
        buffer_width: u32,
        buffer_height: u32,
        layout: ScreenLayout,
    ) {
        let rect = layout.bottom_screen;
        if rect.width() == 0 || rect.height() == 0 {
            return;
        }
        let rect_width = rect.width() as f64;
        let rect_height = rect.height() as f64;

        if !self.centered {
            // Before any input arrives the cursor sits mid-screen; the
            // frontend reports all-zero pointer axes when idle, which
            // never passes the sentinel check below.
            self.x = (rect_width / 2.0).floor();
            self.y = (rect_height / 2.0).floor();
            self.centered = true;
        }

        let mut pressed = false;

        if settings.mouse_touchscreen {
            pressed |= input.pressed(0, device::MOUSE, 0, id::mouse::LEFT);
            self.track_absolute_pointer(input, buffer_width, buffer_height, &layout);
        }

        if settings.touch_touchscreen {
            pressed |= input.pressed(0, device::POINTER, 0, id::pointer::PRESSED);
            self.track_absolute_pointer(input, buffer_width, buffer_height, &layout);
        }

        if settings.analog_touch_enabled() {
            pressed |= input.pressed(0, device::JOYPAD, 0, id::joypad::R2);
            self.track_analog_stick(input, settings, &rect);
        }

        self.x = self.x.clamp(0.0, rect_width - 1.0);
        self.y = self.y.clamp(0.0, rect_height - 1.0);

        // Whole-pixel position, normalized, then re-mapped into the
        // rectangle's own place in the buffer.
        let norm_x = self.x.trunc() / rect_width;
        let norm_y = self.y.trunc() / rect_height;
        self.projected_x = rect.left as f32 + (norm_x * rect_width) as f32;
        self.projected_y = rect.top as f32 + (norm_y * rect_height) as f32;

        self.render_ratio = rect.height() as f32 / 30.0;
        self.pressed = pressed;
        self.layout = layout;
    }

    fn track_absolute_pointer(
        &mut self,
        input: &mut dyn InputSource,
        buffer_width: u32,
        buffer_height: u32,
        layout: &ScreenLayout,
    ) {
        let pointer_x = input.poll(0, device::POINTER, 0, id::pointer::X);
        let pointer_y = input.poll(0, device::POINTER, 0, id::pointer::Y);
        // All-zero means "no pointer data" on most frontends, not a
        // press at the exact buffer center.
        if pointer_x == 0 && pointer_y == 0 {
            return;
        }

        let new_x = pointer_to_buffer(pointer_x, buffer_width);
        let new_y = pointer_to_buffer(pointer_y, buffer_height);
        if new_x == self.last_mouse_x && new_y == self.last_mouse_y {
            return;
        }
        self.last_mouse_x = new_x;
        self.last_mouse_y = new_y;

        let Some((hit_x, hit_y)) = layout.resolve_touch(new_x, new_y, buffer_width) else {
            return;
        };
        let rect = layout.bottom_screen;
        self.x = (hit_x.clamp(rect.left as i32, rect.right as i32) - rect.left as i32) as f64;
        self.y = (hit_y.clamp(rect.top as i32, rect.bottom as i32) - rect.top as i32) as f64;
    }

    fn track_analog_stick(
        &mut self,
        input: &mut dyn InputSource,
        settings: &Settings,
        rect: &Rect,
    ) {
        let axis_x = input.poll(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::X);
        let axis_y = input.poll(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::Y);

        let norm = DVec2::new(
            axis_x as f64 / i16::MAX as f64,
            axis_y as f64 / i16::MAX as f64,
        );
        let radial = norm.length().min(1.0);
        if radial <= settings.deadzone {
            return;
        }

        // Remap the post-deadzone band back onto [0, 1] radially.
        let rescaled = (radial - settings.deadzone) / (1.0 - settings.deadzone);
        let deflection = norm.abs() * (rescaled / radial);
        let shaped = shape_deflection(deflection, settings);

        let speed = speed_multiplier(settings.speed_level, settings.fallback_speed_multiplier)
            * if settings.speedup_enabled {
                settings.speedup_ratio
            } else {
                1.0
            };
        let pixels_per_tick = rect.height() as f64 / 20.0 * speed;

        self.on_move(
            norm.x.signum() * shaped.x * pixels_per_tick,
            norm.y.signum() * shaped.y * pixels_per_tick,
        );
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Pressed position in full-buffer coordinates.
    pub fn pressed_position(&self) -> (u32, u32) {
        (self.projected_x as u32, self.projected_y as u32)
    }

    pub fn projected(&self) -> (f32, f32) {
        (self.projected_x, self.projected_y)
    }

    pub fn render_ratio(&self) -> f32 {
        self.render_ratio
    }

    fn geometry(&self) -> CursorGeometry {
        CursorGeometry::plus_shape(
            self.projected_x,
            self.projected_y,
            self.render_ratio,
            &self.layout.bottom_screen,
        )
    }

    /// Draws the cursor through an accelerated backend. The software
    /// backend has no target here; it renders through `render_into`.
    pub fn render(&mut self, settings: &Settings, buffer_width: u32, buffer_height: u32) {
        if !settings.render_touchscreen {
            return;
        }
        let geometry = self.geometry();
        match &mut self.backend {
            CursorBackend::OpenGl(cursor) => cursor.draw(&geometry, buffer_width, buffer_height),
            CursorBackend::Vulkan(cursor) => cursor.draw(&geometry, buffer_width, buffer_height),
            CursorBackend::Software => {}
        }
    }

    /// Software path: XORs the cursor into a raw RGBA8888 buffer.
    pub fn render_into(
        &mut self,
        settings: &Settings,
        pixels: &mut [u32],
        buffer_width: u32,
        buffer_height: u32,
    ) {
        if !settings.render_touchscreen {
            return;
        }
        if matches!(self.backend, CursorBackend::Software) {
            SoftwareCursor::blit(&self.geometry(), pixels, buffer_width, buffer_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro3ds_core::CStickFunction;
    use std::collections::HashMap;

    struct FakeInput {
        values: HashMap<(u32, u32, u32, u32), i16>,
    }

    impl FakeInput {
        fn new() -> Self {
            FakeInput { values: HashMap::new() }
        }

        fn set(&mut self, port: u32, dev: u32, idx: u32, id: u32, value: i16) -> &mut Self {
            self.values.insert((port, dev, idx, id), value);
            self
        }
    }

    impl InputSource for FakeInput {
        fn poll(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16 {
            self.values.get(&(port, device, index, id)).copied().unwrap_or(0)
        }
    }

    fn bottom_screen() -> ScreenLayout {
        // 400x240 buffer with the touch screen on the lower half.
        ScreenLayout::new(Rect::new(0, 120, 320, 240))
    }

    fn tracker() -> PointerTracker {
        PointerTracker::with_backend(CursorBackend::Software)
    }

    fn analog_settings() -> Settings {
        let mut s = Settings::default();
        s.analog_function = CStickFunction::Touchscreen;
        s.deadzone = 0.0;
        s
    }

    #[test]
    fn pointer_axis_rescaling_lands_on_buffer_pixels() {
        assert_eq!(pointer_to_buffer(0, 400), 200);
        assert_eq!(pointer_to_buffer(0, 240), 120);
        assert_eq!(pointer_to_buffer(-0x7fff, 400), 0);
        assert_eq!(pointer_to_buffer(0x7fff, 400), 400);
    }

    #[test]
    fn idle_pointer_leaves_the_cursor_at_the_rectangle_center() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        t.update(&mut input, &Settings::default(), 400, 240, bottom_screen());
        // (0,0) is the no-data sentinel; the projected position is the
        // center of the bottom screen.
        assert_eq!(t.projected(), (160.0, 180.0));
        assert!(!t.is_pressed());
    }

    #[test]
    fn absolute_pointer_maps_into_the_rectangle() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        // Three quarters right, seven eighths down: buffer (299, 209).
        input
            .set(0, device::POINTER, 0, id::pointer::X, 0x3fff)
            .set(0, device::POINTER, 0, id::pointer::Y, 0x5fff)
            .set(0, device::POINTER, 0, id::pointer::PRESSED, 1);
        t.update(&mut input, &Settings::default(), 400, 240, bottom_screen());
        let (px, py) = t.projected();
        assert_eq!((px, py), (299.0, 209.0));
        assert!(t.is_pressed());
    }

    #[test]
    fn pointer_outside_the_touch_region_is_ignored() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        // Top half of the buffer: outside the bottom screen.
        input
            .set(0, device::POINTER, 0, id::pointer::X, 0x1000)
            .set(0, device::POINTER, 0, id::pointer::Y, -0x4000);
        t.update(&mut input, &Settings::default(), 400, 240, bottom_screen());
        assert_eq!(t.projected(), (160.0, 180.0));
    }

    #[test]
    fn repeated_pointer_reads_do_not_retrigger() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        input
            .set(0, device::POINTER, 0, id::pointer::X, 0x1000)
            .set(0, device::POINTER, 0, id::pointer::Y, 0x4000);
        t.update(&mut input, &Settings::default(), 400, 240, bottom_screen());
        let first = t.projected();

        // Same reading again, then an analog nudge must win because the
        // unchanged pointer is deduplicated.
        let mut s = analog_settings();
        s.speed_level = 4;
        input.set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::X, i16::MAX);
        t.update(&mut input, &s, 400, 240, bottom_screen());
        let second = t.projected();
        assert!(second.0 > first.0);
        assert_eq!(second.1, first.1);
    }

    #[test]
    fn cursor_position_is_clamped_to_the_rectangle() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        let s = analog_settings();
        // Hold the stick hard right-down for many frames.
        input
            .set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::X, i16::MAX)
            .set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::Y, i16::MAX);
        for _ in 0..500 {
            t.update(&mut input, &s, 400, 240, bottom_screen());
        }
        assert_eq!(t.projected(), (319.0, 239.0));

        input
            .set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::X, i16::MIN)
            .set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::Y, i16::MIN);
        for _ in 0..500 {
            t.update(&mut input, &s, 400, 240, bottom_screen());
        }
        assert_eq!(t.projected(), (0.0, 120.0));
    }

    #[test]
    fn deadzone_swallows_small_deflections() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        let mut s = analog_settings();
        s.deadzone = 0.5;
        // 25% deflection: radial length well under the deadzone.
        input.set(
            0,
            device::ANALOG,
            index::ANALOG_RIGHT,
            id::analog::X,
            (i16::MAX as f64 * 0.25) as i16,
        );
        t.update(&mut input, &s, 400, 240, bottom_screen());
        assert_eq!(t.projected(), (160.0, 180.0));
    }

    #[test]
    fn movement_grows_with_deflection_past_the_deadzone() {
        let mut deltas = Vec::new();
        for deflection in [0.4_f64, 0.6, 0.8, 1.0] {
            let mut t = tracker();
            let mut input = FakeInput::new();
            let mut s = analog_settings();
            s.deadzone = 0.2;
            input.set(
                0,
                device::ANALOG,
                index::ANALOG_RIGHT,
                id::analog::X,
                (i16::MAX as f64 * deflection) as i16,
            );
            t.update(&mut input, &s, 400, 240, bottom_screen());
            deltas.push(t.projected().0 - 160.0);
        }
        assert!(deltas.windows(2).all(|w| w[1] > w[0]), "deltas: {deltas:?}");
    }

    #[test]
    fn full_deflection_at_level_nine_moves_a_twentieth_doubled() {
        let mut input = FakeInput::new();
        let mut s = analog_settings();
        s.speed_level = 9;
        input.set(0, device::ANALOG, index::ANALOG_RIGHT, id::analog::Y, i16::MAX);

        let tall = ScreenLayout::new(Rect::new(0, 0, 320, 240));
        let mut t = tracker();
        t.update(&mut input, &s, 320, 240, tall);
        // Starts at center y = 120; one tick at full deflection moves
        // 240 / 20 * 2.0 = 24 pixels.
        assert_eq!(t.projected().1, 144.0);
    }

    #[test]
    fn pressed_state_fuses_all_sources() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        let mut s = analog_settings();
        s.mouse_touchscreen = true;
        input.set(0, device::MOUSE, 0, id::mouse::LEFT, 1);
        t.update(&mut input, &s, 400, 240, bottom_screen());
        assert!(t.is_pressed());

        input.set(0, device::MOUSE, 0, id::mouse::LEFT, 0);
        input.set(0, device::JOYPAD, 0, id::joypad::R2, 1);
        t.update(&mut input, &s, 400, 240, bottom_screen());
        assert!(t.is_pressed());

        input.set(0, device::JOYPAD, 0, id::joypad::R2, 0);
        t.update(&mut input, &s, 400, 240, bottom_screen());
        assert!(!t.is_pressed());
    }

    #[test]
    fn software_render_flips_pixels_under_the_cursor() {
        let mut t = tracker();
        let mut input = FakeInput::new();
        let s = Settings::default();
        t.update(&mut input, &s, 400, 240, bottom_screen());

        let mut pixels = vec![0u32; 400 * 240];
        t.render_into(&s, &mut pixels, 400, 240);
        assert!(pixels.iter().any(|&p| p != 0));

        // render_cursor off leaves the buffer alone.
        let mut s_off = Settings::default();
        s_off.render_touchscreen = false;
        let mut untouched = vec![0u32; 400 * 240];
        t.render_into(&s_off, &mut untouched, 400, 240);
        assert!(untouched.iter().all(|&p| p == 0));
    }
}
