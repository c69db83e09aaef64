// SPDX-License-Identifier: GPL-2.0-or-later
use anyhow::{anyhow, Result};
use glow::HasContext as _;
use retro3ds_render::CursorGeometry;
use std::sync::Arc;
use tracing::debug;

const VERT_DESKTOP: &str = r#"#version 330 core
in vec2 position;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}"#;

const FRAG_DESKTOP: &str = r#"#version 330 core
out vec4 color;
void main() { color = vec4(1.0, 1.0, 1.0, 1.0); }"#;

const VERT_ES: &str = r#"#version 300 es
precision mediump float;
in vec2 position;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}"#;

const FRAG_ES: &str = r#"#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(1.0, 1.0, 1.0, 1.0); }"#;

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program> {
    unsafe {
        let vs = gl
            .create_shader(glow::VERTEX_SHADER)
            .map_err(anyhow::Error::msg)?;
        let fs = gl
            .create_shader(glow::FRAGMENT_SHADER)
            .map_err(anyhow::Error::msg)?;

        gl.shader_source(vs, vert_src);
        gl.compile_shader(vs);

        if !gl.get_shader_compile_status(vs) {
            return Err(anyhow!("GL vert compile: {}", gl.get_shader_info_log(vs)));
        }

        gl.shader_source(fs, frag_src);
        gl.compile_shader(fs);

        if !gl.get_shader_compile_status(fs) {
            return Err(anyhow!("GL frag compile: {}", gl.get_shader_info_log(fs)));
        }

        let program = gl.create_program().map_err(anyhow::Error::msg)?;

        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            return Err(anyhow!("GL link: {}", gl.get_program_info_log(program)));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        Ok(program)
    }
}

/// Converts the cross bars from buffer pixel space into a triangle list in
/// GL clip space (Y up, so pixel rows are flipped).
pub(crate) fn cross_vertices(
    geometry: &CursorGeometry,
    buffer_width: u32,
    buffer_height: u32,
) -> [f32; 24] {
    let to_ndc_x = |x: f32| (x / buffer_width as f32) * 2.0 - 1.0;
    let to_ndc_y = |y: f32| -((y / buffer_height as f32) * 2.0 - 1.0);

    let mut verts = [0.0_f32; 24];
    let mut at = 0;
    for bar in [&geometry.vertical, &geometry.horizontal] {
        let (l, r) = (to_ndc_x(bar[0]), to_ndc_x(bar[2]));
        let (t, b) = (to_ndc_y(bar[1]), to_ndc_y(bar[3]));
        let quad = [l, t, r, t, r, b, l, t, r, b, l, b];
        verts[at..at + 12].copy_from_slice(&quad);
        at += 12;
    }
    verts
}

/// Draws the touch cursor with a solid-white shader pair and
/// inverted-color blending so it stays visible on any background.
pub struct GlCursor {
    gl: Arc<glow::Context>,
    program: glow::Program,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
}

impl GlCursor {
    pub fn new(gl: Arc<glow::Context>, use_gles: bool) -> Result<Self> {
        let (vert, frag) = if use_gles {
            (VERT_ES, FRAG_ES)
        } else {
            (VERT_DESKTOP, FRAG_DESKTOP)
        };
        let program = compile_program(&gl, vert, frag)?;

        unsafe {
            let vao = gl.create_vertex_array().map_err(anyhow::Error::msg)?;
            let vbo = gl.create_buffer().map_err(anyhow::Error::msg)?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));

            let position = gl
                .get_attrib_location(program, "position")
                .ok_or_else(|| anyhow!("cursor shader has no position attribute"))?;
            gl.enable_vertex_attrib_array(position);
            gl.vertex_attrib_pointer_f32(position, 2, glow::FLOAT, false, 0, 0);

            gl.bind_vertex_array(None);

            debug!("GL cursor backend ready (gles={use_gles})");
            Ok(GlCursor { gl, program, vao, vbo })
        }
    }

    pub fn draw(&self, geometry: &CursorGeometry, buffer_width: u32, buffer_height: u32) {
        if buffer_width == 0 || buffer_height == 0 {
            return;
        }
        let verts = cross_vertices(geometry, buffer_width, buffer_height);

        let gl = &self.gl;
        unsafe {
            gl.use_program(Some(self.program));
            gl.bind_vertex_array(Some(self.vao));

            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE_MINUS_DST_COLOR, glow::ONE_MINUS_SRC_COLOR);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&verts),
                glow::STREAM_DRAW,
            );

            gl.draw_arrays(glow::TRIANGLES, 0, 12);

            gl.bind_vertex_array(None);
            gl.use_program(None);
            gl.disable(glow::BLEND);
        }
    }
}

impl Drop for GlCursor {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.vbo);
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_program(self.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro3ds_render::Rect;

    #[test]
    fn cross_vertices_land_in_clip_space() {
        let g = CursorGeometry::plus_shape(200.0, 180.0, 4.0, &Rect::new(0, 120, 320, 240));
        let verts = cross_vertices(&g, 400, 240);
        assert!(verts.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn centered_cursor_straddles_the_origin() {
        let g = CursorGeometry::plus_shape(200.0, 120.0, 8.0, &Rect::new(0, 0, 400, 240));
        let verts = cross_vertices(&g, 400, 240);
        let xs: Vec<f32> = verts.iter().step_by(2).copied().collect();
        let ys: Vec<f32> = verts.iter().skip(1).step_by(2).copied().collect();
        assert!(xs.iter().any(|&x| x < 0.0) && xs.iter().any(|&x| x > 0.0));
        assert!(ys.iter().any(|&y| y < 0.0) && ys.iter().any(|&y| y > 0.0));
    }
}
