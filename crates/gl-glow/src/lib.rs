//! glow backend for the shading core.
//!
//! Wraps a `glow::Context` behind the `GlBackend` seam. Client-side vertex
//! arrays do not exist in core profiles, so each attribute index gets its own
//! streaming vertex buffer that is refilled on every upload.
//!
//! # Invariants
//! - The wrapped context is current on the calling thread for the lifetime of
//!   the backend.
//! - Scratch buffers and the vertex array object are deleted on drop.

use std::collections::HashMap;

use glow::HasContext;
use glshade_gl::{GlBackend, Primitive, ShaderKind, VertexLayout};

pub struct GlowBackend {
    gl: glow::Context,
    vao: glow::VertexArray,
    scratch: HashMap<u32, glow::Buffer>,
}

impl GlowBackend {
    /// Wrap `gl` and bind a vertex array object for attribute state.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread and stay current for as long as
    /// the backend is used.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, String> {
        let vao = unsafe { gl.create_vertex_array() }?;
        unsafe { gl.bind_vertex_array(Some(vao)) };
        tracing::debug!(version = ?gl.version(), "glow backend ready");
        Ok(Self {
            gl,
            vao,
            scratch: HashMap::new(),
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn scratch_buffer(&mut self, index: u32) -> Result<glow::Buffer, String> {
        if let Some(&buffer) = self.scratch.get(&index) {
            return Ok(buffer);
        }
        let buffer = unsafe { self.gl.create_buffer() }?;
        tracing::trace!(index, "scratch vertex buffer allocated");
        self.scratch.insert(index, buffer);
        Ok(buffer)
    }
}

fn shader_type(kind: ShaderKind) -> u32 {
    match kind {
        ShaderKind::Vertex => glow::VERTEX_SHADER,
        ShaderKind::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn primitive_mode(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::Points => glow::POINTS,
        Primitive::Lines => glow::LINES,
        Primitive::LineStrip => glow::LINE_STRIP,
        Primitive::Triangles => glow::TRIANGLES,
        Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
        Primitive::TriangleFan => glow::TRIANGLE_FAN,
    }
}

// Every call below forwards to the context `new` was given, which the caller
// promised is current on this thread.
impl GlBackend for GlowBackend {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&mut self, kind: ShaderKind) -> Result<glow::Shader, String> {
        unsafe { self.gl.create_shader(shader_type(kind)) }
    }

    fn shader_source(&mut self, shader: glow::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }

    fn compile_shader(&mut self, shader: glow::Shader) {
        unsafe { self.gl.compile_shader(shader) }
    }

    fn shader_compile_status(&self, shader: glow::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: glow::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&mut self, shader: glow::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&mut self) -> Result<glow::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&mut self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn detach_shader(&mut self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.detach_shader(program, shader) }
    }

    fn link_program(&mut self, program: glow::Program) {
        unsafe { self.gl.link_program(program) }
    }

    fn program_link_status(&self, program: glow::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: glow::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&mut self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&mut self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn attrib_location(&self, program: glow::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(&self, program: glow::Program, name: &str) -> Option<glow::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn vertex_attrib_array(
        &mut self,
        index: u32,
        layout: VertexLayout,
        data: &[f32],
    ) -> Result<(), String> {
        let buffer = self.scratch_buffer(index)?;
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(data),
                glow::STREAM_DRAW,
            );
            self.gl.enable_vertex_attrib_array(index);
            self.gl.vertex_attrib_pointer_f32(
                index,
                layout.components as i32,
                glow::FLOAT,
                layout.normalized,
                layout.stride as i32,
                0,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        Ok(())
    }

    fn vertex_attrib_4f(&mut self, index: u32, value: [f32; 4]) {
        let [x, y, z, w] = value;
        unsafe {
            self.gl.disable_vertex_attrib_array(index);
            self.gl.vertex_attrib_4_f32(index, x, y, z, w);
        }
    }

    fn uniform_1f(&mut self, location: &glow::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn uniform_3f(&mut self, location: &glow::UniformLocation, value: [f32; 3]) {
        let [x, y, z] = value;
        unsafe { self.gl.uniform_3_f32(Some(location), x, y, z) }
    }

    fn uniform_4f(&mut self, location: &glow::UniformLocation, value: [f32; 4]) {
        let [x, y, z, w] = value;
        unsafe { self.gl.uniform_4_f32(Some(location), x, y, z, w) }
    }

    fn uniform_matrix_4(&mut self, location: &glow::UniformLocation, value: &[f32; 16]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(location), false, value) }
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        unsafe {
            self.gl
                .draw_arrays(primitive_mode(primitive), first as i32, count as i32)
        }
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        unsafe {
            for (_, buffer) in self.scratch.drain() {
                self.gl.delete_buffer(buffer);
            }
            self.gl.bind_vertex_array(None);
            self.gl.delete_vertex_array(self.vao);
        }
    }
}

pub fn crate_info() -> &'static str {
    "glshade-gl-glow v0.1.0"
}
