use std::fmt;

/// Pipeline stage a shader object is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Primitive topology for `draw_arrays`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// How the GPU reads one float attribute out of a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Floats per vertex, 1 to 4.
    pub components: u32,
    /// Whether fixed-point data is normalized when read.
    pub normalized: bool,
    /// Byte distance between consecutive vertices; 0 means tightly packed.
    pub stride: u32,
}

impl VertexLayout {
    pub fn packed(components: u32) -> Self {
        Self {
            components,
            normalized: false,
            stride: 0,
        }
    }
}

/// The subset of the GL ES 2.0 API the shading core drives.
///
/// Object names are associated types so a handle from one backend can never
/// be handed to another. Creation calls return `Err` with the driver's reason
/// when the GL hands back the zero name.
///
/// All calls must come from the thread that owns the GL context.
pub trait GlBackend {
    /// Shader object name.
    type Shader: Copy + Eq + fmt::Debug;
    /// Program object name.
    type Program: Copy + Eq + fmt::Debug;
    /// Resolved uniform location within a linked program.
    type UniformLocation: Clone + fmt::Debug;

    fn create_shader(&mut self, kind: ShaderKind) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn link_program(&mut self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<Self::Program>);

    /// Location of an active attribute, `None` when the name is not active.
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    /// Location of an active uniform, `None` when the name is not active.
    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    /// Enable the attribute array at `index` and point it at `data`.
    ///
    /// Fails when the backend cannot allocate storage for the data.
    fn vertex_attrib_array(
        &mut self,
        index: u32,
        layout: VertexLayout,
        data: &[f32],
    ) -> Result<(), String>;
    /// Set a constant generic attribute value at `index`.
    fn vertex_attrib_4f(&mut self, index: u32, value: [f32; 4]);

    fn uniform_1f(&mut self, location: &Self::UniformLocation, value: f32);
    fn uniform_3f(&mut self, location: &Self::UniformLocation, value: [f32; 3]);
    fn uniform_4f(&mut self, location: &Self::UniformLocation, value: [f32; 4]);
    /// Upload a column-major 4x4 matrix.
    fn uniform_matrix_4(&mut self, location: &Self::UniformLocation, value: &[f32; 16]);

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_kind_display() {
        assert_eq!(ShaderKind::Vertex.to_string(), "vertex");
        assert_eq!(ShaderKind::Fragment.to_string(), "fragment");
    }

    #[test]
    fn packed_layout_has_zero_stride() {
        let layout = VertexLayout::packed(3);
        assert_eq!(layout.components, 3);
        assert_eq!(layout.stride, 0);
        assert!(!layout.normalized);
    }
}
