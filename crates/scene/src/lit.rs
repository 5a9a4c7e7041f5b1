use glam::{Mat4, Vec3};
use glshade_gl::{GlBackend, GlContext};
use glshade_shading::{ShadingError, ShadingProgram};

use crate::SceneError;
use crate::presets;

/// The lit-scene program with one method per parameter it reads.
///
/// Each `link_*` call makes the program current before uploading, so calls
/// may be interleaved with other programs on the same context.
#[derive(Debug)]
pub struct LitSceneProgram<B: GlBackend> {
    program: ShadingProgram<B>,
}

impl<B: GlBackend> LitSceneProgram<B> {
    pub fn new() -> Result<Self, SceneError> {
        let descriptor = presets::preset("lit-scene")?;
        Ok(Self {
            program: descriptor.build(),
        })
    }

    pub fn program(&self) -> &ShadingProgram<B> {
        &self.program
    }

    pub fn setup(&mut self, ctx: &mut GlContext<B>) -> Result<(), ShadingError> {
        self.program.setup(ctx)
    }

    pub fn release(&mut self, ctx: &mut GlContext<B>) {
        self.program.release(ctx);
    }

    /// Positions, three floats per vertex.
    pub fn link_vertices(&self, ctx: &mut GlContext<B>, vertices: &[f32]) -> Result<(), ShadingError> {
        self.link_array(ctx, "a_vertex", vertices, 3)
    }

    /// Normals, three floats per vertex.
    pub fn link_normals(&self, ctx: &mut GlContext<B>, normals: &[f32]) -> Result<(), ShadingError> {
        self.link_array(ctx, "a_normal", normals, 3)
    }

    /// RGBA colors, four floats per vertex.
    pub fn link_colors(&self, ctx: &mut GlContext<B>, colors: &[f32]) -> Result<(), ShadingError> {
        self.link_array(ctx, "a_color", colors, 4)
    }

    pub fn link_model_view_projection(&self, ctx: &mut GlContext<B>, mvp: Mat4) -> Result<(), ShadingError> {
        self.program.execute_using(ctx, |ctx, p| {
            p.bind_uniform(ctx, "u_modelViewProjectionMatrix")?
                .bind_matrix4(ctx, &mvp.to_cols_array())
        })
    }

    pub fn link_camera(&self, ctx: &mut GlContext<B>, camera: Vec3) -> Result<(), ShadingError> {
        self.link_vec3(ctx, "u_camera", camera)
    }

    pub fn link_light_source(&self, ctx: &mut GlContext<B>, light: Vec3) -> Result<(), ShadingError> {
        self.link_vec3(ctx, "u_lightPosition", light)
    }

    fn link_array(
        &self,
        ctx: &mut GlContext<B>,
        name: &str,
        data: &[f32],
        components: u32,
    ) -> Result<(), ShadingError> {
        self.program.execute_using(ctx, |ctx, p| {
            p.bind_attribute(ctx, name)?
                .bind_vertex_data(ctx, data, components, false, 0)
        })
    }

    fn link_vec3(&self, ctx: &mut GlContext<B>, name: &str, v: Vec3) -> Result<(), ShadingError> {
        self.program.execute_using(ctx, |ctx, p| {
            p.bind_uniform(ctx, name)?.bind_vec3(ctx, v.x, v.y, v.z)
        })
    }
}
