use glshade_gl::{GlBackend, GlContext, VertexLayout};

use crate::error::{ParamKind, ShadingError, UnknownParameter};

fn ensure_current<B: GlBackend>(
    ctx: &GlContext<B>,
    program: B::Program,
    generation: u64,
    name: &str,
    kind: ParamKind,
) -> Result<(), ShadingError> {
    if ctx.is_current_generation(program, generation) {
        Ok(())
    } else {
        Err(ShadingError::StaleBinding {
            name: name.to_string(),
            kind,
        })
    }
}

/// A vertex attribute resolved against one linked program.
///
/// Owns no GPU buffer. Uploads require the owning program to be current on
/// the context; an unresolved attribute turns every upload into a no-op.
/// Once the owning program is released the binding is stale for good, even if
/// the driver hands its name to a new program.
#[derive(Debug)]
pub struct AttributeBinding<B: GlBackend> {
    name: String,
    program: B::Program,
    generation: u64,
    location: Option<u32>,
}

impl<B: GlBackend> AttributeBinding<B> {
    pub(crate) fn new(
        name: &str,
        program: B::Program,
        generation: u64,
        location: Option<u32>,
    ) -> Self {
        Self {
            name: name.to_string(),
            program,
            generation,
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<u32> {
        self.location
    }

    pub fn is_resolved(&self) -> bool {
        self.location.is_some()
    }

    /// The unresolved-name warning, if this binding is a no-op.
    pub fn warning(&self) -> Option<UnknownParameter> {
        self.location.is_none().then(|| UnknownParameter {
            name: self.name.clone(),
            kind: ParamKind::Attribute,
        })
    }

    /// Enable the attribute array and describe how to read `components`
    /// floats per vertex out of `data`, `stride` bytes apart.
    ///
    /// Replaces whatever was bound at this location before. An unresolved
    /// attribute skips the upload without looking at `data`.
    pub fn bind_vertex_data(
        &self,
        ctx: &mut GlContext<B>,
        data: &[f32],
        components: u32,
        normalized: bool,
        stride: u32,
    ) -> Result<(), ShadingError> {
        let Some(location) = self.location else {
            tracing::trace!(name = %self.name, "skipping upload to unresolved attribute");
            return Ok(());
        };
        if !(1..=4).contains(&components) {
            return Err(self.invalid(format!("{components} components per vertex, expected 1 to 4")));
        }
        if data.is_empty() {
            return Err(self.invalid("buffer is empty".into()));
        }
        if stride == 0 && data.len() % components as usize != 0 {
            return Err(self.invalid(format!(
                "{} floats is not a whole number of {components}-component vertices",
                data.len()
            )));
        }
        ensure_current(ctx, self.program, self.generation, &self.name, ParamKind::Attribute)?;

        tracing::trace!(name = %self.name, location, components, len = data.len(), "vertex data");
        ctx.backend_mut()
            .vertex_attrib_array(
                location,
                VertexLayout {
                    components,
                    normalized,
                    stride,
                },
                data,
            )
            .map_err(|reason| ShadingError::Allocation {
                object: "vertex buffer",
                reason,
            })
    }

    /// Set a constant value for every vertex instead of an array.
    pub fn bind_constant(
        &self,
        ctx: &mut GlContext<B>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> Result<(), ShadingError> {
        let Some(location) = self.location else {
            tracing::trace!(name = %self.name, "skipping upload to unresolved attribute");
            return Ok(());
        };
        ensure_current(ctx, self.program, self.generation, &self.name, ParamKind::Attribute)?;
        ctx.backend_mut().vertex_attrib_4f(location, [x, y, z, w]);
        Ok(())
    }

    fn invalid(&self, reason: String) -> ShadingError {
        ShadingError::InvalidVertexData {
            name: self.name.clone(),
            reason,
        }
    }
}

/// A uniform resolved against one linked program.
///
/// Same currency and no-op rules as [`AttributeBinding`].
#[derive(Debug)]
pub struct UniformBinding<B: GlBackend> {
    name: String,
    program: B::Program,
    generation: u64,
    location: Option<B::UniformLocation>,
}

impl<B: GlBackend> UniformBinding<B> {
    pub(crate) fn new(
        name: &str,
        program: B::Program,
        generation: u64,
        location: Option<B::UniformLocation>,
    ) -> Self {
        Self {
            name: name.to_string(),
            program,
            generation,
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&B::UniformLocation> {
        self.location.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.location.is_some()
    }

    pub fn warning(&self) -> Option<UnknownParameter> {
        self.location.is_none().then(|| UnknownParameter {
            name: self.name.clone(),
            kind: ParamKind::Uniform,
        })
    }

    /// Upload a column-major 4x4 matrix.
    pub fn bind_matrix4(&self, ctx: &mut GlContext<B>, values: &[f32; 16]) -> Result<(), ShadingError> {
        self.upload(ctx, |gl, location| gl.uniform_matrix_4(location, values))
    }

    pub fn bind_vec3(&self, ctx: &mut GlContext<B>, x: f32, y: f32, z: f32) -> Result<(), ShadingError> {
        self.upload(ctx, |gl, location| gl.uniform_3f(location, [x, y, z]))
    }

    pub fn bind_vec4(
        &self,
        ctx: &mut GlContext<B>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> Result<(), ShadingError> {
        self.upload(ctx, |gl, location| gl.uniform_4f(location, [x, y, z, w]))
    }

    pub fn bind_float(&self, ctx: &mut GlContext<B>, value: f32) -> Result<(), ShadingError> {
        self.upload(ctx, |gl, location| gl.uniform_1f(location, value))
    }

    fn upload(
        &self,
        ctx: &mut GlContext<B>,
        f: impl FnOnce(&mut B, &B::UniformLocation),
    ) -> Result<(), ShadingError> {
        let Some(location) = &self.location else {
            tracing::trace!(name = %self.name, "skipping upload to unresolved uniform");
            return Ok(());
        };
        ensure_current(ctx, self.program, self.generation, &self.name, ParamKind::Uniform)?;
        tracing::trace!(name = %self.name, ?location, "uniform upload");
        f(ctx.backend_mut(), location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Shader, ShadingProgram};
    use glshade_gl::{HeadlessGl, UniformData};

    use super::*;

    const VERTEX: &str = "uniform mat4 u_Matrix;\n\
        attribute vec4 a_Position;\nattribute vec4 a_Color;\nattribute vec3 a_Normal;\n\
        varying vec4 v_Color;\n\
        void main() {\n    v_Color = a_Color;\n    gl_Position = u_Matrix * a_Position;\n}\n";
    const FRAGMENT: &str = "precision mediump float;\n\
        uniform vec4 u_Color;\nuniform vec3 u_Light;\nuniform float u_Alpha;\n\
        varying vec4 v_Color;\n\
        void main() {\n    gl_FragColor = v_Color * u_Color * vec4(u_Light, u_Alpha);\n}\n";

    fn linked(ctx: &mut GlContext<HeadlessGl>) -> ShadingProgram<HeadlessGl> {
        let mut p = ShadingProgram::new(Shader::vertex(VERTEX), Shader::fragment(FRAGMENT)).unwrap();
        p.setup(ctx).unwrap();
        p
    }

    #[test]
    fn uniform_uploads_reach_backend() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let handle = p.handle().unwrap();

        let mut identity = [0.0; 16];
        identity[0] = 1.0;
        identity[5] = 1.0;
        identity[10] = 1.0;
        identity[15] = 1.0;
        p.bind_uniform(&ctx, "u_Matrix")
            .unwrap()
            .bind_matrix4(&mut ctx, &identity)
            .unwrap();
        p.bind_uniform(&ctx, "u_Color")
            .unwrap()
            .bind_vec4(&mut ctx, 0.0, 0.0, 1.0, 1.0)
            .unwrap();
        p.bind_uniform(&ctx, "u_Light")
            .unwrap()
            .bind_vec3(&mut ctx, 0.5, 0.2, 0.5)
            .unwrap();
        p.bind_uniform(&ctx, "u_Alpha")
            .unwrap()
            .bind_float(&mut ctx, 0.75)
            .unwrap();

        let gl = ctx.backend();
        assert_eq!(gl.uniform_value(handle, "u_Matrix"), Some(UniformData::Mat4(identity)));
        assert_eq!(gl.uniform_value(handle, "u_Color"), Some(UniformData::Vec4([0.0, 0.0, 1.0, 1.0])));
        assert_eq!(gl.uniform_value(handle, "u_Light"), Some(UniformData::Vec3([0.5, 0.2, 0.5])));
        assert_eq!(gl.uniform_value(handle, "u_Alpha"), Some(UniformData::Float(0.75)));
        assert_eq!(gl.invalid_operations(), 0);
        p.release(&mut ctx);
    }

    #[test]
    fn stale_binding_after_switching_program() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut a = linked(&mut ctx);
        let mut b = linked(&mut ctx);

        a.use_program(&mut ctx).unwrap();
        let color = a.bind_uniform(&ctx, "u_Color").unwrap();
        let position = a.bind_attribute(&ctx, "a_Position").unwrap();
        color.bind_vec4(&mut ctx, 1.0, 0.0, 0.0, 1.0).unwrap();

        b.use_program(&mut ctx).unwrap();
        let err = color.bind_vec4(&mut ctx, 0.0, 1.0, 0.0, 1.0).unwrap_err();
        assert!(err.is_illegal_state());
        assert!(matches!(
            err,
            ShadingError::StaleBinding {
                kind: ParamKind::Uniform,
                ..
            }
        ));
        let err = position
            .bind_vertex_data(&mut ctx, &[0.0; 9], 3, false, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ShadingError::StaleBinding {
                kind: ParamKind::Attribute,
                ..
            }
        ));

        a.use_program(&mut ctx).unwrap();
        color.bind_vec4(&mut ctx, 0.0, 1.0, 0.0, 1.0).unwrap();

        a.release(&mut ctx);
        b.release(&mut ctx);
    }

    #[test]
    fn unused_attribute_reports_warning() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();

        let normal = p.bind_attribute(&ctx, "a_Normal").unwrap();
        assert!(!normal.is_resolved());
        let warning = normal.warning().unwrap();
        assert_eq!(warning.name, "a_Normal");
        assert_eq!(warning.kind, ParamKind::Attribute);
        normal.bind_vertex_data(&mut ctx, &[0.0; 9], 3, false, 0).unwrap();
        normal.bind_constant(&mut ctx, 0.0, 0.0, 1.0, 0.0).unwrap();

        let position = p.bind_attribute(&ctx, "a_Position").unwrap();
        assert!(position.warning().is_none());
        assert_eq!(position.location(), Some(0));
        assert_eq!(ctx.backend().attrib_array(0), None);
        p.release(&mut ctx);
    }

    #[test]
    fn vertex_data_is_validated() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let position = p.bind_attribute(&ctx, "a_Position").unwrap();

        for (data, components) in [(&[][..], 3), (&[0.0; 6][..], 0), (&[0.0; 6][..], 5), (&[0.0; 7][..], 3)] {
            let err = position
                .bind_vertex_data(&mut ctx, data, components, false, 0)
                .unwrap_err();
            assert!(matches!(err, ShadingError::InvalidVertexData { .. }), "{err}");
        }
        assert!(ctx.backend().attrib_array(0).is_none());
        p.release(&mut ctx);
    }

    #[test]
    fn last_vertex_upload_wins() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let color = p.bind_attribute(&ctx, "a_Color").unwrap();
        let location = color.location().unwrap();

        color.bind_vertex_data(&mut ctx, &[1.0; 12], 4, false, 0).unwrap();
        color.bind_vertex_data(&mut ctx, &[0.5; 32], 4, true, 32).unwrap();

        let array = ctx.backend().attrib_array(location).unwrap();
        assert_eq!(array.layout.stride, 32);
        assert!(array.layout.normalized);
        assert_eq!(array.data.len(), 32);
        p.release(&mut ctx);
    }

    #[test]
    fn unresolved_attribute_ignores_bad_data() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let missing = p.bind_attribute(&ctx, "a_Missing").unwrap();
        assert!(!missing.is_resolved());

        missing.bind_vertex_data(&mut ctx, &[], 3, false, 0).unwrap();
        missing.bind_vertex_data(&mut ctx, &[0.0; 6], 7, false, 0).unwrap();
        missing.bind_vertex_data(&mut ctx, &[0.0; 7], 3, false, 0).unwrap();
        assert_eq!(ctx.backend().invalid_operations(), 0);
        p.release(&mut ctx);
    }

    #[test]
    fn vertex_buffer_allocation_failure_is_reported() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let position = p.bind_attribute(&ctx, "a_Position").unwrap();

        ctx.backend_mut().fail_next_allocation();
        let err = position
            .bind_vertex_data(&mut ctx, &[0.0; 9], 3, false, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ShadingError::Allocation {
                object: "vertex buffer",
                ..
            }
        ));
        assert!(ctx.backend().attrib_array(0).is_none());

        position.bind_vertex_data(&mut ctx, &[0.0; 9], 3, false, 0).unwrap();
        assert!(ctx.backend().attrib_array(0).is_some());
        p.release(&mut ctx);
    }

    #[test]
    fn binding_stays_stale_when_program_name_is_reused() {
        let mut ctx = GlContext::new(HeadlessGl::with_recycled_names());
        let mut old = linked(&mut ctx);
        old.use_program(&mut ctx).unwrap();
        let color = old.bind_uniform(&ctx, "u_Color").unwrap();
        let position = old.bind_attribute(&ctx, "a_Position").unwrap();
        let old_handle = old.handle().unwrap();
        old.release(&mut ctx);

        let mut new = linked(&mut ctx);
        new.use_program(&mut ctx).unwrap();
        let new_handle = new.handle().unwrap();
        assert_eq!(new_handle, old_handle);

        let err = color.bind_vec4(&mut ctx, 1.0, 0.0, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, ShadingError::StaleBinding { .. }));
        let err = position
            .bind_vertex_data(&mut ctx, &[0.0; 9], 3, false, 0)
            .unwrap_err();
        assert!(matches!(err, ShadingError::StaleBinding { .. }));
        assert_eq!(ctx.backend().uniform_value(new_handle, "u_Color"), None);

        new.bind_uniform(&ctx, "u_Color")
            .unwrap()
            .bind_vec4(&mut ctx, 0.0, 1.0, 0.0, 1.0)
            .unwrap();
        assert_eq!(
            ctx.backend().uniform_value(new_handle, "u_Color"),
            Some(UniformData::Vec4([0.0, 1.0, 0.0, 1.0]))
        );
        new.release(&mut ctx);
    }

    #[test]
    fn constant_attribute_value() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut p = linked(&mut ctx);
        p.use_program(&mut ctx).unwrap();
        let color = p.bind_attribute(&ctx, "a_Color").unwrap();
        color.bind_constant(&mut ctx, 1.0, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(
            ctx.backend().constant_attrib(color.location().unwrap()),
            Some([1.0, 0.0, 0.0, 1.0])
        );
        p.release(&mut ctx);
    }
}
