use glshade_gl::{GlBackend, GlContext, ShaderKind};

use crate::error::ShadingError;

/// Shader source for one pipeline stage.
///
/// Holds no GPU state; compiling it produces a [`ShaderUnit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    kind: ShaderKind,
    source: String,
}

impl Shader {
    pub fn new(kind: ShaderKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn vertex(source: impl Into<String>) -> Self {
        Self::new(ShaderKind::Vertex, source)
    }

    pub fn fragment(source: impl Into<String>) -> Self {
        Self::new(ShaderKind::Fragment, source)
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A compiled shader object.
///
/// Only exists for sources that compiled; the handle is freed by
/// [`ShaderUnit::delete`], which consumes the unit.
#[derive(Debug)]
pub struct ShaderUnit<B: GlBackend> {
    kind: ShaderKind,
    source: String,
    handle: B::Shader,
}

impl<B: GlBackend> ShaderUnit<B> {
    /// Allocate a shader object, submit the source and compile it.
    ///
    /// On failure the shader object is deleted before the error is returned.
    pub fn compile(ctx: &mut GlContext<B>, shader: &Shader) -> Result<Self, ShadingError> {
        let kind = shader.kind();
        let gl = ctx.backend_mut();
        let handle = gl
            .create_shader(kind)
            .map_err(|reason| ShadingError::Allocation {
                object: "shader",
                reason,
            })?;
        gl.shader_source(handle, shader.source());
        gl.compile_shader(handle);

        if !gl.shader_compile_status(handle) {
            let info_log = gl.shader_info_log(handle);
            gl.delete_shader(handle);
            tracing::debug!(%kind, %info_log, "shader compile failed");
            return Err(ShadingError::Compile { kind, info_log });
        }

        tracing::debug!(%kind, ?handle, "shader compiled");
        Ok(Self {
            kind,
            source: shader.source().to_string(),
            handle,
        })
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    /// Source text the unit was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn handle(&self) -> B::Shader {
        self.handle
    }

    pub fn delete(self, ctx: &mut GlContext<B>) {
        tracing::debug!(kind = %self.kind, handle = ?self.handle, "shader deleted");
        ctx.backend_mut().delete_shader(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glshade_gl::HeadlessGl;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Shader::vertex("").kind(), ShaderKind::Vertex);
        assert_eq!(Shader::fragment("").kind(), ShaderKind::Fragment);
        assert_eq!(Shader::vertex("void main() {}").source(), "void main() {}");
    }

    #[test]
    fn compile_success_keeps_handle() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let unit = ShaderUnit::compile(
            &mut ctx,
            &Shader::fragment("void main() { gl_FragColor = vec4(1.0); }"),
        )
        .unwrap();
        assert_eq!(unit.kind(), ShaderKind::Fragment);
        assert_eq!(unit.source(), "void main() { gl_FragColor = vec4(1.0); }");
        assert_eq!(ctx.backend().live_shaders(), 1);

        unit.delete(&mut ctx);
        assert_eq!(ctx.backend().live_shaders(), 0);
        assert_eq!(ctx.backend().invalid_operations(), 0);
    }

    #[test]
    fn compile_failure_frees_shader_object() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let err = ShaderUnit::compile(
            &mut ctx,
            &Shader::vertex("void main() { gl_Position = vec4(1.0)"),
        )
        .unwrap_err();

        match err {
            ShadingError::Compile { kind, info_log } => {
                assert_eq!(kind, ShaderKind::Vertex);
                assert!(info_log.starts_with("ERROR: 0:1"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.backend().shaders_created(), 1);
        assert_eq!(ctx.backend().live_shaders(), 0);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        ctx.backend_mut().fail_next_allocation();
        let err = ShaderUnit::compile(&mut ctx, &Shader::vertex("void main() {}")).unwrap_err();
        assert!(matches!(err, ShadingError::Allocation { object: "shader", .. }));
    }
}
