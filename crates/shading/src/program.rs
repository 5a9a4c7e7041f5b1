use std::fmt;

use glshade_gl::{GlBackend, GlContext, ShaderKind};

use crate::binding::{AttributeBinding, UniformBinding};
use crate::error::{ParamKind, ShadingError, UnknownParameter};
use crate::shader::{Shader, ShaderUnit};

/// Lifecycle state of a [`ShadingProgram`].
///
/// `Uncompiled --setup--> Linked --release--> Released`. A failed setup
/// leaves the program `Uncompiled`; `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Uncompiled,
    Linked,
    Released,
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncompiled => f.write_str("uncompiled"),
            Self::Linked => f.write_str("linked"),
            Self::Released => f.write_str("released"),
        }
    }
}

#[derive(Debug)]
struct LinkedProgram<B: GlBackend> {
    handle: B::Program,
    generation: u64,
    vertex: ShaderUnit<B>,
    fragment: ShaderUnit<B>,
}

/// A vertex and fragment shader pair and the GPU program linked from them.
///
/// The program handle exists exactly while the state is `Linked`. GPU
/// objects are only freed by [`release`](Self::release); dropping a linked
/// program leaks them and logs a warning.
#[derive(Debug)]
pub struct ShadingProgram<B: GlBackend> {
    vertex: Shader,
    fragment: Shader,
    state: ProgramState,
    linked: Option<LinkedProgram<B>>,
}

impl<B: GlBackend> ShadingProgram<B> {
    /// Pair a vertex and a fragment shader. Fails before any GPU work when a
    /// shader sits in the wrong slot.
    pub fn new(vertex: Shader, fragment: Shader) -> Result<Self, ShadingError> {
        for (shader, expected) in [(&vertex, ShaderKind::Vertex), (&fragment, ShaderKind::Fragment)] {
            if shader.kind() != expected {
                return Err(ShadingError::KindMismatch {
                    expected,
                    found: shader.kind(),
                });
            }
        }
        Ok(Self {
            vertex,
            fragment,
            state: ProgramState::Uncompiled,
            linked: None,
        })
    }

    pub fn from_sources(
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Self {
        Self {
            vertex: Shader::vertex(vertex_source),
            fragment: Shader::fragment(fragment_source),
            state: ProgramState::Uncompiled,
            linked: None,
        }
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn is_linked(&self) -> bool {
        self.state == ProgramState::Linked
    }

    /// GPU program name, present only while linked.
    pub fn handle(&self) -> Option<B::Program> {
        self.linked.as_ref().map(|l| l.handle)
    }

    pub fn vertex_shader(&self) -> &Shader {
        &self.vertex
    }

    pub fn fragment_shader(&self) -> &Shader {
        &self.fragment
    }

    /// Compile both stages and link them into a new GPU program.
    ///
    /// Every object allocated along the way is freed again when a step
    /// fails, and the program stays `Uncompiled`.
    pub fn setup(&mut self, ctx: &mut GlContext<B>) -> Result<(), ShadingError> {
        self.expect_state(ProgramState::Uncompiled, "set up")?;
        let _span = tracing::info_span!("program_setup").entered();

        let handle = ctx
            .backend_mut()
            .create_program()
            .map_err(|reason| ShadingError::Allocation {
                object: "shading program",
                reason,
            })?;

        let vertex = match ShaderUnit::compile(ctx, &self.vertex) {
            Ok(unit) => unit,
            Err(e) => {
                ctx.backend_mut().delete_program(handle);
                return Err(e);
            }
        };
        ctx.backend_mut().attach_shader(handle, vertex.handle());

        let fragment = match ShaderUnit::compile(ctx, &self.fragment) {
            Ok(unit) => unit,
            Err(e) => {
                ctx.backend_mut().delete_program(handle);
                vertex.delete(ctx);
                return Err(e);
            }
        };
        ctx.backend_mut().attach_shader(handle, fragment.handle());

        let gl = ctx.backend_mut();
        gl.link_program(handle);
        if !gl.program_link_status(handle) {
            let info_log = gl.program_info_log(handle);
            gl.delete_program(handle);
            vertex.delete(ctx);
            fragment.delete(ctx);
            tracing::debug!(%info_log, "program link failed");
            return Err(ShadingError::Link { info_log });
        }

        let generation = ctx.track_program(handle);
        tracing::debug!(?handle, generation, "program linked");
        self.linked = Some(LinkedProgram {
            handle,
            generation,
            vertex,
            fragment,
        });
        self.state = ProgramState::Linked;
        Ok(())
    }

    /// Make this program current on `ctx`.
    pub fn use_program(&self, ctx: &mut GlContext<B>) -> Result<(), ShadingError> {
        let handle = self.linked_handle("use")?;
        ctx.use_program(Some(handle));
        Ok(())
    }

    /// Free the program and its shader objects. Calling it again is a no-op.
    pub fn release(&mut self, ctx: &mut GlContext<B>) {
        match self.state {
            ProgramState::Released => {
                tracing::trace!("program already released");
            }
            ProgramState::Uncompiled => {
                self.state = ProgramState::Released;
            }
            ProgramState::Linked => {
                self.state = ProgramState::Released;
                let Some(linked) = self.linked.take() else {
                    return;
                };
                if ctx.is_current(linked.handle) {
                    ctx.use_program(None);
                }
                ctx.untrack_program(linked.handle);
                let gl = ctx.backend_mut();
                gl.detach_shader(linked.handle, linked.vertex.handle());
                gl.detach_shader(linked.handle, linked.fragment.handle());
                gl.delete_program(linked.handle);
                linked.vertex.delete(ctx);
                linked.fragment.delete(ctx);
                tracing::debug!(handle = ?linked.handle, "program released");
            }
        }
    }

    /// Make the program current, then run `f` against it.
    pub fn execute_using<R>(
        &self,
        ctx: &mut GlContext<B>,
        f: impl FnOnce(&mut GlContext<B>, &Self) -> Result<R, ShadingError>,
    ) -> Result<R, ShadingError> {
        self.use_program(ctx)?;
        f(ctx, self)
    }

    /// Resolve a vertex attribute by name.
    ///
    /// A name the linked program does not expose yields an unresolved
    /// binding whose uploads do nothing.
    pub fn bind_attribute(
        &self,
        ctx: &GlContext<B>,
        name: &str,
    ) -> Result<AttributeBinding<B>, ShadingError> {
        let (handle, generation) = self.linked_stamp("bind attributes of")?;
        let location = ctx.backend().attrib_location(handle, name);
        if location.is_none() {
            tracing::warn!(name, "attribute not active in program; uploads will be skipped");
        }
        Ok(AttributeBinding::new(name, handle, generation, location))
    }

    /// Resolve a uniform by name. Unresolved names behave as in
    /// [`bind_attribute`](Self::bind_attribute).
    pub fn bind_uniform(
        &self,
        ctx: &GlContext<B>,
        name: &str,
    ) -> Result<UniformBinding<B>, ShadingError> {
        let (handle, generation) = self.linked_stamp("bind uniforms of")?;
        let location = ctx.backend().uniform_location(handle, name);
        if location.is_none() {
            tracing::warn!(name, "uniform not active in program; uploads will be skipped");
        }
        Ok(UniformBinding::new(name, handle, generation, location))
    }

    /// Like [`bind_attribute`](Self::bind_attribute), but an unresolved name is an error.
    pub fn require_attribute(
        &self,
        ctx: &GlContext<B>,
        name: &str,
    ) -> Result<AttributeBinding<B>, ShadingError> {
        let (handle, generation) = self.linked_stamp("bind attributes of")?;
        let location = ctx
            .backend()
            .attrib_location(handle, name)
            .ok_or_else(|| UnknownParameter {
                name: name.to_string(),
                kind: ParamKind::Attribute,
            })?;
        Ok(AttributeBinding::new(name, handle, generation, Some(location)))
    }

    /// Like [`bind_uniform`](Self::bind_uniform), but an unresolved name is an error.
    pub fn require_uniform(
        &self,
        ctx: &GlContext<B>,
        name: &str,
    ) -> Result<UniformBinding<B>, ShadingError> {
        let (handle, generation) = self.linked_stamp("bind uniforms of")?;
        let location = ctx
            .backend()
            .uniform_location(handle, name)
            .ok_or_else(|| UnknownParameter {
                name: name.to_string(),
                kind: ParamKind::Uniform,
            })?;
        Ok(UniformBinding::new(name, handle, generation, Some(location)))
    }

    fn expect_state(
        &self,
        expected: ProgramState,
        operation: &'static str,
    ) -> Result<(), ShadingError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ShadingError::IllegalState {
                operation,
                state: self.state,
            })
        }
    }

    fn linked_handle(&self, operation: &'static str) -> Result<B::Program, ShadingError> {
        self.linked_stamp(operation).map(|(handle, _)| handle)
    }

    fn linked_stamp(&self, operation: &'static str) -> Result<(B::Program, u64), ShadingError> {
        self.expect_state(ProgramState::Linked, operation)?;
        self.linked
            .as_ref()
            .map(|l| (l.handle, l.generation))
            .ok_or(ShadingError::IllegalState {
                operation,
                state: self.state,
            })
    }
}

impl<B: GlBackend> Drop for ShadingProgram<B> {
    fn drop(&mut self) {
        if let Some(linked) = &self.linked {
            tracing::warn!(handle = ?linked.handle, "shading program dropped while linked; GPU objects leaked");
        }
    }
}
