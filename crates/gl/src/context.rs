use std::marker::PhantomData;

use crate::backend::{GlBackend, Primitive};

/// One GL context: a backend plus the program it currently has in use.
///
/// Everything that touches GPU state takes a `GlContext` explicitly, so two
/// contexts (for example two tests) never observe each other's current
/// program. Switching the current program through `use_program` invalidates
/// uploads through bindings resolved against the previous one.
///
/// Drivers reuse the names of deleted programs, so the context also stamps
/// each tracked program with a generation. A binding taken before its
/// program was deleted never matches a later program that got the same name.
#[derive(Debug)]
pub struct GlContext<B: GlBackend> {
    backend: B,
    current: Option<B::Program>,
    generations: Vec<(B::Program, u64)>,
    next_generation: u64,
    // GL object names are only meaningful on the thread that owns the context.
    _not_send: PhantomData<*const ()>,
}

impl<B: GlBackend> GlContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            current: None,
            generations: Vec::new(),
            next_generation: 0,
            _not_send: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Tear down the context and hand back the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Program currently in use on this context, if any.
    pub fn current_program(&self) -> Option<B::Program> {
        self.current
    }

    pub fn is_current(&self, program: B::Program) -> bool {
        self.current == Some(program)
    }

    /// Start tracking a freshly linked program and return its generation.
    pub fn track_program(&mut self, program: B::Program) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.generations.retain(|(p, _)| *p != program);
        self.generations.push((program, generation));
        generation
    }

    /// Stop tracking a program whose GL object is about to be deleted.
    pub fn untrack_program(&mut self, program: B::Program) {
        self.generations.retain(|(p, _)| *p != program);
    }

    /// Whether `program` is current and still the object stamped `generation`.
    pub fn is_current_generation(&self, program: B::Program, generation: u64) -> bool {
        self.is_current(program) && self.generations.contains(&(program, generation))
    }

    /// Make `program` current. Re-selecting the current program skips the GL call.
    pub fn use_program(&mut self, program: Option<B::Program>) {
        if self.current == program {
            tracing::trace!(?program, "program already current");
            return;
        }
        self.backend.use_program(program);
        self.current = program;
    }

    /// Issue a draw with the current program.
    ///
    /// Returns `false` without touching the GPU when no program is current.
    pub fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> bool {
        if self.current.is_none() {
            tracing::warn!(?primitive, count, "draw skipped: no program in use");
            return false;
        }
        tracing::trace!(?primitive, first, count, "draw_arrays");
        self.backend.draw_arrays(primitive, first, count);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeadlessGl, ShaderKind};

    fn linked_program(ctx: &mut GlContext<HeadlessGl>) -> u32 {
        let gl = ctx.backend_mut();
        let vs = gl.create_shader(ShaderKind::Vertex).unwrap();
        gl.shader_source(vs, "attribute vec4 a_Position; void main() { gl_Position = a_Position; }");
        gl.compile_shader(vs);
        let fs = gl.create_shader(ShaderKind::Fragment).unwrap();
        gl.shader_source(fs, "void main() { gl_FragColor = vec4(1.0); }");
        gl.compile_shader(fs);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        assert!(gl.program_link_status(program));
        program
    }

    #[test]
    fn context_starts_without_program() {
        let ctx = GlContext::new(HeadlessGl::new());
        assert_eq!(ctx.current_program(), None);
    }

    #[test]
    fn use_program_tracks_current() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let program = linked_program(&mut ctx);
        ctx.use_program(Some(program));
        assert!(ctx.is_current(program));
        assert_eq!(ctx.backend().current_program(), Some(program));

        ctx.use_program(None);
        assert_eq!(ctx.current_program(), None);
    }

    #[test]
    fn draw_without_program_is_skipped() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        assert!(!ctx.draw_arrays(Primitive::Triangles, 0, 3));
        assert!(ctx.backend().draw_calls().is_empty());
    }

    #[test]
    fn generation_changes_when_a_name_is_reused() {
        let mut ctx = GlContext::new(HeadlessGl::with_recycled_names());
        let program = linked_program(&mut ctx);
        let first = ctx.track_program(program);
        ctx.use_program(Some(program));
        assert!(ctx.is_current_generation(program, first));

        ctx.untrack_program(program);
        assert!(!ctx.is_current_generation(program, first));
        let second = ctx.track_program(program);
        assert_ne!(first, second);
        assert!(ctx.is_current_generation(program, second));
        assert!(!ctx.is_current_generation(program, first));
    }

    #[test]
    fn contexts_are_independent() {
        let mut a = GlContext::new(HeadlessGl::new());
        let b = GlContext::new(HeadlessGl::new());
        let program = linked_program(&mut a);
        a.use_program(Some(program));
        assert!(a.current_program().is_some());
        assert!(b.current_program().is_none());
    }
}
