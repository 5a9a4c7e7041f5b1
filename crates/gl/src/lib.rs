//! GL seam: the backend trait the shading core is written against, the
//! explicit per-surface context, and a headless backend for tests.
//!
//! # Invariants
//! - The current program is context state, never process-global state.
//! - Object names handed out by a backend are only valid on that backend.
//!
//! # Backends
//! `HeadlessGl` runs entirely in memory and keeps handle accounting so that
//! leak and double-free checks can be written as plain assertions. The real
//! OpenGL backend lives in `glshade-gl-glow`.

mod backend;
mod context;
mod glsl;
mod headless;

pub use backend::{GlBackend, Primitive, ShaderKind, VertexLayout};
pub use context::GlContext;
pub use headless::{AttribArray, DrawCall, HeadlessGl, UniformData};

pub fn crate_info() -> &'static str {
    "glshade-gl v0.1.0"
}
