//! Shader compilation, program lifecycle and parameter bindings.
//!
//! A [`ShadingProgram`] owns a vertex and fragment [`Shader`], compiles and
//! links them on [`setup`](ShadingProgram::setup), and hands out
//! [`AttributeBinding`]s and [`UniformBinding`]s for per-frame uploads. Every
//! GPU-touching call takes an explicit [`GlContext`](glshade_gl::GlContext).
//!
//! # Invariants
//! - A program has a GPU handle iff it is `Linked`.
//! - A failed setup frees every object it allocated.
//! - `release` is the only path that frees GPU objects and is idempotent.
//! - Uploads through an unresolved binding are no-ops; uploads through a
//!   binding whose program is not current are errors.

mod binding;
mod error;
mod program;
mod shader;

pub use binding::{AttributeBinding, UniformBinding};
pub use error::{ParamKind, ShadingError, UnknownParameter};
pub use program::{ProgramState, ShadingProgram};
pub use shader::{Shader, ShaderUnit};

pub fn crate_info() -> &'static str {
    "glshade-shading v0.1.0"
}
