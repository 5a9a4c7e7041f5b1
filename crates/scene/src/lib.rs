//! Scene-side plumbing over the shading core.
//!
//! Each scene describes its program as data: a [`ProgramDescriptor`] names
//! the shader sources, the attributes the scene feeds, and the uniform
//! constants to upload. [`ScenePrograms`] owns the programs of one scene,
//! and [`presets`] ships the descriptors of the built-in scenes.
//!
//! # Invariants
//! - Descriptors are validated on load; a uniform is always 1, 3, 4 or 16 floats.
//! - Constants naming parameters a program does not expose are skipped, not errors.
//! - A failed `setup_all` leaves no program linked.

mod descriptor;
mod lit;
pub mod presets;
mod registry;

pub use descriptor::{AttributeSpec, ProgramDescriptor, UniformValue};
pub use lit::LitSceneProgram;
pub use registry::ScenePrograms;

use glshade_shading::ShadingError;

/// Errors from loading descriptors and managing scene programs.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Shading(#[from] ShadingError),
    #[error("program `{name}` failed to set up: {source}")]
    Setup { name: String, source: ShadingError },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("uniform `{name}` in `{program}` has {len} components, expected 1, 3, 4 or 16")]
    InvalidUniform {
        program: String,
        name: String,
        len: usize,
    },
    #[error("attribute `{name}` in `{program}` has {components} components, expected 1 to 4")]
    InvalidAttribute {
        program: String,
        name: String,
        components: u32,
    },
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("no program named `{0}`")]
    MissingProgram(String),
    #[error("a program named `{0}` is already registered")]
    DuplicateProgram(String),
}

pub fn crate_info() -> &'static str {
    "glshade-scene v0.1.0"
}
